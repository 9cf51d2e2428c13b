//! Biometric platform interface
//!
//! The gate never touches sensors, keys or dialogs itself. Capability
//! queries, the prompt dialog and the enrollment flow are owned by the
//! platform's biometric subsystem and reached through [`BiometricPlatform`].

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::BitOr;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::AuthState;

/// Authentication failures as seen by the user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BiometricError {
    #[error("Biometric authentication not available on this device")]
    Unavailable,

    #[error("No biometric credential enrolled")]
    NoneEnrolled,

    #[error("Biometric authentication was cancelled by user")]
    UserCanceled,

    #[error("Authentication error: {code}, {message}")]
    Other { code: ErrorCode, message: String },
}

impl BiometricError {
    /// Classify a platform error callback
    pub fn from_platform(code: ErrorCode, message: impl Into<String>) -> Self {
        match code {
            c if c.is_cancellation() => Self::UserCanceled,
            ErrorCode::NO_BIOMETRICS => Self::NoneEnrolled,
            ErrorCode::HW_UNAVAILABLE | ErrorCode::HW_NOT_PRESENT => Self::Unavailable,
            _ => Self::Other {
                code,
                message: message.into(),
            },
        }
    }
}

/// Set of authenticator classes a prompt may accept.
///
/// Bit values match the platform's `Authenticators` constants so they can be
/// handed across unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authenticators(u32);

impl Authenticators {
    /// Class 3 biometrics
    pub const BIOMETRIC_STRONG: Self = Self(0x000F);
    /// Class 2 biometrics (includes class 3)
    pub const BIOMETRIC_WEAK: Self = Self(0x00FF);
    /// Screen lock PIN, pattern or password
    pub const DEVICE_CREDENTIAL: Self = Self(0x8000);

    /// No authenticator allowed; rejected by the prompt builder
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw platform bit value
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every class in `other` is allowed
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the screen lock credential is an accepted fallback
    pub const fn allows_device_credential(self) -> bool {
        self.contains(Self::DEVICE_CREDENTIAL)
    }
}

impl Default for Authenticators {
    fn default() -> Self {
        Self::BIOMETRIC_STRONG | Self::DEVICE_CREDENTIAL
    }
}

impl BitOr for Authenticators {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Authenticators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::BIOMETRIC_WEAK) {
            names.push("BIOMETRIC_WEAK");
        } else if self.contains(Self::BIOMETRIC_STRONG) {
            names.push("BIOMETRIC_STRONG");
        }
        if self.allows_device_credential() {
            names.push("DEVICE_CREDENTIAL");
        }

        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

/// Raw answer of the platform capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Hardware present and a credential is enrolled
    Success,
    /// Hardware present, nothing enrolled yet
    NoneEnrolled,
    /// No hardware, hardware busy, or blocked by policy
    Unavailable,
}

impl From<Capability> for AuthState {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::Success => AuthState::CanAuthenticate,
            Capability::NoneEnrolled => AuthState::NeedsEnrollment,
            Capability::Unavailable => AuthState::Unavailable,
        }
    }
}

/// Error code delivered with a prompt error callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const HW_UNAVAILABLE: Self = Self(1);
    pub const UNABLE_TO_PROCESS: Self = Self(2);
    pub const TIMEOUT: Self = Self(3);
    pub const NO_SPACE: Self = Self(4);
    pub const CANCELED: Self = Self(5);
    pub const LOCKOUT: Self = Self(7);
    pub const VENDOR: Self = Self(8);
    pub const LOCKOUT_PERMANENT: Self = Self(9);
    pub const USER_CANCELED: Self = Self(10);
    pub const NO_BIOMETRICS: Self = Self(11);
    pub const HW_NOT_PRESENT: Self = Self(12);
    pub const NEGATIVE_BUTTON: Self = Self(13);
    pub const NO_DEVICE_CREDENTIAL: Self = Self(14);

    /// The user dismissed the dialog (back gesture or negative button)
    pub fn is_cancellation(self) -> bool {
        self == Self::USER_CANCELED || self == Self::NEGATIVE_BUTTON
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion of one prompt dialog callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Credential accepted, dialog closed
    Succeeded,
    /// One sample rejected, dialog still showing
    Failed,
    /// Dialog closed with an error (including user cancellation)
    Error { code: ErrorCode, message: String },
}

impl PromptOutcome {
    /// Error callback with the platform's code and message
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// User backed out of the dialog
    pub fn canceled() -> Self {
        Self::error(ErrorCode::USER_CANCELED, "Authentication canceled by user")
    }
}

/// Completion of the platform enrollment flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentResult {
    Completed,
    /// Flow left without enrolling; `code` is the activity result code
    Canceled { code: i32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptInfoError {
    #[error("Prompt title must not be empty")]
    EmptyTitle,

    #[error("At least one authenticator must be allowed")]
    NoAuthenticators,

    #[error("Negative button text is required when device credential is not allowed")]
    MissingNegativeButton,

    #[error("Negative button text cannot be set when device credential is allowed")]
    UnexpectedNegativeButton,
}

/// Content and options of the platform prompt dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInfo {
    title: String,
    subtitle: String,
    description: Option<String>,
    allowed_authenticators: Authenticators,
    confirmation_required: bool,
    negative_button_text: Option<String>,
}

impl PromptInfo {
    pub fn builder(title: impl Into<String>) -> PromptInfoBuilder {
        PromptInfoBuilder {
            title: title.into(),
            subtitle: String::new(),
            description: None,
            allowed_authenticators: Authenticators::default(),
            confirmation_required: false,
            negative_button_text: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn allowed_authenticators(&self) -> Authenticators {
        self.allowed_authenticators
    }

    pub fn confirmation_required(&self) -> bool {
        self.confirmation_required
    }

    pub fn negative_button_text(&self) -> Option<&str> {
        self.negative_button_text.as_deref()
    }
}

pub struct PromptInfoBuilder {
    title: String,
    subtitle: String,
    description: Option<String>,
    allowed_authenticators: Authenticators,
    confirmation_required: bool,
    negative_button_text: Option<String>,
}

impl PromptInfoBuilder {
    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn allowed_authenticators(mut self, authenticators: Authenticators) -> Self {
        self.allowed_authenticators = authenticators;
        self
    }

    /// Require an explicit confirm tap after a passive biometric (face)
    pub fn confirmation_required(mut self, required: bool) -> Self {
        self.confirmation_required = required;
        self
    }

    pub fn negative_button_text(mut self, text: impl Into<String>) -> Self {
        self.negative_button_text = Some(text.into());
        self
    }

    /// Validate the combination the same way the platform would at show time
    pub fn build(self) -> Result<PromptInfo, PromptInfoError> {
        if self.title.trim().is_empty() {
            return Err(PromptInfoError::EmptyTitle);
        }
        if self.allowed_authenticators.is_empty() {
            return Err(PromptInfoError::NoAuthenticators);
        }

        match (
            self.allowed_authenticators.allows_device_credential(),
            &self.negative_button_text,
        ) {
            (false, None) => return Err(PromptInfoError::MissingNegativeButton),
            (true, Some(_)) => return Err(PromptInfoError::UnexpectedNegativeButton),
            _ => {}
        }

        Ok(PromptInfo {
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            allowed_authenticators: self.allowed_authenticators,
            confirmation_required: self.confirmation_required,
            negative_button_text: self.negative_button_text,
        })
    }
}

/// Future returned by platform calls that complete on a later callback
pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Platform biometric subsystem, consumed but never reimplemented
pub trait BiometricPlatform: Send + Sync {
    /// Query whether `authenticators` can currently be used
    fn can_authenticate(&self, authenticators: Authenticators) -> Capability;

    /// Show the system prompt and resolve with its next callback
    fn show_prompt(&self, info: &PromptInfo) -> PlatformFuture<'_, PromptOutcome>;

    /// Launch the system enrollment flow
    fn open_enrollment(&self, authenticators: Authenticators)
        -> PlatformFuture<'_, EnrollmentResult>;
}

/// Scripted platform for tests and demos
pub struct MockBiometricPlatform {
    capability: Mutex<Capability>,
    outcomes: Mutex<VecDeque<PromptOutcome>>,
    enrollments: Mutex<VecDeque<EnrollmentResult>>,
    prompts_shown: Mutex<Vec<PromptInfo>>,
    enrollments_opened: Mutex<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBiometricPlatform {
    /// Platform reporting a fixed capability with nothing scripted
    pub fn new(capability: Capability) -> Self {
        Self {
            capability: Mutex::new(capability),
            outcomes: Mutex::new(VecDeque::new()),
            enrollments: Mutex::new(VecDeque::new()),
            prompts_shown: Mutex::new(Vec::new()),
            enrollments_opened: Mutex::new(0),
        }
    }

    /// Platform with an enrolled credential
    pub fn enrolled() -> Self {
        Self::new(Capability::Success)
    }

    /// Script the prompt outcomes, consumed in order
    pub fn with_outcomes<I>(self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = PromptOutcome>,
    {
        lock(&self.outcomes).extend(outcomes);
        self
    }

    pub fn push_outcome(&self, outcome: PromptOutcome) {
        lock(&self.outcomes).push_back(outcome);
    }

    pub fn push_enrollment(&self, result: EnrollmentResult) {
        lock(&self.enrollments).push_back(result);
    }

    /// Change the capability, as enrolling from system settings would
    pub fn set_capability(&self, capability: Capability) {
        *lock(&self.capability) = capability;
    }

    /// Number of times the prompt dialog was awaited
    pub fn prompt_count(&self) -> usize {
        lock(&self.prompts_shown).len()
    }

    /// Dialog configuration of the most recent prompt
    pub fn last_prompt(&self) -> Option<PromptInfo> {
        lock(&self.prompts_shown).last().cloned()
    }

    pub fn enrollment_count(&self) -> usize {
        *lock(&self.enrollments_opened)
    }
}

impl BiometricPlatform for MockBiometricPlatform {
    fn can_authenticate(&self, _authenticators: Authenticators) -> Capability {
        *lock(&self.capability)
    }

    fn show_prompt(&self, info: &PromptInfo) -> PlatformFuture<'_, PromptOutcome> {
        lock(&self.prompts_shown).push(info.clone());
        // Running out of script behaves like the system dismissing the dialog
        let outcome = lock(&self.outcomes)
            .pop_front()
            .unwrap_or_else(|| PromptOutcome::error(ErrorCode::CANCELED, "Prompt dismissed"));
        Box::pin(async move { outcome })
    }

    fn open_enrollment(
        &self,
        _authenticators: Authenticators,
    ) -> PlatformFuture<'_, EnrollmentResult> {
        *lock(&self.enrollments_opened) += 1;
        let result = lock(&self.enrollments)
            .pop_front()
            .unwrap_or(EnrollmentResult::Canceled { code: 0 });
        if result == EnrollmentResult::Completed {
            self.set_capability(Capability::Success);
        }
        Box::pin(async move { result })
    }
}
