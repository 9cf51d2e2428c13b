//! Lock controller
//!
//! Synchronous state machine behind the gate. Lifecycle callbacks (create,
//! resume, pause) and platform completions go in; [`Effect`]s come out.
//!
//! The UI counts as unlocked only between a successful authentication and
//! the next foregrounding that the policy decides needs a prompt. A device
//! with nothing enrolled, or no usable hardware, opens the gate without a
//! credential; that session is never authenticated. The last authentication
//! time is refreshed on pause only for an authenticated session, so neither
//! a restart within the idle threshold nor a later enrollment skips a
//! pending prompt.

use log::{debug, error, info, warn};

use crate::biometric::{BiometricError, Capability, EnrollmentResult, PromptOutcome};
use crate::clock::Clock;
use crate::config::GateSettings;
use crate::events::{Effect, Overlay};
use crate::policy::{decide, Action, AuthState, Timestamp};
use crate::prompt::{PromptLifecycle, PromptState, TransitionError};
use crate::store::KeyValueStore;

pub struct LockController<S, C> {
    settings: GateSettings,
    store: S,
    clock: C,
    prompt: PromptLifecycle,
    overlay: Overlay,
    unlocked: bool,
    // Unlocked by a success in this session, or continuing one within the threshold
    authenticated: bool,
    enrollment_declined: bool,
}

impl<S: KeyValueStore, C: Clock> LockController<S, C> {
    pub fn new(settings: GateSettings, store: S, clock: C) -> Self {
        Self {
            settings,
            store,
            clock,
            prompt: PromptLifecycle::new(),
            overlay: Overlay::None,
            unlocked: false,
            authenticated: false,
            enrollment_declined: false,
        }
    }

    /// Whether app content may be shown
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Whether the current session was unlocked by a biometric credential
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Overlay currently covering the app
    pub fn overlay(&self) -> Overlay {
        self.overlay
    }

    /// Current prompt lifecycle state
    pub fn prompt_state(&self) -> PromptState {
        self.prompt.state()
    }

    /// Whether the platform dialog is up
    pub fn is_awaiting_prompt(&self) -> bool {
        self.prompt.is_awaiting()
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Backing timestamp store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored time of the last success, `None` if never recorded.
    ///
    /// A store that cannot be read is treated as empty, which prompts.
    pub fn last_auth_time(&self) -> Option<Timestamp> {
        match self.store.get(self.settings.timestamp_key()) {
            Ok(value) => value,
            Err(e) => {
                warn!("unable to read last authentication time ({e})");
                None
            }
        }
    }

    /// App started. Offers enrollment when nothing is enrolled yet.
    pub fn on_create(&mut self, capability: Capability) -> Vec<Effect> {
        let state = AuthState::from(capability);
        info!("biometric capability on create: {state:?}");

        if state == AuthState::NeedsEnrollment {
            self.offer_enrollment()
        } else {
            Vec::new()
        }
    }

    /// App returned to the foreground
    pub fn on_resume(&mut self, capability: Capability) -> Result<Vec<Effect>, TransitionError> {
        if self.prompt.is_awaiting() {
            debug!("prompt already showing, nothing to decide");
            return Ok(Vec::new());
        }

        let state = AuthState::from(capability);
        let now = self.clock.now_millis();
        let last = self.last_auth_time();
        let action = decide(now, last, self.settings.idle_threshold(), state);
        info!("resume: capability {state:?}, last auth {last:?}, action {action:?}");

        let mut effects = Vec::new();
        match action {
            Action::Prompt => {
                if self.overlay == Overlay::EnrollmentOffer {
                    self.dismiss_overlay(&mut effects);
                }
                effects.extend(self.show_prompt()?);
            }
            Action::Enroll => {
                // Nothing enrolled means nothing to verify with
                if self.overlay == Overlay::Locked {
                    self.dismiss_overlay(&mut effects);
                }
                self.unlocked = true;
                effects.extend(self.offer_enrollment());
            }
            Action::Skip if state == AuthState::Unavailable => {
                self.unlocked = true;
                self.dismiss_overlay(&mut effects);
            }
            Action::Skip => {
                // The locked overlay only clears on a successful authentication
                if self.overlay != Overlay::Locked {
                    self.unlocked = true;
                    self.authenticated = true;
                }
            }
        }

        Ok(effects)
    }

    /// App moved to the background
    pub fn on_pause(&mut self) {
        if self.unlocked && self.authenticated && !self.prompt.is_awaiting() {
            self.record_authentication();
        } else {
            debug!("pause without an authenticated session, keeping last authentication time");
        }
    }

    /// Unlock button on the locked overlay
    pub fn retry(&mut self) -> Result<Vec<Effect>, TransitionError> {
        if self.overlay != Overlay::Locked {
            debug!("retry ignored, app is not locked");
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        self.dismiss_overlay(&mut effects);
        effects.extend(self.show_prompt()?);
        Ok(effects)
    }

    /// Proceed button on the enrollment offer
    pub fn accept_enrollment(&mut self) -> Vec<Effect> {
        if self.overlay != Overlay::EnrollmentOffer {
            return Vec::new();
        }

        let mut effects = Vec::new();
        self.dismiss_overlay(&mut effects);
        effects.push(Effect::LaunchEnrollment(self.settings.authenticators()));
        effects
    }

    /// Cancel button on the enrollment offer. Not offered again this process.
    pub fn decline_enrollment(&mut self) -> Vec<Effect> {
        if self.overlay != Overlay::EnrollmentOffer {
            return Vec::new();
        }

        self.enrollment_declined = true;
        let mut effects = Vec::new();
        self.dismiss_overlay(&mut effects);
        effects
    }

    /// Platform enrollment flow returned
    pub fn on_enrollment_result(
        &mut self,
        result: EnrollmentResult,
    ) -> Result<Vec<Effect>, TransitionError> {
        match result {
            EnrollmentResult::Completed => {
                info!("biometric enrollment completed");
                if self.prompt.is_awaiting() {
                    return Ok(Vec::new());
                }
                self.show_prompt()
            }
            EnrollmentResult::Canceled { code } => {
                error!("Failed to enroll in biometric authentication. Error code: {code}");
                Ok(vec![Effect::Notice(format!(
                    "Failed to enroll in biometric authentication. Error code: {code}"
                ))])
            }
        }
    }

    /// Platform dialog reported a result
    pub fn on_prompt_outcome(
        &mut self,
        outcome: PromptOutcome,
    ) -> Result<Vec<Effect>, TransitionError> {
        let state = self.prompt.complete(&outcome)?;
        let mut effects = Vec::new();

        match state {
            PromptState::Succeeded => {
                info!("authentication succeeded");
                self.unlocked = true;
                self.authenticated = true;
                self.record_authentication();
                self.dismiss_overlay(&mut effects);
            }
            PromptState::Failed => {
                debug!(
                    "biometric sample rejected ({} this prompt)",
                    self.prompt.failed_samples()
                );
                effects.push(Effect::Notice("Authentication failed".to_string()));
            }
            PromptState::Canceled => {
                info!("authentication canceled, locking");
                self.unlocked = false;
                self.overlay = Overlay::Locked;
                effects.push(Effect::ShowLockedOverlay);
            }
            PromptState::Error(code) => {
                let message = match &outcome {
                    PromptOutcome::Error { message, .. } => message.as_str(),
                    _ => "",
                };
                self.dismiss_overlay(&mut effects);
                effects.push(Effect::Notice(format!(
                    "Authentication error: {code}, {message}"
                )));

                match BiometricError::from_platform(code, message) {
                    BiometricError::NoneEnrolled => {
                        // Credential removed while the app was in the background
                        warn!("authentication error {code}: no biometric enrolled");
                        effects.extend(self.offer_enrollment());
                    }
                    BiometricError::Unavailable => {
                        warn!("authentication error {code}: biometric hardware unavailable");
                    }
                    kind => error!("{kind}"),
                }
            }
            PromptState::Idle | PromptState::AwaitingResult => {}
        }

        Ok(effects)
    }

    fn show_prompt(&mut self) -> Result<Vec<Effect>, TransitionError> {
        self.prompt.begin()?;
        self.unlocked = false;
        self.authenticated = false;
        Ok(vec![Effect::ShowPrompt(self.settings.prompt_info().clone())])
    }

    fn offer_enrollment(&mut self) -> Vec<Effect> {
        if self.enrollment_declined || self.overlay == Overlay::EnrollmentOffer {
            return Vec::new();
        }

        self.overlay = Overlay::EnrollmentOffer;
        vec![Effect::ShowEnrollmentOffer]
    }

    fn dismiss_overlay(&mut self, effects: &mut Vec<Effect>) {
        if self.overlay != Overlay::None {
            self.overlay = Overlay::None;
            effects.push(Effect::DismissOverlay);
        }
    }

    fn record_authentication(&self) {
        let now = self.clock.now_millis();
        if let Err(e) = self.store.put(self.settings.timestamp_key(), now) {
            warn!("unable to store last authentication time ({e})");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::biometric::ErrorCode;
    use crate::clock::ManualClock;
    use crate::config::GateConfig;
    use crate::store::MemoryStore;

    const T: Timestamp = 1_700_000_000_000;
    const KEY: &str = "last_authenticate_time";

    type TestController = LockController<Arc<MemoryStore>, Arc<ManualClock>>;

    fn controller() -> (TestController, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T));
        let settings = GateConfig::default().settings().unwrap();
        let controller = LockController::new(settings, store.clone(), clock.clone());
        (controller, store, clock)
    }

    fn unlock(controller: &mut TestController) {
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::ShowPrompt(_)]));
        controller.on_prompt_outcome(PromptOutcome::Succeeded).unwrap();
        assert!(controller.is_unlocked());
    }

    #[test]
    fn test_first_resume_prompts() {
        let (mut controller, _, _) = controller();

        let effects = controller.on_resume(Capability::Success).unwrap();
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], Effect::ShowPrompt(info) if info.title() == "Biometric login"));
        assert!(!controller.is_unlocked());
        assert_eq!(controller.prompt_state(), PromptState::AwaitingResult);
    }

    #[test]
    fn test_success_records_timestamp() {
        let (mut controller, store, _) = controller();
        unlock(&mut controller);

        assert_eq!(store.get(KEY).unwrap(), Some(T));
        assert_eq!(controller.prompt_state(), PromptState::Succeeded);
    }

    #[test]
    fn test_short_background_skips() {
        let (mut controller, store, clock) = controller();
        unlock(&mut controller);

        clock.advance(Duration::from_secs(5));
        controller.on_pause();
        assert_eq!(store.get(KEY).unwrap(), Some(T + 5_000));

        clock.advance(Duration::from_secs(29));
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(effects.is_empty());
        assert!(controller.is_unlocked());
    }

    #[test]
    fn test_long_background_prompts() {
        let (mut controller, _, clock) = controller();
        unlock(&mut controller);

        controller.on_pause();
        clock.advance(Duration::from_secs(31));
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::ShowPrompt(_)]));
        assert!(!controller.is_unlocked());
    }

    #[test]
    fn test_cancel_locks_and_retry_unlocks() {
        let (mut controller, store, _) = controller();
        controller.on_resume(Capability::Success).unwrap();

        let effects = controller
            .on_prompt_outcome(PromptOutcome::canceled())
            .unwrap();
        assert_eq!(effects, vec![Effect::ShowLockedOverlay]);
        assert_eq!(controller.overlay(), Overlay::Locked);
        assert_eq!(controller.prompt_state(), PromptState::Canceled);

        let effects = controller.retry().unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::DismissOverlay);
        assert!(matches!(effects[1], Effect::ShowPrompt(_)));

        controller.on_prompt_outcome(PromptOutcome::Succeeded).unwrap();
        assert!(controller.is_unlocked());
        assert_eq!(store.get(KEY).unwrap(), Some(T));
    }

    #[test]
    fn test_success_dismisses_locked_overlay() {
        let (mut controller, _, clock) = controller();
        controller.on_resume(Capability::Success).unwrap();
        controller
            .on_prompt_outcome(PromptOutcome::error(ErrorCode::NEGATIVE_BUTTON, "Cancel"))
            .unwrap();
        assert_eq!(controller.overlay(), Overlay::Locked);

        // Nothing recorded yet, so resuming shows the prompt over the overlay
        clock.advance(Duration::from_secs(60));
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::ShowPrompt(_)]));
        assert_eq!(controller.overlay(), Overlay::Locked);

        let effects = controller.on_prompt_outcome(PromptOutcome::Succeeded).unwrap();
        assert_eq!(effects, vec![Effect::DismissOverlay]);
        assert_eq!(controller.overlay(), Overlay::None);
    }

    #[test]
    fn test_error_dismisses_and_notifies() {
        let (mut controller, store, _) = controller();
        controller.on_resume(Capability::Success).unwrap();
        controller
            .on_prompt_outcome(PromptOutcome::canceled())
            .unwrap();
        controller.retry().unwrap();

        let effects = controller
            .on_prompt_outcome(PromptOutcome::error(ErrorCode::LOCKOUT, "Too many attempts"))
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::Notice("Authentication error: 7, Too many attempts".to_string())]
        );
        assert_eq!(controller.prompt_state(), PromptState::Error(ErrorCode::LOCKOUT));
        assert!(!controller.is_unlocked());
        assert_eq!(store.get(KEY).unwrap(), None);

        // Terminal: nothing to retry
        assert!(controller.retry().unwrap().is_empty());
    }

    #[test]
    fn test_failed_sample_keeps_prompt() {
        let (mut controller, _, _) = controller();
        controller.on_resume(Capability::Success).unwrap();

        let effects = controller.on_prompt_outcome(PromptOutcome::Failed).unwrap();
        assert_eq!(effects, vec![Effect::Notice("Authentication failed".to_string())]);
        assert!(controller.is_awaiting_prompt());

        controller.on_prompt_outcome(PromptOutcome::Succeeded).unwrap();
        assert!(controller.is_unlocked());
    }

    #[test]
    fn test_pause_while_locked_keeps_timestamp() {
        let (mut controller, store, clock) = controller();
        unlock(&mut controller);
        controller.on_pause();

        clock.advance(Duration::from_secs(40));
        controller.on_resume(Capability::Success).unwrap();
        controller
            .on_prompt_outcome(PromptOutcome::canceled())
            .unwrap();

        clock.advance(Duration::from_secs(1));
        controller.on_pause();
        assert_eq!(store.get(KEY).unwrap(), Some(T));

        // Back within seconds: still locked
        clock.advance(Duration::from_secs(2));
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::ShowPrompt(_)]));
        assert!(!controller.is_unlocked());
    }

    #[test]
    fn test_skip_does_not_clear_locked_overlay() {
        let (mut controller, store, clock) = controller();
        store.put(KEY, T).unwrap();
        clock.advance(Duration::from_secs(60));

        controller.on_resume(Capability::Success).unwrap();
        controller
            .on_prompt_outcome(PromptOutcome::canceled())
            .unwrap();

        // Clock moved backwards past the stored time
        clock.set(T - 10_000);
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(effects.is_empty());
        assert_eq!(controller.overlay(), Overlay::Locked);
        assert!(!controller.is_unlocked());
    }

    #[test]
    fn test_resume_while_prompt_showing() {
        let (mut controller, _, _) = controller();
        controller.on_resume(Capability::Success).unwrap();
        assert!(controller.on_resume(Capability::Success).unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_opens_gate() {
        let (mut controller, _, _) = controller();
        assert!(controller.on_create(Capability::Unavailable).is_empty());

        let effects = controller.on_resume(Capability::Unavailable).unwrap();
        assert!(effects.is_empty());
        assert!(controller.is_unlocked());
    }

    #[test]
    fn test_enrollment_offer_on_create() {
        let (mut controller, _, _) = controller();

        let effects = controller.on_create(Capability::NoneEnrolled);
        assert_eq!(effects, vec![Effect::ShowEnrollmentOffer]);

        // Not offered twice while showing
        assert!(controller.on_resume(Capability::NoneEnrolled).unwrap().is_empty());
        assert_eq!(controller.overlay(), Overlay::EnrollmentOffer);

        let effects = controller.accept_enrollment();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::DismissOverlay);
        assert!(matches!(effects[1], Effect::LaunchEnrollment(a) if a.allows_device_credential()));

        let effects = controller
            .on_enrollment_result(EnrollmentResult::Completed)
            .unwrap();
        assert!(matches!(effects.as_slice(), [Effect::ShowPrompt(_)]));
    }

    #[test]
    fn test_enrollment_canceled_notice() {
        let (mut controller, _, _) = controller();
        controller.on_create(Capability::NoneEnrolled);
        controller.accept_enrollment();

        let effects = controller
            .on_enrollment_result(EnrollmentResult::Canceled { code: 0 })
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::Notice(
                "Failed to enroll in biometric authentication. Error code: 0".to_string()
            )]
        );
    }

    #[test]
    fn test_declined_enrollment_not_offered_again() {
        let (mut controller, _, _) = controller();
        controller.on_create(Capability::NoneEnrolled);

        assert_eq!(controller.decline_enrollment(), vec![Effect::DismissOverlay]);
        assert!(controller.on_resume(Capability::NoneEnrolled).unwrap().is_empty());
        assert!(controller.on_create(Capability::NoneEnrolled).is_empty());
        assert_eq!(controller.overlay(), Overlay::None);
    }

    #[test]
    fn test_enrolled_elsewhere_replaces_offer_with_prompt() {
        let (mut controller, _, _) = controller();
        controller.on_create(Capability::NoneEnrolled);

        let effects = controller.on_resume(Capability::Success).unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::DismissOverlay);
        assert!(matches!(effects[1], Effect::ShowPrompt(_)));
    }

    #[test]
    fn test_unenrolled_session_does_not_record_on_pause() {
        let (mut controller, store, clock) = controller();
        controller.on_create(Capability::NoneEnrolled);
        controller.on_resume(Capability::NoneEnrolled).unwrap();
        controller.decline_enrollment();
        assert!(controller.is_unlocked());
        assert!(!controller.is_authenticated());

        controller.on_pause();
        assert_eq!(store.get(KEY).unwrap(), None);

        // Enrolled from system settings, back within the threshold
        clock.advance(Duration::from_secs(10));
        let effects = controller.on_resume(Capability::Success).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::ShowPrompt(_)]));
        assert!(!controller.is_unlocked());
    }

    #[test]
    fn test_unavailable_session_does_not_record_on_pause() {
        let (mut controller, store, _) = controller();
        controller.on_resume(Capability::Unavailable).unwrap();
        controller.on_pause();
        assert_eq!(store.get(KEY).unwrap(), None);
    }

    #[test]
    fn test_enrollment_offer_replaces_locked_overlay() {
        let (mut controller, _, _) = controller();
        controller.on_resume(Capability::Success).unwrap();
        controller
            .on_prompt_outcome(PromptOutcome::canceled())
            .unwrap();
        assert_eq!(controller.overlay(), Overlay::Locked);

        let effects = controller.on_resume(Capability::NoneEnrolled).unwrap();
        assert_eq!(
            effects,
            vec![Effect::DismissOverlay, Effect::ShowEnrollmentOffer]
        );
        assert_eq!(controller.overlay(), Overlay::EnrollmentOffer);
    }

    #[test]
    fn test_no_biometrics_error_offers_enrollment() {
        let (mut controller, _, _) = controller();
        controller.on_resume(Capability::Success).unwrap();

        let effects = controller
            .on_prompt_outcome(PromptOutcome::error(
                ErrorCode::NO_BIOMETRICS,
                "No biometrics enrolled",
            ))
            .unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::Notice("Authentication error: 11, No biometrics enrolled".to_string()),
                Effect::ShowEnrollmentOffer,
            ]
        );
        assert!(!controller.is_unlocked());
    }

    #[test]
    fn test_hardware_error_only_notifies() {
        let (mut controller, _, _) = controller();
        controller.on_resume(Capability::Success).unwrap();

        let effects = controller
            .on_prompt_outcome(PromptOutcome::error(ErrorCode::HW_UNAVAILABLE, "Busy"))
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::Notice("Authentication error: 1, Busy".to_string())]
        );
        assert_eq!(controller.overlay(), Overlay::None);
    }

    #[test]
    fn test_outcome_without_prompt_is_rejected() {
        let (mut controller, _, _) = controller();
        assert_eq!(
            controller.on_prompt_outcome(PromptOutcome::Succeeded),
            Err(TransitionError::NotAwaiting(PromptState::Idle))
        );
    }
}
