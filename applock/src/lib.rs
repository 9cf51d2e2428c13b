//! Biometric app lock
//!
//! Gates an app's UI behind the platform biometric prompt:
//! - Re-authentication policy based on idle time since the last success
//! - Prompt dialog lifecycle (awaiting, succeeded, failed, canceled, error)
//! - Lock controller driven by app lifecycle callbacks
//! - Async gate that executes platform dialogs and enrollment
//! - Last authentication timestamp in an injected key-value store
//!
//! Sensor access, key storage and dialog rendering stay with the platform,
//! reached through [`BiometricPlatform`].

pub mod biometric;
pub mod clock;
pub mod config;
pub mod controller;
pub mod events;
pub mod gate;
pub mod policy;
pub mod prompt;
pub mod store;

pub use biometric::{
    Authenticators, BiometricError, BiometricPlatform, Capability, EnrollmentResult, ErrorCode,
    MockBiometricPlatform, PlatformFuture, PromptInfo, PromptInfoBuilder, PromptInfoError,
    PromptOutcome,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GateConfig, GateSettings};
pub use controller::LockController;
pub use events::{Effect, Overlay};
pub use gate::Gate;
pub use policy::{decide, idle_elapsed, Action, AuthState, Timestamp, DEFAULT_IDLE_THRESHOLD};
pub use prompt::{PromptLifecycle, PromptState, TransitionError};
pub use store::{KeyValueStore, MemoryStore, SledStore, StoreError};
