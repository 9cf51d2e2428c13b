//! Re-authentication policy
//!
//! Decides, each time the app comes to the foreground, whether the user has
//! to go through the biometric prompt again. Pure function of its inputs.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Idle time after which a backgrounded app must re-authenticate
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(30);

/// Capability state, derived fresh from the platform on every query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    CanAuthenticate,
    NeedsEnrollment,
    Unavailable,
}

/// What to do when the app returns to the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the UI as it is
    Skip,
    /// Show the biometric prompt
    Prompt,
    /// Offer the enrollment flow
    Enroll,
}

/// Decide whether to re-authenticate.
///
/// `Unavailable` always skips and `NeedsEnrollment` always enrolls. With no
/// recorded success the prompt is shown. Otherwise the prompt is shown only
/// when the idle time exceeds `idle_threshold`; a clock that went backwards
/// counts as not idle.
pub fn decide(
    now: Timestamp,
    last_auth_time: Option<Timestamp>,
    idle_threshold: Duration,
    capability: AuthState,
) -> Action {
    match capability {
        AuthState::Unavailable => return Action::Skip,
        AuthState::NeedsEnrollment => return Action::Enroll,
        AuthState::CanAuthenticate => {}
    }

    let Some(last) = last_auth_time else {
        return Action::Prompt;
    };

    match idle_elapsed(now, last) {
        Some(elapsed) => {
            debug!(
                "idle for {}s (threshold {}s)",
                elapsed.as_secs(),
                idle_threshold.as_secs()
            );
            if elapsed > idle_threshold {
                Action::Prompt
            } else {
                Action::Skip
            }
        }
        None => {
            debug!("clock skew: now {now} is before last authentication {last}");
            Action::Skip
        }
    }
}

/// Idle time between `last` and `now`, truncated to whole seconds.
///
/// Returns `None` when `now` is earlier than `last`.
pub fn idle_elapsed(now: Timestamp, last: Timestamp) -> Option<Duration> {
    let millis = i128::from(now) - i128::from(last);
    if millis < 0 {
        return None;
    }

    let secs = u64::try_from(millis / 1000).unwrap_or(u64::MAX);
    Some(Duration::from_secs(secs))
}
