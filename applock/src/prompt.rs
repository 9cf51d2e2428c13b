//! Prompt dialog lifecycle
//!
//! `Idle → AwaitingResult → {Succeeded, Failed, Canceled, Error(code)}`.
//! A failed sample leaves the dialog up, so `Failed` falls straight back to
//! `AwaitingResult`.

use thiserror::Error;

use crate::biometric::{ErrorCode, PromptOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    AwaitingResult,
    Succeeded,
    Failed,
    Canceled,
    Error(ErrorCode),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Prompt is already showing")]
    AlreadyAwaiting,

    #[error("Prompt outcome received while {0:?}")]
    NotAwaiting(PromptState),
}

/// Tracks one prompt dialog at a time
#[derive(Debug)]
pub struct PromptLifecycle {
    state: PromptState,
    failed_samples: u32,
}

impl PromptLifecycle {
    pub fn new() -> Self {
        Self {
            state: PromptState::Idle,
            failed_samples: 0,
        }
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == PromptState::AwaitingResult
    }

    /// Rejected samples during the current dialog
    pub fn failed_samples(&self) -> u32 {
        self.failed_samples
    }

    /// Enter `AwaitingResult`. Valid from any settled state.
    pub fn begin(&mut self) -> Result<(), TransitionError> {
        if self.is_awaiting() {
            return Err(TransitionError::AlreadyAwaiting);
        }
        self.state = PromptState::AwaitingResult;
        self.failed_samples = 0;
        Ok(())
    }

    /// Apply a platform callback and return the state it resolved to.
    ///
    /// For a rejected sample this returns `Failed` while the lifecycle itself
    /// stays in `AwaitingResult`.
    pub fn complete(&mut self, outcome: &PromptOutcome) -> Result<PromptState, TransitionError> {
        if !self.is_awaiting() {
            return Err(TransitionError::NotAwaiting(self.state));
        }

        let resolved = match outcome {
            PromptOutcome::Succeeded => PromptState::Succeeded,
            PromptOutcome::Failed => {
                self.failed_samples += 1;
                return Ok(PromptState::Failed);
            }
            PromptOutcome::Error { code, .. } if code.is_cancellation() => PromptState::Canceled,
            PromptOutcome::Error { code, .. } => PromptState::Error(*code),
        };

        self.state = resolved;
        Ok(resolved)
    }
}

impl Default for PromptLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut prompt = PromptLifecycle::new();
        assert_eq!(prompt.state(), PromptState::Idle);

        prompt.begin().unwrap();
        assert!(prompt.is_awaiting());

        let state = prompt.complete(&PromptOutcome::Succeeded).unwrap();
        assert_eq!(state, PromptState::Succeeded);
        assert_eq!(prompt.state(), PromptState::Succeeded);
    }

    #[test]
    fn test_failed_sample_keeps_awaiting() {
        let mut prompt = PromptLifecycle::new();
        prompt.begin().unwrap();

        let state = prompt.complete(&PromptOutcome::Failed).unwrap();
        assert_eq!(state, PromptState::Failed);
        assert!(prompt.is_awaiting());
        assert_eq!(prompt.failed_samples(), 1);

        prompt.complete(&PromptOutcome::Failed).unwrap();
        assert_eq!(prompt.failed_samples(), 2);
    }

    #[test]
    fn test_cancellation_codes() {
        for code in [ErrorCode::USER_CANCELED, ErrorCode::NEGATIVE_BUTTON] {
            let mut prompt = PromptLifecycle::new();
            prompt.begin().unwrap();
            let state = prompt
                .complete(&PromptOutcome::error(code, "Cancel"))
                .unwrap();
            assert_eq!(state, PromptState::Canceled);
        }
    }

    #[test]
    fn test_error_is_terminal() {
        let mut prompt = PromptLifecycle::new();
        prompt.begin().unwrap();

        let state = prompt
            .complete(&PromptOutcome::error(ErrorCode::LOCKOUT, "Too many attempts"))
            .unwrap();
        assert_eq!(state, PromptState::Error(ErrorCode::LOCKOUT));

        let late = prompt.complete(&PromptOutcome::Succeeded);
        assert_eq!(
            late,
            Err(TransitionError::NotAwaiting(PromptState::Error(ErrorCode::LOCKOUT)))
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut prompt = PromptLifecycle::new();
        assert!(prompt.complete(&PromptOutcome::Succeeded).is_err());

        prompt.begin().unwrap();
        assert_eq!(prompt.begin(), Err(TransitionError::AlreadyAwaiting));
    }

    #[test]
    fn test_retry_after_cancel() {
        let mut prompt = PromptLifecycle::new();
        prompt.begin().unwrap();
        prompt.complete(&PromptOutcome::canceled()).unwrap();

        prompt.begin().unwrap();
        assert!(prompt.is_awaiting());
        assert_eq!(prompt.failed_samples(), 0);
    }
}
