//! Effects produced by the lock controller.
//!
//! `ShowPrompt` and `LaunchEnrollment` are handed to the biometric platform;
//! the rest are for the UI layer to render.

use crate::biometric::{Authenticators, PromptInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show the platform prompt dialog
    ShowPrompt(PromptInfo),

    /// Launch the platform enrollment flow
    LaunchEnrollment(Authenticators),

    /// Persistent "locked" dialog with an unlock button
    ShowLockedOverlay,

    /// Dialog offering to enroll, with proceed and cancel buttons
    ShowEnrollmentOffer,

    /// Close whichever overlay is showing
    DismissOverlay,

    /// Non-blocking message (toast)
    Notice(String),
}

/// Overlay currently covering the app content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    Locked,
    EnrollmentOffer,
}
