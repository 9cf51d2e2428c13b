//! Async gate driver
//!
//! Wires a [`LockController`] to a [`BiometricPlatform`]. Platform-bound
//! effects are executed here by awaiting the platform, and their completions
//! are fed back into the controller until only UI effects remain. Nothing is
//! spawned; the caller's event loop polls the returned futures.

use std::collections::VecDeque;

use log::debug;

use crate::biometric::BiometricPlatform;
use crate::clock::Clock;
use crate::config::GateSettings;
use crate::controller::LockController;
use crate::events::Effect;
use crate::prompt::TransitionError;
use crate::store::KeyValueStore;

pub struct Gate<P, S, C> {
    platform: P,
    controller: LockController<S, C>,
}

impl<P, S, C> Gate<P, S, C>
where
    P: BiometricPlatform,
    S: KeyValueStore,
    C: Clock,
{
    /// Build a gate; the app starts locked
    pub fn new(platform: P, settings: GateSettings, store: S, clock: C) -> Self {
        Self {
            platform,
            controller: LockController::new(settings, store, clock),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Read-only view of the lock state
    pub fn controller(&self) -> &LockController<S, C> {
        &self.controller
    }

    /// Whether app content may be shown
    pub fn is_unlocked(&self) -> bool {
        self.controller.is_unlocked()
    }

    /// App created
    pub async fn create(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let capability = self
            .platform
            .can_authenticate(self.controller.settings().authenticators());
        let effects = self.controller.on_create(capability);
        self.drive(effects).await
    }

    /// App returned to the foreground
    pub async fn resume(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let capability = self
            .platform
            .can_authenticate(self.controller.settings().authenticators());
        let effects = self.controller.on_resume(capability)?;
        self.drive(effects).await
    }

    /// App moved to the background
    pub fn pause(&mut self) {
        self.controller.on_pause();
    }

    /// Unlock button on the locked overlay
    pub async fn retry(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let effects = self.controller.retry()?;
        self.drive(effects).await
    }

    /// Proceed button on the enrollment offer; runs the platform flow
    pub async fn accept_enrollment(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let effects = self.controller.accept_enrollment();
        self.drive(effects).await
    }

    /// Cancel button on the enrollment offer
    pub fn decline_enrollment(&mut self) -> Vec<Effect> {
        self.controller.decline_enrollment()
    }

    async fn drive(&mut self, effects: Vec<Effect>) -> Result<Vec<Effect>, TransitionError> {
        let mut pending: VecDeque<Effect> = effects.into();
        let mut ui = Vec::new();

        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::ShowPrompt(info) => {
                    let outcome = self.platform.show_prompt(&info).await;
                    debug!("prompt outcome: {outcome:?}");
                    pending.extend(self.controller.on_prompt_outcome(outcome)?);

                    // A rejected sample leaves the dialog up; wait for its next callback
                    if self.controller.is_awaiting_prompt() {
                        pending.push_back(Effect::ShowPrompt(info));
                    }
                }
                Effect::LaunchEnrollment(authenticators) => {
                    let result = self.platform.open_enrollment(authenticators).await;
                    debug!("enrollment result: {result:?}");
                    pending.extend(self.controller.on_enrollment_result(result)?);
                }
                other => ui.push(other),
            }
        }

        Ok(ui)
    }
}
