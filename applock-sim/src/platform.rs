//! Terminal stand-in for the platform biometric subsystem.
//!
//! The "dialog" is a line on stdin: the operator types what the sensor would
//! have reported.

use std::sync::{Arc, Mutex};

use applock::{
    Authenticators, BiometricPlatform, Capability, EnrollmentResult, ErrorCode, PlatformFuture,
    PromptInfo, PromptOutcome,
};
use log::warn;
use tokio::io::{BufReader, Lines, Stdin};
use tokio::sync::Mutex as AsyncMutex;

pub type Input = Arc<AsyncMutex<Lines<BufReader<Stdin>>>>;

pub struct TerminalPlatform {
    input: Input,
    capability: Mutex<Capability>,
}

impl TerminalPlatform {
    pub fn new(input: Input, capability: Capability) -> Self {
        Self {
            input,
            capability: Mutex::new(capability),
        }
    }

    fn set_capability(&self, capability: Capability) {
        match self.capability.lock() {
            Ok(mut current) => *current = capability,
            Err(e) => warn!("capability lock poisoned ({e})"),
        }
    }
}

/// Parse an operator answer to the prompt dialog
pub fn parse_outcome(line: &str) -> Option<PromptOutcome> {
    let mut parts = line.trim().splitn(3, ' ');
    match parts.next()? {
        "s" | "success" => Some(PromptOutcome::Succeeded),
        "f" | "fail" => Some(PromptOutcome::Failed),
        "c" | "cancel" => Some(PromptOutcome::canceled()),
        "n" | "negative" => Some(PromptOutcome::error(
            ErrorCode::NEGATIVE_BUTTON,
            "Negative button pressed",
        )),
        "e" | "error" => {
            let code = parts.next()?.parse().ok()?;
            let message = parts.next().unwrap_or("Platform error");
            Some(PromptOutcome::error(ErrorCode(code), message))
        }
        _ => None,
    }
}

/// Parse the `APPLOCK_CAPABILITY` value
pub fn parse_capability(value: &str) -> Option<Capability> {
    match value.trim().to_ascii_lowercase().as_str() {
        "success" | "enrolled" => Some(Capability::Success),
        "none" | "none_enrolled" => Some(Capability::NoneEnrolled),
        "unavailable" => Some(Capability::Unavailable),
        _ => None,
    }
}

impl BiometricPlatform for TerminalPlatform {
    fn can_authenticate(&self, _authenticators: Authenticators) -> Capability {
        match self.capability.lock() {
            Ok(capability) => *capability,
            Err(_) => Capability::Unavailable,
        }
    }

    fn show_prompt(&self, info: &PromptInfo) -> PlatformFuture<'_, PromptOutcome> {
        let info = info.clone();
        Box::pin(async move {
            println!("┌─ {}", info.title());
            println!("│  {}", info.subtitle());
            if let Some(description) = info.description() {
                println!("│  {description}");
            }
            println!("│  allowed: {}", info.allowed_authenticators());
            if let Some(text) = info.negative_button_text() {
                println!("│  [{text}]");
            }
            println!("└─ s=success f=fail c=cancel n=negative e <code> <message>");

            let mut input = self.input.lock().await;
            loop {
                match input.next_line().await {
                    Ok(Some(line)) => match parse_outcome(&line) {
                        Some(outcome) => return outcome,
                        None => println!("   unrecognised answer: {line}"),
                    },
                    Ok(None) => return PromptOutcome::error(ErrorCode::CANCELED, "Input closed"),
                    Err(e) => {
                        return PromptOutcome::error(ErrorCode::UNABLE_TO_PROCESS, e.to_string())
                    }
                }
            }
        })
    }

    fn open_enrollment(
        &self,
        authenticators: Authenticators,
    ) -> PlatformFuture<'_, EnrollmentResult> {
        Box::pin(async move {
            println!("== Enroll {authenticators} == y=complete, anything else cancels");

            let answer = self.input.lock().await.next_line().await;
            match answer {
                Ok(Some(line)) if line.trim() == "y" => {
                    self.set_capability(Capability::Success);
                    EnrollmentResult::Completed
                }
                _ => EnrollmentResult::Canceled { code: 0 },
            }
        })
    }
}
