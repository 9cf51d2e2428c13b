//! Example: re-authentication after the app sits in the background

use std::sync::Arc;
use std::time::Duration;

use applock::{
    Gate, GateConfig, ManualClock, MemoryStore, MockBiometricPlatform, PromptOutcome,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== Biometric Idle Re-lock Example ===\n");

    // 1. Gate with a 30 second idle threshold
    let config = GateConfig::default();
    let clock = Arc::new(ManualClock::new(chrono::Utc::now().timestamp_millis()));
    let platform = MockBiometricPlatform::enrolled().with_outcomes([
        PromptOutcome::Succeeded,
        PromptOutcome::canceled(),
        PromptOutcome::Succeeded,
    ]);
    let mut gate = Gate::new(
        platform,
        config.settings()?,
        MemoryStore::new(),
        clock.clone(),
    );
    println!("1. Idle threshold: {}s\n", config.idle_threshold_secs);

    // 2. First launch always prompts
    println!("2. First launch...");
    gate.create().await?;
    let effects = gate.resume().await?;
    println!("   Effects: {effects:?}");
    println!("   Unlocked: {}\n", gate.is_unlocked());

    // 3. Short trip to the background
    println!("3. Background for 10s...");
    gate.pause();
    clock.advance(Duration::from_secs(10));
    let effects = gate.resume().await?;
    println!("   Effects: {effects:?}");
    println!("   Prompts shown so far: {}\n", gate.platform().prompt_count());

    // 4. Long trip, and the user cancels the prompt
    println!("4. Background for 45s, user cancels...");
    gate.pause();
    clock.advance(Duration::from_secs(45));
    let effects = gate.resume().await?;
    println!("   Effects: {effects:?}");
    println!("   Unlocked: {}\n", gate.is_unlocked());

    // 5. Unlock button on the locked overlay
    println!("5. Retry from the locked overlay...");
    let effects = gate.retry().await?;
    println!("   Effects: {effects:?}");
    println!("   Unlocked: {}\n", gate.is_unlocked());

    println!("=== Example Complete ===");

    Ok(())
}
