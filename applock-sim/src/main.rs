use std::sync::Arc;

use applock::{
    BiometricPlatform, Capability, Clock, Effect, Gate, GateConfig, KeyValueStore, SledStore,
    SystemClock, TransitionError,
};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;

mod platform;

use platform::{parse_capability, TerminalPlatform};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(run())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GateConfig::load().unwrap_or_else(|e| {
        warn!("unable to load config ({e}), using defaults");
        GateConfig::default()
    });
    let settings = config.settings()?;
    let store = SledStore::open(config.store_path())?;
    info!("preferences: {}", config.store_path().display());

    // Use APPLOCK_CAPABILITY=success|none|unavailable to simulate the device
    let capability = std::env::var("APPLOCK_CAPABILITY")
        .ok()
        .and_then(|v| parse_capability(&v))
        .unwrap_or(Capability::Success);

    let input = Arc::new(AsyncMutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let platform = TerminalPlatform::new(input.clone(), capability);
    let mut gate = Gate::new(platform, settings, store, SystemClock);

    println!("=== applock simulator ===");
    println!("idle threshold: {}s", config.idle_threshold_secs);
    println!("commands: pause, resume, retry, enroll, skip, status, quit\n");

    render(gate.create().await?);
    render(gate.resume().await?);
    status(&gate);

    loop {
        let line = match input.lock().await.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("unable to read command ({e})");
                break;
            }
        };

        match dispatch(&mut gate, line.trim()).await {
            Some(Ok(effects)) => render(effects),
            Some(Err(e)) => warn!("command failed: {e}"),
            None => break,
        }
    }

    // Leaving the app counts as backgrounding it
    gate.pause();
    Ok(())
}

/// Run one typed command. `None` means quit.
async fn dispatch<P, S, C>(
    gate: &mut Gate<P, S, C>,
    command: &str,
) -> Option<Result<Vec<Effect>, TransitionError>>
where
    P: BiometricPlatform,
    S: KeyValueStore,
    C: Clock,
{
    let result = match command {
        "pause" => {
            gate.pause();
            println!("app in background");
            Ok(Vec::new())
        }
        "resume" => gate.resume().await,
        "retry" => gate.retry().await,
        "enroll" => gate.accept_enrollment().await,
        "skip" => Ok(gate.decline_enrollment()),
        "status" => {
            status(gate);
            Ok(Vec::new())
        }
        "quit" | "exit" => return None,
        "" => Ok(Vec::new()),
        other => {
            println!("unknown command: {other}");
            Ok(Vec::new())
        }
    };
    Some(result)
}

fn render(effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::ShowLockedOverlay => {
                println!("🔒 Locked. Type `retry` to unlock with biometrics.")
            }
            Effect::ShowEnrollmentOffer => {
                println!("No biometric enrolled. Type `enroll` to proceed or `skip` to cancel.")
            }
            Effect::DismissOverlay => println!("(overlay dismissed)"),
            Effect::Notice(message) => println!("💬 {message}"),
            Effect::ShowPrompt(_) | Effect::LaunchEnrollment(_) => {}
        }
    }
}

fn status<P, S, C>(gate: &Gate<P, S, C>)
where
    P: BiometricPlatform,
    S: KeyValueStore,
    C: Clock,
{
    let controller = gate.controller();
    println!(
        "unlocked: {}, overlay: {:?}, prompt: {:?}, last auth: {:?}",
        controller.is_unlocked(),
        controller.overlay(),
        controller.prompt_state(),
        controller.last_auth_time()
    );
}
