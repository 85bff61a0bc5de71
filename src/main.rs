//! peer-session - Main entry point
//!
//! Starts several peer sessions on an in-process signaling hub, connects them
//! to each other and tears the connections down again.

use anyhow::{Context, Result};
use peer_session::{
    CliArgs, Config, ConnectionDirectory, InMemoryDirectory, LoopbackHub, PeerSession, SessionError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long to wait for sessions to open or connections to settle
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();
        if let Some(location) = panic_info.location() {
            error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("peer-session starting");
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let hub = LoopbackHub::new();
    let sessions = start_sessions(&hub, &config).await?;

    if let Err(e) = run(&hub, &sessions, &config).await {
        error!("Run failed: {:#}", e);
        shutdown(sessions).await;
        return Err(e);
    }

    shutdown(sessions).await;
    info!("peer-session finished");
    Ok(())
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.is_verbose() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

/// Create the sessions and wait for all of them to open
async fn start_sessions(hub: &LoopbackHub, config: &Config) -> Result<Vec<PeerSession>> {
    let mut sessions = Vec::with_capacity(config.peers);
    for _ in 0..config.peers {
        let directory: Arc<dyn ConnectionDirectory> = Arc::new(InMemoryDirectory::new());
        let session = PeerSession::new(hub, directory, config.reconnect_delay).await?;
        sessions.push(session);
    }

    for session in &sessions {
        tokio::time::timeout(SETTLE_TIMEOUT, session.wait_ready())
            .await
            .map_err(|_| SessionError::network_error("Timed out waiting for the signaling hub"))??;
    }

    info!("{} sessions ready", sessions.len());
    Ok(sessions)
}

/// Connect the first session to every other one, then disconnect again
async fn run(hub: &LoopbackHub, sessions: &[PeerSession], config: &Config) -> Result<()> {
    let (first, others) = sessions
        .split_first()
        .ok_or_else(|| SessionError::config_error_with_field("No sessions started", "peers"))?;

    for other in others {
        first.connect(other.id().as_str()).await?;
    }
    wait_for_directories(others, 1).await?;
    report(sessions).await;

    if config.simulate_network_error {
        hub.drop_signaling(first.id()).await;
        tokio::time::sleep(config.reconnect_delay * 2).await;
        info!(
            "Signaling link for {} online: {} (reconnect attempts: {})",
            first.id(),
            hub.is_online(first.id()).await,
            hub.reconnect_attempts(first.id()).await
        );
    }

    for other in others {
        first.disconnect(other.id().as_str()).await?;
    }
    wait_for_directories(others, 0).await?;

    match first.disconnect(others[0].id().as_str()).await {
        Err(e) if e.downcast_ref::<SessionError>().map_or(false, SessionError::is_not_found) => {
            debug!("Second disconnect rejected as expected: {}", e);
        }
        Err(e) => return Err(e),
        Ok(()) => warn!("Second disconnect unexpectedly succeeded"),
    }

    report(sessions).await;
    Ok(())
}

/// Wait until each session's directory holds the expected number of connections
async fn wait_for_directories(sessions: &[PeerSession], expected: usize) -> Result<()> {
    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    for session in sessions {
        while session.directory().len().await != expected {
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::network_error(format!(
                    "Session {} did not reach {} connections",
                    session.id(),
                    expected
                ))
                .into());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    Ok(())
}

/// Print the connections held by each session
async fn report(sessions: &[PeerSession]) {
    for session in sessions {
        let mut peers = session.directory().peer_ids().await;
        peers.sort();
        let peers: Vec<String> = peers.iter().map(ToString::to_string).collect();
        info!("{} [{:?}] connections: [{}]", session.id(), session.state(), peers.join(", "));
    }
}

async fn shutdown(sessions: Vec<PeerSession>) {
    for session in sessions {
        session.shutdown().await;
    }
}
