use crate::shipper::Shipper;
use std::time::Duration;
use tracing::{error, info};

/// Wire SIGINT and SIGTERM to the shipper's cleanup sequence.
///
/// On the first signal the engine flushes and stops every job, then the
/// signal's disposition is restored to the default and the signal is
/// re-raised so the process terminates through the normal OS path instead of
/// swallowing it.
#[cfg(unix)]
pub fn install(shipper: &Shipper, timeout: Duration) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    for (kind, signum) in [
        (SignalKind::interrupt(), nix::sys::signal::Signal::SIGINT),
        (SignalKind::terminate(), nix::sys::signal::Signal::SIGTERM),
    ] {
        let mut stream = signal(kind)?;
        let shipper = shipper.clone();
        tokio::spawn(async move {
            if stream.recv().await.is_none() {
                return;
            }
            info!(signal = %signum, "termination signal received, flushing and stopping all jobs");
            shipper.cleanup(timeout).await;

            // Hand the signal back to the default disposition so the
            // process exits the way the sender expects.
            unsafe {
                let _ = nix::sys::signal::signal(signum, nix::sys::signal::SigHandler::SigDfl);
            }
            if let Err(e) = nix::sys::signal::raise(signum) {
                error!(signal = %signum, "failed to re-raise signal: {e}");
                std::process::exit(1);
            }
        });
    }
    Ok(())
}

/// Without POSIX signal semantics, run cleanup on ctrl-c and exit with the
/// conventional interrupted status.
#[cfg(not(unix))]
pub fn install(shipper: &Shipper, timeout: Duration) -> std::io::Result<()> {
    let shipper = shipper.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, flushing and stopping all jobs");
            shipper.cleanup(timeout).await;
            std::process::exit(130);
        }
    });
    Ok(())
}
