//! Graceful shutdown coordination: SIGTERM/SIGINT trapping with a bounded
//! grace period, and a second signal forcing immediate exit.

use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Waits for SIGTERM or SIGINT, cancels `token`, then waits up to
/// `grace_period` for a second identical signal before forcing exit.
///
/// Runs until the first signal arrives; callers `tokio::spawn` it and select
/// on the token elsewhere to drive their own shutdown sequence.
pub async fn watch_for_signals(token: CancellationToken, grace_period: Duration) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };

    let signum = tokio::select! {
        _ = sigterm.recv() => 15,
        _ = sigint.recv() => 2,
    };

    info!(signum, "received shutdown signal, initiating graceful shutdown");
    token.cancel();

    let second_signal = tokio::select! {
        _ = sigterm.recv() => true,
        _ = sigint.recv() => true,
        _ = tokio::time::sleep(grace_period) => false,
    };

    if second_signal {
        warn!(signum, "received signal again, forcing exit");
    } else {
        warn!(grace_period_secs = grace_period.as_secs(), "grace period exceeded, forcing exit");
    }
    std::process::exit(128 + signum);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grace_period_is_thirty_seconds() {
        assert_eq!(DEFAULT_GRACE_PERIOD, Duration::from_secs(30));
    }
}
