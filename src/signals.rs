//! Termination signals other than Ctrl-C
//!
//! SIGTERM and SIGHUP would otherwise kill the process with `WORKSPACE`
//! still patched. They are caught here and turned into a stop request.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Listener for SIGTERM and SIGHUP (never fires off Unix)
#[derive(Debug)]
pub(crate) struct Termination {
    #[cfg(unix)]
    signals: Option<(Signal, Signal)>,
}

impl Termination {
    /// Install the handlers. Failing to install them is logged, not fatal.
    #[cfg(unix)]
    pub(crate) fn listen() -> Self {
        let signals = signal(SignalKind::terminate())
            .and_then(|terminate| Ok((terminate, signal(SignalKind::hangup())?)));

        match signals {
            Ok(signals) => Self {
                signals: Some(signals),
            },
            Err(e) => {
                ccpd_build::debug!("Failed to listen for termination signals: {e}");
                Self { signals: None }
            }
        }
    }

    #[cfg(not(unix))]
    pub(crate) const fn listen() -> Self {
        Self {}
    }

    /// Wait for the next signal and return its name.
    #[cfg(unix)]
    pub(crate) async fn recv(&mut self) -> &'static str {
        match &mut self.signals {
            Some((terminate, hangup)) => tokio::select! {
                _ = terminate.recv() => "SIGTERM",
                _ = hangup.recv() => "SIGHUP",
            },
            None => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    pub(crate) async fn recv(&mut self) -> &'static str {
        std::future::pending().await
    }
}
