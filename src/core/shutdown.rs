//! # OS signal handling.
//!
//! Two consumers:
//! - the **supervisor** installs [`SignalListener`], which forwards *every*
//!   termination signal as a [`Control::ShutdownRequested`] (duplicates are the
//!   state machine's business, not the listener's);
//! - the **worker runner** installs it before starting the entry and waits
//!   for the first signal; [`wait_for_shutdown_signal`] does the same for
//!   callers running their own loop.
//!
//! **Unix:** SIGINT, SIGTERM, SIGQUIT. **Other platforms:** Ctrl-C.

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::core::control::{Control, ShutdownSignal};

/// Installed signal streams. Registration happens in [`SignalListener::install`]
/// so failures surface before any worker is spawned.
pub(crate) struct SignalListener {
    #[cfg(unix)]
    streams: UnixStreams,
}

#[cfg(unix)]
struct UnixStreams {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

impl SignalListener {
    /// Registers the signal handlers.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                streams: UnixStreams {
                    sigint: signal(SignalKind::interrupt())?,
                    sigterm: signal(SignalKind::terminate())?,
                    sigquit: signal(SignalKind::quit())?,
                },
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Forwards signals to `tx` until the receiver is gone.
    pub fn spawn(self, tx: UnboundedSender<Control>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut this = self;
            loop {
                let signal = this.recv().await;
                if tx.send(Control::ShutdownRequested { signal }).is_err() {
                    break;
                }
            }
        })
    }

    /// Waits for the next termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        let s = &mut self.streams;
        tokio::select! {
            _ = s.sigterm.recv() => ShutdownSignal::Terminate,
            _ = s.sigint.recv()  => ShutdownSignal::Interrupt,
            _ = s.sigquit.recv() => ShutdownSignal::Quit,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ShutdownSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::CtrlC,
            Err(_) => std::future::pending().await,
        }
    }
}

/// Waits for the first termination signal.
///
/// Returns `Err` if signal registration fails.
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    let mut listener = SignalListener::install()?;
    Ok(listener.recv().await)
}
