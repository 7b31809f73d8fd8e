//! Process shutdown signalling.
//!
//! Two sources can ask the process to stop: the operating system (SIGINT,
//! SIGTERM) and the request pipeline itself, when an error escapes every
//! middleware layer. Both go through one bounded channel. The server owns
//! the receiving end and starts a graceful drain on the first signal.

use std::fmt;
use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Why the process is stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
        })
    }
}

/// A shutdown channel. One pending signal is enough; later ones are dropped.
pub fn channel() -> (ShutdownSender, ShutdownReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownSender { tx }, ShutdownReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct ShutdownSender {
    tx: mpsc::Sender<Signal>,
}

impl ShutdownSender {
    /// Requests a shutdown without waiting.
    ///
    /// Returns `false` when the request was dropped, either because one is
    /// already pending or because nobody is listening any more.
    pub fn signal(&self, sig: Signal) -> bool {
        self.tx.try_send(sig).is_ok()
    }
}

#[derive(Debug)]
pub struct ShutdownReceiver {
    rx: mpsc::Receiver<Signal>,
}

impl ShutdownReceiver {
    /// Waits for the next signal. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }
}

/// Forwards SIGINT and SIGTERM into the shutdown channel until the first one
/// arrives.
pub fn forward_os_signals(tx: ShutdownSender) -> io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };

        // On non-Unix platforms only Ctrl-C exists.
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "unable to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        let sig = tokio::select! {
            () = interrupt => Signal::Interrupt,
            () = terminate => Signal::Terminate,
        };

        info!(signal = %sig, "os signal received");
        tx.signal(sig);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_signal_is_queued() {
        let (tx, mut rx) = channel();
        assert!(tx.signal(Signal::Terminate));
        assert!(!tx.clone().signal(Signal::Interrupt));

        assert_eq!(rx.recv().await, Some(Signal::Terminate));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn closed_channel_drops_signals() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.signal(Signal::Terminate));
    }
}
