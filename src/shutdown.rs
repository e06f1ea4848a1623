#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Stop request from the environment: Ctrl-C, or SIGTERM on unix.
///
/// The SIGTERM handler is installed when this is created, not when it is first
/// polled, so a signal arriving in between is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl ShutdownSignal {
    pub fn install() -> Self {
        #[cfg(unix)]
        let terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                None
            }
        };

        Self {
            #[cfg(unix)]
            terminate,
        }
    }

    pub async fn wait(self) {
        let ctrl_c = async {
            // no handler available: wait for the other signal
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match self.terminate {
                Some(mut stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
            _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        }
    }
}
