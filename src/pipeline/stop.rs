//! External stop request shared between the signal handler and the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cooperative stop signal.
///
/// Clone is cheap and shares state. Once stopped it stays stopped.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request a stop.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless stopped first. Returns `false` if stopped.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
            _ = self.stopped() => false,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_stop() {
        let stop = StopSignal::new();
        assert!(stop.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_stop_aborts_long_sleep() {
        let stop = StopSignal::new();
        let remote = stop.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.stop();
        });

        let started = std::time::Instant::now();
        assert!(!stop.sleep(Duration::from_secs(3600)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(stop.is_stopped());
    }

    #[tokio::test]
    async fn test_already_stopped() {
        let stop = StopSignal::new();
        stop.stop();
        stop.stopped().await;
        assert!(!stop.sleep(Duration::from_secs(3600)).await);
    }
}
