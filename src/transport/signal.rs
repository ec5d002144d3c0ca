//! "Keep running" signal observed by blocking transport operations.
//!
//! The owning workload holds the [`RunController`]; the transport layer only
//! ever reads the [`RunSignal`]. Dropping the controller reads as stopped.

use tokio::sync::watch;

/// Owner side of the run signal.
#[derive(Debug)]
pub struct RunController {
    tx: watch::Sender<bool>,
}

/// Read-only view of the run signal.
#[derive(Debug, Clone)]
pub struct RunSignal {
    rx: watch::Receiver<bool>,
}

/// Create a run signal in the running state.
pub fn run_signal() -> (RunController, RunSignal) {
    let (tx, rx) = watch::channel(true);
    (RunController { tx }, RunSignal { rx })
}

impl RunController {
    /// Signal every observer to stop.
    pub fn stop(&self) {
        self.tx.send_replace(false);
    }

    /// Whether [`stop`](Self::stop) has not been called yet.
    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create another observer.
    pub fn signal(&self) -> RunSignal {
        RunSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl RunSignal {
    /// Whether the owning workload is still running.
    pub fn is_running(&self) -> bool {
        // a closed channel means the owner is gone
        self.rx.has_changed().is_ok() && *self.rx.borrow()
    }

    /// Resolve once the owning workload stops.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        // Err means the controller was dropped, which also reads as stopped.
        let _ = rx.wait_for(|running| !*running).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_running() {
        let (controller, signal) = run_signal();
        assert!(controller.is_running());
        assert!(signal.is_running());
    }

    #[test]
    fn test_stop_is_observed_by_all() {
        let (controller, signal) = run_signal();
        let other = controller.signal();
        let cloned = signal.clone();

        controller.stop();

        assert!(!controller.is_running());
        assert!(!signal.is_running());
        assert!(!other.is_running());
        assert!(!cloned.is_running());
    }

    #[test]
    fn test_dropped_controller_reads_as_stopped() {
        let (controller, signal) = run_signal();
        drop(controller);
        assert!(!signal.is_running());
    }

    #[tokio::test]
    async fn test_stopped_resolves_on_stop() {
        let (controller, signal) = run_signal();

        let waiter = tokio::spawn(async move { signal.stopped().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        controller.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stopped() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_resolves_when_controller_dropped() {
        let (controller, signal) = run_signal();
        drop(controller);

        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .expect("stopped() did not resolve");
    }

    #[tokio::test]
    async fn test_stopped_resolves_immediately_when_already_stopped() {
        let (controller, signal) = run_signal();
        controller.stop();

        tokio::time::timeout(Duration::from_millis(100), signal.stopped())
            .await
            .expect("stopped() did not resolve");
    }
}
