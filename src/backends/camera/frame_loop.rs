// SPDX-License-Identifier: GPL-3.0-only
//! Task lifecycle management for decode loops
//!
//! A decode loop runs as a task on the tokio runtime and yields one decode
//! attempt per available frame. [`ScannerControls`] is the handle the session
//! keeps to stop it again.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stop flag shared between a loop task and its controls
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Whether a stop was requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Control handle for a running decode loop
///
/// `stop()` is idempotent and safe to call after the loop already ended on
/// its own. Dropping the controls stops the loop.
pub struct ScannerControls {
    /// Task handle, taken on stop
    task: Mutex<Option<JoinHandle<()>>>,
    /// Signal to stop the loop
    stop_signal: StopSignal,
    /// Name for logging
    name: String,
}

impl ScannerControls {
    /// Spawn a loop task
    ///
    /// The body receives the stop signal and must check it between
    /// iterations; `stop()` also aborts the task at its next await point.
    pub fn spawn<F, Fut>(name: &str, body: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let stop_signal = StopSignal::default();
        let name_clone = name.to_string();
        let future = body(stop_signal.clone());

        info!(name = %name, "Starting decode loop");

        let task = tokio::spawn(async move {
            debug!(name = %name_clone, "Decode loop task started");
            future.await;
            info!(name = %name_clone, "Decode loop task exiting");
        });

        Self {
            task: Mutex::new(Some(task)),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Whether `stop()` has been called
    pub fn is_stopped(&self) -> bool {
        self.stop_signal.is_set()
    }

    /// Stop the loop and release its task (non-blocking, idempotent)
    pub fn stop(&self) {
        self.stop_signal.set();
        if let Some(task) = self.lock_task().take() {
            debug!(name = %self.name, "Stopping decode loop");
            task.abort();
        }
    }

    /// Stop the loop and wait until its task has finished
    pub async fn stop_and_wait(&self) {
        self.stop_signal.set();
        let task = self.lock_task().take();
        if let Some(task) = task {
            task.abort();
            match task.await {
                Ok(()) => debug!(name = %self.name, "Decode loop finished"),
                Err(e) if e.is_cancelled() => debug!(name = %self.name, "Decode loop cancelled"),
                Err(e) => warn!(name = %self.name, error = %e, "Decode loop task panicked"),
            }
        }
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // A poisoned lock only means a panic elsewhere; the handle is still usable
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ScannerControls {
    fn drop(&mut self) {
        if self.lock_task().is_some() {
            debug!(name = %self.name, "ScannerControls dropped, stopping loop");
            self.stop();
        }
    }
}

impl std::fmt::Debug for ScannerControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerControls")
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn counting_loop(name: &str, counter: Arc<AtomicU32>, pause: Duration) -> ScannerControls {
        ScannerControls::spawn(name, move |stop| async move {
            while !stop.is_set() {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(pause).await;
            }
        })
    }

    #[tokio::test]
    async fn test_body_runs_to_completion() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let controls = ScannerControls::spawn("test-finish", move |_stop| async move {
            for _ in 0..=10 {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });

        while controls.is_running() {
            tokio::task::yield_now().await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert!(!controls.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_aborts_pending_iteration() {
        let counter = Arc::new(AtomicU32::new(0));
        let controls = counting_loop("test-abort", Arc::clone(&counter), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(20)).await;
        controls.stop_and_wait().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!controls.is_running());
        assert!(controls.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let controls = ScannerControls::spawn("test-idempotent", |_stop| async {});

        // Let the body finish on its own first
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!controls.is_running());

        controls.stop();
        controls.stop();
        controls.stop_and_wait().await;
        assert!(controls.is_stopped());
    }

    #[tokio::test]
    async fn test_body_sees_stop_signal() {
        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);

        let controls = ScannerControls::spawn("test-signal", move |stop| async move {
            while !stop.is_set() {
                tokio::task::yield_now().await;
            }
            seen_clone.store(true, Ordering::SeqCst);
        });

        assert!(!seen.load(Ordering::SeqCst));
        controls.stop_signal.set();
        for _ in 0..100 {
            if seen.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(seen.load(Ordering::SeqCst));
        controls.stop();
    }

    #[tokio::test]
    async fn test_drop_stops_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let controls = counting_loop("test-drop", Arc::clone(&counter), Duration::from_millis(1));

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(controls);
        let after_drop = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_drop);
    }
}
