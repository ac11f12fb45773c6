//! Debounced persistence: coalescing rapid edits into one save.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

enum Control {
    Flush,
    Cancel,
}

struct PendingSave {
    seq: u64,
    control: oneshot::Sender<Control>,
    handle: JoinHandle<()>,
}

/// Defers saves by a fixed quiescence window, keyed by storage key.
///
/// Rapid successive `schedule` calls for the same key collapse into one
/// save: each call cancels the pending timer and starts a new one. Saves
/// for different keys are independent.
///
/// Pending work is resolved deterministically: [`DebounceManager::flush`]
/// runs the pending save immediately and waits for it;
/// [`DebounceManager::cancel`] drops it (waiting out a save already in
/// flight). Deletion paths must `cancel` and rename paths must `flush`
/// first, so an in-flight timer can never resurrect a removed student's
/// data.
pub struct DebounceManager {
    delay: Duration,
    next_seq: AtomicU64,
    pending: Arc<Mutex<HashMap<String, PendingSave>>>,
}

impl DebounceManager {
    /// Creates a manager with the given quiescence window.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_seq: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedules `work` to run after the quiescence window, replacing any
    /// save already pending for `key`.
    pub fn schedule<F>(&self, key: &str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            let run = tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                ctl = rx => matches!(ctl, Ok(Control::Flush)),
            };
            if run {
                work.await;
            }
            // Drop our own entry unless a newer schedule replaced it.
            let mut map = pending.lock();
            if map.get(&task_key).is_some_and(|p| p.seq == seq) {
                map.remove(&task_key);
            }
        });

        let previous = self.pending.lock().insert(
            key.to_string(),
            PendingSave {
                seq,
                control: tx,
                handle,
            },
        );
        if let Some(previous) = previous {
            let _ = previous.control.send(Control::Cancel);
        }
    }

    /// Runs the pending save for `key` now, if any, and waits for it.
    pub async fn flush(&self, key: &str) {
        let entry = self.pending.lock().remove(key);
        if let Some(save) = entry {
            let _ = save.control.send(Control::Flush);
            let _ = save.handle.await;
        }
    }

    /// Drops the pending save for `key`, if any.
    ///
    /// A save whose timer already fired cannot be recalled; this waits it
    /// out instead, so the caller observes a quiet store afterwards.
    pub async fn cancel(&self, key: &str) {
        let entry = self.pending.lock().remove(key);
        if let Some(save) = entry {
            let _ = save.control.send(Control::Cancel);
            let _ = save.handle.await;
        }
    }

    /// Runs every pending save now and waits for all of them.
    pub async fn flush_all(&self) {
        let entries: Vec<PendingSave> = self.pending.lock().drain().map(|(_, v)| v).collect();
        for save in entries {
            let _ = save.control.send(Control::Flush);
            let _ = save.handle.await;
        }
    }

    /// Drops every pending save.
    pub async fn cancel_all(&self) {
        let entries: Vec<PendingSave> = self.pending.lock().drain().map(|(_, v)| v).collect();
        for save in entries {
            let _ = save.control.send(Control::Cancel);
            let _ = save.handle.await;
        }
    }

    /// Number of saves currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>, amount: usize) -> impl Future<Output = ()> {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(amount, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_runs_after_quiescence() {
        let mgr = DebounceManager::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        mgr.schedule("ada", counter_task(&counter, 1));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_coalesces_rapid_schedules() {
        let mgr = DebounceManager::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        mgr.schedule("ada", counter_task(&counter, 1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        mgr.schedule("ada", counter_task(&counter, 10));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_keys_are_independent() {
        let mgr = DebounceManager::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        mgr.schedule("ada", counter_task(&counter, 1));
        mgr.schedule("ben", counter_task(&counter, 10));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_immediately() {
        let mgr = DebounceManager::new(Duration::from_secs(3600));
        let counter = Arc::new(AtomicUsize::new(0));

        mgr.schedule("ada", counter_task(&counter, 1));
        mgr.flush("ada").await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_save() {
        let mgr = DebounceManager::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        mgr.schedule("ada", counter_task(&counter, 1));
        mgr.cancel("ada").await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_all_drains_every_key() {
        let mgr = DebounceManager::new(Duration::from_secs(3600));
        let counter = Arc::new(AtomicUsize::new(0));

        mgr.schedule("ada", counter_task(&counter, 1));
        mgr.schedule("ben", counter_task(&counter, 10));
        mgr.flush_all().await;

        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_of_idle_key_is_noop() {
        let mgr = DebounceManager::new(Duration::from_millis(300));
        mgr.flush("nobody").await;
        mgr.cancel("nobody").await;
    }
}
