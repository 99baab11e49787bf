use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Completion tracking for one fetch.
///
/// The total is fixed at creation: one unit per download that was not
/// already cached plus one unit for the finalize step. A new fetch gets a
/// new `FetchProgress`; old ones are never reset.
#[derive(Debug)]
pub struct FetchProgress {
    total: u64,
    completed: AtomicU64,
    tx: watch::Sender<f64>,
}

impl FetchProgress {
    pub fn new(uncached_downloads: usize) -> Self {
        let (tx, _) = watch::channel(0.0);
        Self {
            total: uncached_downloads as u64 + 1,
            completed: AtomicU64::new(0),
            tx,
        }
    }

    /// Progress of a fetch that finished immediately (nothing to do)
    pub fn finished() -> Self {
        let progress = Self::new(0);
        progress.complete_unit();
        progress
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire).min(self.total)
    }

    pub fn fraction(&self) -> f64 {
        self.completed() as f64 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }

    /// Marks one unit done. Extra calls past the total are ignored.
    pub fn complete_unit(&self) {
        let previous = self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
                (done < self.total).then_some(done + 1)
            });
        if previous.is_ok() {
            self.tx.send_replace(self.fraction());
        }
    }

    /// Receiver observing the completed fraction in `[0, 1]`
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }
}
