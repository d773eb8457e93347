//! Pure debouncer: timing and path dedup only, no reload logic.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;

pub struct Debouncer {
    window: Duration,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    /// Record one relevant path. Repeats within the window collapse; every
    /// event restarts the quiet-time clock.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.last_event = Some(Instant::now());
    }

    /// Drain the batch once the window has been quiet, sorted for
    /// deterministic logging.
    pub fn take_if_ready(&mut self) -> Option<Vec<PathBuf>> {
        let last = self.last_event?;
        if last.elapsed() < self.window {
            return None;
        }
        self.last_event = None;
        let mut paths: Vec<_> = std::mem::take(&mut self.pending).into_iter().collect();
        if paths.is_empty() {
            return None;
        }
        paths.sort();
        Some(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_window_required() {
        let mut debouncer = Debouncer::new(Duration::from_millis(40));
        debouncer.record(PathBuf::from("a.cls"));
        assert!(debouncer.take_if_ready().is_none());

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(
            debouncer.take_if_ready(),
            Some(vec![PathBuf::from("a.cls")])
        );
        // Drained: nothing left.
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_repeats_collapse_and_sort() {
        let mut debouncer = Debouncer::new(Duration::from_millis(1));
        debouncer.record(PathBuf::from("b.cls"));
        debouncer.record(PathBuf::from("a.cls"));
        debouncer.record(PathBuf::from("b.cls"));

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(
            debouncer.take_if_ready(),
            Some(vec![PathBuf::from("a.cls"), PathBuf::from("b.cls")])
        );
    }
}
