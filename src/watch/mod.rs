//! Watch mode: debounced filesystem watching driving reload cycles.
//!
//! Watcher-first: the notify watcher attaches before the initial cycle
//! runs, so edits made during that first compile buffer in the channel
//! instead of vanishing. Raw events go through a pure debouncer (timing and
//! dedup only); when a batch settles, one reload cycle runs for the whole
//! batch.

mod debounce;

pub use debounce::Debouncer;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::debug;
use crate::log;
use crate::logger::{status_error, status_success, status_unchanged, status_warning};
use crate::reload::{CycleOutcome, ReloadCoordinator, ReloadError};

/// Poll interval for the debounce clock between event arrivals.
const TICK_MS: u64 = 50;

pub struct SourceWatcher {
    // Held for its Drop: dropping the watcher detaches all roots.
    _watcher: RecommendedWatcher,
    events: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    coordinator: Arc<ReloadCoordinator>,
    debouncer: Debouncer,
    source_suffix: String,
}

impl SourceWatcher {
    /// Attach to every source root and start buffering events immediately.
    pub fn new(
        coordinator: Arc<ReloadCoordinator>,
        roots: &[PathBuf],
        source_suffix: impl Into<String>,
        debounce: Duration,
    ) -> notify::Result<Self> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            log!("watch"; "watching {}", root.display());
        }
        Ok(Self {
            _watcher: watcher,
            events: rx,
            coordinator,
            debouncer: Debouncer::new(debounce),
            source_suffix: source_suffix.into(),
        })
    }

    /// Blocking event loop; returns when `running` clears (ctrl-c).
    pub fn run(mut self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            match self.events.recv_timeout(Duration::from_millis(TICK_MS)) {
                Ok(Ok(event)) => self.absorb(&event),
                Ok(Err(e)) => status_warning(&format!("watcher error: {e}")),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
            if let Some(paths) = self.debouncer.take_if_ready() {
                self.cycle(&paths);
            }
        }
    }

    fn absorb(&mut self, event: &notify::Event) {
        use notify::EventKind;
        match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => {}
            // Metadata-only noise (mtime bumps from our own cache touches)
            // must not retrigger cycles.
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => {}
            _ => return,
        }
        for path in &event.paths {
            if self.is_relevant(path) {
                debug!("watch"; "event {:?}: {}", event.kind, path.display());
                self.debouncer.record(path.clone());
            }
        }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(self.source_suffix.as_str())
            && !is_temp_file(path)
    }

    fn cycle(&self, paths: &[PathBuf]) {
        debug!("watch"; "{} settled path(s), cycling", paths.len());
        match self.coordinator.try_cycle() {
            Ok(CycleOutcome::Unchanged) => status_unchanged("no effective change"),
            Ok(CycleOutcome::Busy) => {}
            Ok(CycleOutcome::Redefined(classes)) => {
                status_success(&format!("redefined {}", summarize(&classes)));
            }
            Ok(CycleOutcome::Swapped { generation, classes }) => {
                status_success(&format!(
                    "generation {generation}: swapped {}",
                    summarize(&classes)
                ));
            }
            Err(e) => report_cycle_error(&e),
        }
    }
}

/// Editor droppings and atomic-save temporaries.
fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.starts_with('.')
        || name.starts_with('#')
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".tmp")
}

fn summarize(classes: &[String]) -> String {
    match classes {
        [] => "0 classes".to_string(),
        [one] => one.clone(),
        [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
    }
}

/// Watch mode keeps running through failed cycles; the first compiler
/// diagnostic is shown with its source line.
fn report_cycle_error(error: &ReloadError) {
    if let ReloadError::Compile(compile) = error
        && let Some(diag) = compile.primary()
    {
        let source = std::fs::read_to_string(&diag.file).unwrap_or_default();
        status_error("compile failed", &diag.render(&source));
        return;
    }
    status_error("reload failed", &error.to_string());
}
