//! Work-boundary integration for the embedding application.
//!
//! A host that serves units of work (requests, jobs, frames) brackets each
//! one: `before_work` runs a reload cycle and hands back the generation to
//! use for the whole unit, `after_work` closes the bracket. The `reissued`
//! flag tells the host its cached per-generation state (routers, lookup
//! tables) is stale.

use std::sync::Arc;

use crate::core::ReloadEvent;
use crate::debug;
use crate::reload::{AppGeneration, CycleOutcome, ReloadCoordinator, ReloadError};

/// Generation lease for one unit of work. The held `Arc` keeps the
/// generation alive even if a concurrent cycle swaps it out mid-work.
pub struct WorkLease {
    generation: Arc<AppGeneration>,
    reissued: bool,
    /// Reload-completed event held back until the work's response flushes.
    pending: Option<ReloadEvent>,
}

impl WorkLease {
    pub fn generation(&self) -> &Arc<AppGeneration> {
        &self.generation
    }

    /// True when this lease carries a different generation than the
    /// previous published one, i.e. a swap happened at this boundary.
    pub fn reissued(&self) -> bool {
        self.reissued
    }
}

impl ReloadCoordinator {
    /// Open a work boundary: reload if sources changed, then lease the
    /// serving generation. Compile or enhancement failures propagate so the
    /// host can refuse the unit of work with a real error.
    pub fn before_work(&self) -> Result<WorkLease, ReloadError> {
        let (outcome, pending) = self.try_cycle_deferred()?;
        let generation = self.generation();
        let reissued = matches!(outcome, CycleOutcome::Swapped { .. });
        Ok(WorkLease {
            generation,
            reissued,
            pending,
        })
    }

    /// Close a work boundary: the reload-completed event (if this boundary
    /// reloaded anything) goes out only now, after the host flushed its
    /// response.
    pub fn after_work(&self, lease: WorkLease) {
        if let Some(event) = lease.pending {
            self.events.publish(&event);
        }
        if lease.reissued {
            debug!(
                "reload";
                "work finished on generation {}",
                lease.generation.loader.generation()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::Modelc;
    use crate::config::Config;
    use crate::core::QualifiedName;
    use crate::loader::NoParent;
    use crate::model::{ClassCodec, JsonCodec};
    use crate::pipeline::Pipeline;
    use crate::project::DirLayout;
    use crate::redefine::InProcessGateway;
    use crate::reload::ReloadCoordinator;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn coordinator(dir: &TempDir) -> ReloadCoordinator {
        let config = Arc::new(Config::rooted_at(dir.path()));
        let layout = Arc::new(DirLayout::single(
            dir.path().join("app"),
            dir.path().join("build/classes"),
        ));
        let codec: Arc<dyn ClassCodec> = Arc::new(JsonCodec);
        ReloadCoordinator::new(
            config,
            layout,
            Arc::new(Modelc::new(codec.clone())),
            codec.clone(),
            Arc::new(Pipeline::new(codec)),
            Arc::new(NoParent),
            Box::new(InProcessGateway),
        )
    }

    #[test]
    fn test_boundary_leases_and_flags_swaps() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("app/a");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("Foo.cls"), "package a;\nclass Foo { int x; }\n").unwrap();

        let coordinator = coordinator(&dir);
        let name = QualifiedName::new("a.Foo");
        coordinator.generation().loader.load(&name).unwrap();

        // Quiet boundary: same generation, not reissued.
        let lease = coordinator.before_work().unwrap();
        assert!(!lease.reissued());
        assert_eq!(lease.generation().loader.generation(), 1);
        coordinator.after_work(lease);

        // Structural edit: the next boundary swaps and says so.
        std::thread::sleep(std::time::Duration::from_millis(30));
        fs::write(
            src.join("Foo.cls"),
            "package a;\nclass Foo { int x; int y; }\n",
        )
        .unwrap();
        let rx = coordinator.subscribe();
        let lease = coordinator.before_work().unwrap();
        assert!(lease.reissued());
        assert_eq!(lease.generation().loader.generation(), 2);

        // The lease pins its generation across later swaps.
        let pinned = lease.generation().clone();
        assert!(pinned.loader.defined(&name).is_some());

        // The reload-completed event waits for the boundary to close.
        assert!(rx.try_recv().is_err());
        coordinator.after_work(lease);
        assert_eq!(rx.recv().unwrap().generation, 2);
    }
}
