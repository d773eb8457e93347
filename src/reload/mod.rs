//! Reload orchestration: scan, compile, enhance, then redefine in place or
//! swap in a new generation.
//!
//! Cycle decision tree:
//!
//! ```text
//! scan -> empty?            -> Unchanged
//!      -> compile fails?    -> error, running generation untouched
//!      -> enhance fails?    -> error, running generation untouched
//!      -> any name never defined here? -> new generation, Swapped
//!      -> gateway capable and all shapes match? -> Redefined
//!      -> otherwise         -> new generation, Swapped
//! ```
//!
//! At most one cycle runs at a time: a cycle requested while another is in
//! flight is a no-op, the caller re-reads the published generation instead.

mod boundary;

pub use boundary::WorkLease;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arc_swap::ArcSwap;
use crossbeam::channel::Receiver;
use thiserror::Error;

use crate::compile::{self, CompileError, CompilerBackend};
use crate::config::Config;
use crate::core::{EventBus, QualifiedName, ReloadEvent, ReloadKind};
use crate::loader::{LoaderError, ParentResolver, Registry, ReloadingClassLoader};
use crate::log;
use crate::model::{ClassCodec, CodecError};
use crate::pipeline::{EnhancementError, Pipeline, StageContext};
use crate::project::ProjectLayout;
use crate::redefine::{RedefineError, RedefinitionGateway};
use crate::scan::ChangeScanner;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Enhance(#[from] EnhancementError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing changed on disk.
    Unchanged,
    /// Changes were applied to the running generation in place.
    Redefined(Vec<String>),
    /// A new generation took over.
    Swapped { generation: u64, classes: Vec<String> },
    /// Another cycle was already in flight; nothing was done.
    Busy,
}

/// One published application generation: the loader and the registration
/// set that go live together.
pub struct AppGeneration {
    pub loader: Arc<ReloadingClassLoader>,
    pub registry: Arc<Registry>,
}

pub struct ReloadCoordinator {
    config: Arc<Config>,
    layout: Arc<dyn ProjectLayout>,
    backend: Arc<dyn CompilerBackend>,
    codec: Arc<dyn ClassCodec>,
    pipeline: Arc<Pipeline>,
    parent: Arc<dyn ParentResolver>,
    gateway: Box<dyn RedefinitionGateway>,
    scanner: ChangeScanner,
    current: ArcSwap<AppGeneration>,
    next_generation: AtomicU64,
    busy: AtomicBool,
    events: EventBus,
}

impl ReloadCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        layout: Arc<dyn ProjectLayout>,
        backend: Arc<dyn CompilerBackend>,
        codec: Arc<dyn ClassCodec>,
        pipeline: Arc<Pipeline>,
        parent: Arc<dyn ParentResolver>,
        gateway: Box<dyn RedefinitionGateway>,
    ) -> Self {
        let scanner = ChangeScanner::new(layout.clone(), config.project.source_suffix.clone());
        let loader = Arc::new(ReloadingClassLoader::new(
            1,
            config.clone(),
            layout.clone(),
            backend.clone(),
            codec.clone(),
            pipeline.clone(),
            parent.clone(),
        ));
        let initial = AppGeneration {
            loader,
            registry: Arc::new(Registry::new()),
        };
        Self {
            config,
            layout,
            backend,
            codec,
            pipeline,
            parent,
            gateway,
            scanner,
            current: ArcSwap::from_pointee(initial),
            next_generation: AtomicU64::new(2),
            busy: AtomicBool::new(false),
            events: EventBus::new(),
        }
    }

    /// The generation currently serving.
    pub fn generation(&self) -> Arc<AppGeneration> {
        self.current.load_full()
    }

    pub fn subscribe(&self) -> Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Run one reload cycle unless one is already in flight, publishing the
    /// reload-completed event right away.
    pub fn try_cycle(&self) -> Result<CycleOutcome, ReloadError> {
        let (outcome, event) = self.try_cycle_deferred()?;
        if let Some(event) = event {
            self.events.publish(&event);
        }
        Ok(outcome)
    }

    /// Like [`Self::try_cycle`], but hands the reload-completed event back
    /// to the caller. Work boundaries publish it only after the unit of
    /// work's response is flushed.
    pub(crate) fn try_cycle_deferred(
        &self,
    ) -> Result<(CycleOutcome, Option<ReloadEvent>), ReloadError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Ok((CycleOutcome::Busy, None));
        }
        let result = self.run_cycle();
        self.busy.store(false, Ordering::Release);
        result
    }

    fn run_cycle(&self) -> Result<(CycleOutcome, Option<ReloadEvent>), ReloadError> {
        let current = self.current.load_full();
        let changes = self.scanner.scan(current.loader.cache());
        if changes.is_empty() {
            return Ok((CycleOutcome::Unchanged, None));
        }
        log!("reload"; "compiling {} changed unit(s)", changes.len());

        // All-or-nothing: a failed compile or enhancement leaves the running
        // generation exactly as it was.
        let batch = self.backend.compile(&changes.units)?;
        compile::write_outputs(&batch, &self.config.project.compiled_ext)?;

        let ctx = StageContext {
            config: &self.config,
        };
        let compiled: Vec<(QualifiedName, Vec<u8>)> = batch
            .classes
            .into_iter()
            .map(|c| (c.name, c.bytes))
            .collect();
        let enhanced = self.pipeline.enhance_all(&compiled, &ctx)?;

        let mut class_names: Vec<String> =
            compiled.iter().map(|(n, _)| n.to_string()).collect();
        class_names.sort();

        // Redefinition can only replace what the live generation already
        // defined. A batch carrying any never-defined name (a brand-new
        // class, or one nothing has loaded) goes straight to a swap so the
        // registration set picks it up.
        if compiled
            .iter()
            .any(|(name, _)| current.loader.defined(name).is_none())
        {
            return self.swap(&current, &compiled, class_names);
        }

        let mut updates = Vec::with_capacity(compiled.len());
        for ((name, bytes), (_, transformed)) in compiled.iter().zip(&enhanced) {
            let model = self
                .codec
                .decode(transformed.as_deref().unwrap_or(bytes))?;
            updates.push((name.clone(), model));
        }

        if self.gateway.capable() {
            match self.gateway.redefine(&current.loader, &updates) {
                Ok(()) => {}
                Err(e @ RedefineError::Incompatible { .. }) => {
                    log!("reload"; "{e}; swapping generation");
                    return self.swap(&current, &compiled, class_names);
                }
                Err(RedefineError::Unavailable) => {
                    return self.swap(&current, &compiled, class_names);
                }
            }
        } else {
            static SWAP_NOTICE: std::sync::Once = std::sync::Once::new();
            crate::logger::log_once(
                &SWAP_NOTICE,
                "reload",
                "no in-place redefinition capability, every change swaps a generation",
            );
            return self.swap(&current, &compiled, class_names);
        }

        self.refresh_caches(&current, &compiled, &enhanced);
        let event = ReloadEvent {
            kind: ReloadKind::Redefined,
            classes: class_names.clone(),
            generation: current.loader.generation(),
        };
        Ok((CycleOutcome::Redefined(class_names), Some(event)))
    }

    /// Install fresh bytes into the live generation's cache and persist
    /// every entry, transformed or raw, so later generations restore from
    /// disk instead of re-enhancing.
    fn refresh_caches(
        &self,
        current: &AppGeneration,
        compiled: &[(QualifiedName, Vec<u8>)],
        enhanced: &[(QualifiedName, Option<Vec<u8>>)],
    ) {
        let cache = current.loader.cache();
        for ((name, bytes), (_, transformed)) in compiled.iter().zip(enhanced) {
            cache.refresh(name, bytes.clone());
            if let Some(out) = transformed {
                cache.set_transformed(name, out.clone());
            }
            cache.write_cache(name);
        }
    }

    /// Stand up a new generation over the freshly written outputs, rebuild
    /// the registration set through it, and publish both atomically.
    fn swap(
        &self,
        current: &AppGeneration,
        compiled: &[(QualifiedName, Vec<u8>)],
        class_names: Vec<String>,
    ) -> Result<(CycleOutcome, Option<ReloadEvent>), ReloadError> {
        let id = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let loader = Arc::new(ReloadingClassLoader::new(
            id,
            self.config.clone(),
            self.layout.clone(),
            self.backend.clone(),
            self.codec.clone(),
            self.pipeline.clone(),
            self.parent.clone(),
        ));

        // The new registration set is the old names plus the changed
        // classes, all resolved through the new loader. Loading here also
        // warms them so the first request after the swap pays nothing.
        let registry = Registry::new();
        for name in current.registry.names() {
            registry.register(loader.load(&name)?);
        }
        for (name, _) in compiled {
            registry.register(loader.load(name)?);
        }

        // Store before the event leaves this function: subscribers reacting
        // to it must observe the new generation.
        self.current.store(Arc::new(AppGeneration {
            loader,
            registry: Arc::new(registry),
        }));
        let event = ReloadEvent {
            kind: ReloadKind::Swapped,
            classes: class_names.clone(),
            generation: id,
        };
        log!("reload"; "generation {id} is live ({} class(es))", class_names.len());
        Ok((
            CycleOutcome::Swapped {
                generation: id,
                classes: class_names,
            },
            Some(event),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Modelc;
    use crate::loader::NoParent;
    use crate::model::{JsonCodec, Op};
    use crate::redefine::{InProcessGateway, SwapOnly};
    use std::fs;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, rel: &str, text: &str) {
        let path = dir.path().join("app").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn coordinator(dir: &TempDir, gateway: Box<dyn RedefinitionGateway>) -> ReloadCoordinator {
        let text = r#"
[enhancer]
accessors = "accessor-synthesis"
redirect = "field-access-redirection"
"#;
        let mut config: Config = toml::from_str(text).unwrap();
        config.root = dir.path().to_path_buf();
        let config = Arc::new(config);

        let layout = Arc::new(crate::project::DirLayout::single(
            dir.path().join("app"),
            dir.path().join("build/classes"),
        ));
        let codec: Arc<dyn ClassCodec> = Arc::new(JsonCodec);
        let pipeline = Arc::new(Pipeline::from_config(&config, codec.clone()).unwrap());
        ReloadCoordinator::new(
            config,
            layout,
            Arc::new(Modelc::new(codec.clone())),
            codec,
            pipeline,
            Arc::new(NoParent),
            gateway,
        )
    }

    const FOO_V1: &str =
        "package com.example;\nclass Foo {\n  int count;\n  fn tick() { get count; }\n}\n";
    // Same shape, different body.
    const FOO_V2: &str =
        "package com.example;\nclass Foo {\n  int count;\n  fn tick() { set count; }\n}\n";
    // Added field: structural change.
    const FOO_V3: &str =
        "package com.example;\nclass Foo {\n  int count;\n  int extra;\n  fn tick() { get count; }\n}\n";

    fn touch_later(dir: &TempDir, rel: &str, text: &str) {
        // Mtime resolution on some filesystems is one second; nudge past
        // the cache watermark instead of sleeping that long.
        std::thread::sleep(std::time::Duration::from_millis(30));
        write_source(dir, rel, text);
    }

    #[test]
    fn test_unchanged_cycle_writes_nothing() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let generation = coordinator.generation();
        generation
            .loader
            .load(&QualifiedName::new("com.example.Foo"))
            .unwrap();
        let writes_before = generation.loader.cache().disk_writes();

        assert_eq!(coordinator.try_cycle().unwrap(), CycleOutcome::Unchanged);
        assert_eq!(generation.loader.cache().disk_writes(), writes_before);
    }

    #[test]
    fn test_body_edit_redefines_in_place() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let name = QualifiedName::new("com.example.Foo");
        let generation = coordinator.generation();
        let class = generation.loader.load(&name).unwrap();
        assert_eq!(
            class.model().method("tick").unwrap().body,
            vec![Op::Call("getCount".into())]
        );

        touch_later(&dir, "com/example/Foo.cls", FOO_V2);
        let outcome = coordinator.try_cycle().unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Redefined(vec!["com.example.Foo".into()])
        );

        // Same generation, same handle, new body.
        assert!(Arc::ptr_eq(&coordinator.generation(), &generation));
        assert_eq!(
            class.model().method("tick").unwrap().body,
            vec![Op::Call("setCount".into())]
        );
    }

    #[test]
    fn test_structural_edit_swaps_generation() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let name = QualifiedName::new("com.example.Foo");
        let old = coordinator.generation();
        let old_class = old.loader.load(&name).unwrap();
        old.registry.register(old_class.clone());

        touch_later(&dir, "com/example/Foo.cls", FOO_V3);
        let outcome = coordinator.try_cycle().unwrap();
        assert!(matches!(outcome, CycleOutcome::Swapped { generation: 2, .. }));

        let new = coordinator.generation();
        assert!(!Arc::ptr_eq(&new, &old));
        // Registry was rebuilt through the new loader.
        let new_class = new.registry.get(&name).unwrap();
        assert_eq!(new_class.generation(), 2);
        assert!(new_class.model().field("extra").is_some());
        // The old handle is frozen, not mutated.
        assert!(old_class.model().field("extra").is_none());
    }

    #[test]
    fn test_incapable_gateway_always_swaps() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(SwapOnly));
        let name = QualifiedName::new("com.example.Foo");
        coordinator.generation().loader.load(&name).unwrap();

        // Body-only edit, but no redefinition capability.
        touch_later(&dir, "com/example/Foo.cls", FOO_V2);
        assert!(matches!(
            coordinator.try_cycle().unwrap(),
            CycleOutcome::Swapped { .. }
        ));
    }

    #[test]
    fn test_new_class_swaps_generation() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let old = coordinator.generation();
        let foo = QualifiedName::new("com.example.Foo");
        old.registry.register(old.loader.load(&foo).unwrap());

        // A brand-new class can never be redefined into the live
        // generation: the cycle must swap.
        touch_later(
            &dir,
            "com/example/Bar.cls",
            "package com.example;\nclass Bar { int z; }\n",
        );
        let outcome = coordinator.try_cycle().unwrap();
        assert!(matches!(outcome, CycleOutcome::Swapped { generation: 2, .. }));

        // The new registration set carries the old names plus the newcomer.
        let new = coordinator.generation();
        let bar = QualifiedName::new("com.example.Bar");
        assert_eq!(new.registry.get(&bar).unwrap().generation(), 2);
        assert_eq!(new.registry.get(&foo).unwrap().generation(), 2);
    }

    #[test]
    fn test_change_before_any_load_swaps() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let name = QualifiedName::new("com.example.Foo");

        // Nothing loaded yet: the class is not defined anywhere, so the
        // first cycle already promotes a generation.
        let outcome = coordinator.try_cycle().unwrap();
        assert!(matches!(outcome, CycleOutcome::Swapped { generation: 2, .. }));

        let new = coordinator.generation();
        assert!(new.loader.defined(&name).is_some());
        assert!(new.registry.get(&name).is_some());
        assert!(
            new.registry
                .get(&name)
                .unwrap()
                .model()
                .has_method("getCount")
        );
    }

    #[test]
    fn test_swap_registers_changed_classes() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(SwapOnly));
        let name = QualifiedName::new("com.example.Foo");
        // Loaded, but the application never registered it.
        coordinator.generation().loader.load(&name).unwrap();

        touch_later(&dir, "com/example/Foo.cls", FOO_V2);
        assert!(matches!(
            coordinator.try_cycle().unwrap(),
            CycleOutcome::Swapped { generation: 2, .. }
        ));

        // The changed class is registered in the swapped generation even
        // though the old registry never held it.
        let class = coordinator.generation().registry.get(&name).unwrap();
        assert_eq!(class.generation(), 2);
        assert_eq!(
            class.model().method("tick").unwrap().body,
            vec![Op::Call("setCount".into())]
        );
    }

    #[test]
    fn test_redefine_persists_untransformed_bytes() {
        const PLAIN_V1: &str =
            "package com.example;\nclass Plain {\n  fn ping() { call logger.a; }\n}\n";
        const PLAIN_V2: &str =
            "package com.example;\nclass Plain {\n  fn ping() { call logger.b; }\n}\n";

        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Plain.cls", PLAIN_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let generation = coordinator.generation();
        generation
            .loader
            .load(&QualifiedName::new("com.example.Plain"))
            .unwrap();
        let writes_before = generation.loader.cache().disk_writes();

        // No fields, so the pipeline changes nothing; the recompiled raw
        // bytes still land in the signature-addressed cache.
        touch_later(&dir, "com/example/Plain.cls", PLAIN_V2);
        assert!(matches!(
            coordinator.try_cycle().unwrap(),
            CycleOutcome::Redefined(_)
        ));
        assert_eq!(generation.loader.cache().disk_writes(), writes_before + 1);
    }

    #[test]
    fn test_compile_failure_leaves_generation_untouched() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let name = QualifiedName::new("com.example.Foo");
        let class = coordinator.generation().loader.load(&name).unwrap();

        touch_later(
            &dir,
            "com/example/Foo.cls",
            "package com.example;\nclass Foo { int }\n",
        );
        assert!(matches!(
            coordinator.try_cycle(),
            Err(ReloadError::Compile(_))
        ));
        // Old definition still serves.
        assert_eq!(
            class.model().method("tick").unwrap().body,
            vec![Op::Call("getCount".into())]
        );

        // Fixing the source recovers on the next cycle.
        touch_later(&dir, "com/example/Foo.cls", FOO_V2);
        assert!(matches!(
            coordinator.try_cycle().unwrap(),
            CycleOutcome::Redefined(_)
        ));
    }

    #[test]
    fn test_cycle_requested_mid_cycle_is_a_noop() {
        use crossbeam::channel::{Sender, bounded};

        // Gateway that parks inside redefine until released, holding the
        // cycle open.
        struct Parking {
            entered: Sender<()>,
            release: crossbeam::channel::Receiver<()>,
        }
        impl RedefinitionGateway for Parking {
            fn capable(&self) -> bool {
                true
            }
            fn redefine(
                &self,
                loader: &ReloadingClassLoader,
                updates: &[(QualifiedName, crate::model::ClassModel)],
            ) -> Result<(), crate::redefine::RedefineError> {
                self.entered.send(()).unwrap();
                self.release.recv().unwrap();
                InProcessGateway.redefine(loader, updates)
            }
        }

        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let coordinator = Arc::new(coordinator(
            &dir,
            Box::new(Parking {
                entered: entered_tx,
                release: release_rx,
            }),
        ));
        coordinator
            .generation()
            .loader
            .load(&QualifiedName::new("com.example.Foo"))
            .unwrap();
        touch_later(&dir, "com/example/Foo.cls", FOO_V2);

        let background = {
            let coordinator = coordinator.clone();
            std::thread::spawn(move || coordinator.try_cycle().unwrap())
        };
        entered_rx.recv().unwrap();

        // A cycle is in flight: this request does nothing.
        assert_eq!(coordinator.try_cycle().unwrap(), CycleOutcome::Busy);

        release_tx.send(()).unwrap();
        assert!(matches!(background.join().unwrap(), CycleOutcome::Redefined(_)));
        // The flag cleared; quiet cycles run again.
        assert_eq!(coordinator.try_cycle().unwrap(), CycleOutcome::Unchanged);
    }

    #[test]
    fn test_event_published_per_cycle() {
        let dir = TempDir::new().unwrap();
        write_source(&dir, "com/example/Foo.cls", FOO_V1);

        let coordinator = coordinator(&dir, Box::new(InProcessGateway));
        let rx = coordinator.subscribe();
        coordinator
            .generation()
            .loader
            .load(&QualifiedName::new("com.example.Foo"))
            .unwrap();

        touch_later(&dir, "com/example/Foo.cls", FOO_V2);
        coordinator.try_cycle().unwrap();
        let event = rx.recv().unwrap();
        assert_eq!(event.kind, ReloadKind::Redefined);
        assert_eq!(event.classes, vec!["com.example.Foo".to_string()]);
        assert_eq!(event.generation, 1);
    }
}
