//! Per-generation descriptor cache with per-key locking.
//!
//! Distinct names never block each other; concurrent lookups of one name
//! serialize on that name's slot, and the loser reuses the winner's result.
//! The cache is owned by exactly one loader generation — no process-wide
//! statics, tests build fresh instances.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::cache::{ClassDescriptor, disk};
use crate::core::QualifiedName;
use crate::debug;
use crate::log;
use crate::project::ProjectLayout;

/// One entry slot. `loaded` distinguishes "never resolved" from "resolved
/// to nothing" so losers of an init race don't re-run the disk IO.
#[derive(Default)]
struct Slot {
    loaded: bool,
    desc: Option<ClassDescriptor>,
}

/// Per-generation mapping name → descriptor.
pub struct DescriptorCache {
    layout: Arc<dyn ProjectLayout>,
    source_suffix: String,
    compiled_ext: String,
    engine: String,
    version_vector: Vec<(String, u32)>,
    entries: DashMap<QualifiedName, Arc<Mutex<Slot>>>,
    disk_writes: AtomicUsize,
}

impl DescriptorCache {
    pub fn new(
        layout: Arc<dyn ProjectLayout>,
        source_suffix: impl Into<String>,
        compiled_ext: impl Into<String>,
        engine: impl Into<String>,
        version_vector: Vec<(String, u32)>,
    ) -> Self {
        Self {
            layout,
            source_suffix: source_suffix.into(),
            compiled_ext: compiled_ext.into(),
            engine: engine.into(),
            version_vector,
            entries: DashMap::new(),
            disk_writes: AtomicUsize::new(0),
        }
    }

    pub fn version_vector(&self) -> &[(String, u32)] {
        &self.version_vector
    }

    /// Run `f` against the descriptor for `name`, resolving it on first
    /// access. Returns None when the name has no source under any watched
    /// root (the loader then delegates to its parent).
    pub fn with_descriptor<R>(
        &self,
        name: &QualifiedName,
        f: impl FnOnce(&mut ClassDescriptor) -> R,
    ) -> Option<R> {
        let slot = self.slot(name);
        let mut guard = slot.lock();
        if !guard.loaded {
            guard.desc = self.resolve(name);
            guard.loaded = true;
        }
        match guard.desc.as_mut() {
            Some(desc) => {
                // Source removal invalidates the record.
                if !desc.source_file.is_file() {
                    guard.desc = None;
                    drop(guard);
                    self.entries.remove(name);
                    return None;
                }
                Some(f(desc))
            }
            None => {
                drop(guard);
                self.entries.remove(name);
                None
            }
        }
    }

    /// Freshness watermark for the scanner. Pure read: never creates or
    /// resolves an entry.
    pub fn peek_last_modified(&self, name: &QualifiedName) -> Option<SystemTime> {
        let slot = self.entries.get(name)?.clone();
        let guard = slot.lock();
        guard.desc.as_ref().map(|d| d.last_modified)
    }

    /// Install fresh compiled bytes after a recompile, creating the
    /// descriptor when the name (e.g. a new inner type) was never loaded.
    pub fn refresh(&self, name: &QualifiedName, compiled_bytes: Vec<u8>) {
        let slot = self.slot(name);
        let mut guard = slot.lock();
        match guard.desc.as_mut() {
            Some(desc) => desc.refresh(compiled_bytes, &self.version_vector),
            None => {
                guard.desc = self.build_descriptor(name, compiled_bytes, SystemTime::now());
                guard.loaded = true;
            }
        }
    }

    /// Store pipeline output on the descriptor.
    pub fn set_transformed(&self, name: &QualifiedName, bytes: Vec<u8>) {
        self.with_descriptor(name, |desc| desc.transformed_bytes = Some(bytes));
    }

    /// Persist the descriptor's loadable bytes to the signature-addressed
    /// disk path. IO failure is a logged miss, never an error: the
    /// in-memory bytes keep serving.
    pub fn write_cache(&self, name: &QualifiedName) {
        let result = self.with_descriptor(name, |desc| {
            disk::write_cached(
                &desc.origin_root,
                &self.engine,
                name,
                desc.signature,
                &self.compiled_ext,
                desc.loadable_bytes(),
                &desc.compiled_file,
            )
        });
        match result {
            Some(Ok(())) => {
                self.disk_writes.fetch_add(1, Ordering::Relaxed);
                debug!("cache"; "persisted {}", name);
            }
            Some(Err(e)) => log!("cache"; "skipping persistence for {name}: {e}"),
            None => {}
        }
    }

    /// Number of successful disk writes (observability and tests).
    pub fn disk_writes(&self) -> usize {
        self.disk_writes.load(Ordering::Relaxed)
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, name: &QualifiedName) -> Arc<Mutex<Slot>> {
        // Clone out of the shard so no DashMap guard is held during IO.
        self.entries.entry(name.clone()).or_default().clone()
    }

    /// First-access resolution: locate paths, load compiled bytes and any
    /// disk-cached transformed entry matching the current signature.
    fn resolve(&self, name: &QualifiedName) -> Option<ClassDescriptor> {
        let paths = self.layout.locate(name, &self.source_suffix)?;
        let source_file = paths.source_file(name, &self.source_suffix);
        if !source_file.is_file() {
            return None;
        }

        let compiled_file = paths.compiled_file(name, &self.compiled_ext);
        let (compiled_bytes, last_modified) = match fs::read(&compiled_file) {
            Ok(bytes) if !bytes.is_empty() => {
                let mtime = fs::metadata(&compiled_file)
                    .and_then(|m| m.modified())
                    .unwrap_or_else(|_| ClassDescriptor::epoch());
                (bytes, mtime)
            }
            // No compiled output yet: epoch watermark forces the scanner
            // to pick the source up.
            _ => (Vec::new(), ClassDescriptor::epoch()),
        };

        let mut desc = ClassDescriptor::new(
            name.clone(),
            source_file,
            compiled_file,
            paths.output_root.clone(),
            compiled_bytes,
            &self.version_vector,
            last_modified,
        );

        if !desc.compiled_bytes.is_empty() {
            desc.transformed_bytes = disk::load_cached(
                &paths.output_root,
                &self.engine,
                name,
                desc.signature,
                &self.compiled_ext,
            );
        }
        Some(desc)
    }

    /// Build a descriptor directly from fresh compiled bytes (post-compile
    /// path for names with no prior entry).
    fn build_descriptor(
        &self,
        name: &QualifiedName,
        compiled_bytes: Vec<u8>,
        last_modified: SystemTime,
    ) -> Option<ClassDescriptor> {
        let paths = self.layout.locate(name, &self.source_suffix)?;
        Some(ClassDescriptor::new(
            name.clone(),
            paths.source_file(name, &self.source_suffix),
            paths.compiled_file(name, &self.compiled_ext),
            paths.output_root.clone(),
            compiled_bytes,
            &self.version_vector,
            last_modified,
        ))
    }
}
