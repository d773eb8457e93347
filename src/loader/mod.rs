//! The reloading class loader.
//!
//! Resolution order for a requested name:
//!
//! 1. already defined in this generation
//! 2. in scope (not denied, source present) -> compile if needed, enhance,
//!    define
//! 3. otherwise delegate to the parent resolver
//!
//! A name is defined at most once per generation. Concurrent first loads of
//! the same name serialize on a per-name lock, with a re-check immediately
//! before defining, so both callers get the same [`LoadedClass`].

mod class;
mod registry;
mod resolver;

pub use class::LoadedClass;
pub use registry::Registry;
pub use resolver::{NoParent, ParentResolver};

#[cfg(test)]
pub use resolver::FixedResolver;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use crate::cache::DescriptorCache;
use crate::compile::{self, CompileError, CompilerBackend};
use crate::config::Config;
use crate::core::QualifiedName;
use crate::debug;
use crate::model::{ClassCodec, CodecError};
use crate::pipeline::{EnhancementError, Pipeline, StageContext};
use crate::project::ProjectLayout;
use crate::source::SourceUnit;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("class `{0}` not found")]
    NotFound(QualifiedName),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Enhance(#[from] EnhancementError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub struct ReloadingClassLoader {
    generation: u64,
    config: Arc<Config>,
    layout: Arc<dyn ProjectLayout>,
    backend: Arc<dyn CompilerBackend>,
    codec: Arc<dyn ClassCodec>,
    pipeline: Arc<Pipeline>,
    parent: Arc<dyn ParentResolver>,
    cache: DescriptorCache,
    defined: DashMap<QualifiedName, Arc<LoadedClass>>,
    define_locks: DashMap<QualifiedName, Arc<Mutex<()>>>,
}

impl ReloadingClassLoader {
    pub fn new(
        generation: u64,
        config: Arc<Config>,
        layout: Arc<dyn ProjectLayout>,
        backend: Arc<dyn CompilerBackend>,
        codec: Arc<dyn ClassCodec>,
        pipeline: Arc<Pipeline>,
        parent: Arc<dyn ParentResolver>,
    ) -> Self {
        let cache = DescriptorCache::new(
            layout.clone(),
            config.project.source_suffix.clone(),
            config.project.compiled_ext.clone(),
            backend.engine(),
            pipeline.version_vector(),
        );
        Self {
            generation,
            config,
            layout,
            backend,
            codec,
            pipeline,
            parent,
            cache,
            defined: DashMap::new(),
            define_locks: DashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Whether this loader owns the name: not in a denied namespace, and a
    /// source for it exists under the watched roots.
    pub fn in_scope(&self, name: &QualifiedName) -> bool {
        !name.starts_with_any(&self.config.loader.deny_prefixes)
            && self
                .layout
                .locate(name, &self.config.project.source_suffix)
                .is_some()
    }

    /// Resolve a name, defining it on first load.
    pub fn load(&self, name: &QualifiedName) -> Result<Arc<LoadedClass>, LoaderError> {
        if let Some(class) = self.defined.get(name) {
            return Ok(class.clone());
        }
        if !self.in_scope(name) {
            return self
                .parent
                .resolve(name)
                .ok_or_else(|| LoaderError::NotFound(name.clone()));
        }

        let lock = self.define_locks.entry(name.clone()).or_default().clone();
        let _guard = lock.lock();
        // Define-once: the losing racer takes the winner's definition.
        if let Some(class) = self.defined.get(name) {
            return Ok(class.clone());
        }

        let bytes = self.materialize(name)?;
        let model = self.codec.decode(&bytes)?;
        let class = Arc::new(LoadedClass::new(name.clone(), self.generation, model));
        self.defined.insert(name.clone(), class.clone());
        debug!("loader"; "defined {} (generation {})", name, self.generation);
        Ok(class)
    }

    /// Already-defined class, without triggering a definition.
    pub fn defined(&self, name: &QualifiedName) -> Option<Arc<LoadedClass>> {
        self.defined.get(name).map(|c| c.clone())
    }

    pub fn defined_names(&self) -> Vec<QualifiedName> {
        let mut names: Vec<_> = self.defined.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Compiled, enhanced, cache-backed bytes for a name.
    fn materialize(&self, name: &QualifiedName) -> Result<Vec<u8>, LoaderError> {
        let missing = self
            .cache
            .with_descriptor(name, |d| d.compiled_bytes.is_empty())
            .ok_or_else(|| LoaderError::NotFound(name.clone()))?;
        if missing {
            self.compile_unit(name)?;
        }

        let ctx = StageContext {
            config: &self.config,
        };
        let outcome = self
            .cache
            .with_descriptor(name, |desc| -> Result<(Vec<u8>, bool), LoaderError> {
                if desc.compiled_bytes.is_empty() {
                    // Compiling the outer unit produced no output under
                    // this name (e.g. a removed inner type).
                    return Err(LoaderError::NotFound(desc.name.clone()));
                }
                // First materialization under this signature: run the
                // pipeline and persist what will load, transformed or raw,
                // so later generations restore instead of re-enhancing.
                let mut fresh = false;
                if desc.transformed_bytes.is_none() {
                    fresh = true;
                    if let Some(out) =
                        self.pipeline.enhance_bytes(&desc.compiled_bytes, &ctx)?
                    {
                        desc.transformed_bytes = Some(out);
                    }
                }
                Ok((desc.loadable_bytes().to_vec(), fresh))
            })
            .ok_or_else(|| LoaderError::NotFound(name.clone()))?;
        let (bytes, fresh) = outcome?;
        if fresh {
            self.cache.write_cache(name);
        }
        Ok(bytes)
    }

    /// Compile the unit owning `name` (the outermost type's file) and push
    /// every produced class, inner types included, into the cache.
    fn compile_unit(&self, name: &QualifiedName) -> Result<(), LoaderError> {
        let suffix = &self.config.project.source_suffix;
        let outer = name.outermost();
        let paths = self
            .layout
            .locate(&outer, suffix)
            .ok_or_else(|| LoaderError::NotFound(name.clone()))?;
        let unit = SourceUnit::new(
            outer.clone(),
            paths.source_file(&outer, suffix),
            paths.output_root.clone(),
        );

        let batch = self.backend.compile(std::slice::from_ref(&unit))?;
        compile::write_outputs(&batch, &self.config.project.compiled_ext)?;
        for class in batch.classes {
            self.cache.refresh(&class.name, class.bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Modelc;
    use crate::model::{ClassKind, ClassModel, JsonCodec};
    use crate::project::DirLayout;
    use std::fs;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, rel: &str, text: &str) {
        let path = dir.path().join("app").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn loader_with_parent(dir: &TempDir, parent: Arc<dyn ParentResolver>) -> ReloadingClassLoader {
        let text = r#"
[enhancer]
accessors = "accessor-synthesis"
redirect = "field-access-redirection"
"#;
        let mut config: Config = toml::from_str(text).unwrap();
        config.root = dir.path().to_path_buf();
        let config = Arc::new(config);

        let layout = Arc::new(DirLayout::single(
            dir.path().join("app"),
            dir.path().join("build/classes"),
        ));
        let codec: Arc<dyn ClassCodec> = Arc::new(JsonCodec);
        let pipeline =
            Arc::new(Pipeline::from_config(&config, codec.clone()).unwrap());
        ReloadingClassLoader::new(
            1,
            config,
            layout,
            Arc::new(Modelc::new(codec.clone())),
            codec,
            pipeline,
            parent,
        )
    }

    fn loader(dir: &TempDir) -> ReloadingClassLoader {
        loader_with_parent(dir, Arc::new(NoParent))
    }

    #[test]
    fn test_load_compiles_and_enhances_on_demand() {
        let dir = TempDir::new().unwrap();
        write_source(
            &dir,
            "com/example/Foo.cls",
            "package com.example;\nclass Foo {\n  int count;\n  fn tick() { get count; }\n}\n",
        );

        let loader = loader(&dir);
        let class = loader.load(&QualifiedName::new("com.example.Foo")).unwrap();
        let model = class.model();

        assert!(model.has_method("getCount"));
        // Redirection rewrote the raw read into the accessor call.
        assert_eq!(
            model.method("tick").unwrap().body,
            vec![crate::model::Op::Call("getCount".into())]
        );
        // Compiled output landed on disk.
        assert!(dir.path().join("build/classes/com/example/Foo.cbin").is_file());
    }

    #[test]
    fn test_pipeline_noop_class_still_persisted() {
        let dir = TempDir::new().unwrap();
        write_source(
            &dir,
            "com/example/Plain.cls",
            "package com.example;\nclass Plain {\n  fn ping() { call logger.write; }\n}\n",
        );

        let loader = loader(&dir);
        let name = QualifiedName::new("com.example.Plain");
        loader.load(&name).unwrap();
        // No fields, nothing for the pipeline to change, yet the raw bytes
        // landed in the signature-addressed cache.
        assert_eq!(loader.cache().disk_writes(), 1);

        // A sibling loader over the same tree restores from disk and never
        // re-persists.
        let sibling = self::loader(&dir);
        assert!(
            sibling
                .cache()
                .with_descriptor(&name, |d| d.transformed_bytes.is_some())
                .unwrap()
        );
        sibling.load(&name).unwrap();
        assert_eq!(sibling.cache().disk_writes(), 0);
    }

    #[test]
    fn test_concurrent_loads_define_once() {
        let dir = TempDir::new().unwrap();
        write_source(
            &dir,
            "com/example/Foo.cls",
            "package com.example;\nclass Foo { int x; }\n",
        );

        let loader = Arc::new(loader(&dir));
        let name = QualifiedName::new("com.example.Foo");
        let mut handles = Vec::new();
        for _ in 0..8 {
            let loader = loader.clone();
            let name = name.clone();
            handles.push(std::thread::spawn(move || loader.load(&name).unwrap()));
        }
        let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for class in &classes[1..] {
            assert!(Arc::ptr_eq(&classes[0], class));
        }
        assert_eq!(loader.defined_names().len(), 1);
    }

    #[test]
    fn test_denied_namespace_delegates_to_parent() {
        let dir = TempDir::new().unwrap();
        // A source exists, but the namespace is denied.
        write_source(&dir, "host/Shadow.cls", "package host;\nclass Shadow { }\n");

        let host = ClassModel::new(QualifiedName::new("host.Shadow"), ClassKind::Class);
        let loader = loader_with_parent(&dir, Arc::new(FixedResolver::new(vec![host])));

        let class = loader.load(&QualifiedName::new("host.Shadow")).unwrap();
        assert_eq!(class.generation(), 0);
        assert!(loader.defined_names().is_empty());
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let dir = TempDir::new().unwrap();
        let loader = loader(&dir);
        assert!(matches!(
            loader.load(&QualifiedName::new("com.example.Nope")),
            Err(LoaderError::NotFound(_))
        ));
    }

    #[test]
    fn test_inner_type_loads_through_outer_unit() {
        let dir = TempDir::new().unwrap();
        write_source(
            &dir,
            "com/example/Outer.cls",
            "package com.example;\nclass Outer {\n  class Inner { int y; }\n}\n",
        );

        let loader = loader(&dir);
        let inner = loader
            .load(&QualifiedName::new("com.example.Outer$Inner"))
            .unwrap();
        assert!(inner.model().has_method("getY"));
        assert!(
            dir.path()
                .join("build/classes/com/example/Outer$Inner.cbin")
                .is_file()
        );
    }
}
