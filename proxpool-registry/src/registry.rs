use std::collections::HashMap;

use erased_serde::Serialize as ESerialize;
use tracing::{debug, warn};

use proxpool_sdk::{
    metadata::{ParamSpec, SourceInfo},
    source::{FetchMode, SourceDescriptor},
    SourceHandle,
};

use crate::{
    config::SourcesConfig,
    sources::{FileListSource, StaticListSource},
    Error, Result,
};

/// One registered source type: its descriptor plus the fetch capabilities
/// observed on a probe instance at registration time. The advisory
/// `hide_*` flags on [`SourceInfo`] never feed into these.
pub struct SourceEntry {
    descriptor: SourceDescriptor,
    supports_batch: bool,
    supports_stream: bool,
}

impl SourceEntry {
    pub fn info(&self) -> &SourceInfo {
        self.descriptor.info()
    }

    pub fn parameters(&self) -> &[ParamSpec] {
        self.descriptor.parameters()
    }

    pub fn supports_batch(&self) -> bool {
        self.supports_batch
    }

    pub fn supports_stream(&self) -> bool {
        self.supports_stream
    }

    /// Host policy for dual-capability sources: batch is preferred for its
    /// all-or-nothing result; streaming stays an explicit opt-in.
    pub fn default_fetch_mode(&self) -> FetchMode {
        if self.supports_batch {
            FetchMode::Batch
        } else {
            FetchMode::Stream
        }
    }

    /// Introspection map for UI/API consumers.
    pub fn as_map(&self) -> HashMap<String, Box<dyn ESerialize + Send>> {
        let mut m: HashMap<String, Box<dyn ESerialize + Send>> = HashMap::new();

        m.insert("id".to_owned(), Box::new(self.info().id().to_string()));
        m.insert("name".to_owned(), Box::new(self.info().name().to_string()));
        if let Some(description) = self.info().description() {
            m.insert("description".to_owned(), Box::new(description.to_string()));
        }
        m.insert("hideBatch".to_owned(), Box::new(self.info().hide_batch()));
        m.insert("hideStream".to_owned(), Box::new(self.info().hide_stream()));
        m.insert("supportsBatch".to_owned(), Box::new(self.supports_batch));
        m.insert("supportsStream".to_owned(), Box::new(self.supports_stream));
        m.insert(
            "parameters".to_owned(),
            Box::new(self.parameters().to_vec()),
        );

        m
    }
}

/// Registry of the source implementations available to a host.
///
/// Registration is explicit; there is no runtime discovery. Identity and
/// schema metadata are readable without constructing an instance, and a
/// source that implements neither fetch discipline is refused outright.
#[derive(Default)]
pub struct SourceRegistry {
    entries: HashMap<String, SourceEntry>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in reference sources.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(StaticListSource::descriptor())
            .expect("builtin descriptors are valid");
        registry
            .register(FileListSource::descriptor())
            .expect("builtin descriptors are valid");
        registry
    }

    /// Registers a source type, probing one throwaway instance for its
    /// real capabilities. Fails on a duplicate id or when the probe
    /// implements neither discipline.
    pub fn register(&mut self, descriptor: SourceDescriptor) -> Result<()> {
        let id = descriptor.info().id().to_owned();
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateSource(id));
        }

        let probe = descriptor.build();
        let supports_batch = probe.as_batch().is_some();
        let supports_stream = probe.as_stream().is_some();
        drop(probe);

        if !supports_batch && !supports_stream {
            warn!("refusing source {}: no fetch discipline", id);
            return Err(Error::NotFetchable(id));
        }

        debug!(
            "registered source {} (batch: {}, stream: {})",
            id, supports_batch, supports_stream
        );
        self.entries.insert(
            id,
            SourceEntry {
                descriptor,
                supports_batch,
                supports_stream,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SourceEntry> {
        self.entries.get(id)
    }

    /// Every registered source, ordered by id for stable listings.
    pub fn sources(&self) -> Vec<&SourceEntry> {
        let mut entries = self.entries.values().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.info().id().cmp(b.info().id()));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Introspection maps for every source, ordered by id.
    pub fn manifest(&self) -> Vec<HashMap<String, Box<dyn ESerialize + Send>>> {
        self.sources().into_iter().map(|e| e.as_map()).collect()
    }

    pub fn default_fetch_mode(&self, id: &str) -> Result<FetchMode> {
        self.get(id)
            .map(SourceEntry::default_fetch_mode)
            .ok_or_else(|| Error::UnknownSource(id.to_owned()))
    }

    /// Creates an uninitialized handle for `id`.
    pub fn create(&self, id: &str) -> Result<SourceHandle> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Error::UnknownSource(id.to_owned()))?;
        Ok(SourceHandle::new(&entry.descriptor))
    }

    /// One handle plus its parameter map per configured source. Fails on
    /// the first unknown id; parameter validation happens later, at
    /// `initialize`.
    pub fn create_from_config(
        &self,
        config: &SourcesConfig,
    ) -> Result<Vec<(SourceHandle, HashMap<String, String>)>> {
        config
            .sources
            .iter()
            .map(|c| Ok((self.create(&c.source)?, c.parameters.clone())))
            .collect()
    }
}
