use std::{
    collections::{HashMap, HashSet},
    fmt::{Debug, Display, Formatter},
};

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::{
    metadata::{ParamSpec, SourceInfo},
    models::Proxy,
    Error, Result,
};

/// Pull based proxy sequence produced by a streaming source. Finite or
/// unbounded; a failed item ends the sequence, items yielded before it
/// remain valid.
pub type ProxyStream = BoxStream<'static, Result<Proxy>>;

/// The two fetch disciplines a source can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Batch,
    Stream,
}

impl Display for FetchMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Batch => write!(f, "batch"),
            FetchMode::Stream => write!(f, "stream"),
        }
    }
}

/// Base contract every proxy source implements.
///
/// Call ordering (initialize before fetch, nothing after dispose) and
/// schema validation are enforced by [`SourceHandle`](crate::SourceHandle);
/// implementations only ever see calls in a legal order and a parameter
/// mapping that already passed the declared schema.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Provider specific setup. Values in `parameters` are uninterpreted
    /// strings; parse them into a typed config here and fail with
    /// [`Error::Initialization`] when one is malformed. Long setups should
    /// observe `token`.
    async fn initialize(
        &mut self,
        parameters: &HashMap<String, String>,
        token: CancellationToken,
    ) -> Result<()>;

    /// Releases everything acquired in `initialize` or a fetch. Invoked at
    /// most once per instance.
    async fn dispose(&mut self) -> Result<()>;

    /// Batch capability view, `None` when eager fetches are unsupported.
    fn as_batch(&self) -> Option<&dyn BatchProxySource> {
        None
    }

    /// Stream capability view, `None` when incremental fetches are
    /// unsupported.
    fn as_stream(&self) -> Option<&dyn StreamProxySource> {
        None
    }
}

/// Eager fetch capability: the complete currently-available set in one
/// call, or a failure with no partial result.
#[async_trait]
pub trait BatchProxySource: ProxySource {
    async fn fetch(&self, token: CancellationToken) -> Result<Vec<Proxy>>;
}

/// Lazy fetch capability. Every call starts an independent sequence;
/// implementations must not share cursor state between returned streams,
/// and should check `token` between items they produce.
pub trait StreamProxySource: ProxySource {
    fn fetch(&self, token: CancellationToken) -> ProxyStream;
}

/// Explicit registration record for one source implementation: identity,
/// parameter schema and a constructor. Collected by the host registry at
/// registration time; there is no runtime discovery.
pub struct SourceDescriptor {
    info: SourceInfo,
    parameters: Vec<ParamSpec>,
    factory: Box<dyn Fn() -> Box<dyn ProxySource> + Send + Sync>,
}

impl Debug for SourceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("info", &self.info)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl SourceDescriptor {
    /// Fails when two declared parameters share a name; field blankness is
    /// already rejected by the metadata constructors.
    pub fn new(
        info: SourceInfo,
        parameters: Vec<ParamSpec>,
        factory: impl Fn() -> Box<dyn ProxySource> + Send + Sync + 'static,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &parameters {
            if !seen.insert(p.name()) {
                return Err(Error::Validation(format!(
                    "source {} declares parameter {} twice",
                    info.id(),
                    p.name()
                )));
            }
        }
        Ok(Self {
            info,
            parameters,
            factory: Box::new(factory),
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn parameters(&self) -> &[ParamSpec] {
        &self.parameters
    }

    /// Constructs a fresh, uninitialized instance.
    pub fn build(&self) -> Box<dyn ProxySource> {
        (self.factory)()
    }
}
