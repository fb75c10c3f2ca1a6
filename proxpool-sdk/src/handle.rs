use std::{
    collections::HashMap,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{future::BoxFuture, FutureExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    metadata::{validate_parameters, ParamSpec},
    models::Proxy,
    source::{FetchMode, ProxySource, ProxyStream, SourceDescriptor},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Disposed,
}

/// Drives one source instance through `initialize -> fetch* -> dispose`.
///
/// The handle owns the instance and performs every ordering and parameter
/// check before provider code runs, so implementations never observe an
/// out-of-order call or a mapping that failed the declared schema. Fetch
/// and lifecycle methods take `&mut self`, which keeps a single call in
/// flight per instance; distinct handles are independent and may run
/// concurrently.
pub struct SourceHandle {
    id: String,
    schema: Vec<ParamSpec>,
    source: Box<dyn ProxySource>,
    state: Lifecycle,
    token: CancellationToken,
}

impl SourceHandle {
    pub fn new(descriptor: &SourceDescriptor) -> Self {
        Self {
            id: descriptor.info().id().to_owned(),
            schema: descriptor.parameters().to_vec(),
            source: descriptor.build(),
            state: Lifecycle::Uninitialized,
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token covering every call on this instance. `dispose` cancels it;
    /// hosts may clone it to abort an in-flight fetch from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Validates `parameters` against the declared schema, then runs the
    /// provider's setup. A validation or setup failure leaves the instance
    /// uninitialized and a later attempt is allowed; success makes any
    /// further `initialize` an [`Error::AlreadyInitialized`].
    pub async fn initialize(
        &mut self,
        parameters: &HashMap<String, String>,
        token: CancellationToken,
    ) -> Result<()> {
        match self.state {
            Lifecycle::Initialized => return Err(Error::AlreadyInitialized),
            Lifecycle::Disposed => return Err(Error::Disposed),
            Lifecycle::Uninitialized => {}
        }
        validate_parameters(&self.schema, parameters)?;
        if token.is_cancelled() || self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let instance = self.token.clone();
        let caller = token.clone();
        let setup = self.source.initialize(parameters, token);
        let res = tokio::select! {
            _ = instance.cancelled() => Err(Error::Cancelled),
            _ = caller.cancelled() => Err(Error::Cancelled),
            res = setup => res,
        };
        if res.is_ok() {
            self.state = Lifecycle::Initialized;
            debug!("source {} initialized", self.id);
        }
        res
    }

    /// Eager fetch: the complete currently-available set, or a failure
    /// with no partial result. Cancellation of either token surfaces as
    /// [`Error::Cancelled`] and discards anything already computed.
    pub async fn fetch_batch(&mut self, token: CancellationToken) -> Result<Vec<Proxy>> {
        self.ensure_fetchable()?;
        let batch = self
            .source
            .as_batch()
            .ok_or(Error::UnsupportedMode(FetchMode::Batch))?;
        if token.is_cancelled() || self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let instance = self.token.clone();
        let caller = token.clone();
        let fetch = batch.fetch(token);
        let res = tokio::select! {
            _ = instance.cancelled() => Err(Error::Cancelled),
            _ = caller.cancelled() => Err(Error::Cancelled),
            res = fetch => res,
        };
        if let Ok(proxies) = &res {
            debug!("source {} fetched {} proxies", self.id, proxies.len());
        }
        res
    }

    /// Starts an independent proxy stream. Cancellation (the given token
    /// or the instance token) is checked before every yield and ends the
    /// sequence with a single [`Error::Cancelled`] item; items already
    /// yielded stay valid. A provider failure likewise ends the sequence,
    /// affecting only the unyielded remainder.
    pub fn fetch_stream(&mut self, token: CancellationToken) -> Result<ProxyStream> {
        self.ensure_fetchable()?;
        let source = self
            .source
            .as_stream()
            .ok_or(Error::UnsupportedMode(FetchMode::Stream))?;
        trace!("source {} starting stream", self.id);
        let inner = source.fetch(token.clone());
        Ok(GuardedStream::new(inner, self.token.clone(), token).boxed())
    }

    /// Idempotent. Cancels the instance token first so an in-flight fetch
    /// holding a token clone unblocks with [`Error::Cancelled`], then runs
    /// the provider's `dispose` exactly once.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.state == Lifecycle::Disposed {
            trace!("source {} already disposed", self.id);
            return Ok(());
        }
        self.token.cancel();
        self.state = Lifecycle::Disposed;
        let res = self.source.dispose().await;
        debug!("source {} disposed", self.id);
        res
    }

    fn ensure_fetchable(&self) -> Result<()> {
        match self.state {
            Lifecycle::Uninitialized => Err(Error::NotInitialized),
            Lifecycle::Disposed => Err(Error::Disposed),
            Lifecycle::Initialized => Ok(()),
        }
    }
}

/// Wraps a provider stream so cancellation is observed on every poll,
/// before the producer is given a chance to run, and so the sequence is
/// fused after its first terminal outcome.
struct GuardedStream {
    inner: ProxyStream,
    cancelled: BoxFuture<'static, ()>,
    done: bool,
}

impl GuardedStream {
    fn new(inner: ProxyStream, instance: CancellationToken, caller: CancellationToken) -> Self {
        let cancelled = async move {
            tokio::select! {
                _ = instance.cancelled_owned() => {}
                _ = caller.cancelled_owned() => {}
            }
        }
        .boxed();
        Self {
            inner,
            cancelled,
            done: false,
        }
    }
}

impl Stream for GuardedStream {
    type Item = Result<Proxy>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.cancelled.poll_unpin(cx).is_ready() {
            this.done = true;
            return Poll::Ready(Some(Err(Error::Cancelled)));
        }
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(item)) => {
                if item.is_err() {
                    this.done = true;
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
