use std::collections::HashMap;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use proxpool_sdk::{
    metadata::{ParamSpec, SourceInfo},
    models::{Protocols, Proxy},
    source::{BatchProxySource, ProxySource, ProxyStream, SourceDescriptor, StreamProxySource},
    Error, Result,
};

/// In-memory reference source: the whole proxy list arrives through the
/// `proxies` parameter. Implements both fetch disciplines and doubles as
/// the conformance vehicle for hosts wiring up the contract.
#[derive(Default)]
pub struct StaticListSource {
    proxies: Vec<Proxy>,
}

impl StaticListSource {
    pub const ID: &'static str = "proxpool.static-list";

    pub fn descriptor() -> SourceDescriptor {
        Self::try_descriptor().expect("static list descriptor is valid")
    }

    fn try_descriptor() -> Result<SourceDescriptor> {
        let info = SourceInfo::new(Self::ID, "Static List")?.with_description(
            "Serves a fixed proxy list supplied via parameters; intended for tests and wiring checks.",
        );
        let parameters = vec![
            ParamSpec::required(
                "proxies",
                "Comma or newline separated host:port entries.",
            )?,
            ParamSpec::optional(
                "protocols",
                "Protocol flags applied to every entry, e.g. `http,socks5`.",
            )?,
            ParamSpec::optional("username", "Username applied to every entry; requires `password`.")?,
            ParamSpec::optional("password", "Password applied to every entry; requires `username`.")?,
        ];
        SourceDescriptor::new(info, parameters, || Box::new(Self::default()))
    }
}

#[async_trait]
impl ProxySource for StaticListSource {
    async fn initialize(
        &mut self,
        parameters: &HashMap<String, String>,
        _token: CancellationToken,
    ) -> Result<()> {
        let raw = parameters
            .get("proxies")
            .ok_or_else(|| Error::Initialization("missing proxies parameter".into()))?;
        let protocols = match parameters.get("protocols") {
            Some(list) => Protocols::parse_list(list)
                .map_err(|e| Error::Initialization(e.to_string()))?,
            None => Protocols::NONE,
        };
        let credentials = match (parameters.get("username"), parameters.get("password")) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            (None, None) => None,
            _ => {
                return Err(Error::Initialization(
                    "username and password must be supplied together".into(),
                ));
            }
        };

        let mut proxies = Vec::new();
        for entry in raw.split(|c: char| c == ',' || c == '\n') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let mut proxy = entry
                .parse::<Proxy>()
                .map_err(|e| Error::Initialization(format!("bad entry `{}`: {}", entry, e)))?
                .with_protocols(protocols);
            if let Some((user, pass)) = &credentials {
                proxy = proxy.with_credentials(user.clone(), pass.clone());
            }
            proxies.push(proxy);
        }
        if proxies.is_empty() {
            return Err(Error::Initialization(
                "proxies parameter holds no entries".into(),
            ));
        }

        debug!("static list parsed {} proxies", proxies.len());
        self.proxies = proxies;
        Ok(())
    }

    async fn dispose(&mut self) -> Result<()> {
        self.proxies.clear();
        Ok(())
    }

    fn as_batch(&self) -> Option<&dyn BatchProxySource> {
        Some(self)
    }

    fn as_stream(&self) -> Option<&dyn StreamProxySource> {
        Some(self)
    }
}

#[async_trait]
impl BatchProxySource for StaticListSource {
    async fn fetch(&self, _token: CancellationToken) -> Result<Vec<Proxy>> {
        Ok(self.proxies.clone())
    }
}

impl StreamProxySource for StaticListSource {
    fn fetch(&self, _token: CancellationToken) -> ProxyStream {
        stream::iter(self.proxies.clone().into_iter().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use proxpool_sdk::SourceHandle;

    use super::*;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn params(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn missing_proxies_parameter_fails_validation() {
        let mut handle = SourceHandle::new(&StaticListSource::descriptor());
        match handle.initialize(&HashMap::new(), token()).await {
            Err(Error::MissingParameters(names)) => assert_eq!(names, vec!["proxies".to_owned()]),
            other => panic!("expected MissingParameters, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn parses_entries_with_protocols_and_credentials() {
        let mut handle = SourceHandle::new(&StaticListSource::descriptor());
        handle
            .initialize(
                &params(&[
                    ("proxies", "10.0.0.1:8080, 10.0.0.2:1080\n10.0.0.3:3128"),
                    ("protocols", "http,https"),
                    ("username", "user"),
                    ("password", "pass"),
                ]),
                token(),
            )
            .await
            .unwrap();

        let proxies = handle.fetch_batch(token()).await.unwrap();
        assert_eq!(proxies.len(), 3);
        for proxy in &proxies {
            assert!(proxy.protocols().contains(Protocols::HTTP));
            assert!(proxy.protocols().contains(Protocols::HTTPS));
            assert_eq!(proxy.username(), Some("user"));
            assert_eq!(proxy.password(), Some("pass"));
        }
        assert_eq!(proxies[1].port(), 1080);
    }

    #[tokio::test]
    async fn malformed_values_are_initialization_errors() {
        // a bad entry is a provider-side failure, never a schema violation
        let mut handle = SourceHandle::new(&StaticListSource::descriptor());
        let err = handle
            .initialize(&params(&[("proxies", "not-an-endpoint")]), token())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));

        let err = handle
            .initialize(
                &params(&[("proxies", "10.0.0.1:8080"), ("username", "user")]),
                token(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[tokio::test]
    async fn stream_yields_the_same_set_as_batch() {
        let mut handle = SourceHandle::new(&StaticListSource::descriptor());
        handle
            .initialize(&params(&[("proxies", "10.0.0.1:8080,10.0.0.2:8081")]), token())
            .await
            .unwrap();

        let batch = handle.fetch_batch(token()).await.unwrap();
        let streamed = handle
            .fetch_stream(token())
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(batch, streamed);
    }
}
