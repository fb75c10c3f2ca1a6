use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use tokio::fs::File;
use tokio_util::{
    codec::{FramedRead, LinesCodec},
    sync::CancellationToken,
};
use tracing::debug;

use proxpool_sdk::{
    metadata::{ParamSpec, SourceInfo},
    models::{Protocols, Proxy},
    source::{ProxySource, ProxyStream, SourceDescriptor, StreamProxySource},
    Error, Result,
};

/// Streams proxies from a local line-oriented list file, one `host:port`
/// entry per line. Blank lines and `#` comments are skipped. The file is
/// read lazily and each fetch opens its own cursor, so sequences stay
/// independent.
#[derive(Default)]
pub struct FileListSource {
    path: Option<PathBuf>,
    protocols: Protocols,
}

impl FileListSource {
    pub const ID: &'static str = "proxpool.file-list";

    pub fn descriptor() -> SourceDescriptor {
        Self::try_descriptor().expect("file list descriptor is valid")
    }

    fn try_descriptor() -> Result<SourceDescriptor> {
        let info = SourceInfo::new(Self::ID, "File List")?
            .with_description("Streams host:port entries from a local list file.");
        let parameters = vec![
            ParamSpec::required("path", "Path of the list file, one host:port entry per line.")?,
            ParamSpec::optional(
                "protocols",
                "Protocol flags applied to every entry, e.g. `http,socks5`.",
            )?,
        ];
        SourceDescriptor::new(info, parameters, || Box::new(Self::default()))
    }
}

#[async_trait]
impl ProxySource for FileListSource {
    async fn initialize(
        &mut self,
        parameters: &HashMap<String, String>,
        token: CancellationToken,
    ) -> Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let path = PathBuf::from(
            parameters
                .get("path")
                .ok_or_else(|| Error::Initialization("missing path parameter".into()))?,
        );
        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            Error::Initialization(format!("cannot read {}: {}", path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(Error::Initialization(format!(
                "{} is not a file",
                path.display()
            )));
        }
        self.protocols = match parameters.get("protocols") {
            Some(list) => Protocols::parse_list(list)
                .map_err(|e| Error::Initialization(e.to_string()))?,
            None => Protocols::NONE,
        };
        debug!("file list source bound to {}", path.display());
        self.path = Some(path);
        Ok(())
    }

    async fn dispose(&mut self) -> Result<()> {
        self.path = None;
        Ok(())
    }

    fn as_stream(&self) -> Option<&dyn StreamProxySource> {
        Some(self)
    }
}

impl StreamProxySource for FileListSource {
    fn fetch(&self, token: CancellationToken) -> ProxyStream {
        let path = self.path.clone();
        let protocols = self.protocols;
        let open = async move {
            // guarded against by the handle; direct callers get the
            // lifecycle error as a stream item
            let path = path.ok_or(Error::NotInitialized)?;
            let display = path.display().to_string();
            let file = File::open(&path).await?;
            Ok::<_, Error>(
                FramedRead::new(file, LinesCodec::new())
                    .map_err(|e| Error::Other(anyhow::anyhow!(e)))
                    .try_filter_map(move |line| {
                        let token = token.clone();
                        let display = display.clone();
                        async move {
                            if token.is_cancelled() {
                                return Err(Error::Cancelled);
                            }
                            let line = line.trim();
                            if line.is_empty() || line.starts_with('#') {
                                return Ok(None);
                            }
                            let proxy = line
                                .parse::<Proxy>()
                                .map_err(|e| {
                                    Error::Other(anyhow::anyhow!("{}: {}", display, e))
                                })?
                                .with_protocols(protocols);
                            Ok(Some(proxy))
                        }
                    }),
            )
        };
        stream::once(open).try_flatten().boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use futures::StreamExt;
    use proxpool_sdk::SourceHandle;

    use super::*;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn params(path: &str) -> HashMap<String, String> {
        HashMap::from([
            ("path".to_owned(), path.to_owned()),
            ("protocols".to_owned(), "socks5".to_owned()),
        ])
    }

    fn list_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn missing_file_fails_initialization() {
        let mut handle = SourceHandle::new(&FileListSource::descriptor());
        let err = handle
            .initialize(&params("/definitely/not/here.txt"), token())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[tokio::test]
    async fn streams_entries_skipping_comments() {
        let file = list_file("# staging pool\n10.0.0.1:1080\n\n10.0.0.2:1080\n");
        let mut handle = SourceHandle::new(&FileListSource::descriptor());
        handle
            .initialize(&params(file.path().to_str().unwrap()), token())
            .await
            .unwrap();

        let proxies = handle
            .fetch_stream(token())
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].host(), "10.0.0.1");
        assert!(proxies[1].protocols().contains(Protocols::SOCKS5));
    }

    #[tokio::test]
    async fn sequences_are_independent() {
        let file = list_file("10.0.0.1:1080\n10.0.0.2:1080\n");
        let mut handle = SourceHandle::new(&FileListSource::descriptor());
        handle
            .initialize(&params(file.path().to_str().unwrap()), token())
            .await
            .unwrap();

        // consume only one item from the first sequence
        let mut first = handle.fetch_stream(token()).unwrap();
        assert!(first.next().await.unwrap().is_ok());
        drop(first);

        // the second sequence starts from the top, sharing no cursor
        let second = handle
            .fetch_stream(token())
            .unwrap()
            .collect::<Vec<_>>()
            .await;
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn bad_line_fails_only_the_remainder() {
        let file = list_file("10.0.0.1:1080\nnot-an-endpoint\n10.0.0.3:1080\n");
        let mut handle = SourceHandle::new(&FileListSource::descriptor());
        handle
            .initialize(&params(file.path().to_str().unwrap()), token())
            .await
            .unwrap();

        let items = handle
            .fetch_stream(token())
            .unwrap()
            .collect::<Vec<_>>()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Other(_))));
    }
}
