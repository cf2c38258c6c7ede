//! Downloading dataset sources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::error::FetchError;
use crate::dataset::{CredentialSource, DatasetDescriptor};

/// Retrieves the raw bytes of a dataset's source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, dataset: &DatasetDescriptor) -> Result<Vec<u8>, FetchError>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl FetchConfig {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: concat!("transit-aggregator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fetches remote sources over HTTP and local sources from disk.
///
/// A dataset's download hook runs against the outgoing request just before
/// it is sent. Local paths are read as-is; hooks don't apply to them.
pub struct HttpFetcher {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpFetcher {
    pub fn new(
        config: &FetchConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, credentials })
    }

    async fn fetch_remote(&self, dataset: &DatasetDescriptor) -> Result<Vec<u8>, FetchError> {
        let mut request = self.http.get(&dataset.source).build()?;

        if let Some(spec) = &dataset.download_hook {
            let hook = spec.build(self.credentials.as_ref(), &self.http)?;
            hook.prepare(&mut request).await?;
        }

        let response = self.http.execute(request).await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(FetchError::Unauthorized);
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, dataset: &DatasetDescriptor) -> Result<Vec<u8>, FetchError> {
        let bytes = if dataset.is_remote() {
            self.fetch_remote(dataset).await?
        } else {
            read_local(&dataset.source).await?
        };

        debug!(dataset = %dataset.identifier, size = bytes.len(), "Fetched source");
        Ok(bytes)
    }
}

async fn read_local(path: &str) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path).await.map_err(|error| FetchError::Io {
        path: path.into(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::dataset::DataSetFormat;

    fn fetcher() -> HttpFetcher {
        let credentials: Arc<dyn CredentialSource> = Arc::new(HashMap::<String, String>::new());
        HttpFetcher::new(&FetchConfig::default(), credentials).unwrap()
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"Kind\":\"Operator\"}").unwrap();

        let dataset = DatasetDescriptor::new(
            "local",
            DataSetFormat::CtdfJson,
            file.path().to_string_lossy(),
        );
        let bytes = fetcher().fetch(&dataset).await.unwrap();
        assert_eq!(bytes, b"{\"Kind\":\"Operator\"}");
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let dataset = DatasetDescriptor::new(
            "missing",
            DataSetFormat::CtdfJson,
            "/definitely/not/here.json",
        );
        let err = fetcher().fetch(&dataset).await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn default_user_agent_names_crate() {
        assert!(FetchConfig::default().user_agent.starts_with("transit-aggregator/"));
    }
}
