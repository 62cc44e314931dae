use crate::config::ContentConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use tracing::{debug, instrument};

/// Source of content files addressed by content id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Download the complete body for a content id
    async fn fetch(&self, content_id: &str) -> Result<Bytes, FetchError>;
}

/// Fetches content files from the asset host over HTTP
pub struct HttpContentFetcher {
    client: Client,
    base_url: String,
}

impl HttpContentFetcher {
    pub fn new(config: &ContentConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, content_id: &str) -> String {
        format!("{}/{}", self.base_url, content_id)
    }
}

#[async_trait]
impl ContentSource for HttpContentFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, content_id: &str) -> Result<Bytes, FetchError> {
        let url = self.url_for(content_id);
        let transport_error = |e: reqwest::Error| FetchError::Unreachable {
            url: url.clone(),
            message: e.to_string(),
        };

        let mut response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            body.extend_from_slice(&chunk);
        }

        debug!(size_bytes = body.len(), "Content downloaded");

        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_development_host() {
        let fetcher = HttpContentFetcher::new(&ContentConfig::default()).unwrap();
        assert_eq!(
            fetcher.url_for("QmHash1"),
            "https://assets.decentraland.zone/QmHash1"
        );
    }

    #[test]
    fn test_url_for_production_host() {
        let config = ContentConfig {
            production: true,
            ..Default::default()
        };
        let fetcher = HttpContentFetcher::new(&config).unwrap();
        assert_eq!(
            fetcher.url_for("QmHash1"),
            "https://assets.decentraland.org/QmHash1"
        );
    }

    #[test]
    fn test_url_for_override_strips_trailing_slash() {
        let config = ContentConfig {
            base_url: Some("http://localhost:9000/contents/".to_string()),
            request_timeout_secs: Some(5),
            ..Default::default()
        };
        let fetcher = HttpContentFetcher::new(&config).unwrap();
        assert_eq!(fetcher.url_for("abc"), "http://localhost:9000/contents/abc");
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let config = ContentConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        };
        let fetcher = HttpContentFetcher::new(&config).unwrap();

        assert!(matches!(
            fetcher.fetch("abc").await,
            Err(FetchError::Unreachable { .. })
        ));
    }
}
