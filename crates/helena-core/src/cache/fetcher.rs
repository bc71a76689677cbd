use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::CachedResponse;
use crate::error::CacheResult;

/// The network side of the cache.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CacheResult<CachedResponse>;
}

#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Any HTTP status is returned as-is; only transport failures are errors.
    async fn fetch(&self, url: &str) -> CacheResult<CachedResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.bytes().await?;

        Ok(CachedResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_keeps_status_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/index.html", server.uri());
        let response = HttpFetcher::new().fetch(&url).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert_eq!(&response.body[..], b"<html></html>");
        assert_eq!(response.url, url);
    }

    #[tokio::test]
    async fn not_found_is_not_a_transport_error() {
        let server = MockServer::start().await;
        let url = format!("{}/missing.js", server.uri());
        let response = HttpFetcher::new().fetch(&url).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }
}
