use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{FetchedPage, PageFetcher};
use crate::error::FetchError;

pub const RANDOM_PAGE_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/random/html";

/// Pulls random article HTML from a redirecting "random page" endpoint.
pub struct WikipediaFetcher {
    client: reqwest::Client,
    url: String,
}

impl WikipediaFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Request { url: url.clone(), source })?;
        Ok(WikipediaFetcher { client, url })
    }
}

#[async_trait]
impl PageFetcher for WikipediaFetcher {
    async fn fetch_random(&self) -> Result<FetchedPage, FetchError> {
        let request_error = |source| FetchError::Request { url: self.url.clone(), source };

        let response = self.client.get(&self.url).send().await.map_err(request_error)?;
        let status = response.status();
        // The endpoint redirects; record the article we actually landed on.
        let landed = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status { url: landed, status: status.as_u16() });
        }

        let html = response.text().await.map_err(request_error)?;
        debug!("Fetched {} ({} bytes)", landed, html.len());
        Ok(FetchedPage { url: landed, html })
    }
}
