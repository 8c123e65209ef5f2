pub mod dbpedia;
pub mod extract;
pub mod wikipedia;

use async_trait::async_trait;

use crate::error::{ExtractionError, FetchError, LookupError};

pub use dbpedia::DbpediaLookup;
pub use extract::HtmlExtractor;
pub use wikipedia::WikipediaFetcher;

/// A fetched document: where it came from and its raw markup.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// Title and flattened body text of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one randomly selected document.
    async fn fetch_random(&self) -> Result<FetchedPage, FetchError>;
}

pub trait ContentExtractor: Send + Sync {
    fn extract(&self, page: &FetchedPage) -> Result<PageContent, ExtractionError>;
}

#[async_trait]
pub trait FactLookup: Send + Sync {
    /// Statement lines (`<s> <p> <o> .`) describing `subject`. May be empty.
    async fn lookup(&self, subject: &str) -> Result<Vec<String>, LookupError>;
}
