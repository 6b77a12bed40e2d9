use crate::error::FetchError;
use async_trait::async_trait;

/// Retrieves raw page markup.
/// The crawler only talks to the network through this, so tests can serve pages from memory.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the body of `url`; non-success responses are errors
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Get the name of the fetcher source
    fn source_name(&self) -> &'static str;
}
