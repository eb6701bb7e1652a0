use crate::Card;

/// What a single page yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Cards(Vec<Card>),
    /// The site reported there is nothing at or past this page.
    EndOfData,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The page could not be fetched or read; later pages may still work.
    #[error("page {page}: {reason}")]
    Transient { page: u32, reason: String },
    /// Nothing further can succeed (rejected credentials, unusable setup).
    #[error("page {page}: {reason}")]
    Fatal { page: u32, reason: String },
}

impl FetchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Fatal { .. })
    }
}

/// Source of listing pages. Implementations own whatever session they need and
/// give it back in [`PageFetcher::close`].
#[async_trait::async_trait]
pub trait PageFetcher: Send {
    async fn fetch(&mut self, page: u32) -> Result<PageOutcome, FetchError>;

    async fn close(&mut self) {}
}
