pub mod file;
#[cfg(test)]
pub mod memory;

use std::{collections::BTreeSet, io, path::PathBuf};

use super::Card;

/// Number of cards kept in [`Summary::sample_cards`].
pub const SAMPLE_SIZE: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("can't access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt data file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only view of whatever a store has persisted so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub output: String,
    pub total_cards: usize,
    pub scraped_pages: BTreeSet<u32>,
    pub sample_cards: Vec<Card>,
    pub file_size: u64,
}

impl Summary {
    pub fn file_size_mb(&self) -> f64 {
        (self.file_size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Page-granular persistence used by the orchestrator.
///
/// `append_page` must not return before the page is durable: anything a caller
/// has seen succeed survives a crash of the process right after.
#[async_trait::async_trait]
pub trait Store {
    fn has_page(&self, page: u32) -> bool;
    async fn append_page(&mut self, page: u32, cards: &[Card]) -> Result<(), StoreError>;
    async fn summarize(&self) -> Result<Summary, StoreError>;
}

fn summary_of<'a, I>(output: String, pages: I, file_size: u64) -> Summary
where
    I: IntoIterator<Item = (&'a u32, &'a Vec<Card>)>,
{
    let mut summary = Summary {
        output,
        file_size,
        ..Default::default()
    };
    for (page, cards) in pages {
        summary.scraped_pages.insert(*page);
        summary.total_cards += cards.len();
        let room = SAMPLE_SIZE - summary.sample_cards.len();
        summary
            .sample_cards
            .extend(cards.iter().take(room).cloned());
    }
    summary
}
