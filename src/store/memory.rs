use std::collections::BTreeMap;

use crate::Card;

use super::{Store, StoreError, Summary};

/// Keeps pages in process memory only. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct Memory {
    pages: BTreeMap<u32, Vec<Card>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages<I>(pages: I) -> Self
    where
        I: IntoIterator<Item = (u32, Vec<Card>)>,
    {
        Self {
            pages: pages.into_iter().collect(),
        }
    }

    pub fn cards(&self, page: u32) -> Option<&[Card]> {
        self.pages.get(&page).map(Vec::as_slice)
    }
}

#[async_trait::async_trait]
impl Store for Memory {
    fn has_page(&self, page: u32) -> bool {
        self.pages.contains_key(&page)
    }

    async fn append_page(&mut self, page: u32, cards: &[Card]) -> Result<(), StoreError> {
        self.pages.insert(page, cards.to_vec());
        Ok(())
    }

    async fn summarize(&self) -> Result<Summary, StoreError> {
        Ok(super::summary_of("<memory>".into(), &self.pages, 0))
    }
}
