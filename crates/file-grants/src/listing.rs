//! Lazy, restartable listing of one origin's grants.

use std::collections::VecDeque;
use std::sync::Arc;

use file_grants_core::{GrantKey, GrantSummary, Origin};
use file_grants_store::GrantStore;

use crate::error::Result;

/// Walks an origin's grants in key order, one store page at a time.
///
/// The listing holds a cursor, not a snapshot: grants created or destroyed
/// while it is being walked may or may not appear, but no grant is yielded
/// twice and no foreign grant is ever yielded.
pub struct GrantListing<S> {
    store: Arc<S>,
    origin: Origin,
    page_size: usize,
    cursor: Option<GrantKey>,
    buffer: VecDeque<GrantSummary>,
    exhausted: bool,
}

impl<S: GrantStore> GrantListing<S> {
    pub(crate) fn new(store: Arc<S>, origin: Origin, page_size: usize) -> Self {
        Self {
            store,
            origin,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Next summary, or `None` once the origin's grants are exhausted.
    pub async fn next(&mut self) -> Result<Option<GrantSummary>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    /// Start over from the first key.
    pub fn restart(&mut self) {
        self.cursor = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Drain the rest of the listing.
    pub async fn collect_all(&mut self) -> Result<Vec<GrantSummary>> {
        let mut out = Vec::new();
        while let Some(summary) = self.next().await? {
            out.push(summary);
        }
        Ok(out)
    }

    async fn fill(&mut self) -> Result<()> {
        let page = self
            .store
            .list_page(&self.origin, self.cursor, self.page_size)
            .await?;

        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.key);
        }
        self.buffer.extend(page.iter().map(|g| g.summary()));
        Ok(())
    }
}
