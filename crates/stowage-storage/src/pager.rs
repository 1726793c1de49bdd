use std::collections::VecDeque;

use async_trait::async_trait;
use futures::Stream;
use stowage_common::Result;
use tracing::trace;

use crate::TRACING_TARGET_PAGER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Continue,
    Done,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Cursor: Send;
    type Item: Send;

    /// Fetches the page at `cursor`, appends its items to `page` and, on
    /// [`PageStatus::Continue`], advances `cursor` to the next page.
    async fn fetch(&self, cursor: &mut Self::Cursor, page: &mut Vec<Self::Item>)
    -> Result<PageStatus>;
}

pub struct Pager<F: PageFetcher> {
    fetcher: F,
    cursor: F::Cursor,
    buffer: VecDeque<F::Item>,
    exhausted: bool,
    pages: usize,
}

impl<F: PageFetcher> std::fmt::Debug for Pager<F>
where
    F::Cursor: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("cursor", &self.cursor)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .field("pages", &self.pages)
            .finish()
    }
}

impl<F: PageFetcher> Pager<F> {
    pub fn new(fetcher: F, cursor: F::Cursor) -> Self {
        Self {
            fetcher,
            cursor,
            buffer: VecDeque::new(),
            exhausted: false,
            pages: 0,
        }
    }

    /// Next item, or `Ok(None)` at end of sequence.
    ///
    /// A failed fetch ends the sequence: its error is returned once and
    /// every later call yields `Ok(None)`. Items delivered before the
    /// failure stay valid; items from the failed page are dropped.
    pub async fn next(&mut self) -> Result<Option<F::Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }

            let mut page = Vec::new();
            let status = match self.fetcher.fetch(&mut self.cursor, &mut page).await {
                Ok(status) => status,
                Err(err) => {
                    self.exhausted = true;
                    return Err(err);
                }
            };

            self.pages += 1;
            trace!(
                target: TRACING_TARGET_PAGER,
                page = self.pages,
                items = page.len(),
                ?status,
                "fetched page"
            );

            self.buffer.extend(page);
            if status == PageStatus::Done {
                self.exhausted = true;
            }
        }
    }

    pub fn cursor(&self) -> &F::Cursor {
        &self.cursor
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// True once no further fetch will happen. Buffered items may remain.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub async fn try_collect(mut self) -> Result<Vec<F::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<F::Item>> + Send
    where
        F: 'static,
        F::Cursor: 'static,
        F::Item: 'static,
    {
        futures::stream::unfold(self, |mut pager| async move {
            match pager.next().await {
                Ok(Some(item)) => Some((Ok(item), pager)),
                Ok(None) => None,
                Err(err) => Some((Err(err), pager)),
            }
        })
    }
}
