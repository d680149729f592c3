//! Paginated listing walked by continuation token
//!
//! A producer task fetches listing pages and hands entries to the consumer
//! through a channel of capacity one. The producer only requests page `p + 1`
//! once the consumer has taken the last entry of page `p`, so the consumer is
//! never more than one page fetch behind and nothing is buffered beyond a
//! single entry.

use crate::import::source::{Enumerated, Enumerator, ImportError};
use crate::types::Cursor;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One page of a remote listing
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Entries in listing order
    pub entries: Vec<Enumerated>,
    /// Continuation token for the next page; `None` ends the listing
    pub next: Option<String>,
}

/// Where a resumed listing starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePoint {
    /// Token of the first page to request
    pub token: Option<String>,
    /// Entries of that first page up to and including this cursor are skipped
    pub skip_through: Option<Cursor>,
}

/// Remote listing endpoint
#[async_trait]
pub trait ListingClient: Send + Sync {
    /// Fetch the page identified by `token` (`None` for the first page)
    async fn fetch_page(&self, token: Option<&str>) -> Result<ListingPage, ImportError>;

    /// Translate a cursor into the page to start from
    fn resume_point(&self, cursor: &Cursor) -> Result<ResumePoint, ImportError>;
}

/// Enumerator over a paginated listing, fed by a background producer task
pub struct PaginatedListing {
    name: String,
    rx: mpsc::Receiver<Result<Enumerated, ImportError>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PaginatedListing {
    /// Start the producer task.
    ///
    /// The producer stops when `cancel` fires, when this enumerator is
    /// dropped, after the last page, or after the first fetch error (which is
    /// handed to the consumer).
    pub fn spawn(
        name: impl Into<String>,
        client: Arc<dyn ListingClient>,
        resume: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> Result<Self, ImportError> {
        let start = match resume {
            Some(cursor) => client.resume_point(cursor)?,
            None => ResumePoint::default(),
        };

        let (tx, rx) = mpsc::channel(1);
        let cancel = cancel.child_token();
        let handle = tokio::spawn(produce(client, start, tx, cancel.clone()));

        Ok(Self {
            name: name.into(),
            rx,
            cancel,
            handle,
        })
    }
}

impl Drop for PaginatedListing {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

#[async_trait]
impl Enumerator for PaginatedListing {
    async fn next_item(&mut self) -> Result<Option<Enumerated>, ImportError> {
        match self.rx.recv().await {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

async fn produce(
    client: Arc<dyn ListingClient>,
    start: ResumePoint,
    tx: mpsc::Sender<Result<Enumerated, ImportError>>,
    cancel: CancellationToken,
) {
    let mut token = start.token;
    let mut skip_through = start.skip_through;

    loop {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            page = client.fetch_page(token.as_deref()) => page,
        };

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                warn!("Listing fetch failed at token {:?}: {}", token, e);
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        debug!("Fetched listing page {:?} with {} entries", token, page.entries.len());

        let mut entries = page.entries;
        if let Some(cursor) = skip_through.take() {
            if let Some(pos) = entries.iter().position(|e| e.cursor == cursor) {
                entries.drain(..=pos);
            }
        }

        for entry in entries {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                sent = tx.send(Ok(entry)) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }

        // Capacity frees up once the consumer has taken the page's last entry
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            permit = tx.reserve() => {
                if permit.is_err() {
                    return;
                }
            }
        }

        match page.next {
            Some(next) => token = Some(next),
            None => return,
        }
    }
}
