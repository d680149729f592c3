//! Signing and publishing documents
//!
//! The publisher turns a [`Document`] into a signed addressable event and
//! submits it through an [`EventSink`]. It never retries on its own: the
//! first error is returned so the import driver can apply its retry policy.

pub mod event;
pub mod relay;

pub use event::{EventTemplate, Keys, SignedEvent, KIND_METADATA, KIND_WIKI_ARTICLE, KIND_WIKI_REDIRECT};
pub use relay::{query_latest, Ack, EventSink, RelayMessage, RelaySink};

use crate::import::ImportError;
use crate::types::Document;
use tracing::debug;

/// Signs documents and writes them to a sink
pub struct Publisher {
    keys: Keys,
    sink: Box<dyn EventSink>,
}

impl Publisher {
    pub fn new(keys: Keys, sink: Box<dyn EventSink>) -> Self {
        Self { keys, sink }
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Sign and submit one document, returning the event that was accepted
    pub async fn publish(&mut self, doc: &Document) -> Result<SignedEvent, ImportError> {
        let created_at = chrono::Utc::now().timestamp();
        let event = EventTemplate::from_document(doc, created_at).sign(&self.keys)?;

        debug!(
            identifier = %doc.identifier,
            kind = event.kind,
            "Submitting event {} to {}",
            event.id,
            self.sink.address()
        );
        self.sink.submit(&event).await?;
        Ok(event)
    }
}
