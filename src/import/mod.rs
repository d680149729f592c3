//! Crawl, transform and publish pipeline
//!
//! An importer is a pair of an [`Enumerator`] (an ordered, resumable stream of
//! source items) and a [`Transformer`] (one item into one [`Document`]). The
//! [`ImportCoordinator`] drives the pair: every enumerated item is
//! transformed, checked for a redirect marker, signed and published, with a
//! fixed pause between items.
//!
//! # Example Usage
//!
//! ```no_run
//! use wiki_importer::import::{ImportCoordinatorBuilder, PipelineConfig, SequentialRange};
//! use wiki_importer::publish::{Keys, Publisher, RelaySink};
//! # use wiki_importer::import::{ImportError, Transformer};
//! # use wiki_importer::types::{Document, ItemRef};
//! # struct MyTransformer;
//! # #[async_trait::async_trait]
//! # impl Transformer for MyTransformer {
//! #     async fn transform(&self, item: &ItemRef) -> Result<Document, ImportError> {
//! #         Document::article(item.to_string(), "body")
//! #     }
//! # }
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), ImportError> {
//! let keys = Keys::from_hex("0000000000000000000000000000000000000000000000000000000000000003")?;
//! let sink = RelaySink::new("wss://relay.example", Duration::from_secs(10), Duration::from_secs(15));
//!
//! let mut coordinator = ImportCoordinatorBuilder::new()
//!     .with_transformer(Box::new(MyTransformer))
//!     .with_publisher(Publisher::new(keys, Box::new(sink)))
//!     .with_config(PipelineConfig::default())
//!     .build()?;
//!
//! let stats = coordinator.run(Box::new(SequentialRange::new("ids", 1, 100, None)?)).await?;
//! println!("Published {} documents", stats.published);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  (item, cursor)  ┌─────────────┐  Document  ┌──────────────────┐
//! │  Enumerator  │ ───────────────▶ │ Transformer │ ─────────▶ │ RedirectResolver │
//! │ range/listing│                  │  per source │            └────────┬─────────┘
//! │ /dump lines  │                  └─────────────┘                     │
//! └──────────────┘                                                      ▼
//!                                                            ┌──────────────────┐
//!                         ImportCoordinator: order, pacing,  │    Publisher     │
//!                         retries, cancellation, progress    │ sign + EventSink │
//!                                                            └──────────────────┘
//! ```

pub mod converter;
pub mod coordinator;
pub mod enumerate;
pub mod fetcher;
pub mod progress;
pub mod redirect;
pub mod source;
pub mod wikitext;

// Re-export main types
pub use converter::{ConversionRequest, PandocConverter, TextConverter};
pub use coordinator::{ImportCoordinator, ImportCoordinatorBuilder, PipelineConfig, RetryPolicy};
pub use enumerate::{
    Compression, DumpLines, ListingClient, ListingPage, PaginatedListing, ResumePoint,
    SequentialRange,
};
pub use fetcher::{FetchConfig, HttpFetcher};
pub use progress::{log_summary, ImportProgress, RunStats};
pub use redirect::{RedirectResolver, Resolution};
pub use source::{Enumerated, Enumerator, ImportError, Transformer};
pub use wikitext::WikiTextCleaner;
