//! Source enumerators
//!
//! Three shapes of source share the [`Enumerator`](super::Enumerator) trait:
//!
//! - [`SequentialRange`]: integer ids from `start` to a fixed `end`
//! - [`PaginatedListing`]: a remote listing walked by continuation token, fetched
//!   by a producer task one page ahead of the consumer
//! - [`DumpLines`]: a compressed line-delimited dump read by a blocking producer

mod dump;
mod listing;
mod range;

pub use dump::{Compression, DumpLines};
pub use listing::{ListingClient, ListingPage, PaginatedListing, ResumePoint};
pub use range::SequentialRange;
