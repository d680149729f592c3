//! Sequential numeric id range

use crate::import::source::{Enumerated, Enumerator, ImportError};
use crate::types::{Cursor, ItemRef};
use async_trait::async_trait;

/// Enumerates `start..=end`, emitting each id as both item and cursor
#[derive(Debug, Clone)]
pub struct SequentialRange {
    name: String,
    next: u64,
    end: u64,
}

impl SequentialRange {
    /// Range starting at `first`, or right after `resume` when given
    pub fn new(name: impl Into<String>, first: u64, end: u64, resume: Option<&Cursor>) -> Result<Self, ImportError> {
        let next = match resume {
            None => first,
            Some(Cursor::Index(last)) => last.saturating_add(1).max(first),
            Some(other) => {
                return Err(ImportError::Config(format!(
                    "cursor '{}' is not a numeric position",
                    other
                )))
            }
        };

        Ok(Self {
            name: name.into(),
            next,
            end,
        })
    }

    /// Ids still to be produced
    pub fn remaining(&self) -> u64 {
        if self.next > self.end {
            0
        } else {
            self.end - self.next + 1
        }
    }
}

#[async_trait]
impl Enumerator for SequentialRange {
    async fn next_item(&mut self) -> Result<Option<Enumerated>, ImportError> {
        if self.next > self.end {
            return Ok(None);
        }

        let id = self.next;
        self.next += 1;
        Ok(Some(Enumerated::new(ItemRef::Id(id), Cursor::Index(id))))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut range: SequentialRange) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(e) = range.next_item().await.unwrap() {
            let ItemRef::Id(id) = e.item else {
                panic!("unexpected item {:?}", e.item);
            };
            assert_eq!(e.cursor, Cursor::Index(id));
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn test_inclusive_range() {
        let range = SequentialRange::new("test", 1, 3, None).unwrap();
        assert_eq!(range.remaining(), 3);
        assert_eq!(collect(range).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_resume_after_cursor() {
        // Cursor of item 2 resumes at 3
        let range = SequentialRange::new("test", 1, 5, Some(&Cursor::Index(2))).unwrap();
        assert_eq!(collect(range).await, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_resume_past_end_is_empty() {
        let range = SequentialRange::new("test", 1, 5, Some(&Cursor::Index(5))).unwrap();
        assert_eq!(range.remaining(), 0);
        assert!(collect(range).await.is_empty());
    }

    #[test]
    fn test_rejects_foreign_cursor() {
        let result = SequentialRange::new("test", 1, 5, Some(&Cursor::Title("x".into())));
        assert!(matches!(result, Err(ImportError::Config(_))));
    }
}
