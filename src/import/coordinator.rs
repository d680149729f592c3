//! Import coordinator that drives one enumerate, transform, publish run
//!
//! Items are processed strictly in enumeration order by a single worker.
//! Per-item failures are logged with the item's cursor and skipped; only an
//! enumerator failure or cancellation ends the run early.

use super::progress::{log_summary, ImportProgress, RunStats};
use super::redirect::{RedirectResolver, Resolution};
use super::source::{Enumerated, Enumerator, ImportError, Transformer};
use crate::publish::Publisher;
use crate::types::{Document, PublishOutcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What to do when publishing a document fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Skip the document
    Skip,
    /// Retry a transient failure once after the retry delay, then skip
    #[default]
    RetryOnce,
    /// Retry transient failures until they succeed
    RetryForever,
}

impl RetryPolicy {
    fn should_retry(self, error: &ImportError, attempts: u32) -> bool {
        match self {
            RetryPolicy::Skip => false,
            RetryPolicy::RetryOnce => attempts == 0 && error.is_transient(),
            RetryPolicy::RetryForever => error.is_transient(),
        }
    }
}

/// Pacing and retry settings for the driver
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause after each published document
    pub item_delay: Duration,
    /// Pause after a skipped item
    pub failure_delay: Duration,
    pub retry: RetryPolicy,
    /// Pause before a publish retry
    pub retry_delay: Duration,
    /// Expected number of items, for the progress bar
    pub total_hint: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_secs(2),
            failure_delay: Duration::from_secs(2),
            retry: RetryPolicy::RetryOnce,
            retry_delay: Duration::from_secs(2),
            total_hint: None,
        }
    }
}

/// How one item ended
enum Step {
    Published,
    SelfRedirect,
    Skipped,
}

/// Import coordinator
pub struct ImportCoordinator {
    transformer: Box<dyn Transformer>,
    resolver: RedirectResolver,
    publisher: Publisher,
    config: PipelineConfig,
    cancel: CancellationToken,
    quiet: bool,
}

impl ImportCoordinator {
    pub fn new(
        transformer: Box<dyn Transformer>,
        publisher: Publisher,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transformer,
            resolver: RedirectResolver::new(),
            publisher,
            config,
            cancel,
            quiet: false,
        }
    }

    /// Set quiet mode (no progress output)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run until the enumerator is exhausted, fails, or the run is cancelled.
    ///
    /// An enumerator error is returned after the summary has been logged, so
    /// the last cursor is still visible to the operator.
    pub async fn run(&mut self, mut enumerator: Box<dyn Enumerator>) -> Result<RunStats, ImportError> {
        let source = enumerator.source_name().to_string();
        info!("Starting import from: {}", source);

        let mut progress = ImportProgress::new(self.config.total_hint, self.quiet);
        let cancel = self.cancel.clone();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = enumerator.next_item() => next,
            };

            let entry = match next {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(ImportError::Cancelled) => break,
                Err(e) => {
                    error!("Enumeration of {} failed: {}", source, e);
                    let stats = progress.finish();
                    log_summary(&source, &stats);
                    return Err(e);
                }
            };

            progress.item_enumerated(&entry.cursor);

            let pause = match self.process(&entry, &mut progress).await {
                Ok(Step::Published) => self.config.item_delay,
                Ok(Step::SelfRedirect) => Duration::ZERO,
                Ok(Step::Skipped) => self.config.failure_delay,
                Err(_) => break,
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            info!("Import cancelled");
            progress.cancel();
        }

        let stats = progress.finish();
        log_summary(&source, &stats);
        Ok(stats)
    }

    /// Transform, resolve and publish one item. Errs only on cancellation.
    async fn process(
        &mut self,
        entry: &Enumerated,
        progress: &mut ImportProgress,
    ) -> Result<Step, ImportError> {
        let cursor = &entry.cursor;
        let cancel = self.cancel.clone();

        let transformed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ImportError::Cancelled),
            doc = self.transformer.transform(&entry.item) => doc,
        };

        let resolution = match transformed.and_then(|doc| self.resolver.resolve(doc)) {
            Ok(resolution) => resolution,
            Err(ImportError::Cancelled) => return Err(ImportError::Cancelled),
            Err(e) => {
                warn!(cursor = %cursor, item = %entry.item, "Skipping item: {}", e);
                progress.item_skipped(cursor, e.to_string());
                return Ok(Step::Skipped);
            }
        };

        let doc = match resolution {
            Resolution::SelfRedirect(doc) => {
                info!(cursor = %cursor, identifier = %doc.identifier, "Not publishing self-redirect");
                progress.self_redirect();
                return Ok(Step::SelfRedirect);
            }
            Resolution::Article(doc) | Resolution::Redirect(doc) => doc,
        };

        match self.publish(&doc, entry, progress).await {
            Ok(()) => Ok(Step::Published),
            Err(ImportError::Cancelled) => Err(ImportError::Cancelled),
            Err(e) => {
                let outcome = PublishOutcome::Skipped(e.to_string());
                warn!(cursor = %cursor, identifier = %doc.identifier, "{}", outcome);
                progress.item_skipped(cursor, format!("publish: {}", e));
                Ok(Step::Skipped)
            }
        }
    }

    async fn publish(
        &mut self,
        doc: &Document,
        entry: &Enumerated,
        progress: &mut ImportProgress,
    ) -> Result<(), ImportError> {
        let cancel = self.cancel.clone();
        let mut attempts: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ImportError::Cancelled),
                result = self.publisher.publish(doc) => result,
            };

            let e = match result {
                Ok(event) => {
                    info!(
                        cursor = %entry.cursor,
                        identifier = %doc.identifier,
                        kind = event.kind,
                        "{} '{}'",
                        PublishOutcome::Published,
                        doc.title
                    );
                    progress.document_published(&doc.title, doc.is_redirect());
                    return Ok(());
                }
                Err(e) => e,
            };

            if !self.config.retry.should_retry(&e, attempts) {
                return Err(e);
            }

            attempts += 1;
            progress.publish_retried();
            let outcome = PublishOutcome::Retried {
                attempt: attempts,
                reason: e.to_string(),
            };
            warn!(cursor = %entry.cursor, identifier = %doc.identifier, "{}", outcome);

            tokio::select! {
                _ = cancel.cancelled() => return Err(ImportError::Cancelled),
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
            debug!("Retrying publish of {}", doc.identifier);
        }
    }
}

/// Builder for ImportCoordinator
pub struct ImportCoordinatorBuilder {
    transformer: Option<Box<dyn Transformer>>,
    publisher: Option<Publisher>,
    config: PipelineConfig,
    cancel: CancellationToken,
    quiet: bool,
}

impl Default for ImportCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            transformer: None,
            publisher: None,
            config: PipelineConfig::default(),
            cancel: CancellationToken::new(),
            quiet: false,
        }
    }

    pub fn with_transformer(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Token observed by the driver; cancelling it stops the run
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> Result<ImportCoordinator, ImportError> {
        let transformer = self.transformer.ok_or_else(|| {
            ImportError::Config("A transformer is required. Call with_transformer() first.".into())
        })?;
        let publisher = self.publisher.ok_or_else(|| {
            ImportError::Config("A publisher is required. Call with_publisher() first.".into())
        })?;

        Ok(ImportCoordinator::new(transformer, publisher, self.config, self.cancel).with_quiet(self.quiet))
    }
}
