//! Code-search harvest pipeline.
//!
//! This module provides the [`CodeSearchPipeline`] coordinator that turns a
//! paginated stream of search hits into a stream of [`ExtractionResult`]s:
//!
//! ```text
//! query driver ─► entry ─► fetch (bounded) ─► parse ─► extract ─► result stream
//! ```
//!
//! - Async execution via `tokio`, one [`StageExecutor`] per stage
//! - A per-file fetch deadline layered under the shared cancellation token
//! - Structured logging via `tracing`
//! - Per-file failures drop the file; page request failures end the run

use async_stream::stream;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use crate::executor::{entry_channel, Concurrency, StageExecutor, StageReceiver, StageSender};
use crate::harvest::document::XmlDocument;
use crate::harvest::matching::NameMatcher;
use crate::harvest::registry::PluginRegistry;
use crate::harvest::traits::{HarvestStage, StageError};
use crate::model::{
    ExtractionResult, FileContents, FileReference, QueryParameters, MAX_RECORDS_LIMIT,
};
use crate::traits::{QueryError, RemoteIndex, Result, SearchRequest, MAX_PAGE_SIZE};

/// Results of one run. Per-file failures never appear here; an `Err` item
/// means a page request failed and the run stopped paginating.
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<ExtractionResult>> + Send>>;

// ============================================================================
// Configuration
// ============================================================================

/// Tuning knobs for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent outbound file fetches (default: 8)
    pub fetch_concurrency: usize,

    /// Per-file fetch deadline in milliseconds (default: 20 000)
    pub fetch_timeout_ms: u64,

    /// Records requested per search page, capped at the remote limit (default: 1000)
    pub max_page_size: usize,

    /// Largest `max_records` a run accepts (default: 10 000)
    pub max_records_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 8,
            fetch_timeout_ms: 20_000,
            max_page_size: MAX_PAGE_SIZE as usize,
            max_records_limit: MAX_RECORDS_LIMIT,
        }
    }
}

impl PipelineConfig {
    fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    fn page_size(&self) -> usize {
        self.max_page_size.clamp(1, MAX_PAGE_SIZE as usize)
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Downloads file text, bounded by its own deadline.
struct FetchStage<C> {
    connection: Arc<C>,
    timeout: Duration,
}

#[async_trait]
impl<C> HarvestStage for FetchStage<C>
where
    C: RemoteIndex + 'static,
{
    type Input = ();
    type Output = String;

    async fn execute(
        &self,
        file: &FileReference,
        _input: (),
    ) -> std::result::Result<String, StageError> {
        match tokio::time::timeout(self.timeout, self.connection.fetch_file_text(file)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(error)) => Err(StageError::Fetch(error)),
            Err(_) => Err(StageError::Timeout(self.timeout)),
        }
    }

    fn stage_name(&self) -> &'static str {
        "fetch"
    }
}

struct ParseStage;

#[async_trait]
impl HarvestStage for ParseStage {
    type Input = String;
    type Output = XmlDocument;

    async fn execute(
        &self,
        _file: &FileReference,
        input: String,
    ) -> std::result::Result<XmlDocument, StageError> {
        Ok(XmlDocument::parse(&input)?)
    }

    fn stage_name(&self) -> &'static str {
        "parse"
    }
}

struct ExtractStage {
    registry: Arc<PluginRegistry>,
    matcher: NameMatcher,
}

#[async_trait]
impl HarvestStage for ExtractStage {
    type Input = XmlDocument;
    type Output = ExtractionResult;

    async fn execute(
        &self,
        file: &FileReference,
        input: XmlDocument,
    ) -> std::result::Result<ExtractionResult, StageError> {
        Ok(self.registry.extract(file.clone(), &input, &self.matcher))
    }

    fn stage_name(&self) -> &'static str {
        "extract"
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Search → fetch → parse → extract coordinator.
///
/// # Example
///
/// ```ignore
/// use package_scrape::{AzdoClient, CodeSearchPipeline, QueryParameters};
/// use futures::StreamExt;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let client = Arc::new(AzdoClient::from_env()?);
/// let query = QueryParameters::from_pattern(client, "Newtonsoft.Json", 1000)?;
/// let pipeline = CodeSearchPipeline::new();
/// let cancel = CancellationToken::new();
///
/// let total = pipeline.match_count(&query, &cancel).await?;
/// let mut results = pipeline.results(&query.with_max_records(total.min(1000) as usize)?, &cancel)?;
/// while let Some(result) = results.next().await {
///     let result = result?;
///     println!("{}: {} package refs", result.file, result.package_references.len());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodeSearchPipeline {
    registry: Arc<PluginRegistry>,
    config: PipelineConfig,
}

impl CodeSearchPipeline {
    /// Creates a pipeline over every built-in extractor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-file fetch deadline.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_fetch_concurrency(mut self, limit: usize) -> Self {
        self.config.fetch_concurrency = limit.max(1);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Remote search text for `query`, built from the same plugins used for
    /// local extraction.
    pub fn query_text<C>(&self, query: &QueryParameters<C>) -> String {
        self.registry.query_text(&matcher_for(query))
    }

    /// Total number of remote hits for `query`, from a single one-record page.
    ///
    /// # Errors
    ///
    /// Propagates transport and HTTP errors, rejects a negative count, and
    /// returns [`QueryError::Cancelled`] if `cancel` fires first.
    #[instrument(skip_all, fields(package = %query.display_name()))]
    pub async fn match_count<C>(
        &self,
        query: &QueryParameters<C>,
        cancel: &CancellationToken,
    ) -> Result<u64>
    where
        C: RemoteIndex,
    {
        self.validate(query)?;

        // The service requires at least one record per page; only the
        // count is read.
        let request = SearchRequest::new(self.query_text(query), 0, 1)?;
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(QueryError::Cancelled),
            page = query.connection.search_page(&request) => page?,
        };

        if page.count < 0 {
            return Err(QueryError::NegativeCount(page.count));
        }

        info!(count = page.count, "Match count retrieved");
        Ok(page.count as u64)
    }

    /// Starts the pipeline and returns its result stream.
    ///
    /// Must be called from within a tokio runtime. Dropping the stream, or
    /// cancelling `cancel`, stops every stage.
    ///
    /// # Errors
    ///
    /// Rejects an out-of-range `max_records` before any work starts.
    pub fn results<C>(
        &self,
        query: &QueryParameters<C>,
        cancel: &CancellationToken,
    ) -> Result<ResultStream>
    where
        C: RemoteIndex + 'static,
    {
        self.validate(query)?;

        let cancel = cancel.child_token();
        let matcher = matcher_for(query);
        let query_text = self.registry.query_text(&matcher);

        info!(
            package = %query.display_name(),
            max_records = query.max_records,
            fetch_concurrency = self.config.fetch_concurrency,
            "Starting harvest pipeline"
        );

        let (entry, pending) = entry_channel();

        let fetched = StageExecutor::new(
            Concurrency::Bounded(self.config.fetch_concurrency),
            cancel.clone(),
        )
        .spawn(
            Arc::new(FetchStage {
                connection: Arc::clone(&query.connection),
                timeout: self.config.fetch_timeout(),
            }),
            pending,
        );

        let parsed = StageExecutor::new(Concurrency::Unbounded, cancel.clone())
            .spawn(Arc::new(ParseStage), fetched);

        let extracted = StageExecutor::new(Concurrency::Unbounded, cancel.clone()).spawn(
            Arc::new(ExtractStage {
                registry: Arc::clone(&self.registry),
                matcher,
            }),
            parsed,
        );

        let driver = tokio::spawn(
            drive_query(
                Arc::clone(&query.connection),
                query_text,
                query.max_records,
                self.config.page_size(),
                entry,
                cancel.clone(),
            )
            .instrument(info_span!("query_driver")),
        );

        Ok(result_stream(extracted, driver, cancel))
    }

    fn validate<C>(&self, query: &QueryParameters<C>) -> Result<()> {
        query.validate()?;
        if query.max_records > self.config.max_records_limit {
            return Err(QueryError::InvalidMaxRecords(query.max_records));
        }
        Ok(())
    }
}

fn matcher_for<C>(query: &QueryParameters<C>) -> NameMatcher {
    NameMatcher::new(query.package_name.clone(), query.use_wildcard_suffix)
}

/// Pages through the remote index and feeds fetchable hits into `entry`.
///
/// Returns the number of files admitted. Dropping `entry` on return is what
/// closes the pipeline.
async fn drive_query<C>(
    connection: Arc<C>,
    query_text: String,
    max_records: usize,
    page_size: usize,
    entry: StageSender<()>,
    cancel: CancellationToken,
) -> Result<usize>
where
    C: RemoteIndex,
{
    let mut remaining = max_records;
    let mut skip = 0usize;
    let mut admitted = 0usize;

    while remaining > 0 {
        let top = remaining.min(page_size);
        let request = SearchRequest::new(query_text.as_str(), skip as i64, top as i64)?;

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            page = connection.search_page(&request) => match page {
                Ok(page) => page,
                Err(error) => {
                    warn!(skip, top, error = %error, "Search page failed, stopping");
                    return Err(error);
                }
            },
        };

        if page.results.is_empty() {
            debug!(skip, "Search results exhausted");
            break;
        }

        let organization = connection.organization();
        for file in page
            .results
            .iter()
            .filter(|record| record.is_fetchable())
            .filter_map(|record| record.to_file_reference(organization))
        {
            if entry.send(FileContents::new(file, ())).is_err() {
                // Every stage is gone; nothing left to feed.
                return Ok(admitted);
            }
            admitted += 1;
        }

        debug!(skip, returned = page.results.len(), admitted, "Search page processed");
        remaining = remaining.saturating_sub(page.results.len());
        skip += page.results.len();
    }

    info!(admitted, "Query driver finished");
    Ok(admitted)
}

/// Exposes the terminal stage as a stream, dropping absent payloads.
///
/// The stream owns a drop guard for `cancel`, so abandoning it tears the
/// pipeline down.
fn result_stream(
    mut extracted: StageReceiver<ExtractionResult>,
    driver: JoinHandle<Result<usize>>,
    cancel: CancellationToken,
) -> ResultStream {
    let guard = cancel.clone().drop_guard();

    Box::pin(stream! {
        let _guard = guard;
        let mut yielded = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = extracted.recv() => next,
            };
            let Some(payload) = next else {
                break;
            };
            if let Some(result) = payload.contents {
                yielded += 1;
                yield Ok(result);
            }
        }

        if cancel.is_cancelled() {
            info!(yielded, "Harvest cancelled");
        } else {
            match driver.await {
                Ok(Ok(admitted)) => info!(admitted, yielded, "Harvest completed"),
                Ok(Err(error)) => yield Err(error),
                Err(error) => warn!(error = %error, "Query driver task failed"),
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
