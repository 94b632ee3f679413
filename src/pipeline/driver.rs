use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::{BatchPlanner, LLMProvider, LlmGateway};
use crate::models::{
    BatchResult, ContentItem, FeedEntry, IsNew, PersistedRecord, RecordFilter, RecordUpdate,
};
use crate::pipeline::recency::RecencyRules;
use crate::pipeline::retry_log::{RetryLog, RetryReason};
use crate::source::ContentSource;
use crate::storage::{content_hash, RecordStore};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub today: NaiveDate,
    pub recency_threshold_days: i64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub show_progress: bool,
}

impl DriverConfig {
    pub fn from_config(config: &Config, today: NaiveDate) -> Self {
        Self {
            today,
            recency_threshold_days: config.recency_threshold_days,
            min_delay: Duration::from_secs_f64(config.scrape_min_delay_seconds),
            max_delay: Duration::from_secs_f64(config.scrape_max_delay_seconds),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Scrape,
    ScrapeRetry,
    LlmRetry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub submitted: usize,
    pub classified: usize,
    pub llm_errors: usize,
    pub excluded: usize,
    pub drifted: usize,
    pub persisted: usize,
}

impl RunSummary {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            processed: 0,
            skipped: 0,
            failed: 0,
            submitted: 0,
            classified: 0,
            llm_errors: 0,
            excluded: 0,
            drifted: 0,
            persisted: 0,
        }
    }

    fn count_result(&mut self, result: &BatchResult) {
        if result.category.is_error() {
            self.llm_errors += 1;
        } else {
            self.classified += 1;
        }
        if result.category.is_outdated() {
            self.excluded += 1;
        }
    }
}

/// 25/50/75/100% marks of a run, as 1-based positions in the URL list.
pub fn checkpoints(total: usize) -> Vec<usize> {
    let mut marks: Vec<usize> = (1..=4).map(|k| (total * k).div_ceil(4)).filter(|&m| m > 0).collect();
    marks.dedup();
    marks
}

/// Drives one run for a single day's table. Owns nothing but the source and
/// gateway; the store is borrowed for the whole run.
pub struct PipelineDriver<'a, C: ContentSource, P: LLMProvider, S: RecordStore> {
    source: C,
    gateway: LlmGateway<P>,
    planner: BatchPlanner,
    store: &'a S,
    retry_log: RetryLog,
    recency: RecencyRules,
    config: DriverConfig,
}

impl<'a, C: ContentSource, P: LLMProvider, S: RecordStore> PipelineDriver<'a, C, P, S> {
    pub fn new(
        source: C,
        gateway: LlmGateway<P>,
        store: &'a S,
        retry_log: RetryLog,
        config: DriverConfig,
    ) -> Self {
        Self {
            planner: gateway.planner(),
            recency: RecencyRules::new(config.recency_threshold_days),
            source,
            gateway,
            store,
            retry_log,
            config,
        }
    }

    pub fn with_planner(mut self, planner: BatchPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn gateway(&self) -> &LlmGateway<P> {
        &self.gateway
    }

    /// Scrapes every feed entry not already stored, classifying and
    /// persisting what has accumulated at each checkpoint.
    pub async fn run_scrape(&self, entries: &[FeedEntry]) -> Result<RunSummary> {
        let mut summary = RunSummary::new(RunMode::Scrape);
        let marks = checkpoints(entries.len());
        let pb = self.progress_bar(entries.len(), "urls");

        let mut seen = HashSet::new();
        let mut pending: Vec<PersistedRecord> = Vec::new();
        let mut buffer: Vec<ContentItem> = Vec::new();

        tracing::info!(
            "Scraping {} URLs (checkpoints at {:?})",
            entries.len(),
            marks
        );

        for (index, entry) in entries.iter().enumerate() {
            pb.inc(1);
            let url = entry.url.as_str();

            if !seen.insert(url) || self.store.exists(url)? {
                tracing::debug!(%url, "Already processed, skipping");
                summary.skipped += 1;
            } else {
                let mut record = PersistedRecord::new(url, entry.lastmodified.clone());
                match self.source.fetch(url).await {
                    Ok(content) => {
                        let recency = self.recency.classify(&content, self.config.today);
                        record.filetype = Some(content.filetype.clone());
                        record.page_date = recency.page_date;
                        record.is_new = recency.is_new;
                        record.set_extracted_text(content.usable_text().map(str::to_string));

                        match recency.content_item(url, &content) {
                            Some(item) => buffer.push(item),
                            None if recency.is_new.is_candidate() => {
                                tracing::warn!(%url, "No extractable text, recording without summary")
                            }
                            None => {}
                        }
                        tracing::debug!(%url, is_new = %record.is_new, "Scraped");
                        summary.processed += 1;
                    }
                    Err(e) => {
                        self.note_fetch_failure(url, &e);
                        summary.failed += 1;
                    }
                }
                pending.push(record);

                if index + 1 < entries.len() {
                    self.pace().await;
                }
            }

            if marks.contains(&(index + 1)) {
                tracing::info!(
                    "Checkpoint {}/{}: flushing {} items",
                    index + 1,
                    entries.len(),
                    buffer.len()
                );
                self.flush(&mut buffer, &mut pending, &mut summary).await;
            }
        }

        self.flush(&mut buffer, &mut pending, &mut summary).await;
        pb.finish_and_clear();

        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scrape run finished"
        );
        Ok(summary)
    }

    /// Re-fetches records stored without text and updates them in place.
    /// Never calls the LLM.
    pub async fn run_scrape_retry(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new(RunMode::ScrapeRetry);
        let records = self.store.fetch_by_predicate(RecordFilter::NeedsScrapeRetry)?;
        let pb = self.progress_bar(records.len(), "retries");
        tracing::info!("Retrying scrape for {} records", records.len());

        for (index, record) in records.iter().enumerate() {
            pb.inc(1);
            let url = record.url.as_str();

            match self.source.fetch(url).await {
                Ok(content) => {
                    let recency = self.recency.classify(&content, self.config.today);
                    let update = RecordUpdate::Rescraped {
                        extracted_text: content.usable_text().map(str::to_string),
                        filetype: Some(content.filetype.clone()),
                        page_date: recency.page_date,
                        is_new: recency.is_new,
                    };
                    match self.store.update(url, update) {
                        Ok(()) => {
                            summary.processed += 1;
                            summary.persisted += 1;
                        }
                        Err(e) => {
                            tracing::error!(%url, "Failed to update record: {}", e);
                            self.retry_log.record(url, RetryReason::InsertFailed);
                            summary.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    self.note_fetch_failure(url, &e);
                    summary.failed += 1;
                }
            }

            if index + 1 < records.len() {
                self.pace().await;
            }
        }

        pb.finish_and_clear();
        Ok(summary)
    }

    /// Re-submits stored text whose classification failed. Never scrapes.
    pub async fn run_llm_retry(&self) -> Result<RunSummary> {
        let records: Vec<PersistedRecord> = self
            .store
            .fetch_by_predicate(RecordFilter::NeedsLlmRetry)?
            .into_iter()
            .filter(PersistedRecord::needs_llm_retry)
            .collect();
        tracing::info!("Retrying classification for {} records", records.len());
        self.reclassify(records).await
    }

    /// Classifies stored records from their saved text and writes the
    /// results back. Outdated content is excluded; `is_new` is left alone.
    /// Text whose stored hash no longer matches is logged as drift and
    /// re-hashed before it is submitted.
    pub async fn reclassify(&self, records: Vec<PersistedRecord>) -> Result<RunSummary> {
        let mut summary = RunSummary::new(RunMode::LlmRetry);

        for record in records.iter().filter(|r| r.has_drifted()) {
            let url = record.url.as_str();
            tracing::warn!(%url, "Stored text changed since it was scraped");
            summary.drifted += 1;

            let Some(text) = record.extracted_text.as_deref() else {
                continue;
            };
            let update = RecordUpdate::Rehashed {
                content_hash: content_hash(text),
            };
            if let Err(e) = self.store.update(url, update) {
                tracing::error!(%url, "Failed to refresh content hash: {}", e);
            }
        }

        let items: Vec<ContentItem> = records
            .iter()
            .filter_map(|record| {
                let text = record.extracted_text.as_deref()?.trim();
                if text.is_empty() {
                    return None;
                }
                let item = ContentItem::new(record.url.as_str(), text);
                Some(if record.is_new == IsNew::Maybe {
                    item.uncertain()
                } else {
                    item
                })
            })
            .collect();
        summary.skipped = records.len() - items.len();
        summary.submitted = items.len();

        let results = self.classify(items).await;
        for record in &records {
            let Some(result) = results.get(&record.url) else {
                continue;
            };
            summary.count_result(result);

            let url = record.url.as_str();
            let mut outcome = self.store.update(url, RecordUpdate::classified(result));
            if outcome.is_ok() && result.category.is_outdated() {
                tracing::info!(%url, "Marking outdated content as excluded");
                outcome = self.store.update(url, RecordUpdate::Excluded);
            }
            match outcome {
                Ok(()) => {
                    summary.processed += 1;
                    summary.persisted += 1;
                }
                Err(e) => {
                    tracing::error!(%url, "Failed to store classification: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn classify(&self, items: Vec<ContentItem>) -> HashMap<String, BatchResult> {
        let mut results = HashMap::new();
        if items.is_empty() {
            return results;
        }

        let batches = self.planner.plan(items);
        tracing::info!("Created {} batches for LLM classification", batches.len());
        for (i, batch) in batches.iter().enumerate() {
            tracing::debug!(batch = i + 1, items = batch.len(), "Submitting batch");
            results.extend(self.gateway.submit(batch).await);
        }
        results
    }

    /// Classifies the buffered items, merges results into the pending
    /// records and writes those records out.
    async fn flush(
        &self,
        buffer: &mut Vec<ContentItem>,
        pending: &mut Vec<PersistedRecord>,
        summary: &mut RunSummary,
    ) {
        if !buffer.is_empty() {
            let items = std::mem::take(buffer);
            summary.submitted += items.len();
            let results = self.classify(items).await;

            for record in pending.iter_mut() {
                if let Some(result) = results.get(&record.url) {
                    record.apply_result(result);
                    summary.count_result(result);
                }
            }
        }

        for record in pending.drain(..) {
            match self.store.insert(&record) {
                Ok(()) => summary.persisted += 1,
                Err(e) => {
                    tracing::error!(url = %record.url, "Failed to insert record: {}", e);
                    self.retry_log.record(&record.url, RetryReason::InsertFailed);
                }
            }
        }
    }

    fn note_fetch_failure(&self, url: &str, error: &Error) {
        let reason = if error.is_forbidden() {
            tracing::warn!(%url, "Access forbidden, deferring to retry log");
            RetryReason::Forbidden
        } else {
            tracing::error!(%url, "Failed to fetch: {}", error);
            RetryReason::FetchFailed
        };
        self.retry_log.record(url, reason);
    }

    fn jitter(&self) -> Duration {
        let (min, max) = (self.config.min_delay, self.config.max_delay);
        if max <= min {
            return min;
        }
        let secs = rand::rng().random_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    async fn pace(&self) {
        let delay = self.jitter();
        if !delay.is_zero() {
            tracing::debug!("Waiting {:.2}s before next request", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
        }
    }

    fn progress_bar(&self, len: usize, unit: &str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {}",
            unit
        );
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
