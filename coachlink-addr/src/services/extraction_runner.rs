//! Extraction batch runner
//!
//! Drives the extraction oracle over chat messages in fixed-size batches and
//! stores the matched answers as address records.
//!
//! # Per batch
//! 1. Call the oracle, retrying up to `max_attempts` times with a delay of
//!    `attempt * backoff_step` before each retry. Exhaustion counts the batch
//!    as failed and moves on.
//! 2. Parse the answer text and match each answer to the first message of the
//!    batch sent by the same identity. Unmatched or unrecognized answers are
//!    skipped.
//! 3. Insert the surviving records with insert-if-absent.
//! 4. Pause `pacing` before the next batch.
//!
//! Oracle failures never abort the run. Persistence errors do.

use coachlink_common::config::PipelineConfig;
use coachlink_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db;
use crate::models::{AddressRecord, ChatMessage, MessageKind};
use crate::services::answer_parser::{parse_answers, ExtractedAddress};
use crate::services::extraction_oracle::{ExtractionOracle, OracleInput};
use crate::utils::pause;

/// Batching and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub pacing: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RunnerConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_attempts: config.max_attempts.max(1),
            backoff_step: Duration::from_millis(config.backoff_step_ms),
            pacing: Duration::from_millis(config.pacing_ms),
        }
    }
}

/// Counts from one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub batches_run: usize,
    pub batches_failed: usize,
    /// Answers matched back to a message with a recognized address
    pub records_extracted: usize,
    pub records_saved: usize,
    /// Records that already existed
    pub duplicates: usize,
    /// Answers without a usable address or without a matching message
    pub skipped_answers: usize,
    pub cancelled: bool,
}

enum BatchOutcome {
    Answered(String),
    Exhausted,
    Cancelled,
}

/// Extraction batch runner
pub struct ExtractionBatchRunner {
    db: SqlitePool,
    oracle: Arc<dyn ExtractionOracle>,
    config: RunnerConfig,
}

impl ExtractionBatchRunner {
    pub fn new(db: SqlitePool, oracle: Arc<dyn ExtractionOracle>, config: RunnerConfig) -> Self {
        Self { db, oracle, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Process `messages` batch by batch
    ///
    /// Stops between batches (or during a delay) when `cancel_token` fires.
    pub async fn run(
        &self,
        messages: &[ChatMessage],
        cancel_token: &CancellationToken,
    ) -> Result<ExtractionStats> {
        let mut stats = ExtractionStats::default();
        let mut max_lock_wait_ms = None;
        let batches: Vec<&[ChatMessage]> = messages.chunks(self.config.batch_size).collect();
        let total_batches = batches.len();

        tracing::info!(
            messages = messages.len(),
            batches = total_batches,
            oracle = self.oracle.name(),
            "Starting address extraction"
        );

        for (index, batch) in batches.into_iter().enumerate() {
            if cancel_token.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            stats.batches_run += 1;
            let batch_number = index + 1;

            let answer = match self.call_with_retry(batch, batch_number, cancel_token).await {
                BatchOutcome::Answered(text) => text,
                BatchOutcome::Exhausted => {
                    stats.batches_failed += 1;
                    tracing::warn!(
                        batch = batch_number,
                        total_batches,
                        attempts = self.config.max_attempts,
                        "Oracle retries exhausted, batch recorded as zero-extracted"
                    );
                    continue;
                }
                BatchOutcome::Cancelled => {
                    stats.cancelled = true;
                    break;
                }
            };

            let (records, skipped) = match_answers(batch, &answer);
            stats.records_extracted += records.len();
            stats.skipped_answers += skipped;

            let saved = match self.save(&records, &mut max_lock_wait_ms).await {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::error!(
                        batch = batch_number,
                        error = %e,
                        "Failed to save address records"
                    );
                    return Err(e);
                }
            };
            stats.records_saved += saved;
            stats.duplicates += records.len() - saved;

            tracing::info!(
                batch = batch_number,
                total_batches,
                extracted = records.len(),
                saved,
                skipped,
                "Batch processed"
            );

            if batch_number < total_batches && !pause(self.config.pacing, cancel_token).await {
                stats.cancelled = true;
                break;
            }
        }

        tracing::info!(
            batches_run = stats.batches_run,
            batches_failed = stats.batches_failed,
            records_extracted = stats.records_extracted,
            records_saved = stats.records_saved,
            cancelled = stats.cancelled,
            "Address extraction finished"
        );

        Ok(stats)
    }

    /// Insert-if-absent; the lock wait setting is read on first use
    async fn save(&self, records: &[AddressRecord], max_lock_wait_ms: &mut Option<u64>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let wait_ms = match *max_lock_wait_ms {
            Some(wait_ms) => wait_ms,
            None => {
                let wait_ms = db::settings::get_max_lock_wait_ms(&self.db).await?;
                *max_lock_wait_ms = Some(wait_ms);
                wait_ms
            }
        };
        db::address_records::insert_if_absent(&self.db, records, wait_ms).await
    }

    async fn call_with_retry(
        &self,
        batch: &[ChatMessage],
        batch_number: usize,
        cancel_token: &CancellationToken,
    ) -> BatchOutcome {
        let inputs: Vec<OracleInput> = batch
            .iter()
            .map(|m| OracleInput {
                identity: m.identity.clone(),
                body: m.body.clone(),
            })
            .collect();

        for attempt in 1..=self.config.max_attempts {
            match self.oracle.extract(&inputs).await {
                Ok(text) => return BatchOutcome::Answered(text),
                Err(e) => {
                    tracing::warn!(
                        batch = batch_number,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Oracle call failed"
                    );

                    if attempt < self.config.max_attempts {
                        let delay = self.config.backoff_step * attempt;
                        if !pause(delay, cancel_token).await {
                            return BatchOutcome::Cancelled;
                        }
                    }
                }
            }
        }

        BatchOutcome::Exhausted
    }
}

/// Match parsed answers to the batch's messages
///
/// Returns the records to store and the number of answers skipped.
fn match_answers(batch: &[ChatMessage], answer: &str) -> (Vec<AddressRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for parsed in parse_answers(answer) {
        let ExtractedAddress::Found(address) = parsed.address else {
            tracing::debug!(identity = %parsed.identity, "Oracle did not recognize an address");
            skipped += 1;
            continue;
        };

        let Some(message) = batch.iter().find(|m| m.identity == parsed.identity) else {
            tracing::debug!(
                identity = %parsed.identity,
                "Oracle answer does not match any message in the batch"
            );
            skipped += 1;
            continue;
        };

        records.push(AddressRecord {
            identity: message.identity.clone(),
            timestamp: message.timestamp,
            raw_address: address,
            source_body: message.body.clone(),
            kind: MessageKind::ChatText,
        });
    }

    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SenderRole;
    use crate::services::extraction_oracle::OracleError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails the first `failures` calls, then answers "无法识别" for every input
    struct ClockedOracle {
        failures: Mutex<u32>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ClockedOracle {
        fn failing_first(failures: u32) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Call times relative to `start`, in seconds
        fn offsets(&self, start: Instant) -> Vec<f64> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|at| at.duration_since(start).as_secs_f64())
                .collect()
        }
    }

    #[async_trait]
    impl ExtractionOracle for ClockedOracle {
        fn name(&self) -> &'static str {
            "clocked"
        }

        async fn extract(&self, batch: &[OracleInput]) -> std::result::Result<String, OracleError> {
            self.calls.lock().unwrap().push(Instant::now());
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(OracleError::Timeout);
            }
            Ok(batch
                .iter()
                .map(|input| format!("用户标识: {} | 地址分析结果: 无法识别", input.identity))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    fn timed_runner(oracle: Arc<ClockedOracle>) -> ExtractionBatchRunner {
        // Never touched: no batch yields a record to store
        let db = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        ExtractionBatchRunner::new(
            db,
            oracle,
            RunnerConfig {
                batch_size: 2,
                max_attempts: 3,
                backoff_step: Duration::from_secs(2),
                pacing: Duration::from_secs(1),
            },
        )
    }

    fn assert_offsets(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?}", actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 0.01, "call offsets {:?}, expected {:?}", actual, expected);
        }
    }

    fn message(identity: &str, timestamp: i64, body: &str) -> ChatMessage {
        ChatMessage {
            identity: identity.to_string(),
            timestamp,
            body: body.to_string(),
            sender_role: SenderRole::Customer,
        }
    }

    #[test]
    fn test_config_from_pipeline_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_step, Duration::from_secs(2));
        assert_eq!(config.pacing, Duration::from_secs(1));
    }

    #[test]
    fn test_config_clamps_zero_values() {
        let config = RunnerConfig::from(&PipelineConfig {
            batch_size: 0,
            max_attempts: 0,
            ..Default::default()
        });
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_first_message_of_identity_wins() {
        let batch = vec![
            message("wx_1", 100, "第一条 江阴市"),
            message("wx_2", 150, "江苏无锡"),
            message("wx_1", 200, "第二条 江阴市"),
        ];
        let answer = "用户标识: wx_1 | 地址分析结果: 江苏-无锡-江阴-顾山镇 (原文: 第一条)";

        let (records, skipped) = match_answers(&batch, answer);

        assert_eq!(skipped, 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, 100);
        assert_eq!(records[0].source_body, "第一条 江阴市");
        assert_eq!(records[0].raw_address, "江苏-无锡-江阴-顾山镇");
    }

    #[test]
    fn test_unmatched_and_unrecognized_answers_skipped() {
        let batch = vec![message("wx_1", 100, "江阴市")];
        let answer = "用户标识: wx_9 | 地址分析结果: 江苏-无锡-江阴 (原文: x)\n\
                      用户标识: wx_1 | 地址分析结果: 无法识别";

        let (records, skipped) = match_answers(&batch, answer);

        assert!(records.is_empty());
        assert_eq!(skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_with_attempt_number() {
        let oracle = Arc::new(ClockedOracle::failing_first(u32::MAX));
        let runner = timed_runner(oracle.clone());
        let batch = vec![message("wx_1", 100, "江阴市")];

        let start = Instant::now();
        let stats = runner.run(&batch, &CancellationToken::new()).await.unwrap();

        // 2s after attempt 1, 4s after attempt 2, nothing after the last
        assert_offsets(&oracle.offsets(start), &[0.0, 2.0, 6.0]);
        assert_offsets(&[start.elapsed().as_secs_f64()], &[6.0]);
        assert_eq!(stats.batches_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_only_between_successful_batches() {
        // Batch 1 exhausts its attempts, batches 2 and 3 succeed first time
        let oracle = Arc::new(ClockedOracle::failing_first(3));
        let runner = timed_runner(oracle.clone());
        let batch: Vec<ChatMessage> = (0..5)
            .map(|i| message(&format!("wx_{}", i), 100 + i, "江阴市"))
            .collect();

        let start = Instant::now();
        let stats = runner.run(&batch, &CancellationToken::new()).await.unwrap();

        // No pause after the failed batch, 1s after batch 2, none after the last
        assert_offsets(&oracle.offsets(start), &[0.0, 2.0, 6.0, 6.0, 7.0]);
        assert_offsets(&[start.elapsed().as_secs_f64()], &[7.0]);
        assert_eq!(stats.batches_run, 3);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.skipped_answers, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_run() {
        let oracle = Arc::new(ClockedOracle::failing_first(u32::MAX));
        let runner = timed_runner(oracle.clone());
        let batch = vec![message("wx_1", 100, "江阴市")];
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let stats = runner.run(&batch, &token).await.unwrap();
        canceller.await.unwrap();

        assert!(stats.cancelled);
        assert_eq!(oracle.offsets(Instant::now()).len(), 1);
        assert_eq!(stats.batches_failed, 0);
    }
}
