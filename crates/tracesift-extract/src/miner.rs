//! Mining pipeline: sessions to validated signals

use crate::error::{ExtractError, Result};
use crate::extractor::Extractor;
use crate::validate::{validate_chunk, SessionRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracesift_core::{chunk_views, Chunk, MinerConfig, Normalizer, Signal};
use tracesift_log::{discover_sessions, read_session, relative_hint, RawRecord, SessionFilter};

/// Counts for one mining run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineReport {
    pub extractor: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sessions_scanned: usize,
    pub sessions_with_items: usize,
    pub sessions_failed: usize,
    pub chunks: usize,
    pub chunks_failed: usize,
    pub candidates_seen: usize,
    pub candidates_rejected: usize,
    pub items: usize,
}

/// Signals and counts for a single session
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    pub signals: Vec<Signal>,
    pub chunks: usize,
    pub chunks_failed: usize,
    pub candidates_seen: usize,
    pub candidates_rejected: usize,
}

#[derive(Debug)]
struct ChunkOutcome {
    index: usize,
    signals: Vec<Signal>,
    candidates: usize,
    rejected: usize,
    failed: bool,
}

/// Runs normalize, chunk, extract and validate over sessions
///
/// Chunks of a session are extracted concurrently, bounded by
/// `workers`; results are merged once every chunk of the session is done.
pub struct Miner {
    config: MinerConfig,
    normalizer: Normalizer,
    extractor: Arc<dyn Extractor>,
}

impl Miner {
    pub fn new(config: MinerConfig, extractor: Arc<dyn Extractor>) -> Self {
        let normalizer = Normalizer::from_config(&config);
        Self {
            config,
            normalizer,
            extractor,
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Normalize and chunk a session without extracting
    pub fn chunks(&self, records: &[RawRecord]) -> Vec<Chunk> {
        let views = self.normalizer.views(records);
        chunk_views(&views, self.config.chunk_events, self.config.chunk_overlap)
    }

    /// Mine one session's records
    pub async fn mine_session(&self, session: &SessionRef, records: &[RawRecord]) -> SessionOutcome {
        let chunks = self.chunks(records);
        let mut outcome = SessionOutcome {
            chunks: chunks.len(),
            ..Default::default()
        };
        if chunks.is_empty() {
            return outcome;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let timeout = Duration::from_secs(self.config.oracle_timeout_secs);
        let mut set = JoinSet::new();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            let constraints = self.config.constraints.clone();
            let session = session.clone();
            let secs = self.config.oracle_timeout_secs;

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = match tokio::time::timeout(timeout, extractor.extract(&chunk, &constraints)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ExtractError::Timeout {
                        chunk_id: chunk.chunk_id.clone(),
                        secs,
                    }),
                };

                match result {
                    Ok(candidates) => {
                        let validated = validate_chunk(&candidates, &chunk, &constraints, &session);
                        ChunkOutcome {
                            index,
                            signals: validated.signals,
                            candidates: candidates.len(),
                            rejected: validated.rejected,
                            failed: false,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            session = %session.session_id,
                            chunk = %chunk.chunk_id,
                            "extraction failed: {e}"
                        );
                        ChunkOutcome {
                            index,
                            signals: Vec::new(),
                            candidates: 0,
                            rejected: 0,
                            failed: true,
                        }
                    }
                }
            });
        }

        let mut results = Vec::with_capacity(outcome.chunks);
        while let Some(res) = set.join_next().await {
            match res {
                Ok(chunk_outcome) => results.push(chunk_outcome),
                Err(e) => {
                    tracing::warn!("{}", ExtractError::Join(e.to_string()));
                    outcome.chunks_failed += 1;
                }
            }
        }
        results.sort_by_key(|r| r.index);

        // Overlapping windows can yield the same signal twice.
        let mut seen = HashSet::new();
        for result in results {
            outcome.candidates_seen += result.candidates;
            outcome.candidates_rejected += result.rejected;
            if result.failed {
                outcome.chunks_failed += 1;
            }
            for signal in result.signals {
                if seen.insert(signal.item_id.clone()) {
                    outcome.signals.push(signal);
                }
            }
        }

        outcome
    }

    /// Mine every session file under `dir`
    ///
    /// A file that cannot be read is logged and counted in
    /// `sessions_failed`; the rest of the run continues.
    pub async fn mine_dir(
        &self,
        dir: &Path,
        filter: &SessionFilter,
    ) -> Result<(MineReport, Vec<Signal>)> {
        let files = discover_sessions(dir, filter)?;
        let mut report = MineReport {
            extractor: self.extractor.name().to_string(),
            started_at: Some(Utc::now()),
            sessions_scanned: files.len(),
            ..Default::default()
        };
        let mut signals = Vec::new();

        for path in &files {
            let records = match read_session(path) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to read session: {e}");
                    report.sessions_failed += 1;
                    continue;
                }
            };

            let session = SessionRef::from_relative_path(&relative_hint(dir, path));
            let outcome = self.mine_session(&session, &records).await;

            report.chunks += outcome.chunks;
            report.chunks_failed += outcome.chunks_failed;
            report.candidates_seen += outcome.candidates_seen;
            report.candidates_rejected += outcome.candidates_rejected;
            if !outcome.signals.is_empty() {
                report.sessions_with_items += 1;
                signals.extend(outcome.signals);
            }
        }

        report.items = signals.len();
        report.finished_at = Some(Utc::now());
        tracing::info!(
            sessions = report.sessions_scanned,
            failed = report.sessions_failed,
            chunks = report.chunks,
            items = report.items,
            "mining complete"
        );
        Ok((report, signals))
    }
}
