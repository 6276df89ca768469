//! Extraction strategy interface

use crate::candidate::Candidate;
use crate::error::Result;
use async_trait::async_trait;
use tracesift_core::{Chunk, Constraints};

/// Produces unvalidated candidates for one chunk
///
/// Implementations are selected by the caller. Errors never abort a run;
/// the miner counts the chunk as failed and moves on.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short label used in logs and run reports
    fn name(&self) -> &str;

    async fn extract(&self, chunk: &Chunk, constraints: &Constraints) -> Result<Vec<Candidate>>;
}
