//! Signal extraction: candidate production and grounding validation

mod candidate;
mod error;
mod extractor;
mod heuristic;
mod miner;
mod prompt;
mod validate;

pub use candidate::{parse_reply, Candidate, CandidateEvidence, CandidateFix};
pub use error::{ExtractError, Result};
pub use extractor::Extractor;
pub use heuristic::HeuristicExtractor;
pub use miner::{MineReport, Miner, SessionOutcome};
pub use prompt::{build_prompt, OraclePrompt};
pub use validate::{
    ground_quote, signal_id, validate_candidate, validate_chunk, ChunkValidation, Rejection,
    SessionRef,
};
