//! Domain model and leaf algorithms for session signal mining

mod chunk;
mod config;
mod hash;
mod normalize;
mod redact;
mod text;
mod types;

pub use chunk::{chunk_views, should_extend};
pub use config::{default_workers, Constraints, MinerConfig};
pub use hash::{prefixed_hash, sha256_hex};
pub use normalize::Normalizer;
pub use redact::redact;
pub use text::{digest, is_salient, prefix_chars, truncate};
pub use types::{
    Chunk, EventView, Evidence, FixType, Kind, ProposedFix, Role, Severity, Signal, SignalSource,
    Span,
};
