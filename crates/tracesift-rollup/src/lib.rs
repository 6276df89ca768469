//! Signature grouping, rollup aggregation, cluster merging and ticket planning

mod aggregate;
mod classify;
mod counter;
mod error;
mod merge;
mod signature;
mod similarity;
mod ticket;
mod tokens;
mod union_find;

pub use aggregate::{
    score_for, sort_clusters, tier_for, Aggregator, Cluster, Rollup, RollupConfig, RollupCounts,
    RollupDocument, RollupSummary, SampleRef,
};
pub use classify::{sentiment, ClassificationRule, ClassificationTable, SecondaryKind, Sentiment};
pub use counter::Counter;
pub use error::{Result, RollupError};
pub use merge::{
    Embedder, JudgeView, MergeConfig, MergeDecision, MergeJudge, MergeMode, MergeReport, Merger,
};
pub use signature::{fingerprint, signature, Signature};
pub use similarity::{cosine_similarity, jaccard, l2_normalize, KnnIndex};
pub use ticket::{plan_tickets, scan_fingerprints, ticket_body, TicketAction, TicketIr, TicketPolicy};
pub use tokens::{bigrams, lexical_set, normalize, stem, tokens};
pub use union_find::UnionFind;
