//! Cluster merger: union near-duplicate rollups within a secondary kind

use crate::aggregate::{sort_clusters, Aggregator, Cluster, Rollup};
use crate::classify::SecondaryKind;
use crate::error::{Result, RollupError};
use crate::signature::Signature;
use crate::similarity::{jaccard, KnnIndex};
use crate::tokens::lexical_set;
use crate::union_find::UnionFind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracesift_core::redact;

/// Similarity measure used to find merge candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Lexical,
    Vector,
}

impl MergeMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lexical" => Some(MergeMode::Lexical),
            "vector" => Some(MergeMode::Vector),
            _ => None,
        }
    }
}

/// Merge thresholds and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub mode: MergeMode,

    /// Lexical similarity at or above which pairs merge unconditionally
    pub auto_jaccard: f64,

    /// Lower bound of the lexical band escalated to the judge
    pub judge_jaccard: f64,

    pub auto_cosine: f64,
    pub judge_cosine: f64,

    /// Neighbours compared per rollup in vector mode
    pub knn: usize,

    /// Pairs compared per block before giving up on the rest
    pub max_pairs_per_block: usize,

    pub min_judge_confidence: f64,
    pub judge_timeout_secs: u64,

    /// Consult the judge for pairs in the ambiguous band
    pub use_judge: bool,
}

impl MergeConfig {
    pub fn new() -> Self {
        Self {
            mode: MergeMode::Lexical,
            auto_jaccard: 0.62,
            judge_jaccard: 0.5,
            auto_cosine: 0.92,
            judge_cosine: 0.85,
            knn: 8,
            max_pairs_per_block: 5000,
            min_judge_confidence: 0.7,
            judge_timeout_secs: 120,
            use_judge: false,
        }
    }

    fn thresholds(&self) -> (f64, f64) {
        match self.mode {
            MergeMode::Lexical => (self.auto_jaccard, self.judge_jaccard),
            MergeMode::Vector => (self.auto_cosine, self.judge_cosine),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What the judge is shown of one rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeView {
    pub canonical_summary: String,
    pub kind_v2_counts: BTreeMap<String, usize>,
    pub tags_top: Vec<String>,
}

impl JudgeView {
    pub fn from_rollup(rollup: &Rollup) -> Self {
        Self {
            canonical_summary: redact(&rollup.canonical_summary),
            kind_v2_counts: rollup.kind_v2_counts.clone(),
            tags_top: rollup.top_tag_names(5),
        }
    }
}

/// Judge answer for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDecision {
    pub merge: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

/// External oracle deciding whether two rollups describe the same issue
#[async_trait]
pub trait MergeJudge: Send + Sync {
    async fn judge(&self, a: &JudgeView, b: &JudgeView) -> Result<MergeDecision>;
}

/// External service turning texts into vectors, one per input in order
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Counts for one merge call, summed over its rounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub groups_in: usize,
    pub groups_out: usize,
    pub rounds: usize,
    pub blocks: usize,
    pub blocks_failed: usize,
    pub pairs_compared: usize,
    pub auto_merges: usize,
    pub judge_calls: usize,
    pub judge_merges: usize,
    pub judge_failures: usize,
}

impl MergeReport {
    pub fn merged_groups(&self) -> usize {
        self.groups_in.saturating_sub(self.groups_out)
    }

    fn absorb(&mut self, other: &MergeReport) {
        self.blocks_failed += other.blocks_failed;
        self.pairs_compared += other.pairs_compared;
        self.auto_merges += other.auto_merges;
        self.judge_calls += other.judge_calls;
        self.judge_merges += other.judge_merges;
        self.judge_failures += other.judge_failures;
    }
}

struct Block {
    kind: SecondaryKind,
    positions: Vec<usize>,
    views: Vec<JudgeView>,
}

struct BlockOutcome {
    edges: Vec<(usize, usize)>,
    report: MergeReport,
}

#[derive(Clone)]
struct BlockContext {
    config: MergeConfig,
    judge: Option<Arc<dyn MergeJudge>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl BlockContext {
    /// Candidate pairs (block-local positions) with their similarity
    async fn candidate_pairs(&self, block: &Block) -> Result<Vec<(usize, usize, f64)>> {
        let n = block.views.len();
        let limit = self.config.max_pairs_per_block;
        let mut pairs = Vec::new();

        match self.config.mode {
            MergeMode::Lexical => {
                let sets: Vec<BTreeSet<String>> = block
                    .views
                    .iter()
                    .map(|v| lexical_set(&v.canonical_summary))
                    .collect();
                'outer: for i in 0..n {
                    for j in (i + 1)..n {
                        if pairs.len() >= limit {
                            break 'outer;
                        }
                        pairs.push((i, j, jaccard(&sets[i], &sets[j])));
                    }
                }
            }
            MergeMode::Vector => {
                let Some(embedder) = &self.embedder else {
                    return Err(RollupError::embedder("no embedder configured"));
                };
                let texts: Vec<String> = block
                    .views
                    .iter()
                    .map(|v| v.canonical_summary.clone())
                    .collect();
                let vectors = embedder.embed(&texts).await?;
                if vectors.len() != n {
                    return Err(RollupError::VectorCount {
                        expected: n,
                        actual: vectors.len(),
                    });
                }
                let index = KnnIndex::build(vectors)?;
                let mut seen = HashSet::new();
                'knn: for i in 0..n {
                    for (j, score) in index.neighbours(i, self.config.knn) {
                        let key = (i.min(j), i.max(j));
                        if !seen.insert(key) {
                            continue;
                        }
                        if pairs.len() >= limit {
                            break 'knn;
                        }
                        pairs.push((key.0, key.1, f64::from(score)));
                    }
                }
            }
        }
        Ok(pairs)
    }

    async fn ask_judge(&self, judge: &dyn MergeJudge, a: &JudgeView, b: &JudgeView) -> Result<MergeDecision> {
        let secs = self.config.judge_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), judge.judge(a, b)).await {
            Ok(result) => result,
            Err(_) => Err(RollupError::Timeout(secs)),
        }
    }

    async fn run(self, block: Block) -> BlockOutcome {
        let mut report = MergeReport::default();
        let mut edges = Vec::new();

        let pairs = match self.candidate_pairs(&block).await {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::warn!(block = %block.kind, "merge disabled for block: {e}");
                report.blocks_failed = 1;
                return BlockOutcome { edges, report };
            }
        };

        let (auto, ambiguous) = self.config.thresholds();
        let judge = if self.config.use_judge {
            self.judge.clone()
        } else {
            None
        };

        for (i, j, score) in pairs {
            report.pairs_compared += 1;
            if score >= auto {
                report.auto_merges += 1;
                edges.push((block.positions[i], block.positions[j]));
                continue;
            }
            if score < ambiguous {
                continue;
            }
            let Some(judge) = &judge else {
                continue;
            };

            report.judge_calls += 1;
            match self.ask_judge(judge.as_ref(), &block.views[i], &block.views[j]).await {
                Ok(decision) if decision.merge && decision.confidence >= self.config.min_judge_confidence => {
                    report.judge_merges += 1;
                    edges.push((block.positions[i], block.positions[j]));
                }
                Ok(_) => {}
                Err(e) => {
                    report.judge_failures += 1;
                    tracing::warn!(block = %block.kind, "merge judge failed: {e}");
                }
            }
        }

        BlockOutcome { edges, report }
    }
}

/// Merges rollups whose canonical summaries describe the same issue
pub struct Merger {
    config: MergeConfig,
    aggregator: Aggregator,
    judge: Option<Arc<dyn MergeJudge>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Merger {
    pub fn new(config: MergeConfig, aggregator: Aggregator) -> Self {
        Self {
            config,
            aggregator,
            judge: None,
            embedder: None,
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn MergeJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge rounds until a round unions nothing
    ///
    /// A merged rollup is re-aggregated and may get a different canonical
    /// summary, which can make it similar to rollups it was not similar to
    /// before. Running to a fixed point keeps a second call from merging more.
    pub async fn merge(&self, clusters: Vec<Cluster>) -> (Vec<Cluster>, MergeReport) {
        let mut report = MergeReport {
            groups_in: clusters.len(),
            ..Default::default()
        };

        let mut clusters = clusters;
        loop {
            report.rounds += 1;
            let (next, unions) = self.merge_round(clusters, &mut report).await;
            clusters = next;
            if unions == 0 {
                break;
            }
        }
        sort_clusters(&mut clusters);

        report.groups_out = clusters.len();
        tracing::info!(
            groups_in = report.groups_in,
            groups_out = report.groups_out,
            rounds = report.rounds,
            auto_merges = report.auto_merges,
            judge_merges = report.judge_merges,
            "merged rollups"
        );
        (clusters, report)
    }

    /// Block by dominant secondary kind, find edges per block concurrently,
    /// union them, and re-aggregate every merged component
    async fn merge_round(&self, clusters: Vec<Cluster>, report: &mut MergeReport) -> (Vec<Cluster>, usize) {
        let mut by_kind: BTreeMap<SecondaryKind, Vec<usize>> = BTreeMap::new();
        for (pos, cluster) in clusters.iter().enumerate() {
            by_kind
                .entry(cluster.rollup.kind_v2_dominant)
                .or_default()
                .push(pos);
        }
        report.blocks += by_kind.len();

        let context = BlockContext {
            config: self.config.clone(),
            judge: self.judge.clone(),
            embedder: self.embedder.clone(),
        };
        let mut set = JoinSet::new();
        for (kind, positions) in by_kind {
            if positions.len() < 2 {
                continue;
            }
            let views = positions
                .iter()
                .map(|&p| JudgeView::from_rollup(&clusters[p].rollup))
                .collect();
            let block = Block {
                kind,
                positions,
                views,
            };
            set.spawn(context.clone().run(block));
        }

        let mut uf = UnionFind::new(clusters.len());
        let mut unions = 0;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(outcome) => {
                    report.absorb(&outcome.report);
                    for (a, b) in outcome.edges {
                        if uf.union(a, b) {
                            unions += 1;
                        }
                    }
                }
                Err(e) => {
                    report.blocks_failed += 1;
                    tracing::warn!("merge block task failed: {e}");
                }
            }
        }
        if unions == 0 {
            return (clusters, 0);
        }

        let components = uf.components();
        let mut slots: Vec<Option<Cluster>> = clusters.into_iter().map(Some).collect();
        let mut merged = Vec::with_capacity(components.len());
        for component in components {
            let members: Vec<Cluster> = component.iter().filter_map(|&p| slots[p].take()).collect();
            if let Some(cluster) = self.combine(members) {
                merged.push(cluster);
            }
        }
        tracing::debug!(unions, groups = merged.len(), "merge round");
        (merged, unions)
    }

    /// Re-aggregate a component; the largest member supplies the signature
    fn combine(&self, members: Vec<Cluster>) -> Option<Cluster> {
        if members.len() <= 1 {
            return members.into_iter().next();
        }

        let mut base = 0;
        for (i, member) in members.iter().enumerate() {
            if member.rollup.count_items > members[base].rollup.count_items {
                base = i;
            }
        }
        let sig = Signature {
            id: members[base].rollup.signature_id.clone(),
            text: members[base].rollup.signature_text.clone(),
        };

        let merged_from: BTreeSet<String> = members
            .iter()
            .flat_map(|m| m.rollup.merged_from.iter().cloned())
            .collect();
        let signals: Vec<_> = members.into_iter().flat_map(|m| m.members).collect();

        let mut rollup = self.aggregator.aggregate(&sig, &signals);
        rollup.merged_from = merged_from.into_iter().collect();
        Some(Cluster {
            rollup,
            members: signals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracesift_core::{Evidence, Kind, Role, Severity, Signal, SignalSource, Span};

    fn signal(session: &str, kind: Kind, summary: &str, tags: &[&str]) -> Signal {
        Signal {
            schema_version: 1,
            item_id: format!("sha256:{session}:{summary}"),
            session_id: session.to_string(),
            source: SignalSource {
                file_hint: session.to_string(),
                chunk_id: format!("{session}/chunk:0"),
            },
            kind,
            summary: summary.to_string(),
            severity: Severity::Medium,
            confidence: 0.5,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            span: Span { start_i: 0, end_i: 0 },
            evidence: vec![Evidence {
                event_i: 0,
                role: Role::ToolResult,
                field_path: "text".to_string(),
                quote: "q".to_string(),
            }],
            proposed_fix: None,
        }
    }

    fn example_clusters() -> Vec<Cluster> {
        let signals = vec![
            signal("s1", Kind::Error, "Connection timeout contacting service A", &["network"]),
            signal("s1", Kind::Error, "Timeout connecting to service A", &["network"]),
        ];
        Aggregator::default().rollup(&signals)
    }

    struct FixedJudge {
        decision: MergeDecision,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MergeJudge for FixedJudge {
        async fn judge(&self, _a: &JudgeView, _b: &JudgeView) -> Result<MergeDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.decision.clone())
        }
    }

    struct FailingJudge;

    #[async_trait]
    impl MergeJudge for FailingJudge {
        async fn judge(&self, _a: &JudgeView, _b: &JudgeView) -> Result<MergeDecision> {
            Err(RollupError::judge("upstream 500"))
        }
    }

    struct TableEmbedder(Vec<Vec<f32>>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(self.0.iter().take(texts.len()).cloned().collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }
    }

    fn merger(config: MergeConfig) -> Merger {
        Merger::new(config, Aggregator::default())
    }

    #[tokio::test]
    async fn test_example_pair_auto_merges() {
        let clusters = example_clusters();
        assert_eq!(clusters.len(), 2);
        let originals: BTreeSet<String> = clusters.iter().map(|c| c.rollup.signature_id.clone()).collect();

        let (merged, report) = merger(MergeConfig::default()).merge(clusters).await;
        assert_eq!(merged.len(), 1);
        assert_eq!(report.auto_merges, 1);
        assert_eq!(report.merged_groups(), 1);

        let rollup = &merged[0].rollup;
        assert_eq!(rollup.count_items, 2);
        assert_eq!(rollup.tier, 2);
        assert_eq!(rollup.kind_v2_dominant, SecondaryKind::ReliabilityPerf);
        assert_eq!(rollup.merged_from, originals.into_iter().collect::<Vec<_>>());
        assert!(rollup.merged_from.contains(&rollup.signature_id));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let mut signals = vec![
            signal("s1", Kind::Error, "Connection timeout contacting service A", &["network"]),
            signal("s2", Kind::Error, "Timeout connecting to service A", &["network"]),
            signal("s3", Kind::Error, "Null pointer in config parser", &[]),
            signal("s4", Kind::UserFrustration, "User repeated the request three times", &[]),
        ];
        signals.push(signal("s5", Kind::UserFrustration, "User had to repeat the request", &[]));
        let clusters = Aggregator::default().rollup(&signals);
        let m = merger(MergeConfig::default());

        let (once, _) = m.merge(clusters).await;
        let (twice, report) = m.merge(once.clone()).await;
        assert_eq!(report.merged_groups(), 0);
        assert_eq!(
            once.iter().map(|c| &c.rollup).collect::<Vec<_>>(),
            twice.iter().map(|c| &c.rollup).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_merge_reaches_fixed_point_when_canonical_summary_shifts() {
        let xa = "Build timeout runner alpha beta gamma delta omicron sigma upsilon phi chi psi omega";
        let xb = "BUILD timeout, runner alpha-beta gamma delta: omicron sigma upsilon phi chi psi omega!";
        let w = "Build timeout runner alpha beta gamma delta zeta eta theta iota kappa lambda";
        let mut signals = Vec::new();
        for i in 0..3 {
            signals.push(signal(&format!("a{i}"), Kind::Error, xa, &[]));
        }
        for i in 0..2 {
            signals.push(signal(&format!("aw{i}"), Kind::Error, w, &[]));
        }
        for i in 0..3 {
            signals.push(signal(&format!("b{i}"), Kind::Error, xb, &["ci"]));
        }
        for i in 0..2 {
            signals.push(signal(&format!("bw{i}"), Kind::Error, w, &["ci"]));
        }
        signals.push(signal(
            "c0",
            Kind::Error,
            "timeout zeta eta theta iota kappa lambda build delta",
            &[],
        ));
        let clusters = Aggregator::default().rollup(&signals);
        assert_eq!(clusters.len(), 3);

        let m = merger(MergeConfig::default());
        let (once, first) = m.merge(clusters).await;
        assert_eq!(once.len(), 1);
        assert_eq!(first.merged_groups(), 2);
        assert_eq!(first.rounds, 3);
        assert_eq!(once[0].rollup.count_items, signals.len());

        let (twice, second) = m.merge(once.clone()).await;
        assert_eq!(second.merged_groups(), 0);
        assert_eq!(second.rounds, 1);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn test_never_merges_across_blocks() {
        let signals = vec![
            signal("s1", Kind::Error, "Build failed on CI", &[]),
            signal("s2", Kind::UserFrustration, "Build failed on CI", &[]),
        ];
        let clusters = Aggregator::default().rollup(&signals);
        let (merged, report) = merger(MergeConfig::default()).merge(clusters).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(report.pairs_compared, 0);
    }

    #[tokio::test]
    async fn test_judge_band() {
        let config = MergeConfig {
            auto_jaccard: 0.9,
            judge_jaccard: 0.5,
            use_judge: true,
            ..MergeConfig::default()
        };

        let confident = Arc::new(FixedJudge {
            decision: MergeDecision {
                merge: true,
                confidence: 0.9,
                reason: "same outage".to_string(),
            },
            calls: AtomicUsize::new(0),
        });
        let (merged, report) = merger(config.clone())
            .with_judge(confident.clone())
            .merge(example_clusters())
            .await;
        assert_eq!(merged.len(), 1);
        assert_eq!(report.judge_merges, 1);
        assert_eq!(confident.calls.load(Ordering::SeqCst), 1);

        let unsure = Arc::new(FixedJudge {
            decision: MergeDecision {
                merge: true,
                confidence: 0.6,
                reason: String::new(),
            },
            calls: AtomicUsize::new(0),
        });
        let (merged, _) = merger(config.clone()).with_judge(unsure).merge(example_clusters()).await;
        assert_eq!(merged.len(), 2);

        let (merged, report) = merger(config)
            .with_judge(Arc::new(FailingJudge))
            .merge(example_clusters())
            .await;
        assert_eq!(merged.len(), 2);
        assert_eq!(report.judge_failures, 1);
    }

    #[tokio::test]
    async fn test_judge_ignored_unless_enabled() {
        let config = MergeConfig {
            auto_jaccard: 0.9,
            ..MergeConfig::default()
        };
        let judge = Arc::new(FixedJudge {
            decision: MergeDecision {
                merge: true,
                confidence: 1.0,
                reason: String::new(),
            },
            calls: AtomicUsize::new(0),
        });
        let (merged, _) = merger(config).with_judge(judge.clone()).merge(example_clusters()).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vector_mode() {
        let config = MergeConfig {
            mode: MergeMode::Vector,
            ..MergeConfig::default()
        };
        let near = Arc::new(TableEmbedder(vec![vec![1.0, 0.0], vec![0.99, 0.05]]));
        let (merged, _) = merger(config.clone()).with_embedder(near).merge(example_clusters()).await;
        assert_eq!(merged.len(), 1);

        let far = Arc::new(TableEmbedder(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
        let (merged, _) = merger(config).with_embedder(far).merge(example_clusters()).await;
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn test_embedder_failure_disables_block() {
        let config = MergeConfig {
            mode: MergeMode::Vector,
            ..MergeConfig::default()
        };
        let (merged, report) = merger(config.clone())
            .with_embedder(Arc::new(ShortEmbedder))
            .merge(example_clusters())
            .await;
        assert_eq!(merged.len(), 2);
        assert_eq!(report.blocks_failed, 1);

        let (merged, report) = merger(config).merge(example_clusters()).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(report.blocks_failed, 1);
    }

    #[tokio::test]
    async fn test_pair_ceiling() {
        let config = MergeConfig {
            max_pairs_per_block: 0,
            ..MergeConfig::default()
        };
        let (merged, report) = merger(config).merge(example_clusters()).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(report.pairs_compared, 0);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: MergeConfig = serde_json::from_str(r#"{"mode": "vector", "knn": 4}"#).unwrap();
        assert_eq!(config.mode, MergeMode::Vector);
        assert_eq!(config.knn, 4);
        assert_eq!(config.auto_jaccard, 0.62);
        assert_eq!(MergeMode::parse(" Lexical "), Some(MergeMode::Lexical));
        assert_eq!(MergeMode::parse("graph"), None);
    }
}
