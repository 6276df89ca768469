mod common;

use common::*;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use tracesift_core::{chunk_views, Kind, MinerConfig, Normalizer, Role, Severity};
use tracesift_extract::{HeuristicExtractor, Miner};
use tracesift_log::{read_session_str, SessionFilter};
use tracesift_rollup::{
    plan_tickets, Aggregator, MergeConfig, Merger, RollupDocument, TicketPolicy,
};

#[test]
fn test_chunk_example_extends_over_tool_pair() {
    let records = read_session_str(&chunk_example_lines().join("\n"));
    let views = Normalizer::new(800, true).views(&records);
    assert_eq!(views.len(), 20);
    assert_eq!(views[0].i, 1);
    assert_eq!(views[9].role, Role::ToolCall);
    assert_eq!(views[10].role, Role::ToolResult);

    let chunks = chunk_views(&views, 10, 4);
    assert!(chunks[0].extended);
    assert_eq!(chunks[0].start_i, 1);
    assert_eq!(chunks[0].end_i, 11);
    assert!(chunks.iter().all(|c| c.end_i != 10));
}

#[tokio::test]
async fn test_mine_then_rollup_is_redacted_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_session(dir.path(), "proj-a/one.jsonl", &leaky_session_lines());
    write_session(dir.path(), "proj-b/two.jsonl", &leaky_session_lines());
    std::fs::write(dir.path().join("proj-b/broken.jsonl"), "{not json\n").unwrap();

    let miner = Miner::new(MinerConfig::default(), Arc::new(HeuristicExtractor::new()));
    let (report, signals) = miner.mine_dir(dir.path(), &SessionFilter::new()).await.unwrap();
    assert_eq!(report.sessions_scanned, 3);
    assert_eq!(report.sessions_with_items, 2);
    assert!(signals.iter().any(|s| s.kind == Kind::Error));
    assert!(signals.iter().any(|s| s.kind == Kind::UserFrustration));

    let clusters = Aggregator::default().rollup(&signals);
    let (clusters, merge) = Merger::new(MergeConfig::default(), Aggregator::default())
        .merge(clusters)
        .await;
    let doc = RollupDocument::new(&clusters, signals.len(), merge.merged_groups());
    assert_eq!(doc.summary.counts.items, signals.len());
    assert!(doc.rollups.iter().any(|r| r.count_sessions == 2));

    let tickets = plan_tickets(
        &doc.rollups,
        &TicketPolicy {
            min_tier: 3,
            min_sessions: 1,
            ..TicketPolicy::default()
        },
        &HashSet::new(),
    );
    assert!(!tickets.is_empty());

    let persisted = [
        signals
            .iter()
            .map(|s| serde_json::to_string(s).unwrap())
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::to_string(&doc).unwrap(),
        serde_json::to_string(&tickets).unwrap(),
    ]
    .join("\n");
    for secret in SECRETS {
        assert!(!persisted.contains(secret), "leaked {secret}");
    }
}

#[test]
fn test_redaction_of_raw_summaries() {
    let signals = vec![
        signal(
            "s1",
            Kind::Error,
            "Webhook https://svc.example.com/hook?token=abc123secret rejected alice@example.com",
            Severity::Medium,
            &["alice@example.com"],
        ),
        signal(
            "s2",
            Kind::Error,
            "Cannot open /home/alice/notes.txt",
            Severity::Low,
            &[],
        ),
    ];
    let clusters = Aggregator::default().rollup(&signals);
    let doc = RollupDocument::new(&clusters, signals.len(), 0);
    let json = serde_json::to_string(&doc).unwrap();
    for secret in SECRETS {
        assert!(!json.contains(secret), "leaked {secret}");
    }
    assert!(doc.rollups.iter().any(|r| r.canonical_summary.contains("[email]")));
}

#[test]
fn test_tier_monotonicity() {
    let signals = vec![
        signal("s1", Kind::Other, "Incident opened for outage", Severity::Low, &["incident"]),
        signal("s1", Kind::UserDelight, "Critical praise", Severity::Critical, &[]),
        signal("s2", Kind::Error, "Lint step failed", Severity::Low, &[]),
        signal("s2", Kind::UserFrustration, "User repeated request", Severity::Low, &[]),
        signal("s3", Kind::ImprovementSuggestion, "Cache the index", Severity::Medium, &[]),
        signal("s3", Kind::UserDelight, "Nice output", Severity::Low, &[]),
        signal("s4", Kind::ProactiveOpportunity, "Share the demo", Severity::Unknown, &[]),
    ];
    let clusters = Aggregator::default().rollup(&signals);
    assert_eq!(clusters.len(), signals.len());

    for cluster in &clusters {
        let r = &cluster.rollup;
        let incident = r.tags_top.iter().any(|(t, _)| t == "incident");
        let severe = r.max_severity >= Severity::High;
        let elevated = r.kind_counts.contains_key("error")
            || r.kind_counts.contains_key("user_frustration")
            || r.max_severity == Severity::Medium;
        let expected = if incident || severe {
            1
        } else if elevated {
            2
        } else {
            3
        };
        assert_eq!(r.tier, expected, "{}", r.canonical_summary);
    }

    let tiers: Vec<u8> = clusters.iter().map(|c| c.rollup.tier).collect();
    let mut sorted = tiers.clone();
    sorted.sort();
    assert_eq!(tiers, sorted);
}

#[tokio::test]
async fn test_example_pair_merges_and_stays_merged() {
    let signals = vec![
        signal("s1", Kind::Error, "Connection timeout contacting service A", Severity::Medium, &["network"]),
        signal("s1", Kind::Error, "Timeout connecting to service A", Severity::Medium, &["network"]),
        signal("s2", Kind::Error, "Disk quota exceeded on runner", Severity::High, &["ci"]),
    ];
    let merger = Merger::new(MergeConfig::default(), Aggregator::default());
    let (once, first) = merger.merge(Aggregator::default().rollup(&signals)).await;
    assert_eq!(first.merged_groups(), 1);

    let pair = once
        .iter()
        .find(|c| c.rollup.merged_from.len() == 2)
        .expect("merged pair");
    assert_eq!(pair.rollup.count_items, 2);
    assert_eq!(pair.rollup.tier, 2);

    let (twice, second) = merger.merge(once.clone()).await;
    assert_eq!(second.merged_groups(), 0);
    assert_eq!(twice.len(), once.len());
}
