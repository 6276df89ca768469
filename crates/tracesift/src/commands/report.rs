use tracesift_rollup::{Rollup, RollupDocument};

const MAX_SECTIONS: usize = 50;

fn counts(map: &std::collections::BTreeMap<String, usize>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn rollup_section(rank: usize, rollup: &Rollup) -> String {
    let tags = rollup
        .tags_top
        .iter()
        .map(|(t, n)| format!("{t}:{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "## {}. {}\n\n\
         - tier: {} ({})\n\
         - score: {:.2}\n\
         - items: {} sessions: {}\n\
         - kinds: {}\n\
         - kind_v2: {}\n\
         - max_severity: {}\n\
         - tags: {}\n\
         - samples: {}\n\
         - fingerprint: `{}`\n",
        rank,
        rollup.canonical_summary,
        rollup.tier,
        rollup.tier_reasons.join(", "),
        rollup.score,
        rollup.count_items,
        rollup.count_sessions,
        counts(&rollup.kind_counts),
        rollup.kind_v2_dominant,
        rollup.max_severity,
        if tags.is_empty() { "-".to_string() } else { tags },
        rollup.sample_refs.len(),
        rollup.fingerprint_id,
    )
}

/// Markdown rollup report: header counts, then the top rollups
pub fn build_report(doc: &RollupDocument) -> String {
    let summary = &doc.summary;
    let mut sections = vec![format!(
        "# Signal rollup\n\n\
         - items: {}\n\
         - groups: {}\n\
         - merged groups: {}\n\
         - tiers: {}\n",
        summary.counts.items,
        summary.counts.groups,
        summary.counts.merged_groups,
        counts(&summary.tiers),
    )];

    if doc.rollups.is_empty() {
        sections.push("No signals.\n".to_string());
    }
    for (i, rollup) in doc.rollups.iter().take(MAX_SECTIONS).enumerate() {
        sections.push(rollup_section(i + 1, rollup));
    }
    sections.join("\n")
}
