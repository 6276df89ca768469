use crate::cli::ExportArgs;
use crate::config::FileConfig;
use anyhow::Context;
use std::collections::HashSet;
use tracesift_log::write_jsonl;
use tracesift_rollup::{plan_tickets, scan_fingerprints, RollupDocument, TicketAction, TicketPolicy};

pub fn policy(args: &ExportArgs, config: &FileConfig) -> TicketPolicy {
    let mut policy = config.tickets.clone();
    if let Some(tier) = args.min_tier {
        policy.min_tier = tier;
    }
    if let Some(n) = args.min_sessions {
        policy.min_sessions = n;
    }
    if let Some(n) = args.min_items {
        policy.min_items = n;
    }
    if let Some(n) = args.max_create {
        policy.max_create = n;
    }
    policy
}

pub fn run(args: &ExportArgs, config: &FileConfig) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.in_json)
        .with_context(|| format!("failed to read {}", args.in_json.display()))?;
    let doc: RollupDocument = serde_json::from_str(&text)
        .with_context(|| format!("invalid rollup document {}", args.in_json.display()))?;

    let seen: HashSet<String> = match &args.seen {
        Some(path) => scan_fingerprints(
            &std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => HashSet::new(),
    };

    let tickets = plan_tickets(&doc.rollups, &policy(args, config), &seen);
    write_jsonl(&args.out_jsonl, &tickets)
        .with_context(|| format!("failed to write {}", args.out_jsonl.display()))?;

    let created = tickets.iter().filter(|t| t.action == TicketAction::Create).count();
    println!(
        "[export] wrote {} created={} updates={} seen={}",
        args.out_jsonl.display(),
        created,
        tickets.len() - created,
        seen.len()
    );
    Ok(())
}
