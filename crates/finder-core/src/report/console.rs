//! Plain-text reporting for the CLI. Everything here writes to stdout;
//! structured events go through `tracing` instead.

use crate::model::{Address, IterationSummary, QualityScore};
use std::collections::BTreeMap;

/// Shortens a wallet address to `head..tail` for table display.
fn short_address(address: &str) -> String {
    if address.len() <= 14 {
        address.to_string()
    } else {
        format!("{}..{}", &address[..8], &address[address.len() - 4..])
    }
}

/// Prints the per-address score table, highest blended share first.
pub fn print_score_table(
    quality: &BTreeMap<Address, QualityScore>,
    blended: &BTreeMap<Address, f64>,
    deltas: &BTreeMap<Address, u64>,
) {
    if blended.is_empty() {
        println!("No scores to report.");
        return;
    }

    let mut rows: Vec<(&Address, f64)> = blended.iter().map(|(a, s)| (a, *s)).collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!();
    println!(
        "{:>4}  {:<14}  {:>8}  {:>6}  {:>8}  {:>7}",
        "rank", "address", "quality", "count", "penalty", "share"
    );
    println!("{}", "-".repeat(58));
    for (rank, (address, share)) in rows.iter().enumerate() {
        let q = quality.get(*address);
        println!(
            "{:>4}  {:<14}  {:>8.4}  {:>6}  {:>8.4}  {:>6.2}%",
            rank + 1,
            short_address(address),
            q.map(|s| s.base).unwrap_or(0.0),
            deltas.get(*address).copied().unwrap_or(0),
            q.map(|s| s.penalty).unwrap_or(0.0),
            share * 100.0,
        );
    }
    println!();
}

/// Prints the end-of-iteration summary block. Dry runs print the same
/// figures as real runs, flagged as such.
pub fn print_iteration_summary(summary: &IterationSummary) {
    println!("Iteration summary");
    println!("  run timestamp : {}", summary.run_timestamp.to_rfc3339());
    match summary.iteration_id {
        Some(id) => println!("  iteration id  : {}", id),
        None => println!("  iteration id  : (dry run, not persisted)"),
    }
    println!("  fetched       : {}", summary.submissions_fetched);
    println!("  active addrs  : {}", summary.deltas.len());
    println!("  weights       : {}", summary.final_weights.len());
    println!(
        "  ledger push   : {}",
        if summary.weights_pushed {
            "ok"
        } else if summary.dry_run {
            "skipped (dry run)"
        } else {
            "skipped"
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_truncates_long_values() {
        let addr = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
        let short = short_address(addr);
        assert_eq!(short, "5GrwvaEF..utQY");
    }

    #[test]
    fn short_address_keeps_short_values() {
        assert_eq!(short_address("alice"), "alice");
    }
}
