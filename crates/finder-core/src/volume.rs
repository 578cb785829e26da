//! Volume Tracker: cumulative submission counts per address and the
//! incremental delta since the previous iteration.

use crate::model::{Address, Submission};
use std::collections::{BTreeMap, HashMap};

pub fn count_by_address(submissions: &[Submission]) -> HashMap<Address, u64> {
    let mut counts: HashMap<Address, u64> = HashMap::new();
    for s in submissions {
        *counts.entry(s.inserted_by_address.clone()).or_default() += 1;
    }
    counts
}

/// Delta per address since the last iteration. Previous defaults to 0 for
/// addresses seen for the first time. An address with delta <= 0 submitted
/// nothing new this round and contributes no volume; that is policy, not an
/// error, even if its running total moved for some other reason.
pub fn compute_deltas(
    current_totals: &HashMap<Address, u64>,
    previous_totals: &HashMap<Address, u64>,
) -> BTreeMap<Address, u64> {
    let mut deltas = BTreeMap::new();
    for (address, current) in current_totals {
        let previous = previous_totals.get(address).copied().unwrap_or(0);
        if *current > previous {
            deltas.insert(address.clone(), current - previous);
        }
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sub(id: i64, addr: &str) -> Submission {
        Submission {
            id,
            inserted_by_address: addr.into(),
            inserted_at: Utc::now(),
            prediction: format!("p{}", id),
            full_post: format!("post {}", id),
            topic: None,
            url: None,
            context: None,
        }
    }

    #[test]
    fn counts_group_by_address() {
        let subs = vec![sub(1, "a"), sub(2, "a"), sub(3, "b")];
        let counts = count_by_address(&subs);
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn deltas_default_previous_to_zero() {
        let current = HashMap::from([("a".to_string(), 5), ("b".to_string(), 2)]);
        let previous = HashMap::from([("a".to_string(), 3)]);
        let deltas = compute_deltas(&current, &previous);
        assert_eq!(deltas["a"], 2);
        assert_eq!(deltas["b"], 2);
    }

    #[test]
    fn non_positive_deltas_are_dropped() {
        let current = HashMap::from([
            ("flat".to_string(), 4),
            ("shrunk".to_string(), 1),
            ("grew".to_string(), 7),
        ]);
        let previous = HashMap::from([
            ("flat".to_string(), 4),
            ("shrunk".to_string(), 3),
            ("grew".to_string(), 6),
        ]);
        let deltas = compute_deltas(&current, &previous);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas["grew"], 1);
    }
}
