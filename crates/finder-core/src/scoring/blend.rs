//! Quality×Quantity Blender: weighted combination of judged quality and
//! submission volume into one distribution summing to 1.0.

use crate::model::Address;
use std::collections::BTreeMap;

/// Blends per-address quality shares (0..=1) with submission counts.
/// Quantity is normalized by the maximum count (0 when the max is 0, so a
/// round with no volume degrades to the pure quality distribution). The
/// weighted values are re-normalized; a zero sum yields all zeros.
pub fn blend(
    quality: &BTreeMap<Address, f64>,
    counts: &BTreeMap<Address, u64>,
    quality_weight: f64,
    quantity_weight: f64,
) -> BTreeMap<Address, f64> {
    let max_count = counts.values().copied().max().unwrap_or(0);

    let mut weighted: BTreeMap<Address, f64> = BTreeMap::new();
    for (address, q) in quality {
        let norm_quantity = if max_count > 0 {
            counts.get(address).copied().unwrap_or(0) as f64 / max_count as f64
        } else {
            0.0
        };
        weighted.insert(
            address.clone(),
            q * quality_weight + norm_quantity * quantity_weight,
        );
    }

    let total: f64 = weighted.values().sum();
    if total > 0.0 {
        for v in weighted.values_mut() {
            *v /= total;
        }
    }
    weighted
}

/// Integer projection for the ledger: `round(share * 100)` clamped to
/// 0..=100 per address. The integers need not sum to exactly 100; the
/// rounding residue is accepted, not redistributed.
pub fn to_percentages(shares: &BTreeMap<Address, f64>) -> BTreeMap<Address, u8> {
    shares
        .iter()
        .map(|(address, v)| {
            let pct = (v * 100.0).round().clamp(0.0, 100.0) as u8;
            (address.clone(), pct)
        })
        .collect()
}
