//! Slot inventory helpers

use crate::domain::booking::ChargingMode;

/// `A1..=An` for AC, `D1..=Dn` for DC. Deterministic for a given count.
pub fn generate_slot_ids(mode: ChargingMode, count: u32) -> Vec<String> {
    (1..=count)
        .map(|i| format!("{}{}", mode.slot_prefix(), i))
        .collect()
}

/// Identifiers present in `before` but not in `after`.
pub fn removed_slot_ids(before: &[String], after: &[String]) -> Vec<String> {
    before
        .iter()
        .filter(|s| !after.contains(s))
        .cloned()
        .collect()
}
