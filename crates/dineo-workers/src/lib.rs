// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled background workers.
//!
//! Each worker owns a `run` loop on its configured cadence and a `tick`
//! that does one pass for an explicit instant, which is what the tests
//! drive. All sends go through idempotency rows (`INSERT OR IGNORE`
//! claims or status columns) so an overlapping tick or a restart never
//! messages the same driver twice for the same slot.

pub mod checkin;
pub mod followup;
pub mod intraday;
pub mod nudge;

pub use checkin::CheckinWorker;
pub use followup::FollowupWorker;
pub use intraday::IntradayWorker;
pub use nudge::NudgeWorker;

/// Deterministic per-driver variant pick. FNV-1a over the wa_id, with a
/// salt so different sequences land different wording for the same driver.
fn variant_index(wa_id: &str, salt: u64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in wa_id.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    ((hash.wrapping_add(salt)) % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::variant_index;

    #[test]
    fn variant_is_stable_per_driver_and_shifts_with_salt() {
        let a = variant_index("27831234567", 1, 3);
        assert_eq!(a, variant_index("27831234567", 1, 3));

        let across_salts: Vec<usize> =
            (0..3).map(|s| variant_index("27831234567", s, 3)).collect();
        assert_eq!(across_salts.len(), 3);
        assert!(across_salts.windows(2).any(|w| w[0] != w[1]));

        assert_eq!(variant_index("anything", 7, 0), 0);
    }
}
