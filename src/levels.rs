//! Skill level derivations.
//!
//! Levels are integers in `0..=10`. There are two distinct derivations and
//! they are never mixed in one computation: completion ratio (how much of the
//! planned work needing a skill got done) and the monthly commit bucket table.

use crate::types::TrendDirection;

/// Highest level either derivation can produce.
pub const MAX_LEVEL: u8 = 10;

/// `round(completed / max(total, 1) * 10)`, clamped to `0..=10`.
pub fn level_from_completion(completed: i64, total: i64) -> u8 {
    let completed = completed.max(0) as f64;
    let total = total.max(1) as f64;
    let level = (completed / total * MAX_LEVEL as f64).round();
    level.clamp(0.0, MAX_LEVEL as f64) as u8
}

/// Stepped commit-count thresholds, highest first.
const COMMIT_BUCKETS: [(i64, u8); 8] = [
    (20, 10),
    (15, 9),
    (10, 8),
    (7, 7),
    (5, 6),
    (3, 5),
    (2, 4),
    (1, 3),
];

/// Floor of the bucket table: a month with no demonstrating commits.
pub const BUCKET_FLOOR: u8 = 1;

/// Level from a month's demonstrating-commit count.
pub fn level_from_commits(commits: i64) -> u8 {
    COMMIT_BUCKETS
        .iter()
        .find(|(threshold, _)| commits >= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(BUCKET_FLOOR)
}

/// Endpoint comparison: any rise is improving, any drop declining.
pub fn classify_trend(first: u8, latest: u8) -> TrendDirection {
    if latest > first {
        TrendDirection::Improving
    } else if latest < first {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_table() {
        assert_eq!(level_from_commits(25), 10);
        assert_eq!(level_from_commits(20), 10);
        assert_eq!(level_from_commits(19), 9);
        assert_eq!(level_from_commits(15), 9);
        assert_eq!(level_from_commits(10), 8);
        assert_eq!(level_from_commits(7), 7);
        assert_eq!(level_from_commits(5), 6);
        assert_eq!(level_from_commits(3), 5);
        assert_eq!(level_from_commits(2), 4);
        assert_eq!(level_from_commits(1), 3);
        assert_eq!(level_from_commits(0), 1);
    }

    #[test]
    fn test_completion_level() {
        assert_eq!(level_from_completion(0, 0), 0);
        assert_eq!(level_from_completion(0, 4), 0);
        assert_eq!(level_from_completion(1, 4), 3);
        assert_eq!(level_from_completion(2, 3), 7);
        assert_eq!(level_from_completion(5, 5), 10);
        assert_eq!(level_from_completion(9, 5), 10);
    }

    #[test]
    fn test_trend_uses_strict_endpoints() {
        assert_eq!(classify_trend(3, 5), TrendDirection::Improving);
        assert_eq!(classify_trend(5, 3), TrendDirection::Declining);
        assert_eq!(classify_trend(4, 4), TrendDirection::Stable);
    }
}
