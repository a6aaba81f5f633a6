//! Spaced-repetition scheduler: an SM-2 variant.
//!
//! Pure functions taking old state + a grade + "today", returning new
//! state + a due date — ease factor, repetition count and interval only,
//! no stability or retrievability curve.

use serde::{Deserialize, Serialize};

use crate::curriculum::{Instant, SkillId};

pub const EASE_MIN: f64 = 1.3;
pub const EASE_MAX: f64 = 3.0;

/// Per-skill SM-2 state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrsParams {
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetition_count: u32,
}

impl Default for SrsParams {
    fn default() -> Self {
        Self {
            ease_factor: 2.5,
            interval_days: 1,
            repetition_count: 0,
        }
    }
}

/// Outcome of advancing `SrsParams` by one review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewOutcome {
    pub params: SrsParams,
    pub next_review: Instant,
}

/// Maps (correctness, response-quality-factor) onto the 6-point SM-2
/// quality scale. `quality` is clamped to `[0, 1]` before thresholding,
/// so out-of-range inputs degrade to the nearest boundary rather than
/// panicking.
pub fn calculate_quality_score(correct: bool, quality: f64) -> u8 {
    let quality = quality.clamp(0.0, 1.0);
    match (correct, quality) {
        (true, q) if q > 0.66 => 5,
        (true, q) if q > 0.33 => 4,
        (true, _) => 3,
        (false, q) if q > 0.66 => 2,
        (false, q) if q > 0.33 => 1,
        (false, _) => 0,
    }
}

/// Advances `params` given a raw correctness + quality-factor pair,
/// deriving `q` via `calculate_quality_score`.
pub fn update(params: SrsParams, correct: bool, quality: f64, now: Instant) -> ReviewOutcome {
    let q = calculate_quality_score(correct, quality);
    update_with_quality(params, q, now)
}

/// Advances `params` given an already-computed SM-2 quality score. Exposed
/// separately so callers that already have `q` (tests, alternate grading
/// UIs) don't have to reverse-engineer a `(correct, quality)` pair.
pub fn update_with_quality(params: SrsParams, q: u8, now: Instant) -> ReviewOutcome {
    let q = q.min(5) as f64;

    let delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
    let mut ease_factor = (params.ease_factor + delta).clamp(EASE_MIN, EASE_MAX);

    let (repetition_count, interval_days) = if q >= 3.0 {
        let repetition_count = params.repetition_count + 1;
        let interval_days = match repetition_count {
            1 => 1,
            2 => 3,
            _ => {
                let prev = params.interval_days as f64;
                (prev * ease_factor).round().max(1.0) as u32
            }
        };
        (repetition_count, interval_days)
    } else {
        ease_factor = (ease_factor - 0.2).max(EASE_MIN);
        (0, 1)
    };

    let params = SrsParams {
        ease_factor,
        interval_days,
        repetition_count,
    };

    ReviewOutcome {
        params,
        next_review: now + chrono::Duration::days(interval_days as i64),
    }
}

/// `now >= next_review`.
pub fn is_due(next_review: Instant, now: Instant) -> bool {
    now >= next_review
}

/// Weighted urgency scalar for ranking review candidates.
///
/// `days_overdue` is the 24-hour-exact difference between `now` and
/// `next_review`; negative values (not yet due) clamp to 0 inside the
/// formula so not-due skills never score higher than just-due ones.
pub fn priority(params: SrsParams, next_review: Instant, mastery_level: f64, now: Instant) -> f64 {
    let days_overdue = (now - next_review).num_milliseconds() as f64 / 86_400_000.0;
    let overdue_term = 0.5 * days_overdue.max(0.0) * 2.0;
    let ease_term = 0.3 * (EASE_MAX - params.ease_factor) / (EASE_MAX - EASE_MIN);
    let mastery_term = 0.2 * (100.0 - mastery_level.clamp(0.0, 100.0)) / 100.0;
    overdue_term + ease_term + mastery_term
}

/// A review candidate, ranked by descending priority with skill_id as the
/// deterministic tiebreak.
#[derive(Debug, Clone)]
pub struct ReviewCandidate {
    pub skill_id: SkillId,
    pub priority: f64,
    pub mastery_level: f64,
}

/// Filters to due skills and sorts by descending priority, ties broken by
/// ascending skill_id.
pub fn rank_due_candidates(
    candidates: impl IntoIterator<Item = (SkillId, SrsParams, Instant, f64)>,
    now: Instant,
) -> Vec<ReviewCandidate> {
    let mut due: Vec<ReviewCandidate> = candidates
        .into_iter()
        .filter(|(_, _, next_review, _)| is_due(*next_review, now))
        .map(|(skill_id, params, next_review, mastery_level)| ReviewCandidate {
            priority: priority(params, next_review, mastery_level, now),
            skill_id,
            mastery_level,
        })
        .collect();

    due.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(day: u32) -> Instant {
        chrono::Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn quality_score_boundaries() {
        assert_eq!(calculate_quality_score(true, 0.0), 3);
        assert_eq!(calculate_quality_score(true, 1.0), 5);
        assert_eq!(calculate_quality_score(false, 0.0), 0);
        assert_eq!(calculate_quality_score(false, 1.0), 2);
        // Out of range clamps rather than panicking.
        assert_eq!(calculate_quality_score(true, 5.0), 5);
        assert_eq!(calculate_quality_score(false, -5.0), 0);
    }

    #[test]
    fn srs_round_trip() {
        let mut params = SrsParams::default();
        let mut now = t(1);
        let outcome = update(params, true, 0.8, now);
        assert_eq!(outcome.params.interval_days, 1);
        assert_eq!(outcome.params.repetition_count, 1);
        params = outcome.params;
        now = outcome.next_review;

        let outcome = update(params, true, 0.8, now);
        assert_eq!(outcome.params.interval_days, 3);
        assert_eq!(outcome.params.repetition_count, 2);
        let ef_after_second = outcome.params.ease_factor;
        params = outcome.params;
        now = outcome.next_review;

        let outcome = update(params, true, 0.8, now);
        assert_eq!(outcome.params.repetition_count, 3);
        assert_eq!(
            outcome.params.interval_days,
            (3.0 * ef_after_second).round().max(1.0) as u32
        );
    }

    #[test]
    fn srs_full_sequence_grows_intervals() {
        let mut params = SrsParams::default();
        let mut now = t(1);
        let mut intervals = Vec::new();
        for _ in 0..10 {
            let outcome = update(params, true, 0.8, now);
            intervals.push(outcome.params.interval_days);
            params = outcome.params;
            now = outcome.next_review;
        }
        assert_eq!(params.repetition_count, 10);
        assert!(params.ease_factor >= 2.0 && params.ease_factor <= 3.0);
        // Intervals grow monotonically from 1.
        for w in intervals.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert_eq!(intervals[0], 1);
        assert_eq!(intervals[1], 3);
    }

    #[test]
    fn srs_forgetting_resets_interval_and_penalizes_ease() {
        let params = SrsParams {
            ease_factor: 2.5,
            interval_days: 30,
            repetition_count: 5,
        };
        let now = t(1);
        let outcome = update(params, false, 0.2, now);
        assert_eq!(outcome.params.interval_days, 1);
        assert_eq!(outcome.params.repetition_count, 0);
        assert!((outcome.params.ease_factor - 2.3).abs() < 1e-9);
        assert_eq!(outcome.next_review, now + chrono::Duration::days(1));
    }

    #[test]
    fn incorrect_update_always_resets() {
        for ef in [1.3, 1.8, 2.5, 3.0] {
            for interval in [1, 5, 100] {
                let params = SrsParams {
                    ease_factor: ef,
                    interval_days: interval,
                    repetition_count: 7,
                };
                let outcome = update_with_quality(params, 1, t(1));
                assert_eq!(outcome.params.interval_days, 1);
                assert_eq!(outcome.params.repetition_count, 0);
            }
        }
    }

    #[test]
    fn ease_factor_always_in_bounds() {
        let mut params = SrsParams::default();
        let mut now = t(1);
        for _ in 0..50 {
            let outcome = update(params, true, 1.0, now);
            assert!(outcome.params.ease_factor <= EASE_MAX);
            assert!(outcome.params.ease_factor >= EASE_MIN);
            params = outcome.params;
            now = outcome.next_review;
        }
        let mut params = SrsParams::default();
        let mut now = t(1);
        for _ in 0..50 {
            let outcome = update(params, false, 0.0, now);
            assert!(outcome.params.ease_factor <= EASE_MAX);
            assert!(outcome.params.ease_factor >= EASE_MIN);
            params = outcome.params;
            now = outcome.next_review;
        }
    }

    #[test]
    fn interval_never_below_one() {
        let params = SrsParams {
            ease_factor: 1.3,
            interval_days: 1,
            repetition_count: 10,
        };
        let outcome = update_with_quality(params, 3, t(1));
        assert!(outcome.params.interval_days >= 1);
    }

    #[test]
    fn is_due_boundary() {
        let now = t(10);
        assert!(is_due(now, now));
        assert!(is_due(t(9), now));
        assert!(!is_due(t(11), now));
    }

    #[test]
    fn priority_ranks_more_overdue_higher() {
        let params = SrsParams::default();
        let now = t(10);
        let p_overdue = priority(params, t(5), 50.0, now);
        let p_just_due = priority(params, t(10), 50.0, now);
        assert!(p_overdue > p_just_due);
    }

    #[test]
    fn priority_not_due_clamps_overdue_term() {
        let params = SrsParams::default();
        let now = t(1);
        let p_future = priority(params, t(20), 50.0, now);
        let p_today = priority(params, t(1), 50.0, now);
        assert!(p_future <= p_today);
    }

    #[test]
    fn rank_due_candidates_orders_and_breaks_ties() {
        let now = t(10);
        let params = SrsParams::default();
        let candidates = vec![
            (SkillId::new("zeta"), params, t(5), 50.0),
            (SkillId::new("alpha"), params, t(5), 50.0),
            (SkillId::new("future"), params, t(20), 50.0),
        ];
        let ranked = rank_due_candidates(candidates, now);
        assert_eq!(ranked.len(), 2);
        // Equal priority -> lexical tiebreak.
        assert_eq!(ranked[0].skill_id, SkillId::new("alpha"));
        assert_eq!(ranked[1].skill_id, SkillId::new("zeta"));
    }
}
