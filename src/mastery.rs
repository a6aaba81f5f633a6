//! Mastery calculator.
//!
//! Combines five normalised factors — recent performance, response speed,
//! hint usage, consistency, and time decay — into a single 0–100 score,
//! tagged with a `MasteryResult` rather than returned as a bare number, so
//! "not enough data yet" and "something went wrong" are distinguishable
//! from a genuine score.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::curriculum::{Difficulty, GradeRange, Instant, SkillId};

/// Maximum attempt window the calculator considers.
pub const MAX_WINDOW: usize = 20;

/// A single past attempt, ordered oldest to newest in the window passed to
/// `calculate_mastery_level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    pub correct: bool,
    pub time_spent_seconds: f64,
    pub hints_used: u32,
}

/// Tagged mastery outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MasteryResult {
    Success { level: f64 },
    InsufficientData { level: f64, reason: String },
    Error { reason: String },
}

impl MasteryResult {
    /// The numeric level, if the result carries one (`Error` does not).
    pub fn level(&self) -> Option<f64> {
        match self {
            MasteryResult::Success { level } | MasteryResult::InsufficientData { level, .. } => {
                Some(*level)
            }
            MasteryResult::Error { .. } => None,
        }
    }
}

/// UI-facing classification of a numeric mastery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryBand {
    Introduced,
    Developing,
    Progressing,
    Proficient,
    Mastered,
}

/// Classifies a 0–100 score into its band. `level` is clamped into
/// `[0, 100]` first so a slightly out-of-range caller value doesn't panic
/// or silently fall through.
pub fn mastery_band(level: f64) -> MasteryBand {
    let level = level.clamp(0.0, 100.0);
    match level as u32 {
        0..=20 => MasteryBand::Introduced,
        21..=40 => MasteryBand::Developing,
        41..=60 => MasteryBand::Progressing,
        61..=80 => MasteryBand::Proficient,
        _ => MasteryBand::Mastered,
    }
}

struct Benchmark {
    min: f64,
    expected: f64,
    max: f64,
}

/// Response-time benchmark table by grade range × difficulty.
fn benchmark(grade: GradeRange, difficulty: Difficulty) -> Benchmark {
    let (min, expected, max) = match (grade, difficulty) {
        (GradeRange::Early, Difficulty::A) => (15.0, 30.0, 60.0),
        (GradeRange::Early, Difficulty::B) => (20.0, 45.0, 90.0),
        (GradeRange::Early, Difficulty::C) => (30.0, 60.0, 120.0),
        (GradeRange::Middle, Difficulty::A) => (20.0, 40.0, 80.0),
        (GradeRange::Middle, Difficulty::B) => (30.0, 60.0, 120.0),
        (GradeRange::Middle, Difficulty::C) => (45.0, 90.0, 180.0),
        (GradeRange::Upper, Difficulty::A) => (30.0, 60.0, 120.0),
        (GradeRange::Upper, Difficulty::B) => (45.0, 90.0, 180.0),
        (GradeRange::Upper, Difficulty::C) => (60.0, 120.0, 240.0),
    };
    Benchmark { min, expected, max }
}

fn recent_performance_factor(attempts: &[Attempt]) -> f64 {
    let n = attempts.len();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (i, attempt) in attempts.iter().enumerate() {
        let w = (-0.1 * (n as f64 - 1.0 - i as f64)).exp();
        weighted_sum += w * if attempt.correct { 1.0 } else { 0.0 };
        weight_total += w;
    }
    if weight_total <= 0.0 {
        0.0
    } else {
        weighted_sum / weight_total
    }
}

/// Maps an average response time against the benchmark. Below the
/// benchmark's `min` reads as suspiciously fast guessing; above `expected`
/// decays linearly to a floor of 0.3 at `max` and beyond.
fn response_speed_factor(avg_seconds: f64, grade: GradeRange, difficulty: Difficulty) -> f64 {
    let b = benchmark(grade, difficulty);
    if avg_seconds < b.min {
        0.4
    } else if avg_seconds <= b.expected {
        1.0
    } else {
        let span = (b.max - b.expected).max(f64::EPSILON);
        let over = (avg_seconds - b.expected) / span;
        (1.0 - 0.7 * over).clamp(0.3, 1.0)
    }
}

fn hint_usage_factor(avg_hints_per_attempt: f64) -> f64 {
    if avg_hints_per_attempt <= 0.0 {
        1.0
    } else if avg_hints_per_attempt <= 0.5 {
        0.85
    } else if avg_hints_per_attempt <= 1.0 {
        0.75
    } else if avg_hints_per_attempt <= 2.0 {
        0.60
    } else if avg_hints_per_attempt <= 3.0 {
        0.50
    } else {
        0.40
    }
}

fn consistency_factor(attempts: &[Attempt]) -> f64 {
    let n = attempts.len();
    if n < 2 {
        return 1.0;
    }
    let values: Vec<f64> = attempts
        .iter()
        .map(|a| if a.correct { 1.0 } else { 0.0 })
        .collect();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let sigma = variance.max(0.0).sqrt();
    (1.0 - sigma / 0.5).clamp(0.0, 1.0)
}

fn time_decay_factor(days_since_last: f64) -> f64 {
    if days_since_last < 1.0 {
        1.0
    } else {
        ((-std::f64::consts::LN_2 * days_since_last / 14.0).exp()).max(0.05)
    }
}

/// Aggregate per-skill state the calculator needs beyond the attempt
/// window itself.
#[derive(Debug, Clone, Copy)]
pub struct SkillAggregate {
    pub last_practiced: Option<Instant>,
}

/// Computes a skill's mastery result from its last-up-to-20 attempts
/// (oldest first) plus aggregate state. Pure; never panics.
pub fn calculate_mastery_level(
    attempts: &[Attempt],
    aggregate: SkillAggregate,
    grade: GradeRange,
    difficulty: Difficulty,
    now: Instant,
) -> MasteryResult {
    let attempts = if attempts.len() > MAX_WINDOW {
        &attempts[attempts.len() - MAX_WINDOW..]
    } else {
        attempts
    };

    if attempts.is_empty() {
        return MasteryResult::InsufficientData {
            level: 0.0,
            reason: "no attempts".to_string(),
        };
    }

    if attempts.len() < 5 {
        let success_rate =
            attempts.iter().filter(|a| a.correct).count() as f64 / attempts.len() as f64;
        let level = (success_rate * 60.0).round();
        return MasteryResult::InsufficientData {
            level,
            reason: "<5 attempts".to_string(),
        };
    }

    let avg_seconds =
        attempts.iter().map(|a| a.time_spent_seconds).sum::<f64>() / attempts.len() as f64;
    let avg_hints =
        attempts.iter().map(|a| a.hints_used as f64).sum::<f64>() / attempts.len() as f64;
    let days_since_last = aggregate
        .last_practiced
        .map(|t| (now - t).num_milliseconds() as f64 / 86_400_000.0)
        .unwrap_or(f64::INFINITY);

    let recent = recent_performance_factor(attempts);
    let speed = response_speed_factor(avg_seconds, grade, difficulty);
    let hints = hint_usage_factor(avg_hints);
    let consistency = consistency_factor(attempts);
    let decay = time_decay_factor(days_since_last);

    let combined = 0.45 * recent + 0.20 * speed + 0.15 * hints + 0.10 * consistency + 0.10 * decay;

    if !combined.is_finite() {
        return MasteryResult::Error {
            reason: "non-finite mastery score".to_string(),
        };
    }

    let level = (combined * 100.0).round().clamp(0.0, 100.0);
    MasteryResult::Success { level }
}

/// Cache key derived from the inputs `calculate_mastery_level` is pure
/// over: per-attempt `(correct, time_spent, hints_used)` tuples plus skill
/// identity and the two timestamps. `f64`s are hashed via their bit
/// pattern so the key is exact-equality, which is what a pure-function
/// cache requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MasteryCacheKey {
    skill_id: SkillId,
    attempts: Vec<(bool, u64, u32)>,
    last_practiced_millis: Option<i64>,
    now_millis: i64,
}

impl MasteryCacheKey {
    pub fn new(
        skill_id: SkillId,
        attempts: &[Attempt],
        aggregate: SkillAggregate,
        now: Instant,
    ) -> Self {
        Self {
            skill_id,
            attempts: attempts
                .iter()
                .map(|a| (a.correct, a.time_spent_seconds.to_bits(), a.hints_used))
                .collect(),
            last_practiced_millis: aggregate.last_practiced.map(|t| t.timestamp_millis()),
            now_millis: now.timestamp_millis(),
        }
    }
}

/// Head-evicting, insertion-order-preserving LRU cache wrapping the
/// calculator. A hit moves the key to the most-recently-used end;
/// capacity overflow evicts from the head.
pub struct MasteryCache {
    capacity: usize,
    values: HashMap<MasteryCacheKey, MasteryResult>,
    order: VecDeque<MasteryCacheKey>,
}

impl MasteryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the cached result for `key`, computing and storing it via
    /// `compute` on a miss. Transparent to the caller: a cache hit and a
    /// cache miss yield the same value.
    pub fn get_or_compute(
        &mut self,
        key: MasteryCacheKey,
        compute: impl FnOnce() -> MasteryResult,
    ) -> MasteryResult {
        if let Some(result) = self.values.get(&key).cloned() {
            self.touch(&key);
            return result;
        }

        let result = compute();
        self.insert(key, result.clone());
        result
    }

    fn touch(&mut self, key: &MasteryCacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).unwrap();
            self.order.push_back(k);
        }
    }

    fn insert(&mut self, key: MasteryCacheKey, result: MasteryResult) {
        if self.values.len() >= self.capacity
            && !self.values.contains_key(&key)
            && let Some(oldest) = self.order.pop_front()
        {
            self.values.remove(&oldest);
        }
        self.values.insert(key.clone(), result);
        self.order.push_back(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(day: u32) -> Instant {
        chrono::Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    fn attempt(correct: bool, seconds: f64, hints: u32) -> Attempt {
        Attempt {
            correct,
            time_spent_seconds: seconds,
            hints_used: hints,
        }
    }

    #[test]
    fn no_attempts_is_insufficient_with_zero_level() {
        let result = calculate_mastery_level(
            &[],
            SkillAggregate { last_practiced: None },
            GradeRange::Middle,
            Difficulty::B,
            t(1),
        );
        assert_eq!(
            result,
            MasteryResult::InsufficientData {
                level: 0.0,
                reason: "no attempts".to_string()
            }
        );
    }

    #[test]
    fn few_attempts_caps_at_sixty() {
        let attempts = vec![
            attempt(true, 30.0, 0),
            attempt(true, 30.0, 0),
            attempt(true, 30.0, 0),
            attempt(true, 30.0, 0),
        ];
        let result = calculate_mastery_level(
            &attempts,
            SkillAggregate {
                last_practiced: Some(t(1)),
            },
            GradeRange::Middle,
            Difficulty::B,
            t(1),
        );
        match result {
            MasteryResult::InsufficientData { level, reason } => {
                assert_eq!(level, 60.0);
                assert_eq!(reason, "<5 attempts");
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn mastery_level_always_in_bounds() {
        let mixed: Vec<Attempt> = (0..20)
            .map(|i| attempt(i % 3 != 0, 10.0 + i as f64 * 5.0, i % 4))
            .collect();
        let result = calculate_mastery_level(
            &mixed,
            SkillAggregate {
                last_practiced: Some(t(1)),
            },
            GradeRange::Upper,
            Difficulty::C,
            t(1),
        );
        let level = result.level().unwrap();
        assert!((0.0..=100.0).contains(&level));
    }

    #[test]
    fn perfect_recent_performance_scores_high() {
        let attempts: Vec<Attempt> = (0..10).map(|_| attempt(true, 40.0, 0)).collect();
        let result = calculate_mastery_level(
            &attempts,
            SkillAggregate {
                last_practiced: Some(t(1)),
            },
            GradeRange::Middle,
            Difficulty::B,
            t(1),
        );
        match result {
            MasteryResult::Success { level } => assert!(level > 80.0),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn window_truncates_to_last_twenty() {
        let mut attempts: Vec<Attempt> = (0..10).map(|_| attempt(false, 500.0, 5)).collect();
        attempts.extend((0..20).map(|_| attempt(true, 40.0, 0)));
        assert_eq!(attempts.len(), 30);
        let result = calculate_mastery_level(
            &attempts,
            SkillAggregate {
                last_practiced: Some(t(1)),
            },
            GradeRange::Middle,
            Difficulty::B,
            t(1),
        );
        // Only the trailing 20 (all correct, fast, no hints) should count.
        match result {
            MasteryResult::Success { level } => assert!(level > 70.0),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(mastery_band(0.0), MasteryBand::Introduced);
        assert_eq!(mastery_band(20.0), MasteryBand::Introduced);
        assert_eq!(mastery_band(21.0), MasteryBand::Developing);
        assert_eq!(mastery_band(40.0), MasteryBand::Developing);
        assert_eq!(mastery_band(41.0), MasteryBand::Progressing);
        assert_eq!(mastery_band(60.0), MasteryBand::Progressing);
        assert_eq!(mastery_band(61.0), MasteryBand::Proficient);
        assert_eq!(mastery_band(80.0), MasteryBand::Proficient);
        assert_eq!(mastery_band(81.0), MasteryBand::Mastered);
        assert_eq!(mastery_band(100.0), MasteryBand::Mastered);
    }

    #[test]
    fn hint_usage_piecewise() {
        assert_eq!(hint_usage_factor(0.0), 1.0);
        assert_eq!(hint_usage_factor(0.5), 0.85);
        assert_eq!(hint_usage_factor(1.0), 0.75);
        assert_eq!(hint_usage_factor(2.0), 0.60);
        assert_eq!(hint_usage_factor(3.0), 0.50);
        assert_eq!(hint_usage_factor(4.0), 0.40);
    }

    #[test]
    fn response_speed_guessing_penalty() {
        let fast = response_speed_factor(5.0, GradeRange::Middle, Difficulty::B);
        assert_eq!(fast, 0.4);
        let ideal = response_speed_factor(45.0, GradeRange::Middle, Difficulty::B);
        assert_eq!(ideal, 1.0);
        let slow = response_speed_factor(120.0, GradeRange::Middle, Difficulty::B);
        assert_eq!(slow, 0.3);
    }

    #[test]
    fn time_decay_recent_is_full() {
        assert_eq!(time_decay_factor(0.5), 1.0);
        assert!(time_decay_factor(14.0) < 1.0);
        assert!(time_decay_factor(14.0) > 0.4);
        assert!(time_decay_factor(1000.0) >= 0.05);
    }

    #[test]
    fn cache_is_transparent() {
        let attempts: Vec<Attempt> = (0..10).map(|_| attempt(true, 40.0, 0)).collect();
        let aggregate = SkillAggregate {
            last_practiced: Some(t(1)),
        };
        let key = MasteryCacheKey::new(SkillId::new("s1"), &attempts, aggregate, t(1));

        let mut cache = MasteryCache::new(2);
        let mut calls = 0;
        let first = cache.get_or_compute(key.clone(), || {
            calls += 1;
            calculate_mastery_level(&attempts, aggregate, GradeRange::Middle, Difficulty::B, t(1))
        });
        let second = cache.get_or_compute(key, || {
            calls += 1;
            calculate_mastery_level(&attempts, aggregate, GradeRange::Middle, Difficulty::B, t(1))
        });
        assert_eq!(first, second);
        assert_eq!(calls, 1);
    }

    #[test]
    fn cache_evicts_oldest_beyond_capacity() {
        let mut cache = MasteryCache::new(2);
        let aggregate = SkillAggregate {
            last_practiced: Some(t(1)),
        };
        let attempts: Vec<Attempt> = vec![attempt(true, 40.0, 0)];

        for i in 0..3 {
            let key = MasteryCacheKey::new(SkillId::new(format!("s{i}")), &attempts, aggregate, t(1));
            cache.get_or_compute(key, || MasteryResult::Success { level: i as f64 });
        }
        assert_eq!(cache.len(), 2);
        let evicted_key = MasteryCacheKey::new(SkillId::new("s0"), &attempts, aggregate, t(1));
        assert!(!cache.values.contains_key(&evicted_key));
    }
}
