//! Curriculum taxonomy value types.
//!
//! These are the leaves of the crate's dependency graph: closed-set enums
//! for competency area, grade range and difficulty, plus the opaque
//! `SkillId` string newtype every other module keys off.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock instant used throughout the core. Milliseconds-since-epoch
/// at the boundary (see `to_millis`/`from_millis`), `DateTime<Utc>`
/// internally so day arithmetic reads naturally.
pub type Instant = DateTime<Utc>;

pub fn to_millis(instant: Instant) -> i64 {
    instant.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Option<Instant> {
    DateTime::from_timestamp_millis(millis)
}

/// Opaque skill identifier. A plain string newtype rather than `String`
/// directly so the type system distinguishes it from template ids and
/// competency ids, which are also strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillId(pub String);

impl SkillId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkillId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SkillId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Closed set of 4 top-level curriculum categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetencyArea {
    NumberSense,
    Algebra,
    Geometry,
    DataAndProbability,
}

impl CompetencyArea {
    pub const ALL: [CompetencyArea; 4] = [
        CompetencyArea::NumberSense,
        CompetencyArea::Algebra,
        CompetencyArea::Geometry,
        CompetencyArea::DataAndProbability,
    ];

    pub fn id(self) -> &'static str {
        match self {
            CompetencyArea::NumberSense => "number_sense",
            CompetencyArea::Algebra => "algebra",
            CompetencyArea::Geometry => "geometry",
            CompetencyArea::DataAndProbability => "data_and_probability",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        CompetencyArea::ALL.into_iter().find(|a| a.id() == s)
    }
}

/// Closed set of 3 grade ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeRange {
    #[serde(rename = "0-3")]
    Early,
    #[serde(rename = "4-6")]
    Middle,
    #[serde(rename = "7-9")]
    Upper,
}

impl GradeRange {
    pub const ALL: [GradeRange; 3] = [GradeRange::Early, GradeRange::Middle, GradeRange::Upper];

    pub fn id(self) -> &'static str {
        match self {
            GradeRange::Early => "0-3",
            GradeRange::Middle => "4-6",
            GradeRange::Upper => "7-9",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        GradeRange::ALL.into_iter().find(|g| g.id() == s)
    }
}

/// Difficulty tier. `A` is easiest, `C` is hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    A,
    B,
    C,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::A, Difficulty::B, Difficulty::C];

    /// Numeric scale used by mastery-adjustment weighting: A=1, B=2, C=3.
    pub fn scale(self) -> f64 {
        match self {
            Difficulty::A => 1.0,
            Difficulty::B => 2.0,
            Difficulty::C => 3.0,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Difficulty::A => "A",
            Difficulty::B => "B",
            Difficulty::C => "C",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Difficulty::ALL.into_iter().find(|d| d.id() == s)
    }
}

/// Per-skill progress snapshot. Owned by the caller's progress store; the
/// core only ever borrows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillProgress {
    pub skill_id: SkillId,
    pub competency_area_id: CompetencyArea,
    pub grade_range: GradeRange,
    pub mastery_level: f64,
    pub srs: crate::scheduler::SrsParams,
    pub attempts: u32,
    pub successes: u32,
    pub avg_response_time_ms: f64,
    pub last_practiced: Option<Instant>,
    pub next_review: Instant,
}

impl SkillProgress {
    /// `successes <= attempts` invariant.
    pub fn is_consistent(&self) -> bool {
        self.successes <= self.attempts
    }

    /// 24-hour-exact days since the skill was last practiced. `None` (never
    /// practiced) reads as "infinitely overdue" by callers.
    pub fn days_since_last_practiced(&self, now: Instant) -> Option<f64> {
        self.last_practiced
            .map(|t| (now - t).num_milliseconds() as f64 / 86_400_000.0)
    }
}

/// `competency_progress` persisted shape. Built by folding a set of
/// `SkillProgress` belonging to the same competency area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyProgress {
    pub competency_area_id: CompetencyArea,
    pub grade_range: GradeRange,
    pub mastery_level: f64,
    pub total_attempts: u32,
    pub success_rate: f64,
    pub last_practiced_at: Option<Instant>,
    pub achieved_at: Option<Instant>,
}

/// Folds per-skill progress into one `competency_progress` row per
/// (competency area, grade range) pair present in `skills`. `achieved_at`
/// is set to `now` the first time mastery crosses 80, approximating "first
/// time we observed mastery >= 80" since the core has no persisted history
/// of when that threshold was actually first crossed.
pub fn roll_up_competency_progress(
    skills: &[SkillProgress],
    now: Instant,
) -> Vec<CompetencyProgress> {
    let mut groups: BTreeMap<(CompetencyArea, GradeRange), Vec<&SkillProgress>> = BTreeMap::new();
    for skill in skills {
        groups
            .entry((skill.competency_area_id, skill.grade_range))
            .or_default()
            .push(skill);
    }

    groups
        .into_iter()
        .map(|((area, grade), members)| {
            let total_attempts: u32 = members.iter().map(|s| s.attempts).sum();
            let total_successes: u32 = members.iter().map(|s| s.successes).sum();
            let success_rate = if total_attempts == 0 {
                0.0
            } else {
                total_successes as f64 / total_attempts as f64
            };
            let mastery_level =
                members.iter().map(|s| s.mastery_level).sum::<f64>() / members.len() as f64;
            let last_practiced_at = members.iter().filter_map(|s| s.last_practiced).max();
            let achieved_at = if mastery_level >= 80.0 {
                Some(now)
            } else {
                None
            };

            CompetencyProgress {
                competency_area_id: area,
                grade_range: grade,
                mastery_level,
                total_attempts,
                success_rate,
                last_practiced_at,
                achieved_at,
            }
        })
        .collect()
}
