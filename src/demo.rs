//! A small in-memory catalog used by the CLI and web demonstration
//! harnesses (`main.rs`, `web.rs`). Not part of the core: a real
//! embedding supplies its own templates and progress store.

use chrono::{Duration, Utc};

use crate::curriculum::{CompetencyArea, GradeRange, SkillId, SkillProgress};
use crate::registry::{ExerciseInstance, TemplateHandle, TemplateMetadataInput, TemplateRegistry};
use crate::scheduler::SrsParams;

const HINTS: [&str; 4] = [
    "Try breaking the problem into smaller steps.",
    "Check your units before computing.",
    "Estimate the answer first, then compute exactly.",
    "Re-read the question for what it's actually asking.",
];

struct DemoTemplate {
    answer: String,
}

impl TemplateHandle for DemoTemplate {
    fn generate(&self, seed: u64, locale: &str) -> ExerciseInstance {
        ExerciseInstance {
            instance_id: uuid::Uuid::new_v4().to_string(),
            prompt: format!("demo exercise (seed={seed})"),
            locale: locale.to_string(),
            seed,
        }
    }

    fn validate(&self, answer: &str) -> bool {
        answer == self.answer
    }

    fn hint_count(&self) -> usize {
        HINTS.len()
    }

    fn hint(&self, index: usize) -> Option<String> {
        HINTS.get(index).map(|s| s.to_string())
    }
}

struct SkillSpec {
    id: &'static str,
    area: CompetencyArea,
    grade: GradeRange,
    attempts: u32,
    mastery: f64,
    days_since_practice: i64,
}

const SKILLS: [SkillSpec; 15] = [
    SkillSpec { id: "add-fractions", area: CompetencyArea::NumberSense, grade: GradeRange::Middle, attempts: 0, mastery: 0.0, days_since_practice: 0 },
    SkillSpec { id: "subtract-fractions", area: CompetencyArea::NumberSense, grade: GradeRange::Middle, attempts: 0, mastery: 0.0, days_since_practice: 0 },
    SkillSpec { id: "long-division", area: CompetencyArea::NumberSense, grade: GradeRange::Middle, attempts: 0, mastery: 0.0, days_since_practice: 0 },
    SkillSpec { id: "linear-equations", area: CompetencyArea::Algebra, grade: GradeRange::Middle, attempts: 18, mastery: 72.0, days_since_practice: 9 },
    SkillSpec { id: "quadratic-factoring", area: CompetencyArea::Algebra, grade: GradeRange::Middle, attempts: 22, mastery: 35.0, days_since_practice: 12 },
    SkillSpec { id: "inequalities", area: CompetencyArea::Algebra, grade: GradeRange::Middle, attempts: 15, mastery: 30.0, days_since_practice: 3 },
    SkillSpec { id: "triangle-area", area: CompetencyArea::Geometry, grade: GradeRange::Middle, attempts: 20, mastery: 65.0, days_since_practice: 6 },
    SkillSpec { id: "circle-circumference", area: CompetencyArea::Geometry, grade: GradeRange::Middle, attempts: 25, mastery: 80.0, days_since_practice: 2 },
    SkillSpec { id: "angle-pairs", area: CompetencyArea::Geometry, grade: GradeRange::Middle, attempts: 10, mastery: 38.0, days_since_practice: 20 },
    SkillSpec { id: "mean-median-mode", area: CompetencyArea::DataAndProbability, grade: GradeRange::Middle, attempts: 0, mastery: 0.0, days_since_practice: 0 },
    SkillSpec { id: "simple-probability", area: CompetencyArea::DataAndProbability, grade: GradeRange::Middle, attempts: 8, mastery: 55.0, days_since_practice: 1 },
    SkillSpec { id: "bar-graphs", area: CompetencyArea::DataAndProbability, grade: GradeRange::Middle, attempts: 0, mastery: 0.0, days_since_practice: 0 },
    SkillSpec { id: "ratios", area: CompetencyArea::NumberSense, grade: GradeRange::Middle, attempts: 30, mastery: 85.0, days_since_practice: 5 },
    SkillSpec { id: "percent-change", area: CompetencyArea::NumberSense, grade: GradeRange::Middle, attempts: 12, mastery: 42.0, days_since_practice: 15 },
    SkillSpec { id: "slope-intercept", area: CompetencyArea::Algebra, grade: GradeRange::Middle, attempts: 5, mastery: 50.0, days_since_practice: 4 },
];

/// Builds a populated registry (3 templates per skill) plus the matching
/// `SkillProgress` snapshots, for the CLI `plan` command and the web demo.
pub fn build_demo_catalog() -> (TemplateRegistry, Vec<SkillProgress>) {
    let mut registry = TemplateRegistry::new();
    let now = Utc::now();

    let mut skills = Vec::with_capacity(SKILLS.len());
    for spec in SKILLS {
        for variant in 0..3 {
            let template_id = format!("{}-v{variant}", spec.id);
            registry
                .register(
                    template_id,
                    Box::new(DemoTemplate {
                        answer: "42".to_string(),
                    }),
                    TemplateMetadataInput {
                        competency_area_id: spec.area.id().to_string(),
                        skill_id: spec.id.to_string(),
                        grade_range: spec.grade.id().to_string(),
                        difficulty: ["A", "B", "C"][variant].to_string(),
                        is_binding: variant == 0,
                        tags: vec!["practice".to_string()],
                    },
                )
                .expect("demo catalog registration is well-formed");
        }

        let last_practiced = if spec.attempts == 0 {
            None
        } else {
            Some(now - Duration::days(spec.days_since_practice))
        };
        let interval_days = if spec.attempts == 0 { 1 } else { 7 };
        skills.push(SkillProgress {
            skill_id: SkillId::new(spec.id),
            competency_area_id: spec.area,
            grade_range: spec.grade,
            mastery_level: spec.mastery,
            srs: SrsParams {
                ease_factor: 2.3,
                interval_days,
                repetition_count: if spec.attempts == 0 { 0 } else { 4 },
            },
            attempts: spec.attempts,
            successes: (spec.attempts as f64 * spec.mastery / 100.0).round() as u32,
            avg_response_time_ms: 35_000.0,
            last_practiced,
            next_review: last_practiced
                .map(|t| t + Duration::days(interval_days as i64))
                .unwrap_or(now),
        });
    }

    (registry, skills)
}
