//! Session composer.
//!
//! Orchestrates the scheduler, mastery calculator and registry into a
//! single pure function, `compose_session`, that partitions skills into
//! four categories, asks the registry to pick templates for each, and
//! interleaves the result into one balanced, shuffled session plan.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::curriculum::{CompetencyArea, GradeRange, Instant, SkillId, SkillProgress};
use crate::error::InvalidConfig;
use crate::registry::{FindCriteria, SelectionWeights, TemplateId, TemplateRegistry};
use crate::rng::RngSource;
use crate::scheduler;

/// Balance of the four categories a session should draw from, plus the
/// total number of exercises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionCompositionConfig {
    pub new_content_percent: i64,
    pub review_content_percent: i64,
    pub weak_area_percent: i64,
    pub random_percent: i64,
    pub total_exercises: u32,
}

/// Thresholds that decide which skills count as "new" for a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewContentCriteria {
    pub max_attempts: u32,
    pub min_days_since_last_practice: f64,
}

/// Thresholds that decide which skills count as a "weak area".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeakAreaCriteria {
    pub max_mastery_level: f64,
    pub min_attempts: u32,
}

/// Which of the four practice categories an exercise was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    New,
    Review,
    WeakArea,
    Random,
}

const ALL_CATEGORIES: [Category; 4] = [
    Category::New,
    Category::Review,
    Category::WeakArea,
    Category::Random,
];

/// The four category counts a plan was built from. Always sums to
/// `total_exercises`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub new: u32,
    pub review: u32,
    pub weak_area: u32,
    pub random: u32,
}

impl Allocation {
    pub fn total(&self) -> u32 {
        self.new + self.review + self.weak_area + self.random
    }

    fn get(&self, category: Category) -> u32 {
        match category {
            Category::New => self.new,
            Category::Review => self.review,
            Category::WeakArea => self.weak_area,
            Category::Random => self.random,
        }
    }
}

/// One exercise placed into a session plan, tagged with the category and
/// skill it was selected for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub template_id: TemplateId,
    pub category: Category,
    pub skill_id: SkillId,
    pub position: usize,
}

/// A composed practice session: the config it was built from, its
/// category allocation, and the ordered, positioned exercises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPlan {
    pub user_id: String,
    pub grade_range: GradeRange,
    pub competency_area_id: Option<CompetencyArea>,
    pub config: SessionCompositionConfig,
    pub allocation: Allocation,
    pub exercises: Vec<PlannedExercise>,
    pub composed_at: Instant,
}

/// Tagged composer outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionCompositionResult {
    Success { plan: SessionPlan },
    InsufficientData {
        message: String,
        available: usize,
        requested: usize,
    },
    Error { message: String },
}

/// Inputs to `compose_session`. Borrows everything; mutates nothing except
/// (through `rng`) the injected randomness source's internal state.
pub struct ComposeOptions<'a> {
    pub user_id: String,
    pub grade_range: GradeRange,
    pub competency_area_id: Option<CompetencyArea>,
    pub config: SessionCompositionConfig,
    pub new_content_criteria: NewContentCriteria,
    pub weak_area_criteria: WeakAreaCriteria,
    pub skills: &'a [SkillProgress],
    pub registry: &'a TemplateRegistry,
    pub now: Instant,
    pub rng: &'a mut dyn RngSource,
}

/// Category-specific weight profiles.
fn weights_for(category: Category) -> SelectionWeights {
    match category {
        Category::Review => SelectionWeights {
            srs_baseline: 1.5,
            binding_bonus: 0.4,
            recency_penalty: 0.5,
            mastery_adjustment: 0.2,
        },
        Category::WeakArea => SelectionWeights {
            srs_baseline: 1.0,
            binding_bonus: 0.4,
            recency_penalty: 0.3,
            mastery_adjustment: 0.3,
        },
        Category::New => SelectionWeights {
            srs_baseline: 1.0,
            binding_bonus: 0.3,
            recency_penalty: 0.4,
            mastery_adjustment: 0.1,
        },
        Category::Random => SelectionWeights {
            srs_baseline: 1.0,
            binding_bonus: 0.2,
            recency_penalty: 0.3,
            mastery_adjustment: 0.0,
        },
    }
}

/// Percentages must fall in `[0, 100]`, sum to `100 ± 1`, and the total
/// exercise count must fall in `[5, 100]`.
fn validate_config(config: &SessionCompositionConfig) -> Result<(), InvalidConfig> {
    for pct in [
        config.new_content_percent,
        config.review_content_percent,
        config.weak_area_percent,
        config.random_percent,
    ] {
        if !(0..=100).contains(&pct) {
            return Err(InvalidConfig::PercentOutOfRange(pct));
        }
    }
    let sum = config.new_content_percent
        + config.review_content_percent
        + config.weak_area_percent
        + config.random_percent;
    if !(99..=101).contains(&sum) {
        return Err(InvalidConfig::PercentSumMismatch(sum));
    }
    if !(5..=100).contains(&config.total_exercises) {
        return Err(InvalidConfig::TotalOutOfRange(config.total_exercises));
    }
    Ok(())
}

/// Floors each ideal count, then reconciles the floor sum against
/// `total_exercises`: a shortfall is distributed to the categories with
/// the largest fractional part first, an overshoot (percentages summing
/// to 101 can floor to more than the total) is trimmed from the
/// categories with the smallest fractional part first. Either way the
/// four counts sum exactly to `total_exercises`.
fn compute_allocation(config: &SessionCompositionConfig) -> Allocation {
    let total = config.total_exercises as i64;
    let percents = [
        ("new", config.new_content_percent as f64),
        ("review", config.review_content_percent as f64),
        ("weak_area", config.weak_area_percent as f64),
        ("random", config.random_percent as f64),
    ];

    let ideals: Vec<(&str, f64)> = percents
        .iter()
        .map(|(name, pct)| (*name, pct / 100.0 * total as f64))
        .collect();
    let floors: Vec<(&str, i64)> = ideals
        .iter()
        .map(|(name, ideal)| (*name, ideal.floor() as i64))
        .collect();
    let fractional: Vec<(&str, f64)> = ideals
        .iter()
        .zip(floors.iter())
        .map(|((name, ideal), (_, floor))| (*name, ideal - *floor as f64))
        .collect();

    let floor_sum: i64 = floors.iter().map(|(_, f)| f).sum();
    let remainder = total - floor_sum;

    let mut counts: std::collections::HashMap<&str, i64> =
        floors.iter().map(|(name, f)| (*name, *f)).collect();

    if remainder > 0 {
        let mut order = fractional.clone();
        order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (name, _) in order.iter().take(remainder as usize) {
            *counts.get_mut(name).unwrap() += 1;
        }
    } else if remainder < 0 {
        let mut order = fractional.clone();
        order.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut to_trim = -remainder;
        while to_trim > 0 {
            for (name, _) in order.iter() {
                if to_trim == 0 {
                    break;
                }
                let count = counts.get_mut(name).unwrap();
                if *count > 0 {
                    *count -= 1;
                    to_trim -= 1;
                }
            }
        }
    }

    Allocation {
        new: counts["new"] as u32,
        review: counts["review"] as u32,
        weak_area: counts["weak_area"] as u32,
        random: counts["random"] as u32,
    }
}

fn is_new_skill(skill: &SkillProgress, criteria: &NewContentCriteria, now: Instant) -> bool {
    if skill.attempts == 0 {
        return true;
    }
    if skill.attempts < criteria.max_attempts {
        return true;
    }
    match skill.days_since_last_practiced(now) {
        Some(days) => days >= criteria.min_days_since_last_practice,
        None => true,
    }
}

fn is_weak_skill(skill: &SkillProgress, criteria: &WeakAreaCriteria) -> bool {
    skill.mastery_level <= criteria.max_mastery_level && skill.attempts >= criteria.min_attempts
}

fn rank_new(skills: &[SkillProgress], criteria: &NewContentCriteria, now: Instant) -> Vec<SkillId> {
    skills
        .iter()
        .filter(|s| is_new_skill(s, criteria, now))
        .map(|s| s.skill_id.clone())
        .collect()
}

fn rank_review(skills: &[SkillProgress], now: Instant) -> Vec<SkillId> {
    let candidates = skills
        .iter()
        .map(|s| (s.skill_id.clone(), s.srs, s.next_review, s.mastery_level));
    scheduler::rank_due_candidates(candidates, now)
        .into_iter()
        .map(|c| c.skill_id)
        .collect()
}

fn rank_weak(skills: &[SkillProgress], criteria: &WeakAreaCriteria) -> Vec<SkillId> {
    let mut weak: Vec<&SkillProgress> = skills.iter().filter(|s| is_weak_skill(s, criteria)).collect();
    weak.sort_by(|a, b| {
        a.mastery_level
            .partial_cmp(&b.mastery_level)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    weak.into_iter().map(|s| s.skill_id.clone()).collect()
}

fn mastery_of<'a>(skills: &'a [SkillProgress], skill_id: &SkillId) -> f64 {
    skills
        .iter()
        .find(|s| &s.skill_id == skill_id)
        .map(|s| s.mastery_level)
        .unwrap_or(0.0)
}

/// Cycles through `ranked_skills`, asking the registry for a template per
/// skill until `count_needed` are picked or the category is exhausted
/// (`ranked_skills.len()` consecutive misses).
#[allow(clippy::too_many_arguments)]
fn select_templates_for_category(
    category: Category,
    ranked_skills: &[SkillId],
    all_skills: &[SkillProgress],
    base: &FindCriteria,
    registry: &TemplateRegistry,
    count_needed: u32,
    used_template_ids: &mut BTreeSet<TemplateId>,
    rng: &mut dyn RngSource,
) -> Vec<PlannedExercise> {
    let mut picked = Vec::new();
    if ranked_skills.is_empty() || count_needed == 0 {
        return picked;
    }

    let weights = weights_for(category);
    let mut consecutive_failures = 0usize;
    let mut cursor = 0usize;

    while (picked.len() as u32) < count_needed && consecutive_failures < ranked_skills.len() {
        let skill_id = &ranked_skills[cursor % ranked_skills.len()];
        cursor += 1;

        let mut criteria = base.clone();
        criteria.skill_id = Some(skill_id.clone());
        criteria.exclude_template_ids = used_template_ids.clone();

        let mastery_level = mastery_of(all_skills, skill_id);
        match registry.select(&criteria, weights, mastery_level, rng) {
            Some(template_id) => {
                used_template_ids.insert(template_id.clone());
                picked.push(PlannedExercise {
                    template_id,
                    category,
                    skill_id: skill_id.clone(),
                    position: 0,
                });
                consecutive_failures = 0;
            }
            None => {
                consecutive_failures += 1;
            }
        }
    }

    tracing::debug!(?category, picked = picked.len(), requested = count_needed, "category selection complete");
    picked
}

/// Groups picked exercises by category, spaces them evenly with a small
/// random jitter, linear-probes on collision, then assigns dense final
/// positions.
fn interleave(
    grouped: Vec<(Category, Vec<PlannedExercise>)>,
    rng: &mut dyn RngSource,
) -> Vec<PlannedExercise> {
    let n: usize = grouped.iter().map(|(_, items)| items.len()).sum();
    if n == 0 {
        return Vec::new();
    }

    let mut slots: Vec<Option<PlannedExercise>> = (0..n).map(|_| None).collect();

    for (_, items) in grouped {
        let k = items.len();
        if k == 0 {
            continue;
        }
        let spacing = n as f64 / k as f64;
        let max_offset = (spacing * 0.2).floor() as i64;

        for (i, item) in items.into_iter().enumerate() {
            let base = (i as f64 * spacing).floor() as i64;
            let offset = if max_offset > 0 {
                rng.next_range((2 * max_offset + 1) as usize) as i64 - max_offset
            } else {
                0
            };
            let mut pos = (base + offset).rem_euclid(n as i64) as usize;
            while slots[pos].is_some() {
                pos = (pos + 1) % n;
            }
            slots[pos] = Some(item);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(pos, item)| {
            item.map(|mut exercise| {
                exercise.position = pos;
                exercise
            })
        })
        .collect()
}

/// Composes one balanced, shuffled practice session from the current
/// skill snapshot and a weighted template registry.
pub fn compose_session(opts: ComposeOptions<'_>) -> SessionCompositionResult {
    let ComposeOptions {
        user_id,
        grade_range,
        competency_area_id,
        config,
        new_content_criteria,
        weak_area_criteria,
        skills,
        registry,
        now,
        rng,
    } = opts;

    if let Err(err) = validate_config(&config) {
        return SessionCompositionResult::Error {
            message: err.to_string(),
        };
    }

    let allocation = compute_allocation(&config);

    let base_criteria = FindCriteria {
        competency_area_id,
        grade_range: Some(grade_range),
        ..Default::default()
    };

    let new_ranked = rank_new(skills, &new_content_criteria, now);
    let review_ranked = rank_review(skills, now);
    let weak_ranked = rank_weak(skills, &weak_area_criteria);
    let mut random_ranked: Vec<SkillId> = skills.iter().map(|s| s.skill_id.clone()).collect();
    rng.shuffle(&mut random_ranked);

    let mut used_template_ids: BTreeSet<TemplateId> = BTreeSet::new();

    let new_picked = select_templates_for_category(
        Category::New,
        &new_ranked,
        skills,
        &base_criteria,
        registry,
        allocation.new,
        &mut used_template_ids,
        rng,
    );
    let review_picked = select_templates_for_category(
        Category::Review,
        &review_ranked,
        skills,
        &base_criteria,
        registry,
        allocation.review,
        &mut used_template_ids,
        rng,
    );
    let weak_picked = select_templates_for_category(
        Category::WeakArea,
        &weak_ranked,
        skills,
        &base_criteria,
        registry,
        allocation.weak_area,
        &mut used_template_ids,
        rng,
    );
    let random_picked = select_templates_for_category(
        Category::Random,
        &random_ranked,
        skills,
        &base_criteria,
        registry,
        allocation.random,
        &mut used_template_ids,
        rng,
    );

    let total_picked =
        new_picked.len() + review_picked.len() + weak_picked.len() + random_picked.len();
    let minimum_required = (config.total_exercises as f64 * 0.5).max(5.0) as usize;

    if total_picked < minimum_required {
        return SessionCompositionResult::InsufficientData {
            message: format!(
                "only {total_picked} of {} requested exercises could be filled",
                config.total_exercises
            ),
            available: total_picked,
            requested: config.total_exercises as usize,
        };
    }

    let grouped = vec![
        (Category::New, new_picked),
        (Category::Review, review_picked),
        (Category::WeakArea, weak_picked),
        (Category::Random, random_picked),
    ];
    let exercises = interleave(grouped, rng);

    let plan = SessionPlan {
        user_id,
        grade_range,
        competency_area_id,
        config,
        allocation,
        exercises,
        composed_at: now,
    };

    SessionCompositionResult::Success { plan }
}
