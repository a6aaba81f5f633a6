//! Template registry.
//!
//! A single struct owning its templates and indices: indices are
//! `map<key, set<template_id>>`, intersection seeds from the smallest
//! applicable set. Validation errors and the weighted, anti-repetition
//! selection are original to this module; the `thiserror`-derived error
//! enum and `tracing` instrumentation follow the same conventions used
//! for those concerns elsewhere in the crate.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::curriculum::{CompetencyArea, Difficulty, GradeRange, Instant, SkillId};
use crate::error::RegistryError;
use crate::rng::RngSource;

pub const MIN_HINT_PROVIDERS: usize = 4;
pub const MAX_RECENCY_QUEUE: usize = 20;

pub type TemplateId = String;

/// What a registered template generates when embedded. The core treats
/// this only by id; the shape here exists so the registry has something
/// concrete to store and the CLI demo has something to print.
/// `instance_id` is a fresh uuid per generation, so an embedding runner
/// can correlate an attempt record back to the exact instance it was
/// generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseInstance {
    pub instance_id: String,
    pub prompt: String,
    pub locale: String,
    pub seed: u64,
}

/// Opaque parameterised exercise generator handle. The core never
/// inspects a template beyond `hint_count`, which it uses only to
/// enforce the registration invariant; `generate`/`validate`/`hint` are
/// called by the embedding runner, never by the core itself.
pub trait TemplateHandle: Send + Sync {
    fn generate(&self, seed: u64, locale: &str) -> ExerciseInstance;
    fn validate(&self, answer: &str) -> bool;
    fn hint_count(&self) -> usize;
    fn hint(&self, index: usize) -> Option<String>;
}

/// Closed-set fields as submitted for registration, before parsing. Kept
/// stringly so `register` can surface `InvalidEnum` — a caller loading
/// templates from an external catalog format hands these over as plain
/// strings.
#[derive(Debug, Clone)]
pub struct TemplateMetadataInput {
    pub competency_area_id: String,
    pub skill_id: String,
    pub grade_range: String,
    pub difficulty: String,
    pub is_binding: bool,
    pub tags: Vec<String>,
}

/// Parsed, validated template metadata.
#[derive(Debug, Clone)]
pub struct TemplateMetadata {
    pub competency_area_id: CompetencyArea,
    pub skill_id: SkillId,
    pub grade_range: GradeRange,
    pub difficulty: Difficulty,
    pub is_binding: bool,
    pub tags: BTreeSet<String>,
}

/// A registered template plus its recency/usage bookkeeping. `weight` is
/// intentionally absent — it is derived at selection time, never stored.
pub struct TemplateRegistryEntry {
    pub handle: Box<dyn TemplateHandle>,
    pub metadata: TemplateMetadata,
    pub last_used: Option<Instant>,
    pub usage_count: u32,
}

/// Criteria for `find`/`select`. `None`/empty fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct FindCriteria {
    pub competency_area_id: Option<CompetencyArea>,
    pub skill_id: Option<SkillId>,
    pub grade_range: Option<GradeRange>,
    pub difficulty: Option<Difficulty>,
    pub is_binding: Option<bool>,
    pub tags: Vec<String>,
    pub exclude_template_ids: BTreeSet<TemplateId>,
}

/// Weight parameters for `select`.
#[derive(Debug, Clone, Copy)]
pub struct SelectionWeights {
    pub srs_baseline: f64,
    pub binding_bonus: f64,
    pub recency_penalty: f64,
    pub mastery_adjustment: f64,
}

/// Owns templates and their secondary indices. Single-writer, many-reader
/// under caller control — this struct itself does no locking; callers
/// sharing a registry across threads wrap it in a mutex.
#[derive(Default)]
pub struct TemplateRegistry {
    entries: HashMap<TemplateId, TemplateRegistryEntry>,
    by_competency: HashMap<CompetencyArea, BTreeSet<TemplateId>>,
    by_skill: HashMap<SkillId, BTreeSet<TemplateId>>,
    by_grade: HashMap<GradeRange, BTreeSet<TemplateId>>,
    by_difficulty: HashMap<Difficulty, BTreeSet<TemplateId>>,
    by_binding: HashMap<bool, BTreeSet<TemplateId>>,
    by_tag: HashMap<String, BTreeSet<TemplateId>>,
    /// Oldest at the front, most recently used at the back. Never
    /// contains a duplicate id.
    recency: VecDeque<TemplateId>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TemplateRegistryEntry> {
        self.entries.get(id)
    }

    /// Validates and registers a template, wiring it into every secondary
    /// index.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        handle: Box<dyn TemplateHandle>,
        input: TemplateMetadataInput,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RegistryError::MissingField("id"));
        }
        if self.entries.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        if input.skill_id.trim().is_empty() {
            return Err(RegistryError::MissingField("skill_id"));
        }
        if handle.hint_count() < MIN_HINT_PROVIDERS {
            return Err(RegistryError::InsufficientHints {
                required: MIN_HINT_PROVIDERS,
                found: handle.hint_count(),
            });
        }

        let competency_area_id =
            CompetencyArea::parse(&input.competency_area_id).ok_or_else(|| {
                RegistryError::InvalidEnum {
                    field: "competency_area_id",
                    value: input.competency_area_id.clone(),
                }
            })?;
        let grade_range = GradeRange::parse(&input.grade_range).ok_or_else(|| {
            RegistryError::InvalidEnum {
                field: "grade_range",
                value: input.grade_range.clone(),
            }
        })?;
        let difficulty = Difficulty::parse(&input.difficulty).ok_or_else(|| {
            RegistryError::InvalidEnum {
                field: "difficulty",
                value: input.difficulty.clone(),
            }
        })?;

        let skill_id = SkillId::new(input.skill_id);
        let tags: BTreeSet<String> = input.tags.into_iter().collect();

        self.by_competency
            .entry(competency_area_id)
            .or_default()
            .insert(id.clone());
        self.by_skill
            .entry(skill_id.clone())
            .or_default()
            .insert(id.clone());
        self.by_grade.entry(grade_range).or_default().insert(id.clone());
        self.by_difficulty
            .entry(difficulty)
            .or_default()
            .insert(id.clone());
        self.by_binding
            .entry(input.is_binding)
            .or_default()
            .insert(id.clone());
        for tag in &tags {
            self.by_tag.entry(tag.clone()).or_default().insert(id.clone());
        }

        let metadata = TemplateMetadata {
            competency_area_id,
            skill_id,
            grade_range,
            difficulty,
            is_binding: input.is_binding,
            tags,
        };

        self.entries.insert(
            id.clone(),
            TemplateRegistryEntry {
                handle,
                metadata,
                last_used: None,
                usage_count: 0,
            },
        );

        tracing::debug!(template_id = %id, "registered template");
        Ok(())
    }

    /// Removes a template and cleans up every index bucket it appeared in.
    pub fn unregister(&mut self, id: &str) -> Option<TemplateRegistryEntry> {
        let entry = self.entries.remove(id)?;

        remove_from_bucket(&mut self.by_competency, &entry.metadata.competency_area_id, id);
        remove_from_bucket(&mut self.by_skill, &entry.metadata.skill_id, id);
        remove_from_bucket(&mut self.by_grade, &entry.metadata.grade_range, id);
        remove_from_bucket(&mut self.by_difficulty, &entry.metadata.difficulty, id);
        remove_from_bucket(&mut self.by_binding, &entry.metadata.is_binding, id);
        for tag in &entry.metadata.tags {
            remove_from_bucket(&mut self.by_tag, tag, id);
        }
        self.recency.retain(|existing| existing != id);

        tracing::debug!(template_id = %id, "unregistered template");
        Some(entry)
    }

    /// Computes the intersection of applicable index sets, then subtracts
    /// `exclude_template_ids`. Seeds the intersection from the smallest
    /// applicable set.
    pub fn find(&self, criteria: &FindCriteria) -> BTreeSet<TemplateId> {
        let mut sets: Vec<&BTreeSet<TemplateId>> = Vec::new();

        if let Some(area) = criteria.competency_area_id {
            sets.push(self.by_competency.get(&area).map_or(&*EMPTY, |s| s));
        }
        if let Some(skill) = &criteria.skill_id {
            sets.push(self.by_skill.get(skill).map_or(&*EMPTY, |s| s));
        }
        if let Some(grade) = criteria.grade_range {
            sets.push(self.by_grade.get(&grade).map_or(&*EMPTY, |s| s));
        }
        if let Some(difficulty) = criteria.difficulty {
            sets.push(self.by_difficulty.get(&difficulty).map_or(&*EMPTY, |s| s));
        }
        if let Some(binding) = criteria.is_binding {
            sets.push(self.by_binding.get(&binding).map_or(&*EMPTY, |s| s));
        }
        for tag in &criteria.tags {
            sets.push(self.by_tag.get(tag).map_or(&*EMPTY, |s| s));
        }

        let mut result: BTreeSet<TemplateId> = if sets.is_empty() {
            self.entries.keys().cloned().collect()
        } else {
            sets.sort_by_key(|s| s.len());
            let mut iter = sets.into_iter();
            let mut acc = iter.next().unwrap().clone();
            for set in iter {
                acc.retain(|id| set.contains(id));
            }
            acc
        };

        for excluded in &criteria.exclude_template_ids {
            result.remove(excluded);
        }
        result
    }

    /// Weighted-random anti-repetition pick among `find(criteria)`'s
    /// results.
    pub fn select(
        &self,
        criteria: &FindCriteria,
        weights: SelectionWeights,
        mastery_level: f64,
        rng: &mut dyn RngSource,
    ) -> Option<TemplateId> {
        let candidates: Vec<TemplateId> = self.find(criteria).into_iter().collect();
        match candidates.len() {
            0 => return None,
            1 => return Some(candidates.into_iter().next().unwrap()),
            _ => {}
        }

        let computed: Vec<f64> = candidates
            .iter()
            .map(|id| self.candidate_weight(id, weights, mastery_level))
            .collect();

        let total: f64 = computed.iter().sum();
        let chosen_index = if total <= 0.0 {
            rng.next_range(candidates.len())
        } else {
            let mut target = rng.next_uniform_unit() * total;
            let mut idx = candidates.len() - 1;
            for (i, w) in computed.iter().enumerate() {
                if target < *w {
                    idx = i;
                    break;
                }
                target -= w;
            }
            idx
        };

        Some(candidates[chosen_index].clone())
    }

    fn candidate_weight(&self, id: &str, weights: SelectionWeights, mastery_level: f64) -> f64 {
        let Some(entry) = self.entries.get(id) else {
            return 0.0;
        };

        let mut weight = weights.srs_baseline;
        if entry.metadata.is_binding {
            weight += weights.binding_bonus;
        }

        if let Some(pos) = self.recency.iter().position(|r| r == id) {
            let len = self.recency.len() as f64;
            let index_from_newest = (self.recency.len() - 1 - pos) as f64;
            weight -= weights.recency_penalty * (len - index_from_newest) / len;
        }

        let optimal = 1.0 + mastery_level.clamp(0.0, 100.0) / 50.0;
        let difficulty_gap = (entry.metadata.difficulty.scale() - optimal).abs();
        weight -= weights.mastery_adjustment * difficulty_gap;

        weight.max(0.0)
    }

    /// Records a use of `id`: pushes it to the tail of the recency queue
    /// (removing any prior occurrence first), bumps `usage_count`, and
    /// stamps `last_used`. A no-op if `id` isn't registered — `mark_used`
    /// is optional and caller-controlled.
    pub fn mark_used(&mut self, id: &str, now: Instant) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.usage_count += 1;
        entry.last_used = Some(now);

        self.recency.retain(|existing| existing != id);
        self.recency.push_back(id.to_string());
        while self.recency.len() > MAX_RECENCY_QUEUE {
            self.recency.pop_front();
        }

        tracing::debug!(template_id = %id, usage_count = entry.usage_count, "marked template used");
    }

    pub fn recency_queue(&self) -> &VecDeque<TemplateId> {
        &self.recency
    }
}

static EMPTY: std::sync::LazyLock<BTreeSet<TemplateId>> = std::sync::LazyLock::new(BTreeSet::new);

fn remove_from_bucket<K: std::hash::Hash + Eq>(
    buckets: &mut HashMap<K, BTreeSet<TemplateId>>,
    key: &K,
    id: &str,
) {
    if let Some(bucket) = buckets.get_mut(key) {
        bucket.remove(id);
        if bucket.is_empty() {
            buckets.remove(key);
        }
    }
}
