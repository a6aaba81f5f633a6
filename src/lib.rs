//! Adaptive mathematics-practice core.
//!
//! A pure, deterministic library that decides what a learner should
//! practise next: [`scheduler`] advances per-skill spaced-repetition state,
//! [`mastery`] scores recent performance, [`registry`] holds the exercise
//! template catalog, and [`composer`] assembles the two into a balanced
//! practice session. None of these modules perform I/O; calendar time and
//! randomness are always supplied by the caller (see [`curriculum::Instant`]
//! and [`rng::RngSource`]).
//!
//! [`runner`] is the one module outside that boundary: a reference
//! debounce buffer an embedding application can use to batch the core's
//! output before writing it to real storage.

pub mod composer;
pub mod curriculum;
pub mod demo;
pub mod error;
pub mod mastery;
pub mod registry;
pub mod rng;
pub mod runner;
pub mod scheduler;

pub mod web;
