//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// User ID - globally unique, immutable after assignment.
///
/// # Usage:
/// - Primary key for ledger accounts
/// - Canonical lock-ordering key for multi-account operations
///   (locks are always taken in ascending `UserId` order)
pub type UserId = u64;

/// Skill ID - reference into the skill catalog.
///
/// Opaque to the escrow core; it is carried through exchange records and
/// events so collaborators can resolve it against the catalog.
pub type SkillId = u64;

/// Points - the internal currency, in whole points.
///
/// Unsigned by construction: a balance field can never go negative.
/// All arithmetic on points is checked (no overflow/underflow).
pub type Points = u64;
