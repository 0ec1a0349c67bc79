//! Domain model for the membership graph and daily absence facts.
//!
//! # Responsibility
//! - Define canonical data structures used by reconciliation and reporting.
//! - Keep identity (`StudentId`, `ClassId`) separate from display names.
//!
//! # Invariants
//! - A student's grade is never stored on the student; it is derived through
//!   the administrative class the student belongs to.
//! - Absence facts are created and destroyed, never updated in place.

pub mod attendance;
pub mod roster;
