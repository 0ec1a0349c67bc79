//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the membership graph
//!   and the attendance store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Multi-statement writes run inside one IMMEDIATE transaction.
//! - Repository APIs return semantic errors (`ClassNotFound`,
//!   `StudentNotFound`) in addition to DB transport errors.

pub mod attendance_repo;
pub mod roster_repo;
