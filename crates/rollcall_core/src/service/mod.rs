//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into roster, submission and report APIs.
//! - Keep CLI and other front ends decoupled from storage details.

pub mod attendance_service;
pub mod report_service;
pub mod roster_service;
