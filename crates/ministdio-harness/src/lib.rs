//! Conformance harness for ministdio.
//!
//! This crate provides:
//! - Live-descriptor checks: the attachment property matrix executed
//!   against real files and pty devices
//! - JSONL reporting: one record per check plus a run summary
//! - A CLI (`harness run` / `harness list`) for CI wiring

#![forbid(unsafe_code)]

pub mod checks;
pub mod fixtures;
pub mod report;

pub use checks::{Check, all_checks, run_all, run_named};
pub use report::{CheckRecord, Outcome, RunSummary};
