//! skv - Skill Vendor
//!
//! Vendors agent skills (directories holding a `SKILL.md`) into a
//! repository, records their provenance and checksums in `skv.lock`, and
//! links them into each consumer tool's skills directory.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod security;
pub mod source;
pub mod test_utils;
pub mod utils;

pub use error::{Result, SkvError};
