//! E2E test suite entry point.

mod add_workflow;
mod fixture;
mod sync_workflow;
mod update_workflow;
