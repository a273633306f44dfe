//! Shared test utilities for servicex integration tests.
//!
//! This module provides:
//! - Scripted fakes for the control plane and the result bucket
//! - `TestHarness` wiring them into an orchestrator over a temp cache
//! - Builders for requests and status snapshots

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::{FakeObjectStore, FakeStoreFactory, ScriptedControlPlane, Step};
pub use harness::TestHarness;
