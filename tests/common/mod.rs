//! Common test utilities and fixtures for tucache integration tests
//!
//! This module provides:
//! - `TestRepo` builder for creating C/C++ source trees on disk
//! - `ScriptedEngine`, a parsing engine that blocks and fails on demand

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod scripted_engine;
pub mod test_repo;

pub use scripted_engine::{EngineCall, Gate, ScriptedEngine, ScriptedUnit};
pub use test_repo::TestRepo;
