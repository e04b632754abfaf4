//! # strata-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire strata workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the handle, key, and context primitives
//! that the composition engine, SDK, and CLI build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
