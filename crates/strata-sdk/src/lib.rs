//! # strata-sdk
//!
//! Public SDK for using strata as a Rust library.
//!
//! Provides three main entry points:
//! - [`load_manifest`](loader::load_manifest): Reads a YAML or JSON stack manifest.
//! - [`StackBuilder`](builder::StackBuilder): Fluent API for assembling a composition in code.
//! - [`StackResolver`](graph_resolver::StackResolver): Resolves, instantiates, and synthesizes a stack.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_sdk::graph_resolver::StackResolver;
//!
//! let resolver = StackResolver::load(std::path::Path::new("strata.yaml"))?;
//! let synthesis = resolver.synthesize()?;
//! println!("{}", synthesis.to_json()?);
//! # Ok::<(), strata_common::error::StrataError>(())
//! ```

pub mod builder;
pub mod graph_resolver;
pub mod loader;
