//! Resolves, instantiates, and synthesizes stacks.
//!
//! Wraps `strata-compose`'s composition and synthesis into a high-level
//! API for SDK consumers.

use std::path::Path;

use strata_common::error::Result;
use strata_compose::{Composition, Instantiation, Synthesis};

use crate::loader::load_manifest;

/// High-level resolver for a stack.
#[derive(Debug)]
pub struct StackResolver {
    composition: Composition,
}

impl StackResolver {
    /// Wraps an already-assembled composition.
    #[must_use]
    pub const fn new(composition: Composition) -> Self {
        Self { composition }
    }

    /// Loads a manifest and registers its units.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, decoding, or registration fails.
    pub fn load(path: &Path) -> Result<Self> {
        let composition = load_manifest(path)?.into_composition()?;
        tracing::info!(units = composition.units().len(), "stack loaded");
        Ok(Self::new(composition))
    }

    /// The wrapped composition.
    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Runs the dry-run checks and orders the units.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement is unsatisfied or the graph has a cycle.
    pub fn deployment_order(&self) -> Result<Vec<String>> {
        self.composition.resolve_order()
    }

    /// Instantiates every unit.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution or any template fails.
    pub fn instantiate(&self) -> Result<Instantiation> {
        self.composition.instantiate_all()
    }

    /// Instantiates every unit and packages the result.
    ///
    /// # Errors
    ///
    /// Returns an error if instantiation or fingerprinting fails.
    pub fn synthesize(&self) -> Result<Synthesis> {
        Synthesis::new(&self.composition, self.instantiate()?)
    }

    /// Renders the unit graph in Graphviz DOT format.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement is unsatisfied.
    pub fn to_dot(&self) -> Result<String> {
        Ok(self.composition.dependency_graph()?.to_dot())
    }
}

impl From<Composition> for StackResolver {
    fn from(composition: Composition) -> Self {
        Self::new(composition)
    }
}
