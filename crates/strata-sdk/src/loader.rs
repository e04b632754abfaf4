//! Stack manifests: the on-disk form of a composition.
//!
//! ```yaml
//! project: { account: "123456789012", region: us-east-1, env: dev, name: shop }
//! defaults: { default_egress: deny-all }
//! units:
//!   - name: network
//!     kind: network
//!     cidr: 10.0.0.0/16
//!     subnets: [ ... ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_common::config::{ComposeConfig, ProjectContext};
use strata_common::error::{Result, StrataError};
use strata_compose::{Composition, UnitDescriptor};

/// Manifest encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// YAML, for `.yaml` and `.yml` files.
    Yaml,
    /// JSON, for `.json` files.
    Json,
}

impl ManifestFormat {
    /// Picks the format from a file extension, defaulting to YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// A decoded stack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Project identity.
    pub project: ProjectContext,
    /// Composition-wide knobs.
    #[serde(default)]
    pub defaults: ComposeConfig,
    /// Units, in any order.
    #[serde(default)]
    pub units: Vec<UnitDescriptor>,
}

impl Manifest {
    /// Registers every unit into a fresh composition.
    ///
    /// # Errors
    ///
    /// Returns the first registration error.
    pub fn into_composition(self) -> Result<Composition> {
        let mut composition = Composition::new(self.project, self.defaults);
        for unit in self.units {
            composition.register(unit)?;
        }
        Ok(composition)
    }
}

/// Decodes manifest text.
///
/// `path` only labels errors.
///
/// # Errors
///
/// Returns [`StrataError::Manifest`] if the text does not decode.
pub fn parse_manifest(content: &str, format: ManifestFormat, path: &Path) -> Result<Manifest> {
    let decoded = match format {
        ManifestFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        ManifestFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    decoded.map_err(|message| StrataError::Manifest {
        path: path.to_path_buf(),
        message,
    })
}

/// Reads and decodes a manifest, choosing the format by extension.
///
/// # Errors
///
/// Returns [`StrataError::Io`] if the file cannot be read, or
/// [`StrataError::Manifest`] if it does not decode.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    tracing::info!(path = %path.display(), "loading manifest");
    let content = std::fs::read_to_string(path).map_err(|e| StrataError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let manifest = parse_manifest(&content, ManifestFormat::from_path(path), path)?;
    tracing::debug!(units = manifest.units.len(), "manifest decoded");
    Ok(manifest)
}
