//! Synthesis output handed to the provisioning engine.
//!
//! The deterministic part (project, order, resources, attachments) is
//! fingerprinted with SHA-256, so two runs over the same input share a
//! fingerprint while keeping distinct run identifiers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strata_common::config::ProjectContext;
use strata_common::constants::SYNTHESIS_FORMAT_VERSION;
use strata_common::error::Result;
use strata_common::types::HandleKey;

use crate::composition::{Attachment, Composition, Instantiation};

/// One resource declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Registry key, `unit.name`.
    pub key: HandleKey,
    /// Kind tag, e.g. `subnet(private)`.
    pub kind: String,
    /// Attributes exposed by the handle.
    pub attributes: BTreeMap<String, String>,
    /// Handles the owning unit read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<HandleKey>,
}

#[derive(Serialize)]
struct Fingerprinted<'a> {
    format_version: u32,
    project: &'a ProjectContext,
    order: &'a [String],
    resources: &'a [ResourceDecl],
    attachments: &'a [Attachment],
}

/// A fully resolved stack, ready for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synthesis {
    /// Document format version.
    pub format_version: u32,
    /// Unique identifier of this run.
    pub run_id: uuid::Uuid,
    /// When the document was generated.
    pub generated_at: DateTime<Utc>,
    /// Hex SHA-256 over the deterministic content.
    pub fingerprint: String,
    /// Project the stack belongs to.
    pub project: ProjectContext,
    /// Unit instantiation order.
    pub order: Vec<String>,
    /// Every produced handle, in instantiation order.
    pub resources: Vec<ResourceDecl>,
    /// Second-phase attachments.
    pub attachments: Vec<Attachment>,
}

impl Synthesis {
    /// Packages an instantiation of `composition`.
    ///
    /// # Errors
    ///
    /// Returns [`strata_common::error::StrataError::Serialization`] if the
    /// fingerprinted content cannot be encoded.
    pub fn new(composition: &Composition, instantiation: Instantiation) -> Result<Self> {
        let resources: Vec<ResourceDecl> = instantiation
            .registry
            .iter()
            .map(|(key, handle)| ResourceDecl {
                key: key.clone(),
                kind: handle.kind().to_string(),
                attributes: handle.attributes().clone(),
                depends_on: composition
                    .unit(key.unit())
                    .map(|unit| unit.requires().into_iter().collect())
                    .unwrap_or_default(),
            })
            .collect();

        let fingerprint = fingerprint(&Fingerprinted {
            format_version: SYNTHESIS_FORMAT_VERSION,
            project: composition.project(),
            order: &instantiation.order,
            resources: &resources,
            attachments: &instantiation.attachments,
        })?;

        let synthesis = Self {
            format_version: SYNTHESIS_FORMAT_VERSION,
            run_id: uuid::Uuid::new_v4(),
            generated_at: Utc::now(),
            fingerprint,
            project: composition.project().clone(),
            order: instantiation.order,
            resources,
            attachments: instantiation.attachments,
        };
        tracing::info!(
            run_id = %synthesis.run_id,
            fingerprint = %synthesis.fingerprint,
            resources = synthesis.resources.len(),
            "synthesized stack"
        );
        Ok(synthesis)
    }

    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`strata_common::error::StrataError::Serialization`] on encoding failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn fingerprint(content: &Fingerprinted<'_>) -> Result<String> {
    let bytes = serde_json::to_vec(content)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    }))
}
