//! Edge unit: a content-delivery layer in front of a balancer or a bucket.

use serde::{Deserialize, Serialize};
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind};

use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

fn default_handle() -> String {
    "cdn".into()
}

const fn yes() -> bool {
    true
}

/// How viewers may connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocol {
    /// HTTP and HTTPS.
    AllowAll,
    /// HTTP is redirected to HTTPS.
    #[default]
    RedirectToHttps,
    /// HTTPS only.
    HttpsOnly,
}

/// Configuration of an edge unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Handle name.
    #[serde(default = "default_handle")]
    pub handle: String,
    /// Distribution or storage handle served at the edge.
    pub origin: HandleKey,
    /// Viewer protocol policy.
    #[serde(default)]
    pub viewer_protocol: ViewerProtocol,
    /// Compress responses.
    #[serde(default = "yes")]
    pub compress: bool,
    /// Object served for `/`.
    #[serde(default)]
    pub default_root_object: Option<String>,
    /// Alternate domain names.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Certificate for the aliases.
    #[serde(default)]
    pub certificate: Option<String>,
}

impl UnitTemplate for EdgeConfig {
    fn kind(&self) -> &'static str {
        "edge"
    }

    fn requires(&self) -> Vec<HandleKey> {
        vec![self.origin.clone()]
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        vec![OutputDecl::new(&self.handle, ResourceKind::Edge)]
    }

    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        let origin = inputs.get(&self.origin)?;
        let origin_kind = match origin.kind() {
            ResourceKind::Distribution => "balancer",
            ResourceKind::Storage => "bucket",
            other => {
                return Err(ctx.invalid(format!(
                    "edge origin \"{}\" is a {other} handle, expected distribution or storage",
                    self.origin
                )));
            }
        };
        if !self.aliases.is_empty() && self.certificate.is_none() {
            return Err(ctx.invalid("edge aliases need a certificate"));
        }
        let viewer_protocol = match self.viewer_protocol {
            ViewerProtocol::AllowAll => "allow-all",
            ViewerProtocol::RedirectToHttps => "redirect-to-https",
            ViewerProtocol::HttpsOnly => "https-only",
        };

        let mut handle = ResourceHandle::new(&self.handle, ResourceKind::Edge)
            .with_attribute("id", ctx.project.resource_name(&self.handle))
            .with_attribute("origin_id", origin.id())
            .with_attribute("origin_kind", origin_kind)
            .with_attribute("viewer_protocol", viewer_protocol)
            .with_attribute("compress", self.compress.to_string());
        // Private buckets are read through an origin access identity.
        if origin.attribute("block_public_access") == Some("true") {
            handle = handle.with_attribute(
                "origin_access_identity",
                ctx.project.resource_name(&format!("oai-{}", self.handle)),
            );
        }
        if let Some(domain) = origin.attribute("domain") {
            handle = handle.with_attribute("origin_domain", domain);
        }
        if let Some(root) = &self.default_root_object {
            handle = handle.with_attribute("default_root_object", root);
        }
        if !self.aliases.is_empty() {
            handle = handle.with_attribute("aliases", self.aliases.join(","));
        }
        if let Some(certificate) = &self.certificate {
            handle = handle.with_attribute("certificate", certificate);
        }
        Ok(vec![handle])
    }
}
