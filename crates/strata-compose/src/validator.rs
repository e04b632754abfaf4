//! Dry-run validation of registered units.
//!
//! Checks every declared requirement and attachment against the outputs
//! units promise, before any template runs.

use strata_common::error::{Result, StrataError};
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind};

use crate::registry::HandleRegistry;
use crate::unit::UnitDescriptor;

/// Validates a set of unit descriptors without constructing anything.
///
/// # Checks performed
///
/// 1. Declared outputs have addressable names and are unique per unit.
/// 2. Every required handle is declared by some unit.
/// 3. Every attachment joins one of the unit's own compute outputs to a
///    declared routing target.
///
/// Returns the scratch registry of placeholder handles so callers can
/// derive graph edges from it.
///
/// # Errors
///
/// Returns [`StrataError::HandleCollision`],
/// [`StrataError::UnsatisfiedDependency`], or
/// [`StrataError::InvalidUnitConfiguration`] for the first failing check.
pub fn validate(units: &[UnitDescriptor]) -> Result<HandleRegistry> {
    tracing::debug!(units = units.len(), "validating composition");
    let placeholders = check_declared_outputs(units)?;
    check_requirements(units, &placeholders)?;
    check_attachments(units, &placeholders)?;
    Ok(placeholders)
}

fn check_declared_outputs(units: &[UnitDescriptor]) -> Result<HandleRegistry> {
    let mut placeholders = HandleRegistry::new();
    for unit in units {
        for output in unit.produces() {
            if output.name.is_empty() || output.name.contains('.') {
                return Err(StrataError::invalid(
                    &unit.name,
                    format!(
                        "output name {:?} must be non-empty and contain no '.'",
                        output.name
                    ),
                ));
            }
            placeholders.put(
                &unit.name,
                &output.name,
                ResourceHandle::new(&output.name, output.kind),
            )?;
        }
    }
    Ok(placeholders)
}

fn resolve_kind(placeholders: &HandleRegistry, consumer: &str, key: &HandleKey) -> Result<ResourceKind> {
    match placeholders.lookup(key) {
        Ok(handle) => Ok(handle.kind()),
        Err(StrataError::UnknownHandle { key }) => Err(StrataError::UnsatisfiedDependency {
            consumer: consumer.to_string(),
            handle: key,
        }),
        Err(other) => Err(other),
    }
}

fn check_requirements(units: &[UnitDescriptor], placeholders: &HandleRegistry) -> Result<()> {
    for unit in units {
        for key in unit.requires() {
            let _ = resolve_kind(placeholders, &unit.name, &key)?;
        }
    }
    Ok(())
}

fn check_attachments(units: &[UnitDescriptor], placeholders: &HandleRegistry) -> Result<()> {
    for unit in units {
        for attachment in unit.attachments() {
            let source = HandleKey::new(&unit.name, &attachment.source);
            if resolve_kind(placeholders, &unit.name, &source)? != ResourceKind::Compute {
                return Err(StrataError::invalid(
                    &unit.name,
                    format!("attachment source \"{source}\" is not a compute handle"),
                ));
            }
            let kind = resolve_kind(placeholders, &unit.name, &attachment.target)?;
            if kind != ResourceKind::Target {
                return Err(StrataError::invalid(
                    &unit.name,
                    format!(
                        "attachment target \"{}\" is a {kind} handle, expected target",
                        attachment.target
                    ),
                ));
            }
        }
    }
    Ok(())
}
