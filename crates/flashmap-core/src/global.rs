//! Process-wide registry
//!
//! Hosted tools that talk to a single board can install its registry once
//! and reach it from anywhere afterwards.

use once_cell::sync::OnceCell;

use crate::registry::Registry;

static REGISTRY: OnceCell<Registry> = OnceCell::new();

/// Install the process-wide registry
///
/// Only the first call succeeds. Later calls hand their registry back
/// unchanged.
pub fn install(registry: Registry) -> Result<&'static Registry, Registry> {
    match REGISTRY.try_insert(registry) {
        Ok(installed) => {
            log::info!("Installed flash map with {} areas", installed.len());
            Ok(installed)
        }
        Err((_, rejected)) => {
            log::warn!("Flash map already installed");
            Err(rejected)
        }
    }
}

/// The process-wide registry, if one was installed
pub fn registry() -> Option<&'static Registry> {
    REGISTRY.get()
}
