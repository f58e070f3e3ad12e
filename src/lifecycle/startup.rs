//! Startup orchestration.
//!
//! # Responsibilities
//! - Launch every extension on its own task
//! - Report readiness only after all of them are launched
//!
//! # Design Decisions
//! - Extensions start concurrently; none waits for another
//! - A panicking extension only ends its own task

use std::sync::Arc;

use crate::extensions::ExtensionMap;
use crate::lifecycle::shutdown::RunningExtension;
use crate::services::ServiceMap;

/// Spawn `run` for every extension.
pub fn start_extensions(services: &Arc<ServiceMap>, extensions: &Arc<ExtensionMap>) -> Vec<RunningExtension> {
    extensions
        .iter()
        .map(|(name, extension)| {
            let task = Arc::clone(extension);
            let services = Arc::clone(services);
            let all = Arc::clone(extensions);
            let handle = tokio::spawn(async move { task.run(services, all).await });
            tracing::debug!(extension = %name, "Extension started");
            RunningExtension {
                name: name.to_string(),
                handle,
            }
        })
        .collect()
}
