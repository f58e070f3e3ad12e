//! Authorization gate.
//!
//! # Responsibilities
//! - Run every auth service against the request credential
//! - Combine the verdicts (all must accept)
//! - Resolve the user through the first registered auth service
//!
//! # Design Decisions
//! - No auth services means every request is authorized
//! - Checks run concurrently, each on its own task, so one slow or failing
//!   service never keeps the others from running
//! - The first rejection answers the request; remaining checks are detached
//!   and allowed to finish, not aborted
//! - A missing credential or a panicking check fails closed

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;

use crate::services::AuthService;

/// Whether every service in `services` accepts `credential`.
pub async fn authorize(services: &[Arc<dyn AuthService>], credential: Option<&str>) -> bool {
    if services.is_empty() {
        return true;
    }
    let Some(credential) = credential else {
        tracing::debug!("No credential sent to authenticated router");
        return false;
    };

    let mut checks = JoinSet::new();
    for service in services {
        let service = Arc::clone(service);
        let credential = credential.to_string();
        checks.spawn(async move { service.authorize(&credential).await });
    }

    while let Some(verdict) = checks.join_next().await {
        match verdict {
            Ok(true) => {}
            Ok(false) => {
                checks.detach_all();
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "Auth service check failed to complete");
                checks.detach_all();
                return false;
            }
        }
    }
    true
}

/// User data from the first auth service, if there is one and a credential.
pub async fn resolve_user(
    services: &[Arc<dyn AuthService>],
    credential: Option<&str>,
) -> Option<Value> {
    match (services.first(), credential) {
        (Some(first), Some(credential)) => first.resolve_user(credential).await,
        _ => None,
    }
}
