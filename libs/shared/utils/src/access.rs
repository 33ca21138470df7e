use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{CallerRole, User};
use shared_models::error::AppError;

/// What a caller wants to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTarget {
    /// Slots and schedule of one provider.
    Provider(Uuid),
    /// Bookings made by one requester.
    Requester(Uuid),
    /// One appointment, visible to both parties.
    Appointment { provider_id: Uuid, requester_id: Uuid },
    /// Maintenance jobs and notification retries.
    Operations,
}

/// Authorization collaborator. The booking core trusts whatever this says.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_allowed(&self, user: &User, target: &AccessTarget) -> bool;
}

/// Admins may do anything; providers and requesters may act on their own
/// records only.
#[derive(Debug, Default, Clone)]
pub struct RoleBasedAccessPolicy;

#[async_trait]
impl AccessPolicy for RoleBasedAccessPolicy {
    async fn is_allowed(&self, user: &User, target: &AccessTarget) -> bool {
        let Some(role) = user.caller_role() else {
            return false;
        };
        if role == CallerRole::Admin {
            return true;
        }

        let caller = user.uuid();
        match target {
            AccessTarget::Provider(id) => role == CallerRole::Provider && caller == Some(*id),
            AccessTarget::Requester(id) => role == CallerRole::Requester && caller == Some(*id),
            AccessTarget::Appointment { provider_id, requester_id } => match role {
                CallerRole::Provider => caller == Some(*provider_id),
                CallerRole::Requester => caller == Some(*requester_id),
                CallerRole::Admin => true,
            },
            AccessTarget::Operations => false,
        }
    }
}

pub async fn ensure_allowed(
    policy: &dyn AccessPolicy,
    user: &User,
    target: &AccessTarget,
) -> Result<(), AppError> {
    if policy.is_allowed(user, target).await {
        Ok(())
    } else {
        debug!("Access denied for user {} on {:?}", user.id, target);
        Err(AppError::Forbidden("Not authorized to act on this resource".to_string()))
    }
}
