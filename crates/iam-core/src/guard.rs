//! Last-administrator protection.
//!
//! A provisioned resource must always keep at least one holder of its
//! administrative relation. Resources whose organization never finished
//! provisioning (RGS or REQ) may lose their only administrator.

use std::sync::Arc;

use iam_org::Status;
use iam_rbac::ResourceRef;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{IamError, IamResult};
use crate::graph::RelationshipGraph;

/// Blocks removals that would leave a resource without an administrator.
#[derive(Clone)]
pub struct LastAdminGuard {
    graph: Arc<dyn RelationshipGraph>,
}

impl LastAdminGuard {
    /// Create a guard over `graph`.
    pub fn new(graph: Arc<dyn RelationshipGraph>) -> Self {
        Self { graph }
    }

    /// Whether `user_id` is the only holder of the resource's admin relation.
    pub async fn is_last_admin(&self, resource: ResourceRef, user_id: Uuid) -> IamResult<bool> {
        let admins = self
            .graph
            .get_resource_relationships(resource, resource.kind.admin_role())
            .await?;
        Ok(admins.len() == 1 && admins[0].user_id == user_id)
    }

    /// Fail with [`IamError::Conflict`] when removing `user_id` would leave a
    /// provisioned resource without an administrator.
    #[instrument(skip(self), fields(resource = %resource, user_id = %user_id, org_status = %org_status))]
    pub async fn check_removal_allowed(
        &self,
        resource: ResourceRef,
        user_id: Uuid,
        org_status: Status,
    ) -> IamResult<()> {
        if !org_status.is_provisioned() {
            debug!("Organization not provisioned, removal allowed");
            return Ok(());
        }
        if self.is_last_admin(resource, user_id).await? {
            return Err(IamError::Conflict(format!(
                "user {} is the last administrator of {}",
                user_id, resource
            )));
        }
        Ok(())
    }
}
