use std::collections::{HashSet, VecDeque};

use uuid::Uuid;

use crate::authz::context::RequestContext;
use crate::errors::AccessResult;
use crate::store::GroupDirectory;

/// Resolves an actor's effective group memberships: direct memberships,
/// everything reachable through nested groups, and the implicit Anonymous
/// group.
#[derive(Clone)]
pub struct GroupResolver {
    directory: GroupDirectory,
}

impl GroupResolver {
    pub fn new(directory: GroupDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &GroupDirectory {
        &self.directory
    }

    /// Transitive closure over nested membership. The visited set doubles
    /// as the cycle guard: a group reached twice is a member once.
    pub async fn resolve_groups(&self, ctx: &RequestContext) -> AccessResult<HashSet<Uuid>> {
        let mut resolved: HashSet<Uuid> = HashSet::new();
        let mut queue: VecDeque<Uuid> = VecDeque::new();

        if let Some(anonymous) = self.directory.anonymous_group().await? {
            if resolved.insert(anonymous.id) {
                queue.push_back(anonymous.id);
            }
        }

        if let Some(account_id) = ctx.actor_id() {
            for group_id in self.directory.direct_groups_of_account(account_id).await? {
                if resolved.insert(group_id) {
                    queue.push_back(group_id);
                }
            }
        }

        // Membership is upward through containment: being in a child group
        // makes the actor a member of every group containing it.
        while let Some(group_id) = queue.pop_front() {
            for parent in self.directory.parent_groups_of(group_id).await? {
                if resolved.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(resolved)
    }

    pub async fn is_member(&self, ctx: &RequestContext, group_id: Uuid) -> AccessResult<bool> {
        Ok(self.resolve_groups(ctx).await?.contains(&group_id))
    }
}
