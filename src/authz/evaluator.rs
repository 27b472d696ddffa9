use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::authz::context::RequestContext;
use crate::authz::resolver::GroupResolver;
use crate::errors::{AccessError, AccessResult};
use crate::models::{Action, ObjectRef, Principal, ResourceKind};
use crate::store::{ObjectStore, PolicyStore};

/// Upper bound on upward containment traversal. The real hierarchy is four
/// levels deep; anything past this indicates a corrupt parent chain.
const MAX_ANCESTOR_DEPTH: usize = 8;

/// The decision algorithm. Every permission question in the system goes
/// through here; everything that is not explicitly allowed is denied.
#[derive(Clone)]
pub struct AuthorizeService {
    policies: PolicyStore,
    objects: ObjectStore,
    resolver: GroupResolver,
}

impl AuthorizeService {
    pub fn new(policies: PolicyStore, objects: ObjectStore, resolver: GroupResolver) -> Self {
        Self {
            policies,
            objects,
            resolver,
        }
    }

    pub fn resolver(&self) -> &GroupResolver {
        &self.resolver
    }

    /// Require `action` on `object` for the current actor; error on denial.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
    ) -> AccessResult<()> {
        self.authorize_on(ctx, object, action, Utc::now().date_naive())
            .await
    }

    /// Same decision pinned to a date. Embargo tooling asks "would this be
    /// allowed on day X"; `authorize` pins to today.
    pub async fn authorize_on(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
        on: NaiveDate,
    ) -> AccessResult<()> {
        if self.allowed_on(ctx, object, action, true, on).await? {
            Ok(())
        } else {
            Err(AccessError::forbidden(format!(
                "{} denied {} on {}",
                describe_actor(ctx),
                action,
                object
            )))
        }
    }

    /// Succeed if any listed action is individually allowed; deny only when
    /// all fail.
    pub async fn authorize_any_of(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        actions: &[Action],
    ) -> AccessResult<()> {
        let on = Utc::now().date_naive();
        for action in actions {
            if self.allowed_on(ctx, object, *action, true, on).await? {
                return Ok(());
            }
        }

        let attempted: Vec<&str> = actions.iter().map(Action::as_str).collect();
        Err(AccessError::forbidden(format!(
            "{} denied all of [{}] on {}",
            describe_actor(ctx),
            attempted.join(", "),
            object
        )))
    }

    /// Boolean variant: a plain "not granted" collapses to `false`; only
    /// store failures surface as errors.
    pub async fn authorize_action_boolean(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
    ) -> AccessResult<bool> {
        self.allowed_on(ctx, object, action, true, Utc::now().date_naive())
            .await
    }

    pub async fn authorize_action_boolean_with(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
        use_inheritance: bool,
    ) -> AccessResult<bool> {
        self.allowed_on(ctx, object, action, use_inheritance, Utc::now().date_naive())
            .await
    }

    async fn allowed_on(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
        use_inheritance: bool,
        on: NaiveDate,
    ) -> AccessResult<bool> {
        // 1. Scoped bypass for trusted internal work
        if ctx.authorization_bypassed() {
            tracing::debug!(object = %object, action = %action, "authorization bypass active");
            return Ok(true);
        }

        // 2. System administrators may do anything
        if self.is_admin(ctx) {
            tracing::debug!(
                actor = %describe_actor(ctx),
                object = %object,
                action = %action,
                "system administrator bypass"
            );
            return Ok(true);
        }

        // 3. An admin grant on the object (or an ancestor) covers every action
        if action != Action::Admin
            && self
                .has_admin_grant(ctx, object, use_inheritance, on)
                .await?
        {
            tracing::debug!(
                actor = %describe_actor(ctx),
                object = %object,
                action = %action,
                "allowed via admin grant"
            );
            return Ok(true);
        }

        // 4. A matching date-valid policy for the actor or a resolved group
        if self.policy_match(ctx, object, action, on).await? {
            tracing::debug!(
                actor = %describe_actor(ctx),
                object = %object,
                action = %action,
                "policy match"
            );
            return Ok(true);
        }

        // 5. Deny
        tracing::debug!(
            actor = %describe_actor(ctx),
            object = %object,
            action = %action,
            "denied"
        );
        Ok(false)
    }

    async fn policy_match(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
        on: NaiveDate,
    ) -> AccessResult<bool> {
        let groups = self.resolver.resolve_groups(ctx).await?;
        let actor_id = ctx.actor_id();

        for policy in self.policies.for_object_action(object, action).await? {
            if !policy.is_valid_on(on) {
                continue;
            }
            match policy.principal() {
                Some(Principal::Account(account)) if Some(account) == actor_id => {
                    return Ok(true);
                }
                Some(Principal::Group(group)) if groups.contains(&group) => {
                    return Ok(true);
                }
                // inert default rows and unresolvable principals match nobody
                _ => {}
            }
        }

        Ok(false)
    }

    async fn has_admin_grant(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        use_inheritance: bool,
        on: NaiveDate,
    ) -> AccessResult<bool> {
        if self.policy_match(ctx, object, Action::Admin, on).await? {
            return Ok(true);
        }
        if !use_inheritance {
            return Ok(false);
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        seen.insert(object.id);
        let mut current = object.id;

        for _ in 0..MAX_ANCESTOR_DEPTH {
            let Some(parent) = self.objects.parent_of(current).await? else {
                break;
            };
            if !seen.insert(parent.id) {
                tracing::warn!(object = %object, "containment cycle at {}", parent);
                break;
            }
            if self.policy_match(ctx, parent, Action::Admin, on).await? {
                return Ok(true);
            }
            current = parent.id;
        }

        Ok(false)
    }

    /// System administrator: the static account flag, or an active scoped
    /// bypass on the context.
    pub fn is_admin(&self, ctx: &RequestContext) -> bool {
        ctx.authorization_bypassed() || ctx.actor().map(|a| a.is_admin).unwrap_or(false)
    }

    /// Admin over this object specifically: system admin, or an ADMIN grant
    /// on the object (or an ancestor, when inheritance is requested).
    pub async fn is_admin_of(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        use_inheritance: bool,
    ) -> AccessResult<bool> {
        if self.is_admin(ctx) {
            return Ok(true);
        }
        self.has_admin_grant(ctx, object, use_inheritance, Utc::now().date_naive())
            .await
    }

    pub async fn is_community_admin(&self, ctx: &RequestContext) -> AccessResult<bool> {
        self.holds_admin_on_kinds(ctx, &[ResourceKind::Community])
            .await
    }

    pub async fn is_collection_admin(&self, ctx: &RequestContext) -> AccessResult<bool> {
        self.holds_admin_on_kinds(ctx, &[ResourceKind::Collection])
            .await
    }

    pub async fn is_com_col_admin(&self, ctx: &RequestContext) -> AccessResult<bool> {
        self.holds_admin_on_kinds(ctx, &[ResourceKind::Community, ResourceKind::Collection])
            .await
    }

    async fn holds_admin_on_kinds(
        &self,
        ctx: &RequestContext,
        kinds: &[ResourceKind],
    ) -> AccessResult<bool> {
        if self.is_admin(ctx) {
            return Ok(true);
        }

        let groups: Vec<Uuid> = self
            .resolver
            .resolve_groups(ctx)
            .await?
            .into_iter()
            .collect();
        let policies = self
            .policies
            .admin_policies_for_kinds(kinds, ctx.actor_id(), &groups)
            .await?;

        let today = Utc::now().date_naive();
        Ok(policies.iter().any(|p| p.is_valid_on(today)))
    }

    /// Groups holding a currently-valid policy for the action on the
    /// object. The baseline the embargo synthesizer derives from.
    pub async fn get_authorized_groups(
        &self,
        object: ObjectRef,
        action: Action,
    ) -> AccessResult<Vec<Uuid>> {
        let today = Utc::now().date_naive();
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut groups: Vec<Uuid> = Vec::new();

        for policy in self.policies.for_object_action(object, action).await? {
            if !policy.is_valid_on(today) {
                continue;
            }
            if let Some(Principal::Group(group)) = policy.principal() {
                if seen.insert(group) {
                    groups.push(group);
                }
            }
        }

        Ok(groups)
    }
}

fn describe_actor(ctx: &RequestContext) -> String {
    match ctx.actor() {
        Some(account) => format!("account {}", account.id),
        None => "anonymous".to_string(),
    }
}
