use chrono::Utc;
use uuid::Uuid;

use crate::authz::context::RequestContext;
use crate::authz::evaluator::AuthorizeService;
use crate::errors::{AccessError, AccessResult};
use crate::events::{log_activity, log_activity_with_old, EventBus};
use crate::models::{
    Action, ActionFilter, ObjectRef, PolicyForm, PolicyType, Principal, ResourcePolicy,
};
use crate::store::PolicyStore;

/// Creates, copies, rewrites and bulk-deletes policies. Grant-creating
/// operations are themselves gated by the evaluator; the bulk-removal
/// family is privileged-internal (see DESIGN.md) and performs no pre-check.
#[derive(Clone)]
pub struct PolicyMutator {
    policies: PolicyStore,
    authorize: AuthorizeService,
    events: EventBus,
}

impl PolicyMutator {
    pub fn new(policies: PolicyStore, authorize: AuthorizeService, events: EventBus) -> Self {
        Self {
            policies,
            authorize,
            events,
        }
    }

    /// Creating a grant on an object requires ADD or ADMIN on that object.
    async fn require_manage(&self, ctx: &RequestContext, object: ObjectRef) -> AccessResult<()> {
        self.authorize
            .authorize_any_of(ctx, object, &[Action::Add, Action::Admin])
            .await
    }

    pub async fn add_policy(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        action: Action,
        principal: Option<Principal>,
        policy_type: Option<PolicyType>,
    ) -> AccessResult<ResourcePolicy> {
        self.require_manage(ctx, object).await?;

        if self
            .is_an_identical_policy_in_place(object, principal, action)
            .await?
        {
            return Err(AccessError::conflict(format!(
                "an identical {} policy is already in place on {}",
                action, object
            )));
        }

        let now = Utc::now();
        let (group_id, account_id) = split_principal(principal);
        let policy = ResourcePolicy {
            id: Uuid::new_v4(),
            object,
            action,
            group_id,
            account_id,
            start_date: None,
            end_date: None,
            policy_type,
            name: None,
            description: None,
            reason: None,
            created_at: now,
            updated_at: now,
        };

        self.policies.create(&policy).await?;
        log_activity(&self.events, "created", ctx.actor_id(), &policy);
        tracing::debug!(policy = %policy.id, object = %object, action = %action, "policy added");

        Ok(policy)
    }

    /// Duplicate-grant check: the exact (object, principal, action)
    /// combination already exists, regardless of dates or type.
    pub async fn is_an_identical_policy_in_place(
        &self,
        object: ObjectRef,
        principal: Option<Principal>,
        action: Action,
    ) -> AccessResult<bool> {
        self.policies
            .exists_identical(object, principal, action)
            .await
    }

    /// Copy a policy list onto `dest`, preserving action, principal and
    /// dates. The whole batch lands or none of it does.
    pub async fn add_policies(
        &self,
        ctx: &RequestContext,
        source_policies: &[ResourcePolicy],
        dest: ObjectRef,
    ) -> AccessResult<Vec<ResourcePolicy>> {
        self.require_manage(ctx, dest).await?;

        let now = Utc::now();
        let copies: Vec<ResourcePolicy> = source_policies
            .iter()
            .map(|policy| ResourcePolicy {
                id: Uuid::new_v4(),
                object: dest,
                created_at: now,
                updated_at: now,
                ..policy.clone()
            })
            .collect();

        self.policies.create_many(&copies).await?;
        for policy in &copies {
            log_activity(&self.events, "created", ctx.actor_id(), policy);
        }
        tracing::debug!(dest = %dest, count = copies.len(), "policies copied");

        Ok(copies)
    }

    /// Stamp the source object's policies onto a newly created child,
    /// tagged as inherited.
    pub async fn inherit_policies(
        &self,
        ctx: &RequestContext,
        source: ObjectRef,
        dest: ObjectRef,
    ) -> AccessResult<Vec<ResourcePolicy>> {
        let inherited: Vec<ResourcePolicy> = self
            .policies
            .for_object(source)
            .await?
            .into_iter()
            .map(|policy| ResourcePolicy {
                policy_type: Some(PolicyType::Inherited),
                ..policy
            })
            .collect();

        self.add_policies(ctx, &inherited, dest).await
    }

    /// Upsert: with `policy_id` the existing policy is rewritten from the
    /// form; without, a new one is created. Either way the write is a
    /// single atomic statement.
    pub async fn create_or_modify_policy(
        &self,
        ctx: &RequestContext,
        policy_id: Option<Uuid>,
        object: ObjectRef,
        form: &PolicyForm,
    ) -> AccessResult<ResourcePolicy> {
        self.require_manage(ctx, object).await?;

        if form.group_id.is_some() && form.account_id.is_some() {
            return Err(AccessError::bad_request(
                "a policy grants to a group or an account, not both",
            ));
        }

        let now = Utc::now();
        match policy_id {
            Some(id) => {
                let old = self
                    .policies
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AccessError::not_found(format!("policy {}", id)))?;

                let updated = ResourcePolicy {
                    id,
                    object,
                    action: form.action,
                    group_id: form.group_id,
                    account_id: form.account_id,
                    start_date: form.start_date,
                    end_date: form.end_date,
                    policy_type: form.policy_type.or(old.policy_type),
                    name: form.name.clone().or_else(|| old.name.clone()),
                    description: form.description.clone().or_else(|| old.description.clone()),
                    reason: form.reason.clone().or_else(|| old.reason.clone()),
                    created_at: old.created_at,
                    updated_at: now,
                };

                self.policies.update(&updated).await?;
                log_activity_with_old(&self.events, "updated", ctx.actor_id(), &updated, Some(&old));
                Ok(updated)
            }
            None => {
                let policy = ResourcePolicy {
                    id: Uuid::new_v4(),
                    object,
                    action: form.action,
                    group_id: form.group_id,
                    account_id: form.account_id,
                    start_date: form.start_date,
                    end_date: form.end_date,
                    policy_type: form.policy_type,
                    name: form.name.clone(),
                    description: form.description.clone(),
                    reason: form.reason.clone(),
                    created_at: now,
                    updated_at: now,
                };

                self.policies.create(&policy).await?;
                log_activity(&self.events, "created", ctx.actor_id(), &policy);
                Ok(policy)
            }
        }
    }

    pub async fn delete_policy(&self, ctx: &RequestContext, id: Uuid) -> AccessResult<()> {
        let Some(policy) = self.policies.find_by_id(id).await? else {
            return Err(AccessError::not_found(format!("policy {}", id)));
        };
        if !self.authorize.is_admin_of(ctx, policy.object, true).await? {
            return Err(AccessError::forbidden(format!(
                "removing a policy requires admin on {}",
                policy.object
            )));
        }

        self.policies.delete(id).await?;
        log_activity(&self.events, "deleted", ctx.actor_id(), &policy);
        Ok(())
    }

    // The remove_* family is privileged-internal: call sites (object
    // deletion, publication-time policy replacement, group removal) run
    // under an authorized mutation or an explicit bypass block.

    pub async fn remove_all_policies(
        &self,
        _ctx: &RequestContext,
        object: ObjectRef,
    ) -> AccessResult<u64> {
        let removed = self.policies.delete_for_object(object).await?;
        tracing::debug!(object = %object, removed, "all policies removed");
        Ok(removed)
    }

    pub async fn remove_all_policies_by_type(
        &self,
        _ctx: &RequestContext,
        object: ObjectRef,
        policy_type: PolicyType,
    ) -> AccessResult<u64> {
        let removed = self
            .policies
            .delete_for_object_by_type(object, policy_type)
            .await?;
        tracing::debug!(object = %object, policy_type = policy_type.as_str(), removed, "policies removed by type");
        Ok(removed)
    }

    pub async fn remove_all_policies_by_type_not_equal_to(
        &self,
        _ctx: &RequestContext,
        object: ObjectRef,
        policy_type: PolicyType,
    ) -> AccessResult<u64> {
        let removed = self
            .policies
            .delete_for_object_type_not(object, policy_type)
            .await?;
        tracing::debug!(object = %object, kept_type = policy_type.as_str(), removed, "policies removed by type exclusion");
        Ok(removed)
    }

    pub async fn remove_policies_action_filter(
        &self,
        _ctx: &RequestContext,
        object: ObjectRef,
        filter: ActionFilter,
    ) -> AccessResult<u64> {
        let removed = match filter {
            ActionFilter::Any => self.policies.delete_for_object(object).await?,
            ActionFilter::Only(action) => {
                self.policies.delete_for_object_action(object, action).await?
            }
        };
        tracing::debug!(object = %object, removed, "policies removed by action filter");
        Ok(removed)
    }

    /// Remove every policy held by the group, across all objects. Used when
    /// a group is being retired.
    pub async fn remove_group_policies(
        &self,
        _ctx: &RequestContext,
        group_id: Uuid,
    ) -> AccessResult<u64> {
        let removed = self.policies.delete_for_group(group_id).await?;
        tracing::debug!(group = %group_id, removed, "group policies removed");
        Ok(removed)
    }

    /// Remove the account's direct policies on one object.
    pub async fn remove_actor_policies(
        &self,
        _ctx: &RequestContext,
        object: ObjectRef,
        account_id: Uuid,
    ) -> AccessResult<u64> {
        let removed = self
            .policies
            .delete_for_account_on_object(object, account_id)
            .await?;
        tracing::debug!(object = %object, account = %account_id, removed, "account policies removed");
        Ok(removed)
    }

    /// Re-tag every `from`-action policy on the object as `to`, preserving
    /// principal and dates; other actions are untouched. Rewriting existing
    /// grants requires admin on the object.
    pub async fn switch_policies_action(
        &self,
        ctx: &RequestContext,
        object: ObjectRef,
        from: Action,
        to: Action,
    ) -> AccessResult<u64> {
        if !self.authorize.is_admin_of(ctx, object, true).await? {
            return Err(AccessError::forbidden(format!(
                "switching policy actions requires admin on {}",
                object
            )));
        }

        let switched = self.policies.switch_action(object, from, to).await?;
        tracing::debug!(object = %object, from = %from, to = %to, switched, "policy actions switched");
        Ok(switched)
    }
}

fn split_principal(principal: Option<Principal>) -> (Option<Uuid>, Option<Uuid>) {
    match principal {
        Some(Principal::Group(group)) => (Some(group), None),
        Some(Principal::Account(account)) => (None, Some(account)),
        None => (None, None),
    }
}
