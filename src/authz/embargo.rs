use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::authz::context::RequestContext;
use crate::authz::evaluator::AuthorizeService;
use crate::errors::AccessResult;
use crate::events::{log_activity, EventBus};
use crate::models::{Action, ObjectRef, PolicyType, ResourcePolicy};
use crate::store::PolicyStore;

/// Derives an embargoed object's READ policies from its owning collection:
/// whoever can read the collection today may read the object once the
/// embargo lifts. Item-level visibility tracks collection-level visibility
/// instead of requiring per-item manual grants.
#[derive(Clone)]
pub struct EmbargoService {
    policies: PolicyStore,
    authorize: AuthorizeService,
    events: EventBus,
}

impl EmbargoService {
    pub fn new(policies: PolicyStore, authorize: AuthorizeService, events: EventBus) -> Self {
        Self {
            policies,
            authorize,
            events,
        }
    }

    /// For each group currently holding READ on `owning_collection`, create
    /// a READ policy on `object` valid from `embargo_date` onward. A null
    /// or non-future date means immediate access. Previously synthesized
    /// submission-default READ policies on the object are replaced, so
    /// re-running after a collection policy change converges.
    pub async fn generate_automatic_policies(
        &self,
        ctx: &RequestContext,
        embargo_date: Option<NaiveDate>,
        reason: Option<&str>,
        object: ObjectRef,
        owning_collection: ObjectRef,
    ) -> AccessResult<Vec<ResourcePolicy>> {
        self.authorize
            .authorize_any_of(ctx, object, &[Action::Add, Action::Admin])
            .await?;

        let groups = self
            .authorize
            .get_authorized_groups(owning_collection, Action::Read)
            .await?;
        if groups.is_empty() {
            tracing::warn!(
                collection = %owning_collection,
                object = %object,
                "no groups hold read on the owning collection; no policies derived"
            );
            return Ok(Vec::new());
        }

        self.policies
            .delete_for_object_action_and_type(object, Action::Read, PolicyType::SubmissionDefault)
            .await?;

        let today = Utc::now().date_naive();
        let start_date = embargo_date.filter(|date| *date > today);
        let now = Utc::now();

        let created: Vec<ResourcePolicy> = groups
            .into_iter()
            .map(|group| ResourcePolicy {
                id: Uuid::new_v4(),
                object,
                action: Action::Read,
                group_id: Some(group),
                account_id: None,
                start_date,
                end_date: None,
                policy_type: Some(PolicyType::SubmissionDefault),
                name: Some("embargo".to_string()),
                description: None,
                reason: reason.map(str::to_string),
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.policies.create_many(&created).await?;
        for policy in &created {
            log_activity(&self.events, "created", ctx.actor_id(), policy);
        }
        tracing::debug!(
            object = %object,
            collection = %owning_collection,
            count = created.len(),
            start = ?start_date,
            "embargo policies derived"
        );

        Ok(created)
    }
}
