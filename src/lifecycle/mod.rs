//! Deposit lifecycle gate: a state machine over
//! workspace -> workflow -> archived/withdrawn that vetoes content
//! mutation once a deposit leaves the workspace. The gate is deliberately
//! independent of the policy evaluator; protocol collaborators consult
//! both, and both must pass.

use uuid::Uuid;

use crate::authz::context::RequestContext;
use crate::authz::evaluator::AuthorizeService;
use crate::errors::{AccessError, AccessResult};
use crate::events::{log_activity, EventBus};
use crate::models::{DepositRecord, DepositState, ObjectRef, OperationKind};
use crate::store::DepositStateStore;

#[derive(Clone)]
pub struct DepositGate {
    deposits: DepositStateStore,
    authorize: AuthorizeService,
    events: EventBus,
}

impl DepositGate {
    pub fn new(deposits: DepositStateStore, authorize: AuthorizeService, events: EventBus) -> Self {
        Self {
            deposits,
            authorize,
            events,
        }
    }

    /// Open a lifecycle record for a fresh deposit (workspace, in
    /// progress).
    pub async fn open_deposit(&self, object_id: Uuid) -> AccessResult<DepositRecord> {
        self.deposits.open(object_id).await
    }

    pub async fn state_of(&self, object_id: Uuid) -> AccessResult<Option<DepositState>> {
        Ok(self.deposits.record_of(object_id).await?.map(|r| r.state))
    }

    /// The gate rule: content-mutating operations are only permitted while
    /// the deposit sits in the workspace. Policy grants cannot override
    /// this — even a caller with full WRITE is rejected here.
    ///
    /// Objects with no lifecycle record (communities, collections) are not
    /// deposits and pass freely.
    pub async fn check_operation(
        &self,
        _ctx: &RequestContext,
        object: ObjectRef,
        operation: OperationKind,
    ) -> AccessResult<()> {
        if !operation.mutates_content() {
            return Ok(());
        }

        let Some(record) = self.deposits.record_of(object.id).await? else {
            return Ok(());
        };

        if record.state.permits_content_mutation() {
            Ok(())
        } else {
            tracing::debug!(
                object = %object,
                state = %record.state,
                operation = operation.as_str(),
                "operation rejected by lifecycle gate"
            );
            Err(AccessError::gate(format!(
                "{} not permitted while {} is {}",
                operation.as_str(),
                object,
                record.state
            )))
        }
    }

    /// Reconcile the recorded state with the submission's in-progress flag
    /// after a deposit step. A finished deposit still sitting in the
    /// workspace advances to workflow; a resumed multi-step submission
    /// that already advanced is pulled back.
    pub async fn resolve_state(
        &self,
        ctx: &RequestContext,
        object_id: Uuid,
        in_progress: bool,
    ) -> AccessResult<DepositRecord> {
        let record = self
            .deposits
            .record_of(object_id)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("deposit {}", object_id)))?;

        self.deposits.set_in_progress(object_id, in_progress).await?;

        let next = match (in_progress, record.state) {
            (false, DepositState::Workspace) => Some(DepositState::Workflow),
            (true, DepositState::Workflow) => Some(DepositState::Workspace),
            _ => None,
        };

        match next {
            Some(state) => self.transition(ctx, object_id, record, state).await,
            None => Ok(DepositRecord {
                in_progress,
                ..record
            }),
        }
    }

    /// Workflow approval completed; the deposit becomes publicly visible.
    pub async fn complete_workflow(
        &self,
        ctx: &RequestContext,
        object_id: Uuid,
    ) -> AccessResult<DepositRecord> {
        let record = self.require_state(object_id, DepositState::Workflow).await?;
        self.transition(ctx, object_id, record, DepositState::Archived)
            .await
    }

    /// Administrative toggle: hide an archived deposit without deleting it.
    pub async fn withdraw(
        &self,
        ctx: &RequestContext,
        object_id: Uuid,
    ) -> AccessResult<DepositRecord> {
        self.require_admin(ctx, object_id).await?;
        let record = self.require_state(object_id, DepositState::Archived).await?;
        self.transition(ctx, object_id, record, DepositState::Withdrawn)
            .await
    }

    /// Administrative toggle: restore a withdrawn deposit to public view.
    pub async fn reinstate(
        &self,
        ctx: &RequestContext,
        object_id: Uuid,
    ) -> AccessResult<DepositRecord> {
        self.require_admin(ctx, object_id).await?;
        let record = self
            .require_state(object_id, DepositState::Withdrawn)
            .await?;
        self.transition(ctx, object_id, record, DepositState::Archived)
            .await
    }

    async fn require_admin(&self, ctx: &RequestContext, object_id: Uuid) -> AccessResult<()> {
        if self
            .authorize
            .is_admin_of(ctx, ObjectRef::item(object_id), true)
            .await?
        {
            Ok(())
        } else {
            Err(AccessError::forbidden(
                "withdraw/reinstate is an administrative operation",
            ))
        }
    }

    async fn require_state(
        &self,
        object_id: Uuid,
        expected: DepositState,
    ) -> AccessResult<DepositRecord> {
        let record = self
            .deposits
            .record_of(object_id)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("deposit {}", object_id)))?;

        if record.state != expected {
            return Err(AccessError::gate(format!(
                "deposit {} is {}, expected {}",
                object_id, record.state, expected
            )));
        }
        Ok(record)
    }

    async fn transition(
        &self,
        ctx: &RequestContext,
        object_id: Uuid,
        old: DepositRecord,
        to: DepositState,
    ) -> AccessResult<DepositRecord> {
        self.deposits.set_state(object_id, to).await?;
        let updated = self
            .deposits
            .record_of(object_id)
            .await?
            .unwrap_or(DepositRecord { state: to, ..old });

        tracing::debug!(
            object = %object_id,
            from = %old.state,
            to = %to,
            "deposit transitioned"
        );
        log_activity(&self.events, "transitioned", ctx.actor_id(), &updated);

        Ok(updated)
    }
}
