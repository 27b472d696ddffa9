use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tempfile::tempdir;
use uuid::Uuid;

use stacks_access::authz::RequestContext;
use stacks_access::models::{Action, DepositState, ObjectRef, OperationKind, Principal};
use stacks_access::{AccessEngine, AccessError};

async fn setup() -> Result<(tempfile::TempDir, SqlitePool)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

#[tokio::test]
async fn workspace_permits_content_mutation_with_a_grant() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let record = engine.gate.open_deposit(item.id).await?;
    assert_eq!(record.state, DepositState::Workspace);
    assert!(record.in_progress);

    let depositor = engine.directory.create_account("d@example.com", "D", false).await?;
    let bootstrap = RequestContext::anonymous();
    {
        let _privileged = bootstrap.ignore_authorization();
        engine
            .mutator
            .add_policy(&bootstrap, item, Action::Write, Some(Principal::Account(depositor.id)), None)
            .await?;
    }

    // the two checks are independent and both must pass
    let ctx = RequestContext::for_account(depositor);
    engine.gate.check_operation(&ctx, item, OperationKind::AddContent).await?;
    engine.authorize.authorize(&ctx, item, Action::Write).await?;

    Ok(())
}

#[tokio::test]
async fn gate_rejects_mutation_outside_workspace_regardless_of_grants() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    engine.gate.open_deposit(item.id).await?;

    let depositor = engine.directory.create_account("d@example.com", "D", false).await?;
    let bootstrap = RequestContext::anonymous();
    {
        let _privileged = bootstrap.ignore_authorization();
        engine
            .mutator
            .add_policy(&bootstrap, item, Action::Write, Some(Principal::Account(depositor.id)), None)
            .await?;
    }
    let ctx = RequestContext::for_account(depositor);

    // submission finished: workspace -> workflow
    let record = engine.gate.resolve_state(&ctx, item.id, false).await?;
    assert_eq!(record.state, DepositState::Workflow);

    for operation in [
        OperationKind::ReplaceContent,
        OperationKind::AddContent,
        OperationKind::RemoveContent,
        OperationKind::EditMetadata,
        OperationKind::DeleteObject,
    ] {
        let rejected = engine.gate.check_operation(&ctx, item, operation).await;
        assert!(matches!(rejected, Err(AccessError::Gate(_))));
    }

    // the evaluator still allows WRITE; the veto is the gate's alone
    engine.authorize.authorize(&ctx, item, Action::Write).await?;

    // reads and state toggles pass in every state
    engine.gate.check_operation(&ctx, item, OperationKind::Read).await?;
    engine.gate.check_operation(&ctx, item, OperationKind::Statement).await?;
    engine.gate.check_operation(&ctx, item, OperationKind::ToggleState).await?;

    Ok(())
}

#[tokio::test]
async fn resumed_submission_is_pulled_back_to_workspace() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    engine.gate.open_deposit(item.id).await?;

    let ctx = RequestContext::anonymous();
    let record = engine.gate.resolve_state(&ctx, item.id, false).await?;
    assert_eq!(record.state, DepositState::Workflow);

    // the depositor reopened an incomplete multi-step submission
    let record = engine.gate.resolve_state(&ctx, item.id, true).await?;
    assert_eq!(record.state, DepositState::Workspace);
    assert!(record.in_progress);

    engine.gate.check_operation(&ctx, item, OperationKind::EditMetadata).await?;

    Ok(())
}

#[tokio::test]
async fn workflow_completion_archives_the_deposit() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    engine.gate.open_deposit(item.id).await?;

    let ctx = RequestContext::anonymous();
    engine.gate.resolve_state(&ctx, item.id, false).await?;

    let record = engine.gate.complete_workflow(&ctx, item.id).await?;
    assert_eq!(record.state, DepositState::Archived);

    // completing twice is a state error, not a silent no-op
    assert!(matches!(
        engine.gate.complete_workflow(&ctx, item.id).await,
        Err(AccessError::Gate(_))
    ));

    assert!(matches!(
        engine.gate.check_operation(&ctx, item, OperationKind::DeleteObject).await,
        Err(AccessError::Gate(_))
    ));

    Ok(())
}

#[tokio::test]
async fn withdraw_and_reinstate_are_admin_toggles() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    engine.gate.open_deposit(item.id).await?;

    let admin = engine.directory.create_account("root@example.com", "Root", true).await?;
    let depositor = engine.directory.create_account("d@example.com", "D", false).await?;

    let admin_ctx = RequestContext::for_account(admin);
    engine.gate.resolve_state(&admin_ctx, item.id, false).await?;
    engine.gate.complete_workflow(&admin_ctx, item.id).await?;

    // not an administrator: the toggle is refused
    let depositor_ctx = RequestContext::for_account(depositor);
    assert!(matches!(
        engine.gate.withdraw(&depositor_ctx, item.id).await,
        Err(AccessError::Forbidden(_))
    ));

    let record = engine.gate.withdraw(&admin_ctx, item.id).await?;
    assert_eq!(record.state, DepositState::Withdrawn);

    // withdrawing a withdrawn deposit is a state error
    assert!(matches!(
        engine.gate.withdraw(&admin_ctx, item.id).await,
        Err(AccessError::Gate(_))
    ));

    let record = engine.gate.reinstate(&admin_ctx, item.id).await?;
    assert_eq!(record.state, DepositState::Archived);

    Ok(())
}

#[tokio::test]
async fn objects_without_a_lifecycle_record_pass_the_gate() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    // collections are not deposits; the gate does not apply
    let collection = ObjectRef::collection(Uuid::new_v4());
    engine.objects.register(collection, None).await?;

    let ctx = RequestContext::anonymous();
    engine
        .gate
        .check_operation(&ctx, collection, OperationKind::EditMetadata)
        .await?;
    assert_eq!(engine.gate.state_of(collection.id).await?, None);

    Ok(())
}
