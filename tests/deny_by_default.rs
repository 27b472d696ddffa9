use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tempfile::tempdir;
use uuid::Uuid;

use stacks_access::authz::RequestContext;
use stacks_access::models::{Action, ObjectRef, ResourcePolicy};
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

fn read_policy_for_account(object: ObjectRef, account_id: Uuid) -> ResourcePolicy {
    let now = Utc::now();
    ResourcePolicy {
        id: Uuid::new_v4(),
        object,
        action: Action::Read,
        group_id: None,
        account_id: Some(account_id),
        start_date: None,
        end_date: None,
        policy_type: None,
        name: None,
        description: None,
        reason: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn no_matching_policy_means_denied() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;

    let anon = RequestContext::anonymous();
    let err = engine.authorize.authorize(&anon, item, Action::Read).await;
    assert!(matches!(err, Err(AccessError::Forbidden(_))));

    // the boolean variant collapses the denial without erroring
    assert!(
        !engine
            .authorize
            .authorize_action_boolean(&anon, item, Action::Read)
            .await?
    );

    let account = engine.directory.create_account("u@example.com", "U", false).await?;
    let ctx = RequestContext::for_account(account);
    for action in [Action::Read, Action::Write, Action::Delete, Action::Admin] {
        assert!(
            !engine
                .authorize
                .authorize_action_boolean(&ctx, item, action)
                .await?
        );
    }

    Ok(())
}

#[tokio::test]
async fn system_admin_is_always_allowed() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    // zero policies anywhere
    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;

    let admin = engine.directory.create_account("root@example.com", "Root", true).await?;
    let ctx = RequestContext::for_account(admin);

    for action in [Action::Read, Action::Write, Action::Delete, Action::Add, Action::Admin] {
        engine.authorize.authorize(&ctx, item, action).await?;
    }

    assert!(engine.authorize.is_admin(&ctx));
    assert!(engine.authorize.is_community_admin(&ctx).await?);

    Ok(())
}

#[tokio::test]
async fn date_window_is_inclusive_on_both_ends() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let account = engine.directory.create_account("u@example.com", "U", false).await?;
    let ctx = RequestContext::for_account(account.clone());

    let today = Utc::now().date_naive();

    // not yet valid
    let mut future = read_policy_for_account(item, account.id);
    future.start_date = Some(today + Duration::days(7));
    engine.policies.create(&future).await?;
    assert!(
        !engine
            .authorize
            .authorize_action_boolean(&ctx, item, Action::Read)
            .await?
    );
    engine.policies.delete(future.id).await?;

    // expired
    let mut expired = read_policy_for_account(item, account.id);
    expired.end_date = Some(today - Duration::days(1));
    engine.policies.create(&expired).await?;
    assert!(
        !engine
            .authorize
            .authorize_action_boolean(&ctx, item, Action::Read)
            .await?
    );
    engine.policies.delete(expired.id).await?;

    // valid exactly today on both bounds
    let mut exact = read_policy_for_account(item, account.id);
    exact.start_date = Some(today);
    exact.end_date = Some(today);
    engine.policies.create(&exact).await?;
    engine.authorize.authorize(&ctx, item, Action::Read).await?;

    Ok(())
}

#[tokio::test]
async fn policy_without_principal_matches_nobody() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let account = engine.directory.create_account("u@example.com", "U", false).await?;

    let mut inert = read_policy_for_account(item, account.id);
    inert.account_id = None;
    engine.policies.create(&inert).await?;

    let ctx = RequestContext::for_account(account);
    assert!(
        !engine
            .authorize
            .authorize_action_boolean(&ctx, item, Action::Read)
            .await?
    );
    assert!(
        !engine
            .authorize
            .authorize_action_boolean(&RequestContext::anonymous(), item, Action::Read)
            .await?
    );

    Ok(())
}

#[tokio::test]
async fn authorize_any_of_succeeds_on_any_grant_and_aggregates_denials() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let account = engine.directory.create_account("u@example.com", "U", false).await?;
    let ctx = RequestContext::for_account(account.clone());

    let err = engine
        .authorize
        .authorize_any_of(&ctx, item, &[Action::Write, Action::Read])
        .await;
    match err {
        Err(AccessError::Forbidden(msg)) => {
            assert!(msg.contains("write"), "aggregated denial should list actions: {}", msg);
            assert!(msg.contains("read"));
        }
        other => panic!("expected forbidden, got {:?}", other.err()),
    }

    engine
        .policies
        .create(&read_policy_for_account(item, account.id))
        .await?;
    engine
        .authorize
        .authorize_any_of(&ctx, item, &[Action::Write, Action::Read])
        .await?;

    Ok(())
}

#[tokio::test]
async fn scoped_bypass_allows_and_is_released() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let ctx = RequestContext::anonymous();

    {
        let _privileged = ctx.ignore_authorization();
        engine.authorize.authorize(&ctx, item, Action::Write).await?;
    }

    // the elevated state must not leak past the block
    assert!(matches!(
        engine.authorize.authorize(&ctx, item, Action::Write).await,
        Err(AccessError::Forbidden(_))
    ));

    Ok(())
}
