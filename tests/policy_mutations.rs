use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::tempdir;
use uuid::Uuid;

use stacks_access::authz::RequestContext;
use stacks_access::models::{
    Action, ActionFilter, ObjectRef, PolicyForm, PolicyType, Principal,
};
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
async fn add_policy_requires_add_or_admin_on_the_target() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let collection = ObjectRef::collection(Uuid::new_v4());
    engine.objects.register(collection, None).await?;

    let depositor = engine.directory.create_account("d@example.com", "D", false).await?;
    let stranger = engine.directory.create_account("s@example.com", "S", false).await?;

    // bootstrap: give the depositor ADD on the collection
    let bootstrap = RequestContext::anonymous();
    {
        let _privileged = bootstrap.ignore_authorization();
        engine
            .mutator
            .add_policy(
                &bootstrap,
                collection,
                Action::Add,
                Some(Principal::Account(depositor.id)),
                None,
            )
            .await?;
    }

    let depositor_ctx = RequestContext::for_account(depositor);
    let anonymous_group = engine.directory.anonymous_group().await?.context("anonymous")?;
    engine
        .mutator
        .add_policy(
            &depositor_ctx,
            collection,
            Action::Read,
            Some(Principal::Group(anonymous_group.id)),
            None,
        )
        .await?;

    let stranger_ctx = RequestContext::for_account(stranger);
    let denied = engine
        .mutator
        .add_policy(
            &stranger_ctx,
            collection,
            Action::Read,
            Some(Principal::Account(Uuid::new_v4())),
            None,
        )
        .await;
    assert!(matches!(denied, Err(AccessError::Forbidden(_))));

    Ok(())
}

#[tokio::test]
async fn identical_policy_is_rejected_as_duplicate() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let group = engine.directory.create_group("staff", None).await?;

    let ctx = RequestContext::anonymous();
    let _privileged = ctx.ignore_authorization();

    engine
        .mutator
        .add_policy(&ctx, item, Action::Read, Some(Principal::Group(group.id)), None)
        .await?;

    assert!(
        engine
            .mutator
            .is_an_identical_policy_in_place(item, Some(Principal::Group(group.id)), Action::Read)
            .await?
    );

    let duplicate = engine
        .mutator
        .add_policy(&ctx, item, Action::Read, Some(Principal::Group(group.id)), None)
        .await;
    assert!(matches!(duplicate, Err(AccessError::Conflict(_))));
    assert_eq!(engine.policies.for_object(item).await?.len(), 1);

    // same principal, different action is a different grant
    engine
        .mutator
        .add_policy(&ctx, item, Action::Write, Some(Principal::Group(group.id)), None)
        .await?;

    Ok(())
}

#[tokio::test]
async fn inherit_policies_reparents_and_preserves_grants() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let collection = ObjectRef::collection(Uuid::new_v4());
    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(collection, None).await?;
    engine.objects.register(item, Some(collection.id)).await?;

    let staff = engine.directory.create_group("staff", None).await?;
    let curator = engine.directory.create_account("c@example.com", "C", false).await?;

    let ctx = RequestContext::anonymous();
    let _privileged = ctx.ignore_authorization();

    engine
        .mutator
        .add_policy(&ctx, collection, Action::Read, Some(Principal::Group(staff.id)), None)
        .await?;
    let form = PolicyForm {
        account_id: Some(curator.id),
        start_date: NaiveDate::from_ymd_opt(2026, 1, 1),
        end_date: NaiveDate::from_ymd_opt(2027, 1, 1),
        ..PolicyForm::new(Action::Write)
    };
    engine
        .mutator
        .create_or_modify_policy(&ctx, None, collection, &form)
        .await?;

    engine.mutator.inherit_policies(&ctx, collection, item).await?;

    let source: Vec<_> = engine
        .policies
        .for_object(collection)
        .await?
        .into_iter()
        .map(|p| (p.action, p.group_id, p.account_id, p.start_date, p.end_date))
        .collect();
    let copied = engine.policies.for_object(item).await?;
    let dest: Vec<_> = copied
        .iter()
        .map(|p| (p.action, p.group_id, p.account_id, p.start_date, p.end_date))
        .collect();

    assert_eq!(source, dest);
    for policy in &copied {
        assert_eq!(policy.object, item);
        assert_eq!(policy.policy_type, Some(PolicyType::Inherited));
    }

    Ok(())
}

#[tokio::test]
async fn switch_policies_action_leaves_other_actions_untouched() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let staff = engine.directory.create_group("staff", None).await?;
    let curator = engine.directory.create_account("c@example.com", "C", false).await?;

    let ctx = RequestContext::anonymous();
    let _privileged = ctx.ignore_authorization();

    let form = PolicyForm {
        group_id: Some(staff.id),
        start_date: NaiveDate::from_ymd_opt(2026, 6, 1),
        ..PolicyForm::new(Action::Read)
    };
    engine.mutator.create_or_modify_policy(&ctx, None, item, &form).await?;
    engine
        .mutator
        .add_policy(&ctx, item, Action::Delete, Some(Principal::Account(curator.id)), None)
        .await?;

    let switched = engine
        .mutator
        .switch_policies_action(&ctx, item, Action::Read, Action::Write)
        .await?;
    assert_eq!(switched, 1);

    let policies = engine.policies.for_object(item).await?;
    let write = policies
        .iter()
        .find(|p| p.action == Action::Write)
        .context("switched policy")?;
    assert_eq!(write.group_id, Some(staff.id));
    assert_eq!(write.start_date, NaiveDate::from_ymd_opt(2026, 6, 1));

    assert!(policies.iter().any(|p| p.action == Action::Delete));
    assert!(!policies.iter().any(|p| p.action == Action::Read));

    Ok(())
}

#[tokio::test]
async fn bulk_removals_only_touch_their_filter() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let staff = engine.directory.create_group("staff", None).await?;
    let curator = engine.directory.create_account("c@example.com", "C", false).await?;

    let ctx = RequestContext::anonymous();
    let _privileged = ctx.ignore_authorization();

    engine
        .mutator
        .add_policy(
            &ctx,
            item,
            Action::Read,
            Some(Principal::Group(staff.id)),
            Some(PolicyType::SubmissionDefault),
        )
        .await?;
    engine
        .mutator
        .add_policy(
            &ctx,
            item,
            Action::Write,
            Some(Principal::Group(staff.id)),
            Some(PolicyType::Custom),
        )
        .await?;
    engine
        .mutator
        .add_policy(&ctx, item, Action::Delete, Some(Principal::Account(curator.id)), None)
        .await?;

    let removed = engine
        .mutator
        .remove_all_policies_by_type(&ctx, item, PolicyType::SubmissionDefault)
        .await?;
    assert_eq!(removed, 1);
    assert_eq!(engine.policies.for_object(item).await?.len(), 2);

    // untyped rows carry no provenance and are kept by the exclusion filter
    let removed = engine
        .mutator
        .remove_all_policies_by_type_not_equal_to(&ctx, item, PolicyType::SubmissionDefault)
        .await?;
    assert_eq!(removed, 1);
    let remaining = engine.policies.for_object(item).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].action, Action::Delete);

    let removed = engine
        .mutator
        .remove_policies_action_filter(&ctx, item, ActionFilter::Only(Action::Read))
        .await?;
    assert_eq!(removed, 0);

    let removed = engine
        .mutator
        .remove_policies_action_filter(&ctx, item, ActionFilter::Any)
        .await?;
    assert_eq!(removed, 1);
    assert!(engine.policies.for_object(item).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn remove_actor_policies_is_scoped_to_one_object() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    let other = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    engine.objects.register(other, None).await?;
    let curator = engine.directory.create_account("c@example.com", "C", false).await?;

    let ctx = RequestContext::anonymous();
    let _privileged = ctx.ignore_authorization();

    engine
        .mutator
        .add_policy(&ctx, item, Action::Read, Some(Principal::Account(curator.id)), None)
        .await?;
    engine
        .mutator
        .add_policy(&ctx, other, Action::Read, Some(Principal::Account(curator.id)), None)
        .await?;

    engine.mutator.remove_actor_policies(&ctx, item, curator.id).await?;

    assert!(engine.policies.for_object(item).await?.is_empty());
    assert_eq!(engine.policies.for_object(other).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn create_or_modify_upserts_and_validates_the_principal_invariant() -> Result<()> {
    let (_dir, pool) = setup().await?;
    let (engine, _rx) = AccessEngine::new(pool);

    let item = ObjectRef::item(Uuid::new_v4());
    engine.objects.register(item, None).await?;
    let staff = engine.directory.create_group("staff", None).await?;
    let curator = engine.directory.create_account("c@example.com", "C", false).await?;

    let ctx = RequestContext::anonymous();
    let _privileged = ctx.ignore_authorization();

    let both = PolicyForm {
        group_id: Some(staff.id),
        account_id: Some(curator.id),
        ..PolicyForm::new(Action::Read)
    };
    assert!(matches!(
        engine.mutator.create_or_modify_policy(&ctx, None, item, &both).await,
        Err(AccessError::BadRequest(_))
    ));

    let form = PolicyForm {
        group_id: Some(staff.id),
        reason: Some("reviewer access".to_string()),
        ..PolicyForm::new(Action::Read)
    };
    let created = engine.mutator.create_or_modify_policy(&ctx, None, item, &form).await?;
    assert_eq!(created.reason.as_deref(), Some("reviewer access"));

    let update = PolicyForm {
        group_id: Some(staff.id),
        end_date: NaiveDate::from_ymd_opt(2030, 1, 1),
        ..PolicyForm::new(Action::Write)
    };
    let updated = engine
        .mutator
        .create_or_modify_policy(&ctx, Some(created.id), item, &update)
        .await?;
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.action, Action::Write);
    assert_eq!(updated.end_date, NaiveDate::from_ymd_opt(2030, 1, 1));
    // annotations not present in the form survive the rewrite
    assert_eq!(updated.reason.as_deref(), Some("reviewer access"));
    assert_eq!(engine.policies.for_object(item).await?.len(), 1);

    let missing = engine
        .mutator
        .create_or_modify_policy(&ctx, Some(Uuid::new_v4()), item, &form)
        .await;
    assert!(matches!(missing, Err(AccessError::NotFound(_))));

    Ok(())
}
