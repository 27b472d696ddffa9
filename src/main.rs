use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use stacks_access::authz::RequestContext;
use stacks_access::models::{Action, ObjectRef, PolicyType, Principal, ResourceKind};
use stacks_access::{db, events, AccessEngine};

#[derive(Parser, Debug)]
#[command(author, version, about = "stacks access-control admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the database and apply pending migrations
    Migrate,
    /// Create an account
    AccountAdd {
        email: String,
        name: String,
        #[arg(long)]
        admin: bool,
    },
    /// Create a group
    GroupAdd {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add an account to a group (both must exist)
    GroupAddMember { group: String, email: String },
    /// Register a governed object
    ObjectAdd {
        kind: String,
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// List the policies attached to an object
    PolicyList { kind: String, object_id: Uuid },
    /// Grant an action on an object to a group
    PolicyAdd {
        kind: String,
        object_id: Uuid,
        action: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        policy_type: Option<String>,
    },
    /// Rewrite one action into another across an object's policies
    PolicySwitch {
        kind: String,
        object_id: Uuid,
        from: String,
        to: String,
    },
    /// Derive embargoed READ policies for an item from its owning collection
    EmbargoSet {
        item_id: Uuid,
        collection_id: Uuid,
        /// Embargo lift date (YYYY-MM-DD); omit for immediate access
        #[arg(long)]
        until: Option<NaiveDate>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show the deposit lifecycle state of an object
    DepositState { object_id: Uuid },
    /// Reconcile deposit state after a submission step
    DepositResolve {
        object_id: Uuid,
        #[arg(long)]
        in_progress: bool,
    },
}

fn parse_kind(value: &str) -> anyhow::Result<ResourceKind> {
    ResourceKind::parse(value).with_context(|| format!("unknown object kind: {}", value))
}

fn parse_action(value: &str) -> anyhow::Result<Action> {
    Action::parse(value).with_context(|| format!("unknown action: {}", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();

    let pool = db::init().await?;
    let (engine, rx) = AccessEngine::new(pool.clone());
    tokio::spawn(events::start_activity_listener(rx, pool));

    // The admin tool is a trusted batch collaborator: mutations run inside
    // an explicit privileged block, released when the guard drops.
    let ctx = RequestContext::anonymous();

    match cli.command {
        Commands::Migrate => {
            // db::init already ran the migrator
            println!("Migrations applied");
        }
        Commands::AccountAdd { email, name, admin } => {
            let account = engine.directory.create_account(&email, &name, admin).await?;
            println!("Created account {} ({})", account.id, account.email);
        }
        Commands::GroupAdd { name, description } => {
            let group = engine
                .directory
                .create_group(&name, description.as_deref())
                .await?;
            println!("Created group {} ({})", group.id, group.name);
        }
        Commands::GroupAddMember { group, email } => {
            let group = engine
                .directory
                .find_group_by_name(&group)
                .await?
                .with_context(|| format!("no such group: {}", group))?;
            let account = engine
                .directory
                .find_account_by_email(&email)
                .await?
                .with_context(|| format!("no such account: {}", email))?;
            engine
                .directory
                .add_account_to_group(group.id, account.id)
                .await?;
            println!("Added {} to {}", account.email, group.name);
        }
        Commands::ObjectAdd { kind, id, parent } => {
            let object = ObjectRef::new(parse_kind(&kind)?, id.unwrap_or_else(Uuid::new_v4));
            engine.objects.register(object, parent).await?;
            println!("Registered {}", object);
        }
        Commands::PolicyList { kind, object_id } => {
            let object = ObjectRef::new(parse_kind(&kind)?, object_id);
            for policy in engine.policies.for_object(object).await? {
                println!(
                    "{}  {}  group={:?} account={:?} start={:?} end={:?} type={:?}",
                    policy.id,
                    policy.action,
                    policy.group_id,
                    policy.account_id,
                    policy.start_date,
                    policy.end_date,
                    policy.policy_type.map(|t| t.as_str()),
                );
            }
        }
        Commands::PolicyAdd {
            kind,
            object_id,
            action,
            group,
            policy_type,
        } => {
            let object = ObjectRef::new(parse_kind(&kind)?, object_id);
            let group = engine
                .directory
                .find_group_by_name(&group)
                .await?
                .with_context(|| format!("no such group: {}", group))?;
            let policy_type = policy_type
                .as_deref()
                .map(|t| PolicyType::parse(t).with_context(|| format!("unknown policy type: {}", t)))
                .transpose()?;

            let _privileged = ctx.ignore_authorization();
            let policy = engine
                .mutator
                .add_policy(
                    &ctx,
                    object,
                    parse_action(&action)?,
                    Some(Principal::Group(group.id)),
                    policy_type,
                )
                .await?;
            println!("Created policy {}", policy.id);
        }
        Commands::PolicySwitch {
            kind,
            object_id,
            from,
            to,
        } => {
            let object = ObjectRef::new(parse_kind(&kind)?, object_id);
            let _privileged = ctx.ignore_authorization();
            let switched = engine
                .mutator
                .switch_policies_action(&ctx, object, parse_action(&from)?, parse_action(&to)?)
                .await?;
            println!("Switched {} policies", switched);
        }
        Commands::EmbargoSet {
            item_id,
            collection_id,
            until,
            reason,
        } => {
            let _privileged = ctx.ignore_authorization();
            let created = engine
                .embargo
                .generate_automatic_policies(
                    &ctx,
                    until,
                    reason.as_deref(),
                    ObjectRef::item(item_id),
                    ObjectRef::collection(collection_id),
                )
                .await?;
            println!("Derived {} read policies", created.len());
        }
        Commands::DepositState { object_id } => match engine.gate.state_of(object_id).await? {
            Some(state) => println!("{}", state),
            None => println!("no deposit record"),
        },
        Commands::DepositResolve {
            object_id,
            in_progress,
        } => {
            let _privileged = ctx.ignore_authorization();
            let record = engine.gate.resolve_state(&ctx, object_id, in_progress).await?;
            println!("{} is now {}", object_id, record.state);
        }
    }

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
