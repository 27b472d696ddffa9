use sqlx::SqlitePool;

use crate::authz::{AuthorizeService, EmbargoService, GroupResolver, PolicyMutator};
use crate::events::{init_event_bus, EventBus};
use crate::lifecycle::DepositGate;
use crate::store::{DepositStateStore, GroupDirectory, ObjectStore, PolicyStore};

/// Everything wired together over one pool. Collaborating layers hold this
/// and call into the services; the returned receiver feeds
/// `events::start_activity_listener`.
#[derive(Clone)]
pub struct AccessEngine {
    pub policies: PolicyStore,
    pub directory: GroupDirectory,
    pub objects: ObjectStore,
    pub deposits: DepositStateStore,
    pub resolver: GroupResolver,
    pub authorize: AuthorizeService,
    pub mutator: PolicyMutator,
    pub embargo: EmbargoService,
    pub gate: DepositGate,
    pub events: EventBus,
}

impl AccessEngine {
    pub fn new(pool: SqlitePool) -> (Self, tokio::sync::broadcast::Receiver<serde_json::Value>) {
        let (events, rx) = init_event_bus();

        let policies = PolicyStore::new(pool.clone());
        let directory = GroupDirectory::new(pool.clone());
        let objects = ObjectStore::new(pool.clone());
        let deposits = DepositStateStore::new(pool);

        let resolver = GroupResolver::new(directory.clone());
        let authorize = AuthorizeService::new(policies.clone(), objects.clone(), resolver.clone());
        let mutator = PolicyMutator::new(policies.clone(), authorize.clone(), events.clone());
        let embargo = EmbargoService::new(policies.clone(), authorize.clone(), events.clone());
        let gate = DepositGate::new(deposits.clone(), authorize.clone(), events.clone());

        let engine = Self {
            policies,
            directory,
            objects,
            deposits,
            resolver,
            authorize,
            mutator,
            embargo,
            gate,
            events,
        };

        (engine, rx)
    }
}
