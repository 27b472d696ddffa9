//! Data access over the SQLite schema. These structs are pure adapters:
//! CRUD and filtered queries, no decision logic. The evaluator and mutator
//! own every allow/deny rule.

pub mod deposits;
pub mod directory;
pub mod objects;
pub mod policies;

pub use deposits::DepositStateStore;
pub use directory::GroupDirectory;
pub use objects::ObjectStore;
pub use policies::PolicyStore;
