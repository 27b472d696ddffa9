pub mod account;
pub mod action;
pub mod deposit;
pub mod group;
pub mod object;
pub mod policy;

pub use account::Account;
pub use action::{Action, ActionFilter};
pub use deposit::{DepositRecord, DepositState, OperationKind};
pub use group::Group;
pub use object::{ObjectRef, ResourceKind};
pub use policy::{PolicyForm, PolicyType, Principal, ResourcePolicy};
