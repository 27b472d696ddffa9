//! Authorization engine: who may do what to which object.
//!
//! The decision path is deny-by-default: an action is permitted only via a
//! scoped bypass, the system-administrator flag, an admin grant on the
//! object or an ancestor, or a matching date-valid policy for the actor or
//! one of its resolved groups.

pub mod context;
pub mod embargo;
pub mod evaluator;
pub mod mutator;
pub mod resolver;
pub mod sources;

pub use context::{AuthorizationOverride, RequestContext};
pub use embargo::EmbargoService;
pub use evaluator::AuthorizeService;
pub use mutator::PolicyMutator;
pub use resolver::GroupResolver;
pub use sources::{SourceSecurity, SourceSecurityRegistry};
