use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::models::Account;

/// Per-request evaluation context: the acting identity (or anonymous) plus
/// the scoped authorization-bypass state used for trusted internal work.
///
/// The bypass is a depth counter, not a flag, so nested privileged blocks
/// compose; it is never process-wide. Clones share the counter, which is
/// what a clone means here: the same request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: Option<Account>,
    bypass_depth: Arc<AtomicUsize>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            actor: None,
            bypass_depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn for_account(account: Account) -> Self {
        Self {
            actor: Some(account),
            bypass_depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn actor(&self) -> Option<&Account> {
        self.actor.as_ref()
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.actor.as_ref().map(|a| a.id)
    }

    /// Begin a privileged block. Authorization checks pass while the
    /// returned guard lives; dropping it restores the previous state on
    /// every exit path, normal or not.
    #[must_use = "the bypass ends when the guard is dropped"]
    pub fn ignore_authorization(&self) -> AuthorizationOverride {
        self.bypass_depth.fetch_add(1, Ordering::SeqCst);
        AuthorizationOverride {
            depth: Arc::clone(&self.bypass_depth),
        }
    }

    pub fn authorization_bypassed(&self) -> bool {
        self.bypass_depth.load(Ordering::SeqCst) > 0
    }
}

/// RAII handle for a privileged block. Not cloneable: one guard, one block.
#[derive(Debug)]
pub struct AuthorizationOverride {
    depth: Arc<AtomicUsize>,
}

impl Drop for AuthorizationOverride {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
