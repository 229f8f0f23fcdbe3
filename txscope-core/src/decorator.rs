//! Function-decorator façade.
//!
//! `Transactional` is what `#[transactional]` expands to, and can be used
//! directly to wrap a closure. Its parameters form the call-site tier and
//! are never inherited from an enclosing scope.

use std::sync::Arc;

use crate::completion::Outcome;
use crate::error::TxError;
use crate::manager::TxManager;
use crate::policy::{ErrorPolicy, ExistingTxnPolicy, PolicyOverride};
use crate::scope::{ActiveScope, CallSite, ScopeRequest};

#[derive(Debug, Clone, Default)]
pub struct Transactional {
    manager: Option<Arc<TxManager>>,
    call_site: PolicyOverride,
    nested: bool,
}

impl Transactional {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manager(mut self, manager: &Arc<TxManager>) -> Self {
        self.manager = Some(Arc::clone(manager));
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.call_site.error_policy = Some(policy);
        self
    }

    pub fn existing_txn_policy(mut self, policy: ExistingTxnPolicy) -> Self {
        self.call_site.existing_txn_policy = Some(policy);
        self
    }

    /// Open as a savepoint when another scope already owns the transaction.
    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    fn enter(&self) -> Result<ActiveScope, TxError> {
        ScopeRequest {
            manager: self.manager.clone(),
            call_site: CallSite::Own(self.call_site),
            instance: PolicyOverride::NONE,
            nested: self.nested,
        }
        .open()
    }

    /// Run `f` once inside a fresh scope.
    pub fn run<T, E, F>(&self, f: F) -> Outcome<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<TxError> + std::fmt::Display,
    {
        let scope = self.enter().map_err(E::from)?;
        let result = f();
        scope.exit(result)
    }

    /// Decorate `f`: every call of the returned function runs in its own scope.
    ///
    /// ```ignore
    /// let create = Transactional::new()
    ///     .error_policy(ErrorPolicy::Status)
    ///     .wrap(|email: String| users.add(User::new(email)));
    /// let done = create("a@example.com".into())?;
    /// ```
    pub fn wrap<A, T, E, F>(self, f: F) -> impl Fn(A) -> Outcome<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        E: From<TxError> + std::fmt::Display,
    {
        move |arg| self.run(|| f(arg))
    }
}
