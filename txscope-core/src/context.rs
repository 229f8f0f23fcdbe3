//! Execution-context accessors.
//!
//! Scope stacks belong to a logical execution context, never to a global.
//! The engine reaches them through a [`ContextAccessor`]; the default keys
//! them by OS thread, and with the `tokio` feature [`TaskContext`] keys them
//! by logical task so tasks sharing a worker thread never see each other's
//! scopes.

use std::cell::RefCell;

use crate::error::TxError;
use crate::stack::ScopeStacks;

/// Resolves the scope stacks of the current execution context.
pub trait ContextAccessor: Send + Sync {
    /// Run `f` against the current context's stacks.
    fn with_stacks(&self, f: &mut dyn FnMut(&mut ScopeStacks)) -> Result<(), TxError>;

    /// Short name used in log output.
    fn name(&self) -> &'static str;
}

/// Typed convenience over [`ContextAccessor::with_stacks`].
pub(crate) fn with_stacks<R>(
    accessor: &dyn ContextAccessor,
    f: impl FnOnce(&mut ScopeStacks) -> R,
) -> Result<R, TxError> {
    let mut f = Some(f);
    let mut out = None;
    accessor.with_stacks(&mut |stacks| {
        if let Some(f) = f.take() {
            out = Some(f(stacks));
        }
    })?;
    out.ok_or_else(|| TxError::ContextUnavailable(format!("{} accessor did not run", accessor.name())))
}

fn borrow_stacks(
    cell: &RefCell<ScopeStacks>,
    name: &str,
    f: &mut dyn FnMut(&mut ScopeStacks),
) -> Result<(), TxError> {
    let mut stacks = cell
        .try_borrow_mut()
        .map_err(|_| TxError::ContextUnavailable(format!("{name} context re-entered")))?;
    f(&mut stacks);
    Ok(())
}

thread_local! {
    static THREAD_STACKS: RefCell<ScopeStacks> = RefCell::new(ScopeStacks::default());
}

/// Keys scope stacks by the current OS thread. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadContext;

impl ContextAccessor for ThreadContext {
    fn with_stacks(&self, f: &mut dyn FnMut(&mut ScopeStacks)) -> Result<(), TxError> {
        THREAD_STACKS
            .try_with(|cell| borrow_stacks(cell, "thread", f))
            .map_err(|_| TxError::ContextUnavailable("thread-local storage destroyed".into()))?
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

#[cfg(feature = "tokio")]
tokio::task_local! {
    static TASK_STACKS: RefCell<ScopeStacks>;
}

/// Keys scope stacks by logical tokio task.
///
/// Every task that opens scopes must run inside [`TaskContext::scope`];
/// outside of it the engine fails with `ContextUnavailable`.
///
/// ```ignore
/// tokio::spawn(TaskContext::scope(async move {
///     Transactional::new().manager(&manager).run(|| do_work())
/// }));
/// ```
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskContext;

#[cfg(feature = "tokio")]
impl TaskContext {
    /// Run `fut` with a fresh, empty set of scope stacks.
    pub async fn scope<F: std::future::Future>(fut: F) -> F::Output {
        TASK_STACKS
            .scope(RefCell::new(ScopeStacks::default()), fut)
            .await
    }

    /// Synchronous variant of [`TaskContext::scope`].
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        TASK_STACKS.sync_scope(RefCell::new(ScopeStacks::default()), f)
    }
}

#[cfg(feature = "tokio")]
impl ContextAccessor for TaskContext {
    fn with_stacks(&self, f: &mut dyn FnMut(&mut ScopeStacks)) -> Result<(), TxError> {
        TASK_STACKS
            .try_with(|cell| borrow_stacks(cell, "task", f))
            .map_err(|_| {
                TxError::ContextUnavailable("not running inside TaskContext::scope".into())
            })?
    }

    fn name(&self) -> &'static str {
        "task"
    }
}
