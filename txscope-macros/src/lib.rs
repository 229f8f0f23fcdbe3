//! Procedural macros for txscope.

use proc_macro::TokenStream;

mod crate_path;
mod transactional_attr;

/// Run a function inside a transaction scope.
///
/// The function must return `Result<T, E>` where `E: From<TxError> + Display`.
/// The signature is rewritten: the declared `Result<T, E>` always becomes
/// `Outcome<T, E>`, i.e. `Result<Completion<T, E>, E>`, whatever the error
/// policy, `raise` included. Callers therefore do not see the declared
/// return type. The effective policy can come from the instance or
/// process-wide settings at run time, so one signature has to cover both:
/// under `raise` failures come back as `Err` and successes as a committed
/// [`Completion`](../txscope_core/completion/struct.Completion.html), under
/// `status` failures come back as a `Completion` with no value. Argument
/// types are left untouched.
///
/// Arguments (all optional):
///
/// - `error_policy = "raise" | "status"`
/// - `existing_txn_policy = "error" | "join" | "savepoint" | "adopt_autobegin" | "reset"`
/// - `nested`: open a savepoint when an enclosing scope owns the transaction
/// - `manager = <expr>`: a `&Arc<TxManager>` to use instead of the configured one
///
/// ```ignore
/// #[transactional(error_policy = "status")]
/// fn rename(users: &Crud<User>, id: i64, name: String) -> Result<(), DataError> {
///     let by_id = Query::new().where_eq("id", id)?;
///     users.update(&by_id, |u| u.name = name)?;
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn transactional(args: TokenStream, input: TokenStream) -> TokenStream {
    transactional_attr::expand(args, input)
}
