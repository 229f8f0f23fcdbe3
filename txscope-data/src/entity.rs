use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record stored through [`Crud`](crate::Crud).
///
/// Rows are kept as JSON objects, so every field the entity serializes can
/// be filtered on. Ids are assigned by the session on insert.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct User { id: Option<i64>, email: String, active: bool }
///
/// impl Entity for User {
///     fn table_name() -> &'static str { "users" }
///     fn id(&self) -> Option<i64> { self.id }
///     fn set_id(&mut self, id: i64) { self.id = Some(id) }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn table_name() -> &'static str;

    /// Name of the id field in the serialized row.
    fn id_column() -> &'static str {
        "id"
    }

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);
}
