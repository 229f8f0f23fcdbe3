use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use crate::error::DataError;

/// Filter and ordering applied to stored rows.
///
/// # Example
///
/// ```ignore
/// let q = Query::new()
///     .where_eq("active", true)?
///     .where_not_null("email")
///     .order_by("id", false);
/// let users = crud.all(&q)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(String, Value),
    NotEq(String, Value),
    IsNull(String),
    IsNotNull(String),
}

impl Condition {
    fn matches(&self, row: &Value) -> bool {
        let field = |name: &str| row.get(name).unwrap_or(&Value::Null);
        match self {
            Condition::Eq(column, value) => field(column) == value,
            Condition::NotEq(column, value) => field(column) != value,
            Condition::IsNull(column) => field(column).is_null(),
            Condition::IsNotNull(column) => !field(column).is_null(),
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, column: &str, value: impl Serialize) -> Result<Self, DataError> {
        self.conditions
            .push(Condition::Eq(column.to_string(), serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn where_not_eq(mut self, column: &str, value: impl Serialize) -> Result<Self, DataError> {
        self.conditions
            .push(Condition::NotEq(column.to_string(), serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNull(column.to_string()));
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNotNull(column.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    /// Append another query's conditions (ordering is kept from `self`).
    pub(crate) fn and(mut self, other: &Query) -> Self {
        self.conditions.extend(other.conditions.iter().cloned());
        if self.order.is_empty() {
            self.order = other.order.clone();
        }
        self
    }

    pub(crate) fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// Sort `rows` by the requested columns; stable, so insertion order breaks ties.
    pub(crate) fn sort(&self, rows: &mut [Value]) {
        if self.order.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for (column, ascending) in &self.order {
                let ord = compare(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                );
                let ord = if *ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

/// Nulls first, then booleans, numbers, strings; anything else compares equal.
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conditions_are_anded() {
        let q = Query::new()
            .where_eq("active", true)
            .unwrap()
            .where_not_null("email");
        assert!(q.matches(&json!({"active": true, "email": "a@b"})));
        assert!(!q.matches(&json!({"active": true, "email": null})));
        assert!(!q.matches(&json!({"active": false, "email": "a@b"})));
    }

    #[test]
    fn missing_fields_count_as_null() {
        let q = Query::new().where_null("deleted_at");
        assert!(q.matches(&json!({"id": 1})));
    }

    #[test]
    fn sort_by_multiple_columns() {
        let mut rows = vec![
            json!({"team": "b", "n": 1}),
            json!({"team": "a", "n": 2}),
            json!({"team": "a", "n": 1}),
        ];
        Query::new()
            .order_by("team", true)
            .order_by("n", false)
            .sort(&mut rows);
        assert_eq!(rows[0], json!({"team": "a", "n": 2}));
        assert_eq!(rows[2], json!({"team": "b", "n": 1}));
    }
}
