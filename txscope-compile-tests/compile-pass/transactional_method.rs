use std::sync::Arc;

use txscope::prelude::*;
use txscope::txscope_data::{Crud, DataError, Entity, Query};

#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct User {
    id: Option<i64>,
    email: String,
}

impl Entity for User {
    fn table_name() -> &'static str {
        "users"
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

struct UserService {
    manager: Arc<TxManager>,
    users: Crud<User>,
}

impl UserService {
    #[transactional(manager = &self.manager)]
    fn register(&self, email: &str) -> Result<User, DataError> {
        if self.users.count(&Query::new().where_eq("email", email)?)? > 0 {
            return Err(DataError::Other("email taken".into()));
        }
        self.users.add(User {
            id: None,
            email: email.to_string(),
        })
    }
}

fn main() {
    let _ = UserService::register;
}
