pub mod error;
pub mod session;

pub use error::DieselErrorExt;
pub use session::DieselSession;

pub mod prelude {
    pub use crate::{DieselErrorExt, DieselSession};
    pub use txscope_data::prelude::*;
}
