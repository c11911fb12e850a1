pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod state;
pub mod store;

pub use error::{DbError, DbResult};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use state::AppState;
pub use store::*;
