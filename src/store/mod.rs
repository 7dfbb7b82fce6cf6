//! Domain records and the repository interface over them.

pub mod memory;
pub mod model;
pub mod traits;

pub use memory::InMemoryStore;
pub use traits::Database;
