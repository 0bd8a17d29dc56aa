pub mod connection;
pub mod memory_store;
pub mod pg_store;
pub mod store;

pub use memory_store::MemorySubscriberStore;
pub use pg_store::PgSubscriberStore;
pub use store::SubscriberStore;
