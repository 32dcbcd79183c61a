pub mod codec;
pub mod memory;
pub mod persister;
pub mod sqlite;
pub mod store;

pub use codec::{ProfileCodec, PROFILE_FORMAT_VERSION};
pub use memory::MemoryStore;
pub use persister::Persister;
pub use sqlite::SqliteStore;
pub use store::{new_writer_id, KeyValueStore, StoreChange, WriterId};
