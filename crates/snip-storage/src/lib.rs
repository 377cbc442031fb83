pub mod map_file;
pub mod sqlite;

pub use map_file::MapFileRepository;
pub use snip_core::repository::{Deleter, ReadRepository, Repository, Result};
pub use snip_core::StorageError;
pub use sqlite::SqliteRepository;
