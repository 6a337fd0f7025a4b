mod memory_backend_repo;
mod sqlite_backend_repo;

pub use memory_backend_repo::MemoryBackendRepository;
pub use sqlite_backend_repo::SqliteBackendRepository;
