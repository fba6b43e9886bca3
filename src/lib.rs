// primedex - indexed prime number storage
// Segmented sieve generation, delta/varint compressed segments, cached lookups

#![warn(rust_2018_idioms)]

pub mod builder;
pub mod cache;
pub mod codec;
pub mod config;
pub mod database;
pub mod progress;
pub mod server;
pub mod sieve;
pub mod storage;

// Re-exports for convenience
pub use builder::{BuildReport, PrimeDatabaseBuilder};
pub use config::EngineConfig;
pub use database::PrimeDatabase;
pub use storage::{initialize_store, FileSegmentStore, SegmentStore};

/// primedex error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        /// A varint or delta buffer is truncated, overflows, or disagrees
        /// with the declared segment size.
        #[error("Malformed encoding: {0}")]
        MalformedEncoding(String),

        /// No segment covers the requested index (not generated yet).
        #[error("Prime index {0} not found")]
        NotFound(u64),

        /// The caller asked for an index that can never exist (zero or negative).
        #[error("Prime index {0} out of range: index must be a positive integer")]
        OutOfRange(i64),

        #[error("Storage unavailable: {0}")]
        StorageUnavailable(String),

        /// Invariant violation while building; nothing inconsistent is persisted.
        #[error("Generation failure: {0}")]
        GenerationFailure(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),
    }

    impl Error {
        /// Whether retrying later may succeed (store busy or still building).
        pub fn is_retryable(&self) -> bool {
            matches!(self, Error::StorageUnavailable(_) | Error::NotFound(_))
        }
    }

    impl From<std::io::Error> for Error {
        fn from(err: std::io::Error) -> Self {
            Error::StorageUnavailable(err.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
