//! Infrastructure layer for conclave
//!
//! Adapters behind the application ports: figment-merged configuration and
//! the atomic JSON config store, the filesystem run store, HMAC-SHA256
//! partial-result signatures, and the sensitive-data scrubber.

pub mod config;
pub mod persistence;
pub mod providers;
pub mod scrub;

pub use config::{ConfigLoader, FileConfig, JsonConfigStore};
pub use persistence::{
    run_store::FsRunStore,
    signature::{HmacSigner, DEFAULT_SECRET, SECRET_ENV},
};
pub use providers::{canned_registry, CannedProvider};
pub use scrub::{scrub, ScrubReport};
