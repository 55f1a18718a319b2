//! Durable key-value collaborator for queue snapshots
//!
//! The queue core persists its in-flight state through the [`KeyValueStore`]
//! trait; production deployments wire in whatever durable store the
//! storefront already runs, while tests and transient setups use the
//! bundled [`MemoryStore`].

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::MemoryStore;
pub use error::{Result, StoreError};
pub use traits::KeyValueStore;
