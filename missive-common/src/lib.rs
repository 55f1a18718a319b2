pub mod domain;
pub mod logging;
pub mod priority;
pub mod status;

pub use domain::Domain;
pub use priority::Priority;
pub use status::{DeliveryState, SendStatus};
pub use tracing;

/// Control signal broadcast to long-running service loops
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
