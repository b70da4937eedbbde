//! Cross-cutting building blocks shared by every layer.

pub mod cancellation;
pub mod errors;
pub mod shutdown;
pub mod time;

pub use cancellation::{cancellable, detached};
pub use errors::{DomainError, DomainResult};
pub use shutdown::ShutdownSignal;
pub use time::{Clock, FixedClock, PresentationZone, SharedClock, SystemClock};
