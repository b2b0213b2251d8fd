//! Presence tracking: who is online and through which connection.

mod broadcaster;
mod registry;

pub use broadcaster::PresenceBroadcaster;
pub use registry::{OnlineSet, PresenceRegistry};
