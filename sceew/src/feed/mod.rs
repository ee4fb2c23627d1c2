//! The inbound side of the engine: the WebSocket subscription and the
//! classification of what arrives on it.

pub mod connector;
pub mod message;

pub use connector::{FeedConnector, ResyncHandle};
pub use message::{classify, FeedMessage, QuakeReport, HEARTBEAT_TYPE};
