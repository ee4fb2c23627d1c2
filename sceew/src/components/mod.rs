//! Contains the building blocks the engine runs off the message loop.
//!
//! The countdown and the dispatcher are what a triggered alert turns into;
//! the supervisor owns every task they spawn.

pub mod countdown;
pub mod dispatcher;
pub mod supervisor;
