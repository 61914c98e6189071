//! Live status fan-out.
//!
//! Observers subscribe to one order id and receive every status event
//! published for it from then on. Nothing is buffered for observers that are
//! not connected; a late subscriber only sees its own acknowledgement and
//! whatever comes after it.

mod heartbeat;
mod registry;

pub use registry::{
    ListenerId, OrderStream, OutboundFrame, StreamError, StreamSettings, Subscription,
};
