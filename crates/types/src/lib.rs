pub mod event;
pub mod job;
pub mod order;
pub mod request;
pub mod route;

pub use event::*;
pub use job::*;
pub use order::*;
pub use request::*;
pub use route::*;

/// Number of execution attempts an order gets before it is marked failed.
pub const MAX_ATTEMPTS: u32 = 3;
