//! Venue routing for market orders.
//!
//! [`RouteProvider`] is what the lifecycle engine calls. [`DexRouter`] fans a
//! quote request out to every [`VenueClient`] and keeps the highest price.

pub mod dex;
pub mod error;
pub mod traits;
pub mod venue;

pub use dex::{generate_tx_hash, select_best_quote, DexRouter};
pub use error::RouteError;
pub use traits::{RouteProvider, VenueClient};
pub use venue::{base_price, SimulatedVenue};
