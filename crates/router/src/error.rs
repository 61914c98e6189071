use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no venue returned a quote for {base}/{quote}")]
    NoViableRoute { base: String, quote: String },

    #[error("venue query failed: {0}")]
    VenueQueryFailed(String),

    #[error("invalid route request: {0}")]
    InvalidRequest(String),
}
