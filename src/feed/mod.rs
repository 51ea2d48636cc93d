//! Live-score feed module - websocket connection and provider message decoding

pub mod messages;
pub mod websocket;

pub use websocket::ScoreFeedClient;
