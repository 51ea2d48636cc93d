//! Exchange module - signed REST client and market port implementations

pub mod auth;
pub mod client;
pub mod messages;
pub mod paper;
pub mod rest;
pub mod retry;

pub use client::ExchangeClient;
pub use paper::PaperMarketPort;
pub use rest::ExchangeRestClient;
pub use retry::RetryPolicy;
