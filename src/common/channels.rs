//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use super::types::FeedEvent;
use crate::strategy::types::EngineReport;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new feed event channel with the default buffer size
pub fn create_feed_channel() -> (mpsc::Sender<FeedEvent>, mpsc::Receiver<FeedEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create the report channel the dispatcher publishes decisions and position closes to
pub fn create_report_channel() -> (mpsc::Sender<EngineReport>, mpsc::Receiver<EngineReport>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}
