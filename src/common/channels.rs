//! Channel type definitions for the gateway event queue

use tokio::sync::mpsc;

use super::types::GatewayEvent;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new gateway event channel with the default buffer size
pub fn create_event_channel() -> (mpsc::Sender<GatewayEvent>, mpsc::Receiver<GatewayEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new gateway event channel with a custom buffer size
pub fn create_event_channel_with_size(
    size: usize,
) -> (mpsc::Sender<GatewayEvent>, mpsc::Receiver<GatewayEvent>) {
    mpsc::channel(size.max(1))
}
