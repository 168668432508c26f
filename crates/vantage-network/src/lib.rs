//! Backend access: the sync gateway, the dashboard client and the local
//! event bus.

pub mod bus;
pub mod dashboard;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod poll;

pub use bus::EventBus;
pub use dashboard::DashboardClient;
pub use gateway::{dispatch, GatewayCall, GatewayReply, MoveOutcome, SyncGateway};
pub use http::HttpGateway;
pub use memory::{BackendReply, BackendState, InMemoryBackend};
pub use poll::{spawn_poller, PollGate, PollTicket};

use vantage_types::VantageError;

pub fn network_error(message: impl Into<String>) -> VantageError {
    VantageError::Network(message.into())
}
