//! WebSocket Real-Time Streaming
//!
//! ## Endpoints
//!
//! - `/water-monitor` - viewers: current reading on connect, then every
//!   interval; JSON they send is echoed back
//! - `/water-monitor/publish` - publishers: readings and mode commands
//! - `/water-pubsub` - topic pub/sub backed by the **BroadcastHub**
//!
//! ## Topics
//!
//! - `water_data` - the current reading, once per generator tick
//! - `system` - mode changes
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8000/water-pubsub');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topics: ['water_data']}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'publish') console.log(msg.data.T, msg.data.PH, msg.data.C);
//! };
//! ```

mod handler;
mod hub;
mod messages;
mod publisher;
mod session;
#[cfg(test)]
pub(crate) mod testing;
mod viewer;

pub use handler::{pubsub_handler, run_pubsub};
pub use hub::{BroadcastHub, ConnectionId, HubConfig, HubError, PublishReport};
pub use messages::{
    ClientMessage, ServerMessage, TopicPayload, WsEvent, SYSTEM_TOPIC, WATER_DATA_TOPIC,
};
pub use publisher::run_publisher;
pub use session::{ConnectionGauge, GaugeGuard, SessionEnd};
pub use viewer::{run_viewer, ViewerMessage, ViewerSession};
