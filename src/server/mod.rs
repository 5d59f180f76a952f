//! HTTP and WebSocket server surface.

pub mod protocol;
pub mod registry;
pub mod routes;
pub mod ws;

pub use protocol::{parse_inbound, InboundMessage, OutboundEvent};
pub use registry::ConnectionRegistry;
pub use routes::{build_router, AppState};
