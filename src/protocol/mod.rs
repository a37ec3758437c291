//! # Gateway Protocol Client
//!
//! Client engine for the game gateway:
//!
//! - **codec / messages**: envelope framing and protobuf message types
//! - **correlation**: matching replies to outstanding requests
//! - **dispatcher**: push notification routing
//! - **heartbeat**: liveness tracking
//! - **transport**: WebSocket connector
//! - **session**: one logged-in connection tying the above together

pub mod codec;
pub mod correlation;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod messages;
pub mod session;
pub mod transport;

pub use codec::{Envelope, MessageType, SequenceCounter};
pub use correlation::{CorrelationTable, PendingReply, Reply};
pub use dispatcher::{NotificationDispatcher, PushKind};
pub use events::{AccountSnapshot, SessionEvent};
pub use heartbeat::{HeartbeatMonitor, Liveness};
pub use session::{Credential, Session, SessionFactory, SessionStatus};
pub use transport::{Connection, Connector, TransportEvent, WebSocketConnector};
