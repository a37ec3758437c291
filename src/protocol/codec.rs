//! Envelope Codec
//!
//! Framing for gateway traffic. Every frame is a protobuf `GateMessage`
//! whose `meta` carries routing data and sequence numbers; `body` is opaque.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use prost::Message;

use super::messages::{GateMessage, Meta};
use crate::shared::error::ProtocolError;

/// Envelope direction tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MessageType {
    Request = 1,
    Reply = 2,
    Push = 3,
}

impl MessageType {
    /// Convert from the wire representation.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            3 => Some(Self::Push),
            _ => None,
        }
    }
}

/// One decoded unit of wire traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub service_name: String,
    pub method_name: String,
    pub message_type: MessageType,
    pub client_seq: u64,
    pub server_seq: u64,
    pub error_code: i64,
    pub error_message: String,
    pub body: Bytes,
}

impl Envelope {
    /// Build an outgoing request envelope.
    pub fn request(
        service_name: &str,
        method_name: &str,
        client_seq: u64,
        server_seq: u64,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            service_name: service_name.to_string(),
            method_name: method_name.to_string(),
            message_type: MessageType::Request,
            client_seq,
            server_seq,
            error_code: 0,
            error_message: String::new(),
            body: body.into(),
        }
    }

    /// `service.method`, used in logs and error messages
    pub fn label(&self) -> String {
        format!("{}.{}", self.service_name, self.method_name)
    }

    /// Serialize into a wire frame.
    pub fn encode(&self) -> Vec<u8> {
        GateMessage {
            meta: Some(Meta {
                service_name: self.service_name.clone(),
                method_name: self.method_name.clone(),
                message_type: self.message_type as i32,
                client_seq: self.client_seq as i64,
                server_seq: self.server_seq as i64,
                error_code: self.error_code,
                error_message: self.error_message.clone(),
            }),
            body: self.body.to_vec(),
        }
        .encode_to_vec()
    }

    /// Parse a wire frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Decode` when the bytes are not a gate message,
    /// carry no metadata, or use an unknown message type.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let msg = GateMessage::decode(frame)?;
        let meta = msg
            .meta
            .ok_or_else(|| ProtocolError::Decode("frame without meta".into()))?;
        let message_type = MessageType::from_wire(meta.message_type).ok_or_else(|| {
            ProtocolError::Decode(format!("unknown message type {}", meta.message_type))
        })?;

        Ok(Self {
            service_name: meta.service_name,
            method_name: meta.method_name,
            message_type,
            client_seq: meta.client_seq.max(0) as u64,
            server_seq: meta.server_seq.max(0) as u64,
            error_code: meta.error_code,
            error_message: meta.error_message,
            body: Bytes::from(msg.body),
        })
    }
}

/// Per-session sequence state.
///
/// Client sequence numbers start at 1 and are never reused; the highest
/// server sequence seen is echoed on outgoing requests.
#[derive(Debug)]
pub struct SequenceCounter {
    next_client_seq: AtomicU64,
    highest_server_seq: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self {
            next_client_seq: AtomicU64::new(1),
            highest_server_seq: AtomicU64::new(0),
        }
    }

    /// Consume the next client sequence number.
    pub fn next_client_seq(&self) -> u64 {
        self.next_client_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Remember a server sequence number if it is the highest so far.
    pub fn observe_server_seq(&self, seq: u64) {
        self.highest_server_seq.fetch_max(seq, Ordering::Relaxed);
    }

    pub fn highest_server_seq(&self) -> u64 {
        self.highest_server_seq.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
