//! Request/Reply Correlation
//!
//! Matches replies to outstanding requests by client sequence number. Each
//! registered request resolves exactly once: with its reply, a remote error,
//! a timeout, or a forced failure. Whichever happens first removes the entry
//! under the table lock, so the others find nothing and become no-ops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::codec::Envelope;
use crate::shared::error::ProtocolError;

/// Successful reply payload and the metadata it arrived with.
#[derive(Debug, Clone)]
pub struct Reply {
    pub service_name: String,
    pub method_name: String,
    pub server_seq: u64,
    pub body: Bytes,
}

pub type ReplyResult = Result<Reply, ProtocolError>;

#[derive(Debug)]
struct PendingRequest {
    label: String,
    sender: oneshot::Sender<ReplyResult>,
}

/// Outstanding requests of one session.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<u64, PendingRequest>>,
}

impl CorrelationTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a request that is about to be transmitted.
    ///
    /// Must be called before the frame is written so that an immediate reply
    /// finds its entry.
    pub fn register(
        self: &Arc<Self>,
        seq: u64,
        label: impl Into<String>,
        timeout: Duration,
    ) -> PendingReply {
        let label = label.into();
        let deadline = Instant::now() + timeout;
        let (sender, receiver) = oneshot::channel();

        let previous = self.pending.lock().insert(
            seq,
            PendingRequest {
                label: label.clone(),
                sender,
            },
        );
        if let Some(previous) = previous {
            tracing::error!(
                seq,
                label = %previous.label,
                "Sequence number reused, dropping stale request"
            );
        }

        PendingReply {
            seq,
            label,
            deadline,
            receiver,
            table: Arc::clone(self),
        }
    }

    /// Resolve the request a reply belongs to.
    ///
    /// Returns `false` when no request is waiting (late, duplicate or
    /// unsolicited reply). Such replies are dropped; error replies among them
    /// are logged as orphaned.
    pub fn complete(&self, reply: Envelope) -> bool {
        let mut pending = self.pending.lock();
        let Some(entry) = pending.remove(&reply.client_seq) else {
            drop(pending);
            if reply.error_code != 0 {
                tracing::warn!(
                    seq = reply.client_seq,
                    method = %reply.label(),
                    code = reply.error_code,
                    message = %reply.error_message,
                    "Orphaned error reply"
                );
            } else {
                tracing::trace!(seq = reply.client_seq, "Dropping reply with no pending request");
            }
            return false;
        };

        let outcome = if reply.error_code != 0 {
            Err(ProtocolError::Remote {
                service: reply.service_name,
                method: reply.method_name,
                code: reply.error_code,
                message: reply.error_message,
            })
        } else {
            Ok(Reply {
                service_name: reply.service_name,
                method_name: reply.method_name,
                server_seq: reply.server_seq,
                body: reply.body,
            })
        };

        // Sent under the lock: a waiter whose deadline races this reply will
        // find the outcome already in its channel.
        if entry.sender.send(outcome).is_err() {
            tracing::trace!(
                seq = reply.client_seq,
                label = %entry.label,
                "Reply waiter already gone"
            );
        }
        true
    }

    /// Fail every pending request with `error` and clear the table.
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&self, error: ProtocolError) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        for (seq, entry) in pending.drain() {
            if entry.sender.send(Err(error.clone())).is_err() {
                tracing::trace!(seq, label = %entry.label, "Reply waiter already gone");
            }
        }
        count
    }

    /// Number of requests awaiting a reply.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.pending.lock().contains_key(&seq)
    }

    fn remove(&self, seq: u64) -> bool {
        self.pending.lock().remove(&seq).is_some()
    }
}

/// Future side of a registered request.
///
/// Dropping it without awaiting releases the table entry.
#[derive(Debug)]
pub struct PendingReply {
    seq: u64,
    label: String,
    deadline: Instant,
    receiver: oneshot::Receiver<ReplyResult>,
    table: Arc<CorrelationTable>,
}

impl PendingReply {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait for the reply, the deadline, or a forced failure.
    pub async fn wait(mut self) -> ReplyResult {
        match tokio::time::timeout_at(self.deadline, &mut self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without an outcome: the table itself went away.
            Ok(Err(_)) => Err(ProtocolError::Disconnected),
            Err(_) => {
                if self.table.remove(self.seq) {
                    tracing::debug!(seq = self.seq, label = %self.label, "Request timed out");
                    return Err(ProtocolError::Timeout {
                        method: self.label.clone(),
                        seq: self.seq,
                    });
                }
                // Lost the race: the outcome is already in the channel.
                self.receiver.try_recv().unwrap_or_else(|_| {
                    Err(ProtocolError::Timeout {
                        method: self.label.clone(),
                        seq: self.seq,
                    })
                })
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.remove(self.seq);
    }
}
