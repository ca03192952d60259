//! Session event channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use super::state::SessionState;
use crate::tools::ToolKind;
use crate::types::{ResponseEvent, ToolOutput};

/// Stream of events for one session. Ends when the session reaches a
/// terminal state.
pub type SessionEvents = UnboundedReceiverStream<SessionEvent>;

/// Concrete event payloads emitted by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventPayload {
    StateChanged {
        state: SessionState,
    },
    /// A canonical event of the round in flight.
    Response {
        event: ResponseEvent,
    },
    ToolStarted {
        call_id: String,
        tool_name: String,
        kind: ToolKind,
    },
    ToolFinished {
        output: ToolOutput,
    },
    Error {
        message: String,
    },
}

/// Envelope for session events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub seq: u64,
    /// Round the event belongs to; 0 before the first round.
    pub round: usize,
    pub timestamp: DateTime<Utc>,
    pub payload: SessionEventPayload,
}

impl SessionEvent {
    pub fn response_event(&self) -> Option<&ResponseEvent> {
        match &self.payload {
            SessionEventPayload::Response { event } => Some(event),
            _ => None,
        }
    }
}

/// Owns the sending half of a session's event channel.
#[derive(Debug)]
pub(crate) struct SessionEmitter {
    session_id: Uuid,
    seq: AtomicU64,
    tx: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

impl SessionEmitter {
    /// Open the channel. The receiver is handed to the single consumer.
    pub(crate) fn open(session_id: Uuid) -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            session_id,
            seq: AtomicU64::new(1),
            tx: Mutex::new(Some(tx)),
        };
        (emitter, UnboundedReceiverStream::new(rx))
    }

    pub(crate) fn emit(&self, round: usize, payload: SessionEventPayload) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(SessionEvent {
            session_id: self.session_id,
            seq,
            round,
            timestamp: Utc::now(),
            payload,
        });
    }

    /// Drop the sender so the consumer's stream ends.
    pub(crate) fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}
