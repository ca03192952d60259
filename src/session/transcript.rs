//! Conversation state carried between rounds.

use crate::types::{InputItem, Response, ToolOutput};

/// Input bookkeeping for both continuation modes.
///
/// With `store` the server keeps history, so only the items added since the
/// last round are sent along with the previous response id. Without it the
/// full transcript is resent every round.
#[derive(Debug, Clone)]
pub struct Conversation {
    store: bool,
    history: Vec<InputItem>,
    pending: Vec<InputItem>,
    previous_response_id: Option<String>,
}

impl Conversation {
    pub fn new(store: bool, input: Vec<InputItem>) -> Self {
        Self {
            store,
            history: input.clone(),
            pending: input,
            previous_response_id: None,
        }
    }

    /// Input items for the next request.
    pub fn request_input(&self) -> Vec<InputItem> {
        if self.store {
            self.pending.clone()
        } else {
            self.history.clone()
        }
    }

    /// Continuation id for the next request (`store` mode only).
    pub fn previous_response_id(&self) -> Option<&str> {
        if self.store {
            self.previous_response_id.as_deref()
        } else {
            None
        }
    }

    /// Fold a finalized response into the conversation.
    pub fn record_round(&mut self, response: &Response) {
        self.history
            .extend(response.output.iter().cloned().map(InputItem::from));
        self.pending.clear();
        if !response.id.is_empty() {
            self.previous_response_id = Some(response.id.clone());
        }
    }

    /// Queue one batch of tool outputs for the next round.
    pub fn push_tool_outputs(&mut self, outputs: &[ToolOutput]) {
        for output in outputs {
            self.history.push(InputItem::from(output.clone()));
            self.pending.push(InputItem::from(output.clone()));
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Everything exchanged so far, in order.
    pub fn transcript(&self) -> &[InputItem] {
        &self.history
    }
}
