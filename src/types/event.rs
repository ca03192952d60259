//! Canonical response events shared by streaming and non-streaming rounds.

use serde::{Deserialize, Serialize};

use super::item::OutputItem;
use super::response::{Response, ResponseError};

/// Which buffer of an output item a delta fragment extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeltaKind {
    Text,
    Refusal,
    Arguments,
    ReasoningSummary,
    ReasoningText,
    Code,
}

/// One event of a round, after normalization.
///
/// Per output index the order is Added, Delta*, Done. Every round ends in
/// exactly one `ResponseCompleted` or `ResponseError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    OutputItemAdded {
        output_index: usize,
        item: OutputItem,
    },
    OutputItemDelta {
        output_index: usize,
        /// Content, summary or part index inside the item.
        #[serde(default)]
        part_index: usize,
        kind: DeltaKind,
        fragment: String,
    },
    OutputItemDone {
        output_index: usize,
        item: OutputItem,
    },
    ImagePartial {
        output_index: usize,
        item_id: String,
        partial_image_index: u32,
        partial_image_b64: String,
    },
    ResponseCompleted {
        response: Response,
    },
    ResponseError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
        error: ResponseError,
    },
}

impl ResponseEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ResponseCompleted { .. } | Self::ResponseError { .. }
        )
    }

    pub fn output_index(&self) -> Option<usize> {
        match self {
            Self::OutputItemAdded { output_index, .. }
            | Self::OutputItemDelta { output_index, .. }
            | Self::OutputItemDone { output_index, .. }
            | Self::ImagePartial { output_index, .. } => Some(*output_index),
            Self::ResponseCompleted { .. } | Self::ResponseError { .. } => None,
        }
    }

    /// Short label for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OutputItemAdded { .. } => "output_item_added",
            Self::OutputItemDelta { .. } => "output_item_delta",
            Self::OutputItemDone { .. } => "output_item_done",
            Self::ImagePartial { .. } => "image_partial",
            Self::ResponseCompleted { .. } => "response_completed",
            Self::ResponseError { .. } => "response_error",
        }
    }
}
