//! The finalized result of one round.

use serde::{Deserialize, Deserializer, Serialize};

use super::item::OutputItem;
use super::usage::Usage;

/// Overall status of a response.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseStatus {
    Queued,
    #[default]
    InProgress,
    Completed,
    Incomplete,
    Failed,
    Cancelled,
}

/// Terminal error attached to a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Empty when the API sends no code or `null`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code: String,
    pub message: String,
}

impl ResponseError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Placeholder for a failed snapshot that carried no error object.
    pub(crate) fn unspecified() -> Self {
        Self::new("unknown", "response failed without an error payload")
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A response snapshot. Immutable once finalized by the accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Response {
    /// Concatenate the text of every assistant message in output order.
    pub fn aggregate_text(&self) -> String {
        self.output.iter().filter_map(OutputItem::text).collect()
    }

    /// Every call item (client-resolved or hosted) in output order.
    pub fn calls(&self) -> impl Iterator<Item = &OutputItem> {
        self.output.iter().filter(|item| item.resolution().is_some())
    }

    pub fn client_calls(&self) -> impl Iterator<Item = &OutputItem> {
        self.output.iter().filter(|item| item.is_client_call())
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResponseStatus::Failed
    }

    /// Error of a failed response, substituting a placeholder when the
    /// snapshot carried none.
    pub fn failure(&self) -> Option<ResponseError> {
        self.is_failed().then(|| {
            self.error
                .clone()
                .unwrap_or_else(ResponseError::unspecified)
        })
    }
}
