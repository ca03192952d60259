//! Token usage reported by the remote API.

use serde::{Deserialize, Serialize};

/// Token usage for one response, or accumulated across a session.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

impl Usage {
    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        if let Some(details) = &other.input_tokens_details {
            self.input_tokens_details
                .get_or_insert_with(Default::default)
                .cached_tokens += details.cached_tokens;
        }
        if let Some(details) = &other.output_tokens_details {
            self.output_tokens_details
                .get_or_insert_with(Default::default)
                .reasoning_tokens += details.reasoning_tokens;
        }
    }

    pub fn cached_tokens(&self) -> u32 {
        self.input_tokens_details
            .as_ref()
            .map_or(0, |d| d.cached_tokens)
    }

    pub fn reasoning_tokens(&self) -> u32 {
        self.output_tokens_details
            .as_ref()
            .map_or(0, |d| d.reasoning_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates_details() {
        let mut total = Usage::default();
        let round = Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            input_tokens_details: Some(InputTokensDetails { cached_tokens: 4 }),
            output_tokens_details: Some(OutputTokensDetails {
                reasoning_tokens: 2,
            }),
        };
        total.merge(&round);
        total.merge(&round);
        assert_eq!(total.total_tokens, 30);
        assert_eq!(total.cached_tokens(), 8);
        assert_eq!(total.reasoning_tokens(), 4);
    }
}
