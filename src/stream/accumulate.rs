//! Fold canonical events into a finalized response.

use std::collections::{BTreeMap, HashSet};

use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use super::normalize::EventStream;
use crate::error::RondoError;
use crate::types::{OutputItem, Response, ResponseEvent, ResponseStatus};

#[derive(Debug, Clone)]
struct Slot {
    item: OutputItem,
    done: bool,
}

/// Per-round event folder. Produces the response exactly once, on the
/// terminal event.
#[derive(Debug, Default)]
pub struct Accumulator {
    slots: BTreeMap<usize, Slot>,
    finished: bool,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns the finalized response on the terminal event.
    pub fn apply(&mut self, event: ResponseEvent) -> Result<Option<Response>, RondoError> {
        if self.finished {
            debug!(event = event.name(), "ignoring event after terminal");
            return Ok(None);
        }
        match event {
            ResponseEvent::OutputItemAdded { output_index, item } => {
                if self.slots.contains_key(&output_index) {
                    return Err(RondoError::Protocol(format!(
                        "output index {output_index} added twice"
                    )));
                }
                self.slots.insert(output_index, Slot { item, done: false });
            }
            ResponseEvent::OutputItemDelta {
                output_index,
                part_index,
                kind,
                fragment,
            } => {
                let slot = self.slots.get_mut(&output_index).ok_or_else(|| {
                    RondoError::Protocol(format!("delta for unknown output index {output_index}"))
                })?;
                if slot.done {
                    return Err(RondoError::Protocol(format!(
                        "delta after done for output index {output_index}"
                    )));
                }
                slot.item.apply_delta(kind, part_index, &fragment)?;
            }
            ResponseEvent::OutputItemDone { output_index, item } => match self.slots.get_mut(&output_index) {
                Some(slot) => {
                    slot.item = merge_done(&slot.item, item);
                    slot.done = true;
                }
                None => {
                    debug!(output_index, "done without added");
                    self.slots.insert(output_index, Slot { item, done: true });
                }
            },
            ResponseEvent::ImagePartial {
                output_index,
                partial_image_index,
                ..
            } => {
                if let Some(Slot {
                    item: OutputItem::ImageGenerationCall(call),
                    done: false,
                }) = self.slots.get_mut(&output_index)
                {
                    call.partial_image_index = Some(partial_image_index);
                }
            }
            ResponseEvent::ResponseCompleted { response } => {
                self.finished = true;
                return self.finalize(response).map(Some);
            }
            ResponseEvent::ResponseError { response_id, error } => {
                self.finished = true;
                let output = std::mem::take(&mut self.slots)
                    .into_values()
                    .map(|slot| slot.item)
                    .collect();
                return Ok(Some(Response {
                    id: response_id.unwrap_or_default(),
                    status: ResponseStatus::Failed,
                    output,
                    error: Some(error),
                    ..Default::default()
                }));
            }
        }
        Ok(None)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_done(&self, output_index: usize) -> bool {
        self.slots.get(&output_index).is_some_and(|slot| slot.done)
    }

    /// Item at `output_index` as accumulated so far.
    pub fn item(&self, output_index: usize) -> Option<&OutputItem> {
        self.slots.get(&output_index).map(|slot| &slot.item)
    }

    /// Parsed arguments of a call item. `None` until the item is done, since
    /// partial argument buffers are not valid JSON.
    pub fn parsed_arguments(&self, output_index: usize) -> Option<Result<Value, RondoError>> {
        let slot = self.slots.get(&output_index).filter(|slot| slot.done)?;
        let raw = slot.item.arguments()?;
        Some(serde_json::from_str(raw).map_err(|e| RondoError::InvalidArguments {
            call_id: slot.item.call_id().unwrap_or_default().to_string(),
            message: e.to_string(),
        }))
    }

    fn finalize(&mut self, snapshot: Response) -> Result<Response, RondoError> {
        let mut slots = std::mem::take(&mut self.slots);
        let len = slots
            .keys()
            .next_back()
            .map_or(0, |last| last + 1)
            .max(snapshot.output.len());
        let output: Vec<OutputItem> = (0..len)
            .filter_map(|index| {
                slots
                    .remove(&index)
                    .map(|slot| slot.item)
                    .or_else(|| snapshot.output.get(index).cloned())
            })
            .collect();

        let mut seen = HashSet::new();
        for call_id in output.iter().filter_map(OutputItem::call_id) {
            if !seen.insert(call_id) {
                return Err(RondoError::Protocol(format!(
                    "duplicate call id {call_id} in response {}",
                    snapshot.id
                )));
            }
        }

        let mut response = Response { output, ..snapshot };
        if response.output_text.is_none() {
            let text = response.aggregate_text();
            if !text.is_empty() {
                response.output_text = Some(text);
            }
        }
        Ok(response)
    }
}

/// The done item wins, except that an empty argument string keeps the
/// buffered arguments.
fn merge_done(buffered: &OutputItem, mut done: OutputItem) -> OutputItem {
    match (&mut done, buffered) {
        (OutputItem::FunctionCall(d), OutputItem::FunctionCall(b)) if d.arguments.is_empty() => {
            d.arguments = b.arguments.clone();
        }
        (OutputItem::McpCall(d), OutputItem::McpCall(b)) if d.arguments.is_empty() => {
            d.arguments = b.arguments.clone();
        }
        _ => {}
    }
    done
}

/// Drain a round's events into its finalized response.
pub async fn collect_response(mut events: EventStream) -> Result<Response, RondoError> {
    let mut accumulator = Accumulator::new();
    while let Some(event) = events.next().await {
        if let Some(response) = accumulator.apply(event?)? {
            return Ok(response);
        }
    }
    Err(RondoError::IncompleteStream)
}
