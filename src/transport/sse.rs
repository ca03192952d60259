//! Incremental server-sent events decoder.

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Joined `data:` lines of one event.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Splits a chunked byte stream into SSE data payloads.
///
/// Lines are buffered as bytes so multi-byte characters split across chunks
/// survive. `event:`, `id:` and `retry:` fields are ignored; `:` lines are
/// comments.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush an event left open when the body ended without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(frame) = self.line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.pending.push(rest.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let data = self.pending.join("\n");
        self.pending.clear();
        if data == "[DONE]" {
            Some(SseFrame::Done)
        } else {
            Some(SseFrame::Data(data))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_blank_line_and_skips_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keepalive\nevent: response.created\ndata: {\"a\":1}\n\n");
        assert_eq!(frames, vec![SseFrame::Data("{\"a\":1}".into())]);
    }

    #[test]
    fn joins_multi_line_data_and_handles_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: first\r\nda").is_empty());
        let frames = decoder.push(b"ta: second\r\n\r\ndata: [DONE]\n\n");
        assert_eq!(
            frames,
            vec![SseFrame::Data("first\nsecond".into()), SseFrame::Done]
        );
    }

    #[test]
    fn keeps_multibyte_characters_split_across_chunks() {
        let payload = "data: héllo\n\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&payload[..split]).is_empty());
        assert_eq!(
            decoder.push(&payload[split..]),
            vec![SseFrame::Data("héllo".into())]
        );
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::Data("tail".into())));
        assert_eq!(decoder.finish(), None);
    }
}
