//! Shared helpers for Server-Sent Events streaming.

use crate::{CompletionChunk, ToolCall, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// UTF-8 Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Decode as much of `byte_buffer` as forms valid UTF-8.
/// Incomplete trailing sequences stay in the buffer for the next network chunk.
pub fn decode_utf8_streaming(byte_buffer: &mut Vec<u8>) -> Option<String> {
    let valid_up_to = match std::str::from_utf8(byte_buffer) {
        Ok(_) => byte_buffer.len(),
        Err(e) => e.valid_up_to(),
    };

    if valid_up_to == 0 {
        return None;
    }

    let valid_bytes: Vec<u8> = byte_buffer.drain(..valid_up_to).collect();
    Some(String::from_utf8_lossy(&valid_bytes).into_owned())
}

/// Extract the payload of an SSE `data:` line.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Chunk Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Final chunk carrying any accumulated tool calls and usage.
pub fn make_final_chunk(
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
    stop_reason: Option<String>,
) -> CompletionChunk {
    CompletionChunk {
        content: String::new(),
        finished: true,
        usage,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        stop_reason,
    }
}

/// Text content chunk (not finished).
pub fn make_text_chunk(content: String) -> CompletionChunk {
    CompletionChunk {
        content,
        finished: false,
        usage: None,
        tool_calls: None,
        stop_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_incomplete_sequence() {
        // "é" is 0xC3 0xA9; split it across two network chunks
        let mut buffer = vec![b'a', 0xC3];
        assert_eq!(decode_utf8_streaming(&mut buffer).as_deref(), Some("a"));
        assert_eq!(buffer, vec![0xC3]);

        assert_eq!(decode_utf8_streaming(&mut buffer), None);

        buffer.push(0xA9);
        assert_eq!(decode_utf8_streaming(&mut buffer).as_deref(), Some("é"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sse_data_prefix() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data("event: ping"), None);
    }

    #[test]
    fn test_final_chunk_omits_empty_tool_calls() {
        let chunk = make_final_chunk(Vec::new(), None, Some("stop".to_string()));
        assert!(chunk.finished);
        assert!(chunk.tool_calls.is_none());
    }
}
