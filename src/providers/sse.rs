//! SSE decoding for OpenAI-compatible streaming responses.
//!
//! Provides [`SseDecoder`] for line-buffered extraction of `delta.content`
//! chunks, and [`chunk_stream`] which turns a raw byte stream into a
//! [`ChunkStream`]. Handles TCP chunk boundary reassembly correctly.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use super::{ChunkStream, ProviderError};

/// Lines longer than this are dropped instead of buffered.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Line buffer that survives chunk boundaries and yields text deltas.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns the text deltas completed by this chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut chunks = Vec::new();
        if self.done {
            return chunks;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.process_line(&line, &mut chunks);
            if self.done {
                self.buffer.clear();
                return chunks;
            }
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                "SSE line exceeded buffer cap, dropping"
            );
            self.buffer.clear();
        }

        chunks
    }

    /// Flush whatever is left in the buffer as a final line.
    pub fn finish(&mut self) -> Vec<String> {
        let mut chunks = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut chunks);
        }
        chunks
    }

    fn process_line(&mut self, raw: &[u8], chunks: &mut Vec<String>) {
        let Ok(line) = std::str::from_utf8(raw) else {
            return;
        };
        let line = line.trim_end_matches(['\n', '\r']);

        // event:, id:, retry: and comments carry no content
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data == "[DONE]" {
            self.done = true;
            return;
        }

        if let Some(content) = delta_content(data) {
            chunks.push(content);
        }
    }
}

/// Extract `choices[0].delta.content` from one `data:` payload.
fn delta_content(data: &str) -> Option<String> {
    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed SSE data line");
            return None;
        }
    };

    parsed
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Decode an SSE byte stream into text chunks.
///
/// The stream ends at `[DONE]` or when the body ends; a transport error
/// becomes a single terminal [`ProviderError::Stream`].
pub fn chunk_stream<S, E>(provider: String, body: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (body.boxed(), SseDecoder::new(), provider, false);

    stream::unfold(
        state,
        |(mut body, mut decoder, provider, finished)| async move {
            if finished {
                return None;
            }

            let (items, finished) = match body.next().await {
                Some(Ok(bytes)) => {
                    let chunks = decoder.push(&bytes);
                    let done = decoder.is_done();
                    (chunks.into_iter().map(Ok).collect::<Vec<_>>(), done)
                }
                Some(Err(e)) => {
                    tracing::error!(provider = %provider, error = %e, "Error streaming from provider");
                    let err = ProviderError::Stream {
                        provider: provider.clone(),
                        message: e.to_string(),
                    };
                    (vec![Err(err)], true)
                }
                None => (decoder.finish().into_iter().map(Ok).collect(), true),
            };

            Some((stream::iter(items), (body, decoder, provider, finished)))
        },
    )
    .flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build SSE data from event lines, then split at the given byte positions.
    fn split_sse_at_positions(events: &[&str], split_positions: &[usize]) -> Vec<Vec<u8>> {
        let full: Vec<u8> = events
            .iter()
            .flat_map(|e| format!("{}\n\n", e).into_bytes())
            .collect();

        let mut chunks = Vec::new();
        let mut prev = 0;
        for &pos in split_positions {
            if pos > prev && pos < full.len() {
                chunks.push(full[prev..pos].to_vec());
                prev = pos;
            }
        }
        chunks.push(full[prev..].to_vec());
        chunks
    }

    fn decode_all(chunks: &[Vec<u8>]) -> (Vec<String>, bool) {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.push(chunk));
        }
        out.extend(decoder.finish());
        (out, decoder.is_done())
    }

    const HELLO_WORLD: [&str; 4] = [
        r#"data: {"id":"abc","choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#,
        r#"data: {"id":"abc","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        r#"data: {"id":"abc","choices":[{"index":0,"delta":{"content":" world"},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
    ];

    #[test]
    fn test_single_chunk_full_stream() {
        let chunks = split_sse_at_positions(&HELLO_WORLD, &[]);
        let (out, done) = decode_all(&chunks);
        assert!(done);
        assert_eq!(out, vec!["Hello", " world"]);
    }

    #[test]
    fn test_content_split_across_chunks() {
        let chunks = split_sse_at_positions(&HELLO_WORLD, &[30, 95, 140, 200]);
        assert!(chunks.len() > 1, "Should be split into multiple chunks");
        let (out, done) = decode_all(&chunks);
        assert!(done);
        assert_eq!(out, vec!["Hello", " world"]);
    }

    #[test]
    fn test_no_done_still_yields_content() {
        let chunks = split_sse_at_positions(&HELLO_WORLD[..3], &[]);
        let (out, done) = decode_all(&chunks);
        assert!(!done);
        assert_eq!(out, vec!["Hello", " world"]);
    }

    #[test]
    fn test_data_after_done_ignored() {
        let raw = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n";
        let mut decoder = SseDecoder::new();
        let mut out = decoder.push(raw);
        out.extend(decoder.finish());
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn test_malformed_json_skipped() {
        let events = [
            "data: {this is not valid json}",
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
            "data: [DONE]",
        ];
        let (out, done) = decode_all(&split_sse_at_positions(&events, &[]));
        assert!(done);
        assert_eq!(out, vec!["ok"]);
    }

    #[test]
    fn test_non_data_sse_fields_skipped() {
        let raw = b"event: message\nid: 123\nretry: 5000\n: this is a comment\ndata: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
        let (out, done) = decode_all(&[raw.to_vec()]);
        assert!(done);
        assert_eq!(out, vec!["Hi"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let raw = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\r\n\r\ndata: [DONE]\r\n\r\n";
        let (out, done) = decode_all(&[raw.to_vec()]);
        assert!(done);
        assert_eq!(out, vec!["Hi"]);
    }

    #[test]
    fn test_data_without_space() {
        let raw = b"data:{\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata:[DONE]\n\n";
        let (out, done) = decode_all(&[raw.to_vec()]);
        assert!(done);
        assert_eq!(out, vec!["Hi"]);
    }

    #[test]
    fn test_final_line_without_trailing_newline() {
        let raw = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}";
        let (out, done) = decode_all(&[raw.to_vec()]);
        assert!(!done);
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_content_skipped() {
        let raw = b"data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":null}}]}\n\n";
        let (out, _) = decode_all(&[raw.to_vec()]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_buffer_cap() {
        let huge_chunk = vec![b'x'; 65 * 1024];

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&huge_chunk).is_empty());

        let normal = b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: [DONE]\n\n";
        let out = decoder.push(normal);
        assert!(decoder.is_done());
        assert_eq!(out, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_chunk_stream_yields_in_order() {
        let parts: Vec<Result<Bytes, std::io::Error>> = split_sse_at_positions(&HELLO_WORLD, &[60, 130])
            .into_iter()
            .map(|c| Ok(Bytes::from(c)))
            .collect();

        let chunks: Vec<String> = chunk_stream("test".to_string(), stream::iter(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_chunk_stream_surfaces_transport_error() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            )),
            Err(std::io::Error::other("connection reset")),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
            )),
        ];

        let items: Vec<Result<String, ProviderError>> =
            chunk_stream("flaky".to_string(), stream::iter(parts))
                .collect()
                .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(
            &items[1],
            Err(ProviderError::Stream { provider, .. }) if provider == "flaky"
        ));
    }
}
