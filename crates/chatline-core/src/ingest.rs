//! Streaming response ingestion.
//!
//! Turns a chunked response body into an ordered stream of text fragments:
//! bytes are decoded incrementally as UTF-8, split into newline-delimited
//! records, and each record is parsed as a JSON object whose `response`
//! field carries the fragment.

use crate::error::ChatError;
use chatline_protocol::StreamRecord;
use futures_util::stream::{self, BoxStream, StreamExt};
use log::debug;
use serde_json::Value;
use std::collections::VecDeque;

/// Owned response body yielding raw chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

/// Ordered text fragments decoded from a response body.
pub type FragmentStream = BoxStream<'static, Result<String, ChatError>>;

/// Prefix used by server-sent-event framing.
const SSE_DATA_PREFIX: &str = "data:";
/// Terminal sentinel in server-sent-event framing.
const SSE_DONE: &str = "[DONE]";

/// Stateful UTF-8 decoder that tolerates sequences split across chunks.
///
/// Invalid sequences decode to U+FFFD; an incomplete trailing sequence is
/// held until the next chunk arrives.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode a chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);
        let mut text = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Flush any held bytes at end of input.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Splits decoded text into records and extracts fragments.
///
/// The trailing unterminated record of each chunk is carried over and
/// joined with the next chunk. The carry never holds a newline, so each
/// chunk only scans the text it appended.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    utf8: Utf8Decoder,
    carry: String,
}

impl RecordDecoder {
    /// Feed a chunk and return the fragments of every completed record.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(chunk);
        let mut scan_from = self.carry.len();
        self.carry.push_str(&text);
        let mut fragments = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[scan_from..].find('\n') {
            let end = scan_from + offset;
            if let Some(fragment) = parse_record(&self.carry[start..end]) {
                fragments.push(fragment);
            }
            start = end + 1;
            scan_from = start;
        }
        self.carry.drain(..start);
        fragments
    }

    /// Parse whatever remains buffered once the body is exhausted.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.utf8.finish();
        self.carry.push_str(&tail);
        let record = std::mem::take(&mut self.carry);
        parse_record(&record)
    }
}

/// Parse one record, returning its fragment.
///
/// Blank lines, malformed JSON, non-object values and records without a
/// non-empty string `response` all yield `None`.
pub fn parse_record(line: &str) -> Option<String> {
    let record = line.trim();
    let record = record
        .strip_prefix(SSE_DATA_PREFIX)
        .map(str::trim_start)
        .unwrap_or(record);
    if record.is_empty() || record == SSE_DONE {
        return None;
    }
    let value: Value = match serde_json::from_str(record) {
        Ok(value) => value,
        Err(err) => {
            debug!(
                "skipping malformed record (len={}, err={})",
                record.len(),
                err
            );
            return None;
        }
    };
    if !value.is_object() {
        debug!("skipping non-object record (len={})", record.len());
        return None;
    }
    serde_json::from_value::<StreamRecord>(value)
        .ok()
        .and_then(StreamRecord::fragment)
}

struct IngestState {
    body: Option<ByteStream>,
    decoder: RecordDecoder,
    ready: VecDeque<String>,
    chunks: usize,
}

/// Drain `body` lazily into an ordered stream of fragments.
///
/// The stream ends after end-of-body, or after yielding a single error when
/// a read fails. The body is dropped as soon as it is exhausted or fails.
pub fn fragments(body: ByteStream) -> FragmentStream {
    let state = IngestState {
        body: Some(body),
        decoder: RecordDecoder::default(),
        ready: VecDeque::new(),
        chunks: 0,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            let body = state.body.as_mut()?;
            let next = body.next().await;
            match next {
                Some(Ok(chunk)) => {
                    state.chunks += 1;
                    let decoded = state.decoder.push(&chunk);
                    state.ready.extend(decoded);
                }
                Some(Err(err)) => {
                    state.body = None;
                    return Some((Err(err), state));
                }
                None => {
                    state.body = None;
                    state.ready.extend(state.decoder.finish());
                    debug!("response body exhausted (chunks={})", state.chunks);
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(chunks: Vec<&'static str>) -> ByteStream {
        stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.as_bytes().to_vec()))).boxed()
    }

    async fn collect(body: ByteStream) -> Vec<Result<String, ChatError>> {
        fragments(body).collect().await
    }

    #[test]
    fn utf8_sequence_split_across_chunks() {
        let mut decoder = Utf8Decoder::default();
        let bytes = "héllo €".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 2);
        let mut text = decoder.decode(&head[..2]);
        text.push_str(&decoder.decode(&head[2..]));
        text.push_str(&decoder.decode(tail));
        text.push_str(&decoder.finish());
        assert_eq!(text, "héllo €");
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.decode(b"c\xe2\x82"), "c");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn record_split_across_chunks_is_reassembled() {
        let mut decoder = RecordDecoder::default();
        assert_eq!(decoder.push(br#"{"respo"#), Vec::<String>::new());
        assert_eq!(decoder.push(b"nse\":\"Hi\"}\n{\"response\""), vec!["Hi"]);
        assert_eq!(decoder.push(b":\" there\"}"), Vec::<String>::new());
        assert_eq!(decoder.finish(), Some(" there".to_string()));
    }

    #[test]
    fn long_record_fed_byte_by_byte_yields_one_fragment() {
        let text = "x".repeat(4096);
        let record = format!("{{\"response\":\"{text}\"}}\n{{\"response\":\"!\"}}\n");
        let mut decoder = RecordDecoder::default();
        let mut fragments = Vec::new();
        for byte in record.as_bytes() {
            fragments.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(fragments, vec![text, "!".to_string()]);
        assert!(decoder.carry.is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn parse_record_rules() {
        assert_eq!(parse_record(r#"{"response":"Hi"}"#), Some("Hi".to_string()));
        assert_eq!(parse_record("{\"response\":\"Hi\"}\r\n"), Some("Hi".to_string()));
        assert_eq!(parse_record(r#"data: {"response":"Hi"}"#), Some("Hi".to_string()));
        assert_eq!(parse_record("data: [DONE]"), None);
        assert_eq!(parse_record(""), None);
        assert_eq!(parse_record("not json"), None);
        assert_eq!(parse_record(r#""response""#), None);
        assert_eq!(parse_record(r#"["response"]"#), None);
        assert_eq!(parse_record(r#"{"response":null}"#), None);
        assert_eq!(parse_record(r#"{"usage":{"prompt_tokens":4}}"#), None);
    }

    #[tokio::test]
    async fn malformed_records_do_not_change_the_result() {
        let clean = collect(body(vec!["{\"response\":\"Hi\"}\n{\"response\":\" there\"}\n"])).await;
        let noisy = collect(body(vec![
            "garbage\n{\"response\":\"Hi\"}\n",
            "{\"response\":\n{}\n[1,2]\n{\"response\":\" there\"}\n{bad",
        ]))
        .await;
        let clean: Vec<String> = clean.into_iter().map(|item| item.expect("fragment")).collect();
        let noisy: Vec<String> = noisy.into_iter().map(|item| item.expect("fragment")).collect();
        assert_eq!(clean, vec!["Hi", " there"]);
        assert_eq!(noisy, clean);
    }

    #[tokio::test]
    async fn read_error_ends_stream_after_earlier_fragments() {
        let chunks: Vec<Result<Vec<u8>, ChatError>> = vec![
            Ok(b"{\"response\":\"Hi\"}\n".to_vec()),
            Err(ChatError::Read("connection reset".to_string())),
            Ok(b"{\"response\":\"never\"}\n".to_vec()),
        ];
        let items = collect(stream::iter(chunks).boxed()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().ok().map(String::as_str), Some("Hi"));
        assert!(matches!(items[1], Err(ChatError::Read(_))));
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        assert!(collect(body(Vec::new())).await.is_empty());
    }
}
