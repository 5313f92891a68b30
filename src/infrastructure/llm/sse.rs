use std::fmt::Display;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::application::ports::{CompletionError, FragmentStream};

pub const DONE_MARKER: &str = "[DONE]";

/// Incremental `text/event-stream` parser yielding the `data` payload of each
/// event. Bytes are buffered until a full line arrives, so multi-byte
/// characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            self.line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        events
    }

    /// Flushes an event left open when the byte stream ends.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            self.line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        // comment / keep-alive
        if line.starts_with(':') {
            return;
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

/// Turns an SSE byte stream into reply fragments.
///
/// `decode` maps one event payload to an optional fragment. The stream ends
/// cleanly at `[DONE]`; a body that closes before it is a transport error.
pub fn sse_fragments<S, E>(
    bytes: S,
    decode: fn(&str) -> Result<Option<String>, CompletionError>,
) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();

        loop {
            let (payloads, closed) = match bytes.next().await {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    yield Err(CompletionError::Transport(e.to_string()));
                    return;
                }
                None => (decoder.finish(), true),
            };

            for payload in payloads {
                if payload.trim() == DONE_MARKER {
                    return;
                }
                match decode(&payload) {
                    Ok(Some(fragment)) => yield Ok(fragment),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if closed {
                yield Err(CompletionError::Transport(
                    "stream closed before [DONE]".to_string(),
                ));
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_events_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();

        let mut events = decoder.push(b"data: {\"content\":\"Hel");
        assert!(events.is_empty());
        events.extend(decoder.push(b"lo\"}\n\ndata: [DONE]\n\n"));

        assert_eq!(events, vec![r#"{"content":"Hello"}"#, "[DONE]"]);
    }

    #[test]
    fn skips_comments_and_joins_multi_line_data() {
        let mut decoder = SseDecoder::new();

        let events = decoder.push(b": keep-alive\n\ndata: one\r\ndata: two\r\n\r\n");

        assert_eq!(events, vec!["one\ntwo"]);
    }

    #[test]
    fn keeps_multibyte_characters_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        let text = "data: h\u{e9}llo\n\n".as_bytes();
        let (head, tail) = text.split_at(8);

        let mut events = decoder.push(head);
        events.extend(decoder.push(tail));

        assert_eq!(events, vec!["h\u{e9}llo"]);
    }

    fn plain_payload(payload: &str) -> Result<Option<String>, CompletionError> {
        Ok(Some(payload.to_string()))
    }

    #[tokio::test]
    async fn fragments_stop_at_done_and_can_cross_tasks() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: one\n\ndata: tw")),
            Ok(Bytes::from_static(b"o\n\ndata: [DONE]\n\ndata: ignored\n\n")),
        ];
        let fragments = sse_fragments(futures::stream::iter(chunks), plain_payload);

        let collected = tokio::spawn(fragments.collect::<Vec<_>>()).await.unwrap();

        let texts: Vec<String> = collected.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn body_error_ends_the_fragments_with_a_transport_error() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Err(std::io::Error::other("connection reset")),
        ];

        let items: Vec<_> = sse_fragments(futures::stream::iter(chunks), plain_payload)
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(CompletionError::Transport(m)) if m == "connection reset"));
    }

    #[test]
    fn finish_flushes_an_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());

        assert_eq!(decoder.finish(), vec!["tail"]);
    }
}
