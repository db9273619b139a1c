//! Incremental decoder for streamed chat completions.
//!
//! Both supported backends stream newline-delimited `data: <json>` lines and
//! finish with `data: [DONE]`; they differ only in where the text lives inside
//! each JSON payload.
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use shared::settings::ProviderKind;
use shared::ResearchError;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Payload shape of a streaming backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `candidates[0].content.parts[0].text`
    Gemini,
    /// `choices[0].delta.content`
    OpenAi,
}

impl WireFormat {
    /// Pull the text delta out of one payload. `Ok(None)` means a well-formed
    /// payload that carries no text (role headers, usage blocks, ...).
    fn extract(&self, payload: &str) -> Result<Option<String>, serde_json::Error> {
        match self {
            WireFormat::Gemini => crate::gemini::stream_text(payload),
            WireFormat::OpenAi => crate::openai::stream_text(payload),
        }
    }
}

impl From<ProviderKind> for WireFormat {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Gemini => WireFormat::Gemini,
            ProviderKind::OpenAi => WireFormat::OpenAi,
        }
    }
}

/// Line decoder that owns the undecoded tail of the body between fragments.
///
/// One decoder per response: create, [`feed`](Self::feed) every fragment,
/// then [`finish`](Self::finish).
pub struct StreamDecoder {
    format: WireFormat,
    // Raw bytes, so a multi-byte character split across fragments survives.
    buffer: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// True once the `[DONE]` sentinel was seen or the body ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes from the response body. Returns the text deltas of every
    /// line completed by this fragment.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.finished {
            return deltas;
        }
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return deltas;
        };
        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        for line in complete.split(|&b| b == b'\n') {
            self.process_line(line, &mut deltas);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        deltas
    }

    /// End of body: decode a trailing line that never got its newline.
    pub fn finish(mut self) -> Vec<String> {
        let mut deltas = Vec::new();
        if !self.finished && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut deltas);
        }
        self.finished = true;
        deltas
    }

    fn process_line(&mut self, raw: &[u8], out: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload == DONE_SENTINEL {
            self.finished = true;
            return;
        }

        match self.format.extract(payload) {
            Ok(Some(text)) if !text.is_empty() => out.push(text),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(format = ?self.format, error = %e, payload, "skipping malformed stream payload");
            }
        }
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: Option<StreamDecoder>,
    pending: VecDeque<String>,
}

/// Lazily decode a streamed response body into text deltas.
///
/// The next fragment is only pulled from `body` once every delta of the
/// previous one has been consumed. A transport error is yielded once as a
/// `Network` error and ends the stream.
pub fn decode_body<S, B, E>(
    body: S,
    format: WireFormat,
    service: &'static str,
) -> impl Stream<Item = Result<String, ResearchError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: Some(StreamDecoder::new(format)),
        pending: VecDeque::new(),
    };

    futures::stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(delta) = st.pending.pop_front() {
                return Some((Ok(delta), st));
            }
            let decoder = st.decoder.as_mut()?;
            if decoder.is_finished() {
                st.decoder = None;
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let deltas = decoder.feed(bytes.as_ref());
                    st.pending.extend(deltas);
                }
                Some(Err(e)) => {
                    st.decoder = None;
                    let message = format!("stream read error: {}", e);
                    return Some((Err(ResearchError::network(service, None, message)), st));
                }
                None => {
                    let decoder = st.decoder.take()?;
                    st.pending.extend(decoder.finish());
                }
            }
        }
    })
}
