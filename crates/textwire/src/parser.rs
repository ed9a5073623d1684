//! Turns a backend's raw text reply into a sequence of typed chunks.
//!
//! The scan is a single left-to-right pass. Text between blocks is emitted as-is,
//! and every block is either converted into a structured chunk or, when its payload
//! does not parse, re-emitted verbatim. Parsing never fails.

pub mod grammar;

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::models::chunk::ApiStreamChunk;
use crate::models::tool::ToolCodePayload;
use grammar::{BlockKind, BlockMatch, Grammar};

/// Mints `tool_use_<n>` correlation ids, starting at zero.
///
/// One counter belongs to one session. Increments are atomic so concurrent streams on
/// the same session never reuse an id.
#[derive(Debug, Default)]
pub struct ToolUseIds(AtomicU64);

impl ToolUseIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        format!("tool_use_{}", self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// A chunk together with the span of reply text it was produced from
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub span: Range<usize>,
    pub chunk: ApiStreamChunk,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputParser<'a> {
    grammar: &'a Grammar,
    ids: &'a ToolUseIds,
}

impl<'a> OutputParser<'a> {
    pub fn new(grammar: &'a Grammar, ids: &'a ToolUseIds) -> Self {
        Self { grammar, ids }
    }

    /// Lazily parse `text` into chunks
    pub fn parse<'t>(&self, text: &'t str) -> Chunks<'a, 't> {
        Chunks {
            segments: self.segments(text),
        }
    }

    /// Lazily parse `text`, keeping the source span of each chunk.
    ///
    /// The spans are contiguous and together cover `text` exactly.
    pub fn segments<'t>(&self, text: &'t str) -> Segments<'a, 't> {
        Segments {
            parser: *self,
            text,
            pos: 0,
            pending: None,
        }
    }

    fn convert(&self, block: &BlockMatch<'_>) -> ApiStreamChunk {
        let converted = match block.kind {
            BlockKind::PassThrough => None,
            BlockKind::JsonToolCall => {
                ToolCodePayload::parse(block.payload).map(|payload| ApiStreamChunk::ToolUse {
                    name: payload.tool_name,
                    content: payload.parameters.to_string(),
                    id: self.ids.next_id(),
                })
            }
            BlockKind::ToolCode => Some(ApiStreamChunk::ToolCode {
                tool_code: block.payload.trim().to_string(),
            }),
            BlockKind::XmlToolCall => {
                parse_xml_tool_call(block.payload.trim()).map(|(name, content)| {
                    ApiStreamChunk::ToolUse {
                        name,
                        content: content.to_string(),
                        id: self.ids.next_id(),
                    }
                })
            }
        };

        converted.unwrap_or_else(|| {
            if block.kind != BlockKind::PassThrough {
                tracing::debug!(kind = ?block.kind, "block payload did not parse, keeping it as text");
            }
            ApiStreamChunk::text(block.raw)
        })
    }
}

pub struct Segments<'a, 't> {
    parser: OutputParser<'a>,
    text: &'t str,
    pos: usize,
    pending: Option<Segment>,
}

impl Iterator for Segments<'_, '_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }
        if self.pos >= self.text.len() {
            return None;
        }

        let start = self.pos;
        match self.parser.grammar.find_at(self.text, start) {
            Some(block) => {
                self.pos = block.span.end;
                let segment = Segment {
                    chunk: self.parser.convert(&block),
                    span: block.span.clone(),
                };
                if block.span.start > start {
                    self.pending = Some(segment);
                    Some(text_segment(self.text, start..block.span.start))
                } else {
                    Some(segment)
                }
            }
            None => {
                self.pos = self.text.len();
                Some(text_segment(self.text, start..self.text.len()))
            }
        }
    }
}

fn text_segment(text: &str, span: Range<usize>) -> Segment {
    Segment {
        chunk: ApiStreamChunk::text(&text[span.clone()]),
        span,
    }
}

pub struct Chunks<'a, 't> {
    segments: Segments<'a, 't>,
}

impl Iterator for Chunks<'_, '_> {
    type Item = ApiStreamChunk;

    fn next(&mut self) -> Option<ApiStreamChunk> {
        self.segments.next().map(|segment| segment.chunk)
    }
}

/// Parse `<name>...</name>` into the tool name and its arguments.
///
/// Children of the form `<key>value</key>` become a JSON object of strings; an
/// element without children carries its trimmed text instead.
fn parse_xml_tool_call(payload: &str) -> Option<(String, Value)> {
    let (name, inner, rest) = split_element(payload)?;
    if !rest.trim().is_empty() {
        return None;
    }
    Some((name.to_string(), xml_children(inner)))
}

/// Split `<name>inner</name>rest`, returning `(name, inner, rest)`
fn split_element(text: &str) -> Option<(&str, &str, &str)> {
    let open = text.strip_prefix('<')?;
    let name_end = open.find('>')?;
    let name = &open[..name_end];
    if !is_element_name(name) {
        return None;
    }
    let body = &open[name_end + 1..];
    let close = format!("</{}>", name);
    let inner_end = body.find(&close)?;
    Some((name, &body[..inner_end], &body[inner_end + close.len()..]))
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn xml_children(inner: &str) -> Value {
    let mut children = Map::new();
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        match split_element(rest) {
            Some((key, value, tail)) => {
                children.insert(key.to_string(), Value::String(value.trim().to_string()));
                rest = tail.trim_start();
            }
            None => return Value::String(inner.trim().to_string()),
        }
    }
    if children.is_empty() {
        Value::String(inner.trim().to_string())
    } else {
        Value::Object(children)
    }
}
