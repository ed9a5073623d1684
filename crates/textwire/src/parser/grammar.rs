//! Block rules recognised inside a raw text reply.
//!
//! A [`Grammar`] is an ordered list of [`BlockRule`]s compiled into a single
//! leftmost-first regex. At any scan position the leftmost block wins, and when two
//! rules match at the same position the earlier rule wins.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Versions of the block grammar a backend may be prompted with
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GrammarVersion {
    /// `tool_code` / `tool_result` markers followed by a fenced block
    #[default]
    Fenced,
    /// Everything in xml-like tags, including `<tool_code>` and `<tool_use>`
    Tagged,
}

/// What the parser does with a matched block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Re-emitted verbatim as text
    PassThrough,
    /// A JSON `{"tool_name", "parameters"}` payload, emitted as a tool use
    JsonToolCall,
    /// The trimmed payload is emitted as a `tool_code` chunk
    ToolCode,
    /// An xml-ish `<name>...</name>` payload, emitted as a tool use
    XmlToolCall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Delimiter {
    /// `<tag>...</tag>`
    Tag(String),
    /// `marker` then a fenced block with an optional language tag
    Fence(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRule {
    delimiter: Delimiter,
    kind: BlockKind,
}

impl BlockRule {
    pub fn tagged<S: Into<String>>(tag: S, kind: BlockKind) -> Self {
        Self {
            delimiter: Delimiter::Tag(tag.into()),
            kind,
        }
    }

    pub fn fenced<S: Into<String>>(marker: S, kind: BlockKind) -> Self {
        Self {
            delimiter: Delimiter::Fence(marker.into()),
            kind,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Each rule contributes exactly two capture groups: the whole block, then the payload.
    fn pattern(&self) -> String {
        match &self.delimiter {
            Delimiter::Tag(tag) => {
                let tag = regex::escape(tag);
                format!("(<{tag}>((?s:.*?))</{tag}>)")
            }
            Delimiter::Fence(marker) => {
                // The marker has to start a word: `my_tool_code` is prose
                let boundary = match marker.chars().next() {
                    Some(c) if c.is_alphanumeric() || c == '_' => r"\b",
                    _ => "",
                };
                let marker = regex::escape(marker);
                format!(r"({boundary}{marker}\s*```[\w+.-]*[ \t]*\r?\n?((?s:.*?))```)")
            }
        }
    }
}

/// A block found in the reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMatch<'t> {
    pub kind: BlockKind,
    pub span: Range<usize>,
    /// The whole block, delimiters included
    pub raw: &'t str,
    /// The block interior
    pub payload: &'t str,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    version: Option<GrammarVersion>,
    rules: Vec<BlockRule>,
    regex: Regex,
}

lazy_static! {
    static ref FENCED: Grammar = Grammar::compile(
        Some(GrammarVersion::Fenced),
        vec![
            BlockRule::tagged("task", BlockKind::PassThrough),
            BlockRule::tagged("environment_details", BlockKind::PassThrough),
            BlockRule::tagged("thinking", BlockKind::PassThrough),
            BlockRule::fenced("tool_code", BlockKind::JsonToolCall),
            BlockRule::fenced("tool_result", BlockKind::PassThrough),
        ],
    )
    .expect("built-in fenced grammar is valid");
    static ref TAGGED: Grammar = Grammar::compile(
        Some(GrammarVersion::Tagged),
        vec![
            BlockRule::tagged("task", BlockKind::PassThrough),
            BlockRule::tagged("environment_details", BlockKind::PassThrough),
            BlockRule::tagged("tool_code", BlockKind::ToolCode),
            BlockRule::tagged("tool_use", BlockKind::XmlToolCall),
            BlockRule::tagged("thinking", BlockKind::PassThrough),
        ],
    )
    .expect("built-in tagged grammar is valid");
}

impl Grammar {
    /// A custom grammar. Rules are tried in the order given.
    pub fn new(rules: Vec<BlockRule>) -> Result<Self, regex::Error> {
        Self::compile(None, rules)
    }

    fn compile(version: Option<GrammarVersion>, rules: Vec<BlockRule>) -> Result<Self, regex::Error> {
        let pattern = rules
            .iter()
            .map(BlockRule::pattern)
            .collect::<Vec<_>>()
            .join("|");
        // An empty alternation would match everywhere.
        let pattern = if pattern.is_empty() {
            r"\b\B".to_string()
        } else {
            pattern
        };
        Ok(Self {
            version,
            rules,
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn fenced() -> Self {
        FENCED.clone()
    }

    pub fn tagged() -> Self {
        TAGGED.clone()
    }

    pub fn for_version(version: GrammarVersion) -> Self {
        match version {
            GrammarVersion::Fenced => Self::fenced(),
            GrammarVersion::Tagged => Self::tagged(),
        }
    }

    /// The built-in version this grammar was created from, if any
    pub fn version(&self) -> Option<GrammarVersion> {
        self.version
    }

    pub fn rules(&self) -> &[BlockRule] {
        &self.rules
    }

    /// Find the first block starting at or after `pos`
    pub fn find_at<'t>(&self, text: &'t str, pos: usize) -> Option<BlockMatch<'t>> {
        let caps = self.regex.captures_at(text, pos)?;
        self.rules.iter().enumerate().find_map(|(index, rule)| {
            let block = caps.get(1 + 2 * index)?;
            let payload = caps.get(2 + 2 * index)?;
            Some(BlockMatch {
                kind: rule.kind,
                span: block.range(),
                raw: block.as_str(),
                payload: payload.as_str(),
            })
        })
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::fenced()
    }
}
