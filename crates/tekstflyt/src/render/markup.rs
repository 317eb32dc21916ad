//! The lightweight markup used for document bodies: `#`/`##`/`###`
//! headings, `- ` bullets, `---` rules (dropped), `**bold**` and `*italic*`.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Bullet,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    Plain,
    Bold,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    fn new(text: &str, style: SpanStyle) -> Self {
        Self {
            text: text.to_string(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub spans: Vec<Span>,
}

impl Block {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

enum Line<'a> {
    Empty,
    Rule,
    Content(BlockKind, &'a str),
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    let line = line.strip_suffix('\\').unwrap_or(line).trim_end();

    if line.is_empty() {
        return Line::Empty;
    }
    if line.starts_with("---") {
        return Line::Rule;
    }
    for (marker, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Line::Content(BlockKind::Heading(level), rest.trim());
        }
    }
    if let Some(rest) = line.strip_prefix("- ") {
        return Line::Content(BlockKind::Bullet, rest.trim());
    }
    Line::Content(BlockKind::Normal, line)
}

/// One block per non-empty, non-rule line.
pub fn parse(body: &str) -> Vec<Block> {
    body.lines()
        .filter_map(|raw| match classify(raw) {
            Line::Empty | Line::Rule => None,
            Line::Content(kind, text) => Some(Block {
                kind,
                spans: parse_inline(text),
            }),
        })
        .collect()
}

fn emphasis() -> &'static Regex {
    static EMPHASIS: OnceLock<Regex> = OnceLock::new();
    EMPHASIS.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*|\*([^*]+)\*").expect("static regex"))
}

/// Left-to-right, non-nested emphasis. Span text never contains `*`, so
/// unmatched markers stay literal.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    for caps in emphasis().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            spans.push(Span::new(&text[cursor..whole.start()], SpanStyle::Plain));
        }
        match (caps.get(1), caps.get(2)) {
            (Some(bold), _) => spans.push(Span::new(bold.as_str(), SpanStyle::Bold)),
            (None, Some(italic)) => spans.push(Span::new(italic.as_str(), SpanStyle::Italic)),
            (None, None) => spans.push(Span::new(whole.as_str(), SpanStyle::Plain)),
        }
        cursor = whole.end();
    }
    if cursor < text.len() {
        spans.push(Span::new(&text[cursor..], SpanStyle::Plain));
    }
    spans
}
