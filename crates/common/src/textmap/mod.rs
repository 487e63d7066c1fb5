// Flattening of structured rich-text documents into plain text with a map
// from text offsets back to structured positions.
//
// Positions follow ProseMirror counting: text advances by UTF-16 code units,
// leaves occupy one position, and every other node adds an opening and a
// closing token around its content. Text offsets are `char` indices.
//
// The map is rebuilt from scratch for every query; any edit invalidates it.

pub mod schema;

use serde::{Deserialize, Serialize};

pub use schema::{NodeKind, NodeSchema};

/// One node of a structured document, as exchanged in JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attrs: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<serde_json::Value>,
}

impl Node {
    pub fn new(node_type: impl Into<String>, content: Vec<Node>) -> Self {
        Self {
            node_type: node_type.into(),
            content,
            text: None,
            attrs: serde_json::Map::new(),
            marks: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::new("text", Vec::new()) }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Size of this node in structured positions.
    pub fn node_size(&self, schema: &NodeSchema) -> usize {
        if let Some(text) = &self.text {
            return text.encode_utf16().count();
        }
        match schema.kind(&self.node_type) {
            Some(kind) if kind.is_leaf() => 1,
            None if self.content.is_empty() => 1,
            _ => self.content_size(schema) + 2,
        }
    }

    /// Combined size of this node's children.
    pub fn content_size(&self, schema: &NodeSchema) -> usize {
        self.content.iter().map(|child| child.node_size(schema)).sum()
    }

    /// Concatenated descendant text, without separators.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    if let Some(text) = &node.text {
        out.push_str(text);
    }
    for child in &node.content {
        collect_text(child, out);
    }
}

/// Structured `{from, to}` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRange {
    pub from: usize,
    pub to: usize,
}

/// Plain-text `{start, end}` range in `char` offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

/// Flattened text plus one structured position per `char`, followed by a
/// sentinel equal to the document's content size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMap {
    text: String,
    position_map: Vec<usize>,
}

impl TextMap {
    /// Flatten `doc` (the root node) in one depth-first pass.
    pub fn build(doc: &Node, schema: &NodeSchema) -> Self {
        let mut builder = Builder { schema, text: String::new(), positions: Vec::new(), blocks: 0 };
        builder.walk(&doc.content, 0);
        builder.positions.push(doc.content_size(schema));
        Self { text: builder.text, position_map: builder.positions }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position_map(&self) -> &[usize] {
        &self.position_map
    }

    /// Number of `char`s in the flattened text.
    pub fn char_len(&self) -> usize {
        self.position_map.len() - 1
    }

    pub fn doc_size(&self) -> usize {
        self.position_map.last().copied().unwrap_or_default()
    }

    /// Convert a text range to a structured range.
    ///
    /// Offsets are clamped to the map; offset 0 resolves to the start of the
    /// document. Returns `None` for ranges that are empty, inverted, or out of
    /// bounds once mapped.
    pub fn convert_range(&self, start: usize, end: usize) -> Option<PositionRange> {
        let last = self.char_len();
        let (start, end) = (start.min(last), end.min(last));
        let from = if start == 0 { 0 } else { self.position_map[start] };
        let to = self.position_map[end];

        if from >= to || to > self.doc_size() {
            tracing::debug!(start, end, from, to, "dropping degenerate annotation range");
            return None;
        }
        Some(PositionRange { from, to })
    }

    /// Convert a batch of ranges, silently dropping the invalid ones.
    pub fn convert_ranges<I>(&self, ranges: I) -> Vec<PositionRange>
    where
        I: IntoIterator<Item = TextRange>,
    {
        ranges.into_iter().filter_map(|range| self.convert_range(range.start, range.end)).collect()
    }
}

struct Builder<'a> {
    schema: &'a NodeSchema,
    text: String,
    positions: Vec<usize>,
    blocks: usize,
}

impl Builder<'_> {
    /// Walk `nodes`, the first of which starts at structured position `pos`.
    fn walk(&mut self, nodes: &[Node], mut pos: usize) {
        let schema = self.schema;
        for node in nodes {
            let size = node.node_size(schema);
            if let Some(text) = &node.text {
                self.push_text(text, pos);
                pos += size;
                continue;
            }

            match schema.kind(&node.node_type) {
                Some(NodeKind::TextBlock) => {
                    if self.blocks > 0 {
                        self.push_fixed(&schema.block_separator, pos);
                    }
                    self.blocks += 1;
                    self.walk(&node.content, pos + 1);
                }
                Some(NodeKind::Block | NodeKind::Inline) => self.walk(&node.content, pos + 1),
                Some(NodeKind::Leaf { text: Some(text) }) => self.push_fixed(text, pos),
                Some(NodeKind::Leaf { text: None }) => {}
                Some(NodeKind::Atom { attr, .. }) => {
                    let body = match attr {
                        Some(attr) => attr_text(node, attr),
                        None => node.text_content(),
                    };
                    self.push_fixed(&format!(" [{body}]"), pos);
                }
                None if node.content.is_empty() => {
                    tracing::debug!(node_type = %node.node_type, "unknown leaf node contributes no text");
                }
                None => {
                    tracing::debug!(node_type = %node.node_type, "unknown node treated as block");
                    self.walk(&node.content, pos + 1);
                }
            }
            pos += size;
        }
    }

    fn push_text(&mut self, text: &str, mut pos: usize) {
        for ch in text.chars() {
            self.text.push(ch);
            self.positions.push(pos);
            pos += ch.len_utf16();
        }
    }

    /// Push text whose every `char` maps to the same position.
    fn push_fixed(&mut self, text: &str, pos: usize) {
        for ch in text.chars() {
            self.text.push(ch);
            self.positions.push(pos);
        }
    }
}

fn attr_text(node: &Node, attr: &str) -> String {
    match node.attrs.get(attr) {
        Some(serde_json::Value::String(value)) => value.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
