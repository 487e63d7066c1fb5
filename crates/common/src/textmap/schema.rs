// Node classification for structured rich-text documents.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How a node type participates in text flattening and position counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Block holding other blocks (lists, blockquotes, tables).
    Block,
    /// Block holding inline content; a separator precedes every one but
    /// the first.
    TextBlock,
    /// Inline node with inline content of its own.
    Inline,
    /// Node without content; occupies a single position.
    Leaf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Indivisible node rendered as `" [body]"`, every character of which
    /// maps to the node's own position. The body is read from `attr` when
    /// set, otherwise from the node's descendant text.
    Atom {
        leaf: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attr: Option<String>,
    },
}

impl NodeKind {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. } | Self::Atom { leaf: true, .. })
    }
}

/// Mapping from node type name to its kind.
///
/// Unknown types are treated as blocks when they carry content and as
/// textless leaves otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSchema {
    #[serde(default = "default_separator")]
    pub block_separator: String,
    pub nodes: HashMap<String, NodeKind>,
}

fn default_separator() -> String {
    "\n".to_string()
}

impl NodeSchema {
    pub fn empty() -> Self {
        Self { block_separator: default_separator(), nodes: HashMap::new() }
    }

    pub fn with(mut self, node_type: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes.insert(node_type.into(), kind);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.block_separator = separator.into();
        self
    }

    pub fn kind(&self, node_type: &str) -> Option<&NodeKind> {
        self.nodes.get(node_type)
    }

    /// Schema of the report editor.
    pub fn report_editor() -> Self {
        let mut schema = Self::empty();
        for block in
            ["bulletList", "orderedList", "listItem", "blockquote", "table", "tableRow", "tableCell", "tableHeader"]
        {
            schema = schema.with(block, NodeKind::Block);
        }
        for text_block in ["paragraph", "heading", "codeBlock", "figcaption"] {
            schema = schema.with(text_block, NodeKind::TextBlock);
        }
        schema
            .with("hardBreak", NodeKind::Leaf { text: Some("\n".to_string()) })
            .with("horizontalRule", NodeKind::Leaf { text: None })
            .with("image", NodeKind::Leaf { text: None })
            .with("footnote", NodeKind::Atom { leaf: false, attr: None })
            .with("templateVariable", NodeKind::Atom { leaf: true, attr: Some("id".to_string()) })
    }
}

impl Default for NodeSchema {
    fn default() -> Self {
        Self::report_editor()
    }
}
