//! Structured note documents.
//!
//! A [`Document`] is the ordered list of top-level blocks of one note, in the JSON shape the
//! editing toolkit exchanges (`{"type":"doc","content":[...]}`). Every node occupies a number
//! of address units; a position is a flat offset into that address space and is only
//! meaningful for the document instance that produced it.

mod commands;

pub use commands::{BlockType, ListKind};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inline formatting owned by the editing toolkit (bold, highlight, ...). Passed through as-is.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadingAttrs {
    pub level: u8,
}

impl Default for HeadingAttrs {
    fn default() -> Self {
        Self { level: 1 }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeBlockAttrs {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderedListAttrs {
    #[serde(default = "default_list_start")]
    pub start: u32,
}

fn default_list_start() -> u32 {
    1
}

impl Default for OrderedListAttrs {
    fn default() -> Self {
        Self {
            start: default_list_start(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskItemAttrs {
    #[serde(default)]
    pub checked: bool,
}

/// One node of the document tree. Block nodes hold child nodes; text and hard breaks are inline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    Heading {
        #[serde(default)]
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    CodeBlock {
        #[serde(default)]
        attrs: CodeBlockAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    Blockquote {
        #[serde(default)]
        content: Vec<Node>,
    },
    BulletList {
        #[serde(default)]
        content: Vec<Node>,
    },
    OrderedList {
        #[serde(default)]
        attrs: OrderedListAttrs,
        #[serde(default)]
        content: Vec<Node>,
    },
    ListItem {
        #[serde(default)]
        content: Vec<Node>,
    },
    TaskList {
        #[serde(default)]
        content: Vec<Node>,
    },
    TaskItem {
        #[serde(default)]
        attrs: TaskItemAttrs,
        #[serde(default)]
        content: Vec<Node>,
    },
    HorizontalRule,
    HardBreak,
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
}

impl Node {
    pub fn text(text: &str) -> Self {
        Node::Text {
            text: text.to_string(),
            marks: Vec::new(),
        }
    }

    /// Paragraph holding `text`; an empty string yields an empty paragraph.
    pub fn paragraph(text: &str) -> Self {
        Node::Paragraph {
            content: inline_text(text),
        }
    }

    pub fn heading(level: u8, text: &str) -> Self {
        Node::Heading {
            attrs: HeadingAttrs { level },
            content: inline_text(text),
        }
    }

    pub fn code_block(text: &str) -> Self {
        Node::CodeBlock {
            attrs: CodeBlockAttrs::default(),
            content: inline_text(text),
        }
    }

    pub fn blockquote(content: Vec<Node>) -> Self {
        Node::Blockquote { content }
    }

    pub fn list_item(content: Vec<Node>) -> Self {
        Node::ListItem { content }
    }

    pub fn task_item(checked: bool, content: Vec<Node>) -> Self {
        Node::TaskItem {
            attrs: TaskItemAttrs { checked },
            content,
        }
    }

    pub fn bullet_list(items: Vec<Node>) -> Self {
        Node::BulletList { content: items }
    }

    pub fn ordered_list(items: Vec<Node>) -> Self {
        Node::OrderedList {
            attrs: OrderedListAttrs::default(),
            content: items,
        }
    }

    pub fn task_list(items: Vec<Node>) -> Self {
        Node::TaskList { content: items }
    }

    pub fn horizontal_rule() -> Self {
        Node::HorizontalRule
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Paragraph { .. } => "paragraph",
            Node::Heading { .. } => "heading",
            Node::CodeBlock { .. } => "codeBlock",
            Node::Blockquote { .. } => "blockquote",
            Node::BulletList { .. } => "bulletList",
            Node::OrderedList { .. } => "orderedList",
            Node::ListItem { .. } => "listItem",
            Node::TaskList { .. } => "taskList",
            Node::TaskItem { .. } => "taskItem",
            Node::HorizontalRule => "horizontalRule",
            Node::HardBreak => "hardBreak",
            Node::Text { .. } => "text",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text { .. })
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Node::Text { .. } | Node::HardBreak)
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }

    pub fn is_textblock(&self) -> bool {
        matches!(
            self,
            Node::Paragraph { .. } | Node::Heading { .. } | Node::CodeBlock { .. }
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Node::BulletList { .. } | Node::OrderedList { .. } | Node::TaskList { .. }
        )
    }

    pub fn is_list_item(&self) -> bool {
        matches!(self, Node::ListItem { .. } | Node::TaskItem { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::HorizontalRule | Node::HardBreak | Node::Text { .. })
    }

    pub fn content(&self) -> &[Node] {
        match self {
            Node::Paragraph { content }
            | Node::Heading { content, .. }
            | Node::CodeBlock { content, .. }
            | Node::Blockquote { content }
            | Node::BulletList { content }
            | Node::OrderedList { content, .. }
            | Node::ListItem { content }
            | Node::TaskList { content }
            | Node::TaskItem { content, .. } => content,
            Node::HorizontalRule | Node::HardBreak | Node::Text { .. } => &[],
        }
    }

    pub(crate) fn content_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Paragraph { content }
            | Node::Heading { content, .. }
            | Node::CodeBlock { content, .. }
            | Node::Blockquote { content }
            | Node::BulletList { content }
            | Node::OrderedList { content, .. }
            | Node::ListItem { content }
            | Node::TaskList { content }
            | Node::TaskItem { content, .. } => Some(content),
            Node::HorizontalRule | Node::HardBreak | Node::Text { .. } => None,
        }
    }

    /// Address units this node occupies, including its own open/close tokens.
    pub fn size(&self) -> usize {
        match self {
            Node::Text { text, .. } => text.chars().count(),
            Node::HorizontalRule | Node::HardBreak => 1,
            _ => 2 + content_size(self.content()),
        }
    }

    /// Flattened inline text of this node (hard breaks become newlines).
    pub fn inline_text(&self) -> String {
        let mut out = String::new();
        for child in self.content() {
            match child {
                Node::Text { text, .. } => out.push_str(text),
                Node::HardBreak => out.push('\n'),
                _ => {}
            }
        }
        out
    }

    fn is_well_formed(&self) -> bool {
        match self {
            Node::Text { text, .. } => !text.is_empty(),
            Node::HardBreak | Node::HorizontalRule => true,
            Node::Heading { attrs, content } => {
                (1..=3).contains(&attrs.level) && all_inline(content)
            }
            Node::Paragraph { content } | Node::CodeBlock { content, .. } => all_inline(content),
            Node::BulletList { content } | Node::OrderedList { content, .. } => {
                !content.is_empty()
                    && content
                        .iter()
                        .all(|c| matches!(c, Node::ListItem { .. }) && c.is_well_formed())
            }
            Node::TaskList { content } => {
                !content.is_empty()
                    && content
                        .iter()
                        .all(|c| matches!(c, Node::TaskItem { .. }) && c.is_well_formed())
            }
            Node::ListItem { content }
            | Node::TaskItem { content, .. }
            | Node::Blockquote { content } => !content.is_empty() && all_flow_blocks(content),
        }
    }
}

fn inline_text(text: &str) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text)]
    }
}

fn all_inline(content: &[Node]) -> bool {
    content.iter().all(|c| c.is_inline() && c.is_well_formed())
}

/// Blocks that may appear at document level or inside items and quotes.
fn all_flow_blocks(content: &[Node]) -> bool {
    content
        .iter()
        .all(|c| c.is_block() && !c.is_list_item() && c.is_well_formed())
}

fn content_size(content: &[Node]) -> usize {
    content.iter().map(Node::size).sum()
}

/// Index of the child covering `pos` and the offset at which that child starts.
fn find_child(content: &[Node], pos: usize) -> Option<(usize, usize)> {
    let mut offset = 0;
    for (i, child) in content.iter().enumerate() {
        let end = offset + child.size();
        if pos < end {
            return Some((i, offset));
        }
        offset = end;
    }
    None
}

pub(crate) fn node_in<'a>(content: &'a [Node], path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = content.get(*first)?;
    for i in rest {
        node = node.content().get(*i)?;
    }
    Some(node)
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub content: Vec<Node>,
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("Document", 2)?;
        doc.serialize_field("type", "doc")?;
        doc.serialize_field("content", &self.content)?;
        doc.end()
    }
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self { content }
    }

    /// What an editor shows for a note with no content: one empty paragraph.
    pub fn blank() -> Self {
        Self::new(vec![Node::Paragraph { content: vec![] }])
    }

    /// Parse stored content. `""` and `"{}"` (a note that was never edited) are the empty document.
    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn size(&self) -> usize {
        content_size(&self.content)
    }

    /// Position immediately before top-level child `index`.
    pub fn child_start(&self, index: usize) -> Option<usize> {
        if index >= self.content.len() {
            return None;
        }
        Some(content_size(&self.content[..index]))
    }

    /// Shallowest node starting exactly at `pos`, or the text node `pos` falls inside.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let path = self.path_at(pos)?;
        self.node(&path)
    }

    pub fn block_at(&self, pos: usize) -> Option<&Node> {
        self.node_at(pos).filter(|n| n.is_block())
    }

    /// Start positions of every block node, in document order.
    pub fn block_positions(&self) -> Vec<usize> {
        fn walk(content: &[Node], base: usize, out: &mut Vec<usize>) {
            let mut offset = base;
            for node in content {
                if node.is_block() {
                    out.push(offset);
                    walk(node.content(), offset + 1, out);
                }
                offset += node.size();
            }
        }

        let mut out = Vec::new();
        walk(&self.content, 0, &mut out);
        out
    }

    /// Text of every textblock in document order, separated by a blank line.
    pub fn plain_text(&self) -> String {
        fn collect(content: &[Node], out: &mut Vec<String>) {
            for node in content {
                if node.is_textblock() {
                    out.push(node.inline_text());
                } else if node.is_block() {
                    collect(node.content(), out);
                }
            }
        }

        let mut blocks = Vec::new();
        collect(&self.content, &mut blocks);
        blocks.join("\n\n")
    }

    pub fn is_well_formed(&self) -> bool {
        all_flow_blocks(&self.content)
    }

    pub(crate) fn node(&self, path: &[usize]) -> Option<&Node> {
        node_in(&self.content, path)
    }

    pub(crate) fn path_at(&self, pos: usize) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut content = &self.content[..];
        let mut rel = pos;
        loop {
            let (i, offset) = find_child(content, rel)?;
            path.push(i);
            let node = &content[i];
            if offset == rel || node.is_text() {
                return Some(path);
            }
            rel -= offset + 1;
            content = node.content();
        }
    }

    /// Block a command at `pos` acts on: the block starting at `pos`, otherwise the
    /// innermost block whose content contains `pos`.
    pub(crate) fn target_path(&self, pos: usize) -> Option<Vec<usize>> {
        if let Some(path) = self.path_at(pos) {
            if self.node(&path).is_some_and(Node::is_block) {
                return Some(path);
            }
        }

        let mut path = Vec::new();
        let mut content = &self.content[..];
        let mut rel = pos;
        while let Some((i, offset)) = find_child(content, rel) {
            let node = &content[i];
            if node.is_inline() || rel == offset {
                break;
            }
            path.push(i);
            rel -= offset + 1;
            content = node.content();
        }
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(vec![
            Node::heading(1, "Title"),
            Node::paragraph("hello"),
            Node::bullet_list(vec![
                Node::list_item(vec![Node::paragraph("one")]),
                Node::list_item(vec![Node::paragraph("two")]),
            ]),
            Node::horizontal_rule(),
        ])
    }

    #[test]
    fn test_sizes_count_boundary_tokens() {
        assert_eq!(Node::paragraph("").size(), 2);
        assert_eq!(Node::paragraph("hello").size(), 7);
        assert_eq!(Node::horizontal_rule().size(), 1);
        // list(2) + item(2) + paragraph(2 + 3)
        assert_eq!(
            Node::bullet_list(vec![Node::list_item(vec![Node::paragraph("one")])]).size(),
            9
        );
        assert_eq!(sample().size(), 7 + 7 + 16 + 1);
    }

    #[test]
    fn test_child_start_advances_by_block_size() {
        let doc = sample();
        assert_eq!(doc.child_start(0), Some(0));
        assert_eq!(doc.child_start(1), Some(7));
        assert_eq!(doc.child_start(2), Some(14));
        assert_eq!(doc.child_start(3), Some(30));
        assert_eq!(doc.child_start(4), None);
    }

    #[test]
    fn test_node_at_returns_shallowest_node_starting_at_pos() {
        let doc = sample();
        assert_eq!(doc.node_at(7).map(Node::type_name), Some("paragraph"));
        assert_eq!(doc.node_at(14).map(Node::type_name), Some("bulletList"));
        assert_eq!(doc.node_at(15).map(Node::type_name), Some("listItem"));
        assert_eq!(doc.node_at(16).map(Node::type_name), Some("paragraph"));
        assert_eq!(doc.node_at(30).map(Node::type_name), Some("horizontalRule"));
        // Inside the heading text.
        assert_eq!(doc.node_at(3).map(Node::type_name), Some("text"));
        assert!(doc.block_at(3).is_none());
        // Past the end.
        assert!(doc.node_at(31).is_none());
    }

    #[test]
    fn test_target_path_falls_back_to_enclosing_block() {
        let doc = sample();
        assert_eq!(doc.target_path(3), Some(vec![0]));
        // End of the heading's content (closing boundary).
        assert_eq!(doc.target_path(6), Some(vec![0]));
        // Inside the first list item's paragraph text.
        assert_eq!(doc.target_path(18), Some(vec![2, 0, 0]));
        assert_eq!(doc.target_path(999), None);
    }

    #[test]
    fn test_block_positions_cover_nested_blocks() {
        let doc = sample();
        assert_eq!(doc.block_positions(), vec![0, 7, 14, 15, 16, 22, 23, 30]);
        for pos in doc.block_positions() {
            assert!(doc.block_at(pos).is_some(), "no block at {pos}");
        }
    }

    #[test]
    fn test_from_json_treats_blank_and_empty_object_as_empty_document() {
        assert!(Document::from_json("").unwrap().is_empty());
        assert!(Document::from_json("{}").unwrap().is_empty());
        assert!(Document::from_json("not json").is_err());
    }

    #[test]
    fn test_toolkit_json_contract_parses() {
        let json = r#"{
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Plan"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "marks": [{"type": "bold"}], "text": "bold"},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "next"}
                ]},
                {"type": "taskList", "content": [
                    {"type": "taskItem", "attrs": {"checked": true}, "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "done"}]}
                    ]}
                ]},
                {"type": "codeBlock", "attrs": {"language": null}, "content": [{"type": "text", "text": "let x = 1;"}]},
                {"type": "horizontalRule"},
                {"type": "paragraph"}
            ]
        }"#;
        let doc = Document::from_json(json).expect("toolkit document should parse");
        assert_eq!(doc.content.len(), 6);
        assert!(doc.is_well_formed());
        assert_eq!(
            doc.plain_text(),
            "Plan\n\nbold\nnext\n\ndone\n\nlet x = 1;\n\n"
        );

        let v = serde_json::to_value(&doc).expect("should serialize");
        assert_eq!(v["type"], "doc");
        assert_eq!(v["content"][0]["attrs"]["level"], 2);
        assert_eq!(v["content"][1]["content"][0]["marks"][0]["type"], "bold");
        assert_eq!(v["content"][4]["type"], "horizontalRule");
    }

    #[test]
    fn test_plain_text_skips_rules_and_joins_blocks() {
        assert_eq!(sample().plain_text(), "Title\n\nhello\n\none\n\ntwo");
        assert_eq!(Document::default().plain_text(), "");
    }

    #[test]
    fn test_well_formed_rejects_mismatched_items_and_empty_text() {
        let bad_list = Document::new(vec![Node::bullet_list(vec![Node::task_item(
            false,
            vec![Node::paragraph("x")],
        )])]);
        assert!(!bad_list.is_well_formed());

        let empty_text = Document::new(vec![Node::Paragraph {
            content: vec![Node::text("")],
        }]);
        assert!(!empty_text.is_well_formed());

        let stray_item = Document::new(vec![Node::list_item(vec![Node::paragraph("x")])]);
        assert!(!stray_item.is_well_formed());

        assert!(sample().is_well_formed());
    }
}
