use super::{node_in, CodeBlockAttrs, Document, HeadingAttrs, Node, OrderedListAttrs, TaskItemAttrs};
use strum::{Display, EnumIter};

/// Block types offered by the "Turn into" menu, in menu order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BlockType {
    #[strum(to_string = "Text")]
    Paragraph,
    #[strum(to_string = "Heading 1")]
    Heading1,
    #[strum(to_string = "Heading 2")]
    Heading2,
    #[strum(to_string = "Heading 3")]
    Heading3,
    #[strum(to_string = "Bullet List")]
    BulletList,
    #[strum(to_string = "Numbered List")]
    OrderedList,
    #[strum(to_string = "To-do List")]
    TaskList,
    #[strum(to_string = "Code Block")]
    CodeBlock,
    #[strum(to_string = "Quote")]
    Blockquote,
    #[strum(to_string = "Divider")]
    HorizontalRule,
}

impl BlockType {
    pub fn heading_level(self) -> Option<u8> {
        match self {
            BlockType::Heading1 => Some(1),
            BlockType::Heading2 => Some(2),
            BlockType::Heading3 => Some(3),
            _ => None,
        }
    }

    pub fn list_kind(self) -> Option<ListKind> {
        match self {
            BlockType::BulletList => Some(ListKind::Bullet),
            BlockType::OrderedList => Some(ListKind::Ordered),
            BlockType::TaskList => Some(ListKind::Task),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
    Task,
}

impl ListKind {
    fn of(node: &Node) -> Option<Self> {
        match node {
            Node::BulletList { .. } => Some(ListKind::Bullet),
            Node::OrderedList { .. } => Some(ListKind::Ordered),
            Node::TaskList { .. } => Some(ListKind::Task),
            _ => None,
        }
    }

    fn item(self, previous: Option<&Node>, content: Vec<Node>) -> Node {
        match self {
            ListKind::Task => {
                let checked = match previous {
                    Some(Node::TaskItem { attrs, .. }) => attrs.checked,
                    _ => false,
                };
                Node::TaskItem {
                    attrs: TaskItemAttrs { checked },
                    content,
                }
            }
            ListKind::Bullet | ListKind::Ordered => Node::ListItem { content },
        }
    }

    fn list(self, items: Vec<Node>) -> Node {
        match self {
            ListKind::Bullet => Node::BulletList { content: items },
            ListKind::Ordered => Node::OrderedList {
                attrs: OrderedListAttrs::default(),
                content: items,
            },
            ListKind::Task => Node::TaskList { content: items },
        }
    }
}

fn node_mut<'a>(content: &'a mut Vec<Node>, path: &[usize]) -> Option<&'a mut Node> {
    let (first, rest) = path.split_first()?;
    let mut node = content.get_mut(*first)?;
    for i in rest {
        node = node.content_mut()?.get_mut(*i)?;
    }
    Some(node)
}

/// Child list of the node at `parent` (the document itself for an empty path).
fn siblings_mut<'a>(content: &'a mut Vec<Node>, parent: &[usize]) -> Option<&'a mut Vec<Node>> {
    if parent.is_empty() {
        Some(content)
    } else {
        node_mut(content, parent)?.content_mut()
    }
}

/// Closest node on `path` (including its end) matching `pred`.
fn nearest_on_path(content: &[Node], path: &[usize], pred: fn(&Node) -> bool) -> Option<Vec<usize>> {
    (1..=path.len())
        .rev()
        .find(|len| node_in(content, &path[..*len]).is_some_and(pred))
        .map(|len| path[..len].to_vec())
}

fn first_textblock(content: &[Node], target: &[usize]) -> Option<Vec<usize>> {
    let mut path = target.to_vec();
    loop {
        let node = node_in(content, &path)?;
        if node.is_textblock() {
            return Some(path);
        }
        if node.is_leaf() || node.content().is_empty() {
            return None;
        }
        path.push(0);
    }
}

/// Code blocks hold a single unmarked text run.
fn code_content(inline: &[Node]) -> Vec<Node> {
    let text: String = inline
        .iter()
        .map(|n| match n {
            Node::Text { text, .. } => text.as_str(),
            Node::HardBreak => "\n",
            _ => "",
        })
        .collect();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(&text)]
    }
}

fn retype_textblock(content: &mut Vec<Node>, target: &[usize], ty: BlockType) -> Option<()> {
    let path = first_textblock(content, target)?;
    let node = node_mut(content, &path)?;
    let inline = node.content().to_vec();
    *node = match ty {
        BlockType::Paragraph => Node::Paragraph { content: inline },
        BlockType::CodeBlock if matches!(node, Node::CodeBlock { .. }) => {
            Node::Paragraph { content: inline }
        }
        BlockType::CodeBlock => Node::CodeBlock {
            attrs: CodeBlockAttrs::default(),
            content: code_content(&inline),
        },
        _ => Node::Heading {
            attrs: HeadingAttrs {
                level: ty.heading_level()?,
            },
            content: inline,
        },
    };
    Some(())
}

fn toggle_list(content: &mut Vec<Node>, target: &[usize], kind: ListKind) -> Option<()> {
    if let Some(list_path) = nearest_on_path(content, target, Node::is_list) {
        let list = node_in(content, &list_path)?.clone();
        if ListKind::of(&list) == Some(kind) {
            let lifted: Vec<Node> = list
                .content()
                .iter()
                .flat_map(|item| item.content().iter().cloned())
                .collect();
            let (idx, parent) = list_path.split_last()?;
            let siblings = siblings_mut(content, parent)?;
            siblings.splice(*idx..=*idx, lifted);
        } else {
            let items = list
                .content()
                .iter()
                .map(|item| kind.item(Some(item), item.content().to_vec()))
                .collect();
            *node_mut(content, &list_path)? = kind.list(items);
        }
        return Some(());
    }

    let (idx, parent) = target.split_last()?;
    let siblings = siblings_mut(content, parent)?;
    let block = siblings.get(*idx)?.clone();
    if block.is_list_item() {
        return None;
    }
    siblings[*idx] = kind.list(vec![kind.item(None, vec![block])]);
    Some(())
}

fn toggle_blockquote(content: &mut Vec<Node>, target: &[usize]) -> Option<()> {
    if let Some(quote_path) = nearest_on_path(content, target, |n| {
        matches!(n, Node::Blockquote { .. })
    }) {
        let lifted = node_in(content, &quote_path)?.content().to_vec();
        let (idx, parent) = quote_path.split_last()?;
        siblings_mut(content, parent)?.splice(*idx..=*idx, lifted);
        return Some(());
    }

    let (idx, parent) = target.split_last()?;
    let siblings = siblings_mut(content, parent)?;
    let block = siblings.get(*idx)?.clone();
    if block.is_list_item() {
        return None;
    }
    siblings[*idx] = Node::blockquote(vec![block]);
    Some(())
}

fn insert_rule(content: &mut Vec<Node>, target: &[usize]) -> Option<()> {
    let (idx, parent) = target.split_last()?;
    let siblings = siblings_mut(content, parent)?;
    let block = siblings.get(*idx)?;
    if block.is_list_item() {
        return None;
    }
    if block.is_textblock() && block.content().is_empty() {
        siblings[*idx] = Node::horizontal_rule();
    } else {
        siblings.insert(idx + 1, Node::horizontal_rule());
    }
    Some(())
}

impl Document {
    /// Run `edit` against a copy of the content and keep it only if it succeeded and changed
    /// something, so a command never partially applies.
    fn transact(&mut self, edit: impl FnOnce(&mut Vec<Node>) -> Option<()>) -> bool {
        let mut next = self.content.clone();
        if edit(&mut next).is_none() || next == self.content {
            return false;
        }
        self.content = next;
        true
    }

    /// Retype the block at `pos`. Returns `false` (document untouched) when `pos` does not
    /// resolve to a block or the conversion does not apply.
    pub fn set_block_type(&mut self, pos: usize, ty: BlockType) -> bool {
        let Some(target) = self.target_path(pos) else {
            return false;
        };
        self.transact(|content| match ty {
            BlockType::Paragraph
            | BlockType::Heading1
            | BlockType::Heading2
            | BlockType::Heading3
            | BlockType::CodeBlock => retype_textblock(content, &target, ty),
            BlockType::BulletList | BlockType::OrderedList | BlockType::TaskList => {
                toggle_list(content, &target, ty.list_kind()?)
            }
            BlockType::Blockquote => toggle_blockquote(content, &target),
            BlockType::HorizontalRule => insert_rule(content, &target),
        })
    }

    /// Remove the block at `pos` with its subtree, plus any container it leaves empty.
    pub fn delete_block(&mut self, pos: usize) -> bool {
        let Some(target) = self.target_path(pos) else {
            return false;
        };
        self.transact(|content| {
            let mut path = target;
            loop {
                let (&idx, parent) = path.split_last()?;
                let depth = parent.len();
                let siblings = siblings_mut(content, parent)?;
                if idx >= siblings.len() {
                    return None;
                }
                siblings.remove(idx);
                if !siblings.is_empty() || depth == 0 {
                    break;
                }
                path.truncate(depth);
            }
            if content.is_empty() {
                content.push(Node::paragraph(""));
            }
            Some(())
        })
    }

    /// Insert a deep copy of the block at `pos` right after it (at `pos + size`).
    pub fn duplicate_block(&mut self, pos: usize) -> bool {
        let Some(target) = self.target_path(pos) else {
            return false;
        };
        self.transact(|content| {
            let (idx, parent) = target.split_last()?;
            let siblings = siblings_mut(content, parent)?;
            let copy = siblings.get(*idx)?.clone();
            siblings.insert(idx + 1, copy);
            Some(())
        })
    }
}
