//! DOM Tree implementation.

use crate::element::ElementData;
use crate::node::{Node, NodeData, NodeId};
use common::{MediafyError, MediafyResult};
use slotmap::SlotMap;

/// The DOM tree structure.
///
/// Nodes live in a slot map; detaching a node keeps it alive so that it can
/// be re-inserted, `remove` frees the node and its subtree.
pub struct DomTree {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl DomTree {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert_with_key(|id| Node::new(id, NodeData::Document));
        Self { nodes, root }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn get_element(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id).and_then(|n| n.as_element())
    }

    pub fn get_element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.nodes.get_mut(id).and_then(|n| n.as_element_mut())
    }

    pub fn create_element(&mut self, data: ElementData) -> NodeId {
        self.nodes
            .insert_with_key(|id| Node::new(id, NodeData::Element(data)))
    }

    /// Append a child to a parent node, detaching it from any old parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return;
        }
        self.remove_from_parent(child);

        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
        }
    }

    /// Detach a node from its parent. Returns the old parent, if any.
    pub fn remove_from_parent(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(node)?.parent.take()?;
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|id| *id != node);
        }
        Some(parent)
    }

    /// Remove a node and its subtree from the tree.
    pub fn remove(&mut self, node: NodeId) {
        self.remove_from_parent(node);

        let mut to_remove = vec![node];
        let mut i = 0;
        while i < to_remove.len() {
            if let Some(n) = self.nodes.get(to_remove[i]) {
                to_remove.extend(n.children.iter().copied());
            }
            i += 1;
        }

        for id in to_remove {
            self.nodes.remove(id);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.children.first().copied())
    }

    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(|n| n.children.iter().copied())
    }

    /// Whether the node is reachable from the document node.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Descendants in pre-order.
    pub fn descendants(&self, node: NodeId) -> DescendantIterator<'_> {
        let mut stack = Vec::new();
        if let Some(n) = self.nodes.get(node) {
            stack.extend(n.children.iter().rev().copied());
        }
        DescendantIterator { tree: self, stack }
    }

    /// First connected element with the given id.
    pub fn find_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root).find(|&node| {
            self.get_element(node)
                .and_then(|e| e.id.as_deref())
                .map_or(false, |v| v == id)
        })
    }

    /// First element matching a selector list, in document order.
    ///
    /// Fails with `InvalidValue` when the selector cannot be parsed.
    pub fn query_selector(&self, selector: &str) -> MediafyResult<Option<NodeId>> {
        let compiled = SelectorList::parse(selector)?;
        Ok(self
            .descendants(self.root)
            .find(|&id| compiled.matches(self, id)))
    }

    /// All elements matching a selector list, in document order.
    pub fn query_selector_all(&self, selector: &str) -> MediafyResult<Vec<NodeId>> {
        let compiled = SelectorList::parse(selector)?;
        Ok(self
            .descendants(self.root)
            .filter(|&id| compiled.matches(self, id))
            .collect())
    }

    /// Serialize a node and its subtree as HTML.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        match &n.data {
            NodeData::Document => {
                for &child in &n.children {
                    self.write_html(child, out);
                }
            }
            NodeData::Element(elem) => {
                out.push('<');
                out.push_str(elem.tag_name.as_str());
                if !elem.attributes.is_empty() {
                    out.push(' ');
                    out.push_str(&elem.attributes.to_html());
                }
                out.push('>');
                if elem.is_void() {
                    return;
                }
                for &child in &n.children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(elem.tag_name.as_str());
                out.push('>');
            }
        }
    }

    /// Total number of nodes, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only the document node.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over descendant nodes (pre-order traversal).
pub struct DescendantIterator<'a> {
    tree: &'a DomTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIterator<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(node) = self.tree.nodes.get(current) {
            self.stack.extend(node.children.iter().rev().copied());
        }
        Some(current)
    }
}

/// Comma-separated list of complex selectors.
#[derive(Clone, Debug, PartialEq)]
struct SelectorList(Vec<ComplexSelector>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
}

/// Compound selectors joined by combinators. `ancestors` runs right to
/// left: the first entry is the compound closest to the subject.
#[derive(Clone, Debug, PartialEq)]
struct ComplexSelector {
    subject: CompoundSelector,
    ancestors: Vec<(Combinator, CompoundSelector)>,
}

/// `tag#id.class[attr=value]` with every part optional.
#[derive(Clone, Debug, Default, PartialEq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

enum Token<'a> {
    Compound(&'a str),
    Child,
}

impl SelectorList {
    fn parse(selector: &str) -> MediafyResult<Self> {
        let invalid = || MediafyError::invalid(format!("invalid selector {:?}", selector));
        let list = selector
            .split(',')
            .map(|part| ComplexSelector::parse(part.trim()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        if list.is_empty() {
            return Err(invalid());
        }
        Ok(SelectorList(list))
    }

    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.0.iter().any(|s| s.matches(tree, node))
    }
}

impl ComplexSelector {
    fn parse(input: &str) -> Option<Self> {
        let mut compounds = Vec::new();
        let mut pending: Option<Combinator> = None;
        for token in tokenize(input)? {
            match token {
                Token::Child => {
                    if compounds.is_empty() || pending.is_some() {
                        return None;
                    }
                    pending = Some(Combinator::Child);
                }
                Token::Compound(text) => {
                    let compound = CompoundSelector::parse(text)?;
                    let combinator = if compounds.is_empty() {
                        None
                    } else {
                        Some(pending.take().unwrap_or(Combinator::Descendant))
                    };
                    compounds.push((combinator, compound));
                }
            }
        }
        if pending.is_some() {
            return None;
        }

        // Re-link right to left: each compound carries the combinator that
        // joins it to the one on its right.
        let (last_combinator, subject) = compounds.pop()?;
        let mut ancestors = Vec::with_capacity(compounds.len());
        let mut link = last_combinator;
        while let Some((combinator, compound)) = compounds.pop() {
            ancestors.push((link?, compound));
            link = combinator;
        }
        Some(ComplexSelector { subject, ancestors })
    }

    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        tree.get_element(node)
            .map_or(false, |e| self.subject.matches(e))
            && self.matches_ancestors(tree, node, 0)
    }

    fn matches_ancestors(&self, tree: &DomTree, node: NodeId, index: usize) -> bool {
        let Some((combinator, compound)) = self.ancestors.get(index) else {
            return true;
        };
        let hit = |id: NodeId| {
            tree.get_element(id).map_or(false, |e| compound.matches(e))
                && self.matches_ancestors(tree, id, index + 1)
        };
        match combinator {
            Combinator::Child => tree.parent(node).map_or(false, hit),
            Combinator::Descendant => {
                let mut current = tree.parent(node);
                while let Some(id) = current {
                    if hit(id) {
                        return true;
                    }
                    current = tree.parent(id);
                }
                false
            }
        }
    }
}

/// Tag, id and class names: letters, digits, `-` and `_`.
fn is_ident(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Split a complex selector into compounds and `>` tokens. Whitespace inside
/// `[...]` belongs to the compound.
fn tokenize(input: &str) -> Option<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_brackets = false;
    for (i, c) in input.char_indices() {
        match c {
            '[' if !in_brackets => {
                in_brackets = true;
                start.get_or_insert(i);
            }
            ']' if in_brackets => in_brackets = false,
            _ if in_brackets => {}
            '>' => {
                if let Some(s) = start.take() {
                    tokens.push(Token::Compound(&input[s..i]));
                }
                tokens.push(Token::Child);
            }
            c if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    tokens.push(Token::Compound(&input[s..i]));
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if in_brackets {
        return None;
    }
    if let Some(s) = start {
        tokens.push(Token::Compound(&input[s..]));
    }
    Some(tokens)
}

impl CompoundSelector {
    fn parse(input: &str) -> Option<Self> {
        if input.is_empty() {
            return None;
        }

        let mut selector = CompoundSelector::default();
        let mut rest = input;

        let tag_end = rest.find(['#', '.', '[']).unwrap_or(rest.len());
        if tag_end > 0 {
            let tag = &rest[..tag_end];
            if tag != "*" && !is_ident(tag) {
                return None;
            }
            if tag != "*" {
                selector.tag = Some(tag.to_ascii_lowercase());
            }
        }
        rest = &rest[tag_end..];

        while let Some(c) = rest.chars().next() {
            match c {
                '#' | '.' => {
                    let body = &rest[1..];
                    let end = body.find(['#', '.', '[']).unwrap_or(body.len());
                    let name = &body[..end];
                    if !is_ident(name) {
                        return None;
                    }
                    if c == '#' {
                        selector.id = Some(name.to_string());
                    } else {
                        selector.classes.push(name.to_string());
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let close = rest.find(']')?;
                    let inner = &rest[1..close];
                    let attr = match inner.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_ascii_lowercase(),
                            Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                        ),
                        None => (inner.trim().to_ascii_lowercase(), None),
                    };
                    if attr.0.is_empty() {
                        return None;
                    }
                    selector.attributes.push(attr);
                    rest = &rest[close + 1..];
                }
                _ => return None,
            }
        }

        Some(selector)
    }

    fn matches(&self, elem: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if elem.tag_name.as_str() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if elem.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| elem.has_class(c)) {
            return false;
        }
        self.attributes.iter().all(|(name, value)| match value {
            None => elem.has_attribute(name),
            Some(v) => elem.get_attribute(name) == Some(v.as_str()),
        })
    }
}
