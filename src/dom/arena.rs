//! Arena-allocated DOM that html5ever parses into.
//!
//! Nodes live in one vector and refer to each other by index. Pre-order
//! traversal of the arena follows document order, which is what the section
//! locator relies on for positions.

use html5ever::{LocalName, QualName};

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<(LocalName, String)>,
        classes: Vec<String>,
    },
    Text(String),
    /// Comments, doctypes and processing instructions.
    Other,
}

#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Parsed HTML document.
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub(crate) fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn create_element(
        &mut self,
        name: QualName,
        attrs: Vec<(LocalName, String)>,
    ) -> NodeId {
        let classes = attrs
            .iter()
            .find(|(attr, _)| attr.as_ref() == "class")
            .map(|(_, value)| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        self.alloc(NodeData::Element {
            name,
            attrs,
            classes,
        })
    }

    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Append text, merging with a trailing text sibling.
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        let last = self.get(parent).and_then(|p| p.children.last().copied());
        if let Some(last) = last
            && let Some(Node {
                data: NodeData::Text(existing),
                ..
            }) = self.get_mut(last)
        {
            existing.push_str(text);
            return;
        }
        let node = self.alloc(NodeData::Text(text.to_string()));
        self.append(parent, node);
    }

    pub(crate) fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let Some(parent) = self.get(sibling).and_then(|n| n.parent) else {
            return;
        };
        self.detach(new_node);
        if let Some(node) = self.get_mut(new_node) {
            node.parent = Some(parent);
        }
        if let Some(p) = self.get_mut(parent) {
            let pos = p
                .children
                .iter()
                .position(|&c| c == sibling)
                .unwrap_or(p.children.len());
            p.children.insert(pos, new_node);
        }
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get_mut(id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|&c| c != id);
        }
    }

    pub(crate) fn reparent_children(&mut self, from: NodeId, to: NodeId) {
        let children = self
            .get_mut(from)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            if let Some(node) = self.get_mut(child) {
                node.parent = None;
            }
            self.append(to, child);
        }
    }

    pub(crate) fn add_attrs_if_missing(&mut self, id: NodeId, new: Vec<(LocalName, String)>) {
        if let Some(Node {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.get_mut(id)
        {
            for (name, value) in new {
                if !attrs.iter().any(|(existing, _)| *existing == name) {
                    attrs.push((name, value));
                }
            }
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.data {
            NodeData::Element { name, .. } => Some(name.local.as_ref()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        match &self.get(id)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(name, _)| name.as_ref() == attr_name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn classes(&self, id: NodeId) -> &[String] {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Element { classes, .. }) => classes,
            _ => &[],
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).iter().any(|c| c == class)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Nodes under `root` (inclusive) in document order.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            dom: self,
            stack: vec![root],
        }
    }

    /// First element with the given tag name.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.document())
            .find(|&id| self.element_name(id) == Some(tag))
    }

    /// Concatenated text of `id` and its descendants, skipping subtrees
    /// for which `skip` returns true.
    pub fn text_content_filtered<F>(&self, id: NodeId, skip: F) -> String
    where
        F: Fn(&Dom, NodeId) -> bool,
    {
        let mut out = String::new();
        self.collect_text(id, &skip, &mut out);
        out
    }

    fn collect_text<F>(&self, id: NodeId, skip: &F, out: &mut String)
    where
        F: Fn(&Dom, NodeId) -> bool,
    {
        if skip(self, id) {
            return;
        }
        if let Some(text) = self.text(id) {
            out.push_str(text);
            return;
        }
        for &child in self.children(id) {
            self.collect_text(child, skip, out);
        }
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    dom: &'a Dom,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.dom.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use html5ever::{local_name, ns};

    use super::*;

    fn qname(local: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(local))
    }

    #[test]
    fn test_append_and_order() {
        let mut dom = Dom::new();
        let doc = dom.document();
        let div = dom.create_element(qname("div"), vec![]);
        let a = dom.create_element(qname("p"), vec![]);
        let b = dom.create_element(qname("p"), vec![]);
        dom.append(doc, div);
        dom.append(div, b);
        dom.insert_before(b, a);

        assert_eq!(dom.children(div), &[a, b]);
        let order: Vec<_> = dom.descendants(doc).collect();
        assert_eq!(order, vec![doc, div, a, b]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = Dom::new();
        let p = dom.create_element(qname("p"), vec![]);
        dom.append(dom.document(), p);
        dom.append_text(p, "Hello, ");
        dom.append_text(p, "world");

        assert_eq!(dom.children(p).len(), 1);
        assert_eq!(dom.text_content_filtered(p, |_, _| false), "Hello, world");
    }

    #[test]
    fn test_classes_and_attrs() {
        let mut dom = Dom::new();
        let span = dom.create_element(
            qname("span"),
            vec![
                (local_name!("class"), "mw-headline extra".to_string()),
                (local_name!("id"), "History".to_string()),
            ],
        );
        assert!(dom.has_class(span, "mw-headline"));
        assert!(!dom.has_class(span, "mw-editsection"));
        assert_eq!(dom.attr(span, "id"), Some("History"));
        assert_eq!(dom.element_name(span), Some("span"));
    }

    #[test]
    fn test_reparent_and_detach() {
        let mut dom = Dom::new();
        let doc = dom.document();
        let old = dom.create_element(qname("div"), vec![]);
        let new = dom.create_element(qname("section"), vec![]);
        dom.append(doc, old);
        dom.append(doc, new);
        dom.append_text(old, "moved");
        dom.reparent_children(old, new);

        assert!(dom.children(old).is_empty());
        assert_eq!(dom.text_content_filtered(new, |_, _| false), "moved");

        dom.detach(new);
        assert_eq!(dom.children(doc), &[old]);
    }
}
