//! html5ever TreeSink implementation for [`Dom`].

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, QualName, local_name, ns};

use super::arena::{Dom, NodeData, NodeId};

/// Handle used by the tree builder to reference nodes.
///
/// Elements carry their own name so `elem_name` can hand out a reference
/// without borrowing through the arena's `RefCell`.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: NodeId,
    name: Rc<QualName>,
}

impl NodeHandle {
    fn element(id: NodeId, name: QualName) -> Self {
        Self {
            id,
            name: Rc::new(name),
        }
    }

    fn other(id: NodeId) -> Self {
        Self {
            id,
            name: Rc::new(QualName::new(None, ns!(), local_name!(""))),
        }
    }
}

/// TreeSink that builds a [`Dom`].
///
/// html5ever's TreeSink takes `&self`, so the arena sits in a RefCell.
#[derive(Default)]
pub struct DomSink {
    dom: RefCell<Dom>,
}

impl DomSink {
    pub fn into_dom(self) -> Dom {
        self.dom.into_inner()
    }
}

fn convert_attrs(attrs: Vec<Attribute>) -> Vec<(html5ever::LocalName, String)> {
    attrs
        .into_iter()
        .map(|a| (a.name.local, a.value.to_string()))
        .collect()
}

impl TreeSink for DomSink {
    type Handle = NodeHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    // Malformed markup is expected; the builder recovers the way browsers do.
    fn parse_error(&self, _msg: Cow<'static, str>) {}

    fn get_document(&self) -> Self::Handle {
        NodeHandle::other(self.dom.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        &target.name
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let id = self
            .dom
            .borrow_mut()
            .create_element(name.clone(), convert_attrs(attrs));
        NodeHandle::element(id, name)
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        NodeHandle::other(self.dom.borrow_mut().alloc(NodeData::Other))
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        NodeHandle::other(self.dom.borrow_mut().alloc(NodeData::Other))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => dom.append(parent.id, node.id),
            NodeOrText::AppendText(text) => dom.append_text(parent.id, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self
            .dom
            .borrow()
            .get(element.id)
            .is_some_and(|n| n.parent.is_some());
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        let mut dom = self.dom.borrow_mut();
        let doctype = dom.alloc(NodeData::Other);
        let doc = dom.document();
        dom.append(doc, doctype);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.id == y.id
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        let node = match new_node {
            NodeOrText::AppendNode(node) => node.id,
            NodeOrText::AppendText(text) => dom.alloc(NodeData::Text(text.to_string())),
        };
        dom.insert_before(sibling.id, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        self.dom
            .borrow_mut()
            .add_attrs_if_missing(target.id, convert_attrs(attrs));
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.id);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        self.dom
            .borrow_mut()
            .reparent_children(node.id, new_parent.id);
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_html;

    #[test]
    fn test_basic_parse() {
        let dom = parse_html("<html><body><p>Hello</p></body></html>");
        let p = dom.find_by_tag("p").expect("should find p");
        assert_eq!(dom.text_content_filtered(p, |_, _| false), "Hello");
    }

    #[test]
    fn test_unclosed_tags_recover() {
        let dom = parse_html("<div><p>One<p>Two</div>");
        let div = dom.find_by_tag("div").expect("div");
        let paragraphs = dom
            .children(div)
            .iter()
            .filter(|&&c| dom.element_name(c) == Some("p"))
            .count();
        assert_eq!(paragraphs, 2);
    }

    #[test]
    fn test_fragment_without_html_wrapper() {
        let dom = parse_html(r#"<h2 id="History">History</h2><figure><img src="//x/y.png"></figure>"#);
        let img = dom.find_by_tag("img").expect("img");
        assert_eq!(dom.attr(img, "src"), Some("//x/y.png"));
        assert!(dom.find_by_tag("body").is_some());
    }
}
