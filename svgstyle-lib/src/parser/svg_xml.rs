//! This module parses SVG (XML) text into the `crate::dom::dom_tree` tree.
//!
//! It uses xml5ever as the XML parser. Processing instructions are kept as
//! nodes so `<?xml-stylesheet?>` can be read back during cascade collection.

use crate::dom::dom_tree::{self, append_child, remove_child, Node, NodeRef};
use crate::error::{Result, StyleError};
use log::debug;
use markup5ever::interface::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use markup5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever::tendril::{StrTendril, TendrilSink};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use url::Url;

/// Parses `text` into a document. `url` is the document location used to
/// resolve relative stylesheet references.
pub fn parse_document(text: &str, url: Option<Url>) -> Result<dom_tree::Document> {
    let sink = SvgTreeSink::new(url);
    let document = xml5ever::driver::parse_document(sink, Default::default()).one(text);
    if document.document_element().is_none() {
        return Err(StyleError::Syntax("document has no root element".to_string()));
    }
    Ok(document)
}

/// Builds the tree node by node as xml5ever reports it.
pub struct SvgTreeSink {
    document: dom_tree::Document,
    error_count: Cell<usize>,
    quirks_mode: Cell<QuirksMode>,
}

impl SvgTreeSink {
    pub fn new(url: Option<Url>) -> Self {
        Self {
            document: dom_tree::new_document(url),
            error_count: Cell::new(0),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
        }
    }

    fn new_node(node: Node) -> NodeRef {
        Rc::new(RefCell::new(node))
    }

    /// Text directly after a text node extends it instead of adding a sibling.
    fn text_node(&self, siblings: &[NodeRef], text: &str) -> Option<NodeRef> {
        if let Some(last) = siblings.last() {
            if let Node::Text(existing) = &mut *last.borrow_mut() {
                existing.push_str(text);
                return None;
            }
        }
        Some(Self::new_node(Node::Text(text.to_string())))
    }

    fn push_child(parent: &NodeRef, child: NodeRef) {
        let is_element = matches!(*child.borrow(), Node::Element(_));
        if is_element {
            if let Err(e) = append_child(parent, &child) {
                debug!("dropping misplaced element: {}", e);
            }
            return;
        }
        match &mut *parent.borrow_mut() {
            Node::DocumentRoot(root) => root.children.push(child),
            Node::Element(elem) => elem.children.push(child),
            _ => {}
        }
    }
}

/// Element name view handed to xml5ever.
#[derive(Debug)]
pub struct SvgElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for SvgElemName {
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

/// `prefix:local` for prefixed attributes such as `xlink:href`.
fn attribute_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

impl TreeSink for SvgTreeSink {
    type Handle = NodeRef;
    type Output = dom_tree::Document;
    type ElemName<'a>
        = SvgElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        if self.error_count.get() > 0 {
            debug!("document parsed with {} recoverable errors", self.error_count.get());
        }
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.error_count.set(self.error_count.get() + 1);
        debug!("XML parse error: {}", msg);
    }

    fn get_document(&self) -> Self::Handle {
        self.document.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        match &*target.borrow() {
            Node::Element(elem) => SvgElemName {
                ns: elem.qual_name.ns.clone(),
                local: elem.qual_name.local.clone(),
            },
            _ => SvgElemName {
                ns: Namespace::from(""),
                local: LocalName::from(""),
            },
        }
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, _flags: ElementFlags) -> Self::Handle {
        let mut element = dom_tree::ElementNode::new(name.local.to_string(), name);
        element.attributes = attrs
            .into_iter()
            .map(|attr| (attribute_name(&attr.name), attr.value.to_string()))
            .collect();
        Self::new_node(Node::Element(element))
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Self::new_node(Node::Comment(text.to_string()))
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        Self::new_node(Node::ProcessingInstruction(dom_tree::ProcessingInstructionNode {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let node = match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => {
                match self.text_node(&dom_tree::children(parent), &text) {
                    Some(node) => node,
                    None => return,
                }
            }
        };
        Self::push_child(parent, node);
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let Some(parent) = dom_tree::parent_node(sibling) else {
            return;
        };
        let node = match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => Self::new_node(Node::Text(text.to_string())),
        };
        Self::push_child(&parent, Rc::clone(&node));
        // move the new node from the end to just before `sibling`
        let mut parent_borrow = parent.borrow_mut();
        let siblings = match &mut *parent_borrow {
            Node::DocumentRoot(root) => &mut root.children,
            Node::Element(elem) => &mut elem.children,
            _ => return,
        };
        if let (Some(from), Some(to)) = (
            siblings.iter().rposition(|c| Rc::ptr_eq(c, &node)),
            siblings.iter().position(|c| Rc::ptr_eq(c, sibling)),
        ) {
            let moved = siblings.remove(from);
            siblings.insert(to.min(siblings.len()), moved);
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if dom_tree::parent_node(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    /// Doctypes carry nothing style resolution needs.
    fn append_doctype_to_document(&self, _name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {}

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let Node::Element(elem) = &mut *target.borrow_mut() {
            for attr in attrs {
                let name = attribute_name(&attr.name);
                if !elem.has_attribute(&name) {
                    elem.attributes.push((name, attr.value.to_string()));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        if let Some(parent) = dom_tree::parent_node(target) {
            if let Err(e) = remove_child(&parent, target) {
                debug!("remove_from_parent: {}", e);
            }
        }
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let moved = match &mut *node.borrow_mut() {
            Node::DocumentRoot(root) => std::mem::take(&mut root.children),
            Node::Element(elem) => std::mem::take(&mut elem.children),
            _ => Vec::new(),
        };
        for child in moved {
            if let Node::Element(elem) = &mut *child.borrow_mut() {
                elem.parent = None;
            }
            Self::push_child(new_parent, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::dom_tree::{attribute, descendant_elements, tag_name, text_content};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_keeps_processing_instructions() {
        let doc = parse_document(
            r#"<?xml-stylesheet href="a.css" type="text/css"?><svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#,
            None,
        )
        .unwrap();
        let pis: Vec<String> = dom_tree::children(&doc.root)
            .iter()
            .filter_map(|node| match &*node.borrow() {
                Node::ProcessingInstruction(pi) if pi.target == "xml-stylesheet" => pi.pseudo_attribute("href"),
                _ => None,
            })
            .collect();
        assert_eq!(pis, vec!["a.css"]);
    }

    #[test]
    fn test_namespaces_and_attributes() {
        let doc = parse_document(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
                 <use id="u" xlink:href="#a" x="1"/>
                 <style>rect { fill: red }</style>
               </svg>"##,
            None,
        )
        .unwrap();
        let root = doc.document_element().unwrap();
        match &*root.borrow() {
            Node::Element(elem) => assert_eq!(elem.namespace(), "http://www.w3.org/2000/svg"),
            _ => panic!("root is not an element"),
        }
        let used = doc.get_element_by_id("u").unwrap();
        assert_eq!(attribute(&used, "xlink:href").as_deref(), Some("#a"));
        assert_eq!(attribute(&used, "x").as_deref(), Some("1"));

        let names: Vec<String> = descendant_elements(&doc.root).iter().filter_map(tag_name).collect();
        assert_eq!(names, vec!["svg", "use", "style"]);
        let style = descendant_elements(&doc.root).pop().unwrap();
        assert_eq!(text_content(&style), "rect { fill: red }");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(parse_document("", None), Err(StyleError::Syntax(_))));
    }
}
