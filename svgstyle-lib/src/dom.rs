use markup5ever::{LocalName, Namespace, QualName};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use url::Url;

pub mod dom_tree {
    use super::*;
    use crate::error::{Result, StyleError};

    pub type NodeRef = Rc<RefCell<Node>>;
    pub type WeakNodeRef = Weak<RefCell<Node>>;

    #[derive(Debug)]
    pub enum Node {
        DocumentRoot(DocumentRootNode),
        Element(ElementNode),
        ProcessingInstruction(ProcessingInstructionNode),
        Text(String),
        Comment(String),
    }

    #[derive(Debug)]
    pub struct DocumentRootNode {
        pub children: Vec<NodeRef>,
        /// Location the document was loaded from; base for relative stylesheet URLs.
        pub url: Option<Url>,
    }

    #[derive(Debug)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        /// Attributes in source order. Prefixed attributes keep their `prefix:local` form.
        pub attributes: Vec<(String, String)>,
        pub children: Vec<NodeRef>,
        pub parent: Option<WeakNodeRef>,
    }

    #[derive(Debug)]
    pub struct ProcessingInstructionNode {
        pub target: String,
        pub data: String,
    }

    #[derive(Debug)]
    pub struct Document {
        pub root: NodeRef,
    }

    impl DocumentRootNode {
        pub fn new(url: Option<Url>) -> Self {
            DocumentRootNode {
                children: Vec::new(),
                url,
            }
        }
    }

    impl ElementNode {
        pub fn new(tag: String, qual_name: QualName) -> Self {
            ElementNode {
                tag,
                qual_name,
                attributes: Vec::new(),
                children: Vec::new(),
                parent: None,
            }
        }

        pub fn namespace(&self) -> &str {
            &self.qual_name.ns
        }

        pub fn get_attribute(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }

        pub fn has_attribute(&self, name: &str) -> bool {
            self.attributes.iter().any(|(k, _)| k == name)
        }

        /// Replaces the value in place when present so attribute order is stable.
        pub fn set_attribute(&mut self, name: &str, value: &str) {
            match self.attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => self
                    .attributes
                    .push((name.to_string(), value.to_string())),
            }
        }

        pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
            let index = self.attributes.iter().position(|(k, _)| k == name)?;
            Some(self.attributes.remove(index).1)
        }
    }

    impl ProcessingInstructionNode {
        /// Reads a pseudo-attribute such as `href="a.css"` out of the instruction data.
        pub fn pseudo_attribute(&self, name: &str) -> Option<String> {
            let mut rest = self.data.trim();
            while !rest.is_empty() {
                let (key, after_key) = rest.split_once('=')?;
                let after_key = after_key.trim_start();
                let quote = after_key.chars().next()?;
                if quote != '"' && quote != '\'' {
                    return None;
                }
                let body = &after_key[1..];
                let end = body.find(quote)?;
                if key.trim() == name {
                    return Some(body[..end].to_string());
                }
                rest = body[end + 1..].trim_start();
            }
            None
        }
    }

    impl Document {
        /// Parses SVG markup. `url` is where the document came from, if anywhere.
        pub fn parse_str(svg: &str, url: Option<Url>) -> Result<Document> {
            crate::parser::svg_xml::parse_document(svg, url)
        }

        pub fn url(&self) -> Option<Url> {
            match &*self.root.borrow() {
                Node::DocumentRoot(root) => root.url.clone(),
                _ => None,
            }
        }

        /// The outermost element, e.g. `<svg>`.
        pub fn document_element(&self) -> Option<NodeRef> {
            element_children(&self.root).into_iter().next()
        }

        pub fn get_element_by_id(&self, id: &str) -> Option<NodeRef> {
            descendant_elements(&self.root)
                .into_iter()
                .find(|node| attribute(node, "id").as_deref() == Some(id))
        }

        /// Creates a detached element; attach it with [`append_child`].
        pub fn create_element(&self, namespace: &str, tag: &str) -> NodeRef {
            let qual_name = QualName::new(None, Namespace::from(namespace), LocalName::from(tag));
            Rc::new(RefCell::new(Node::Element(ElementNode::new(
                tag.to_string(),
                qual_name,
            ))))
        }

        pub fn create_text_node(&self, text: &str) -> NodeRef {
            Rc::new(RefCell::new(Node::Text(text.to_string())))
        }
    }

    pub fn new_document(url: Option<Url>) -> Document {
        Document {
            root: Rc::new(RefCell::new(Node::DocumentRoot(DocumentRootNode::new(url)))),
        }
    }

    pub fn is_element(node: &NodeRef) -> bool {
        matches!(*node.borrow(), Node::Element(_))
    }

    pub fn tag_name(node: &NodeRef) -> Option<String> {
        match &*node.borrow() {
            Node::Element(elem) => Some(elem.tag.clone()),
            _ => None,
        }
    }

    pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
        match &*node.borrow() {
            Node::Element(elem) => elem.get_attribute(name).map(str::to_string),
            _ => None,
        }
    }

    pub fn set_attribute(node: &NodeRef, name: &str, value: &str) -> Result<()> {
        match &mut *node.borrow_mut() {
            Node::Element(elem) => {
                elem.set_attribute(name, value);
                Ok(())
            }
            _ => Err(StyleError::NotAnElement),
        }
    }

    pub fn remove_attribute(node: &NodeRef, name: &str) -> Result<Option<String>> {
        match &mut *node.borrow_mut() {
            Node::Element(elem) => Ok(elem.remove_attribute(name)),
            _ => Err(StyleError::NotAnElement),
        }
    }

    /// Parent of an element, which is either another element or the document root.
    pub fn parent_node(node: &NodeRef) -> Option<NodeRef> {
        match &*node.borrow() {
            Node::Element(elem) => elem.parent.as_ref().and_then(Weak::upgrade),
            _ => None,
        }
    }

    pub fn parent_element(node: &NodeRef) -> Option<NodeRef> {
        parent_node(node).filter(is_element)
    }

    pub fn children(node: &NodeRef) -> Vec<NodeRef> {
        match &*node.borrow() {
            Node::DocumentRoot(root) => root.children.clone(),
            Node::Element(elem) => elem.children.clone(),
            _ => Vec::new(),
        }
    }

    pub fn element_children(node: &NodeRef) -> Vec<NodeRef> {
        children(node).into_iter().filter(is_element).collect()
    }

    /// All elements below `node` in document order.
    pub fn descendant_elements(node: &NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef> = element_children(node).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            stack.extend(element_children(&current).into_iter().rev());
            out.push(current);
        }
        out
    }

    /// Climbs to the document root node owning `node`, if it is attached.
    pub fn document_root(node: &NodeRef) -> Option<NodeRef> {
        let mut current = Rc::clone(node);
        loop {
            if matches!(*current.borrow(), Node::DocumentRoot(_)) {
                return Some(current);
            }
            current = parent_node(&current)?;
        }
    }

    pub fn text_content(node: &NodeRef) -> String {
        match &*node.borrow() {
            Node::Text(text) => text.clone(),
            Node::Element(elem) => elem.children.iter().map(text_content).collect(),
            Node::DocumentRoot(root) => root.children.iter().map(text_content).collect(),
            _ => String::new(),
        }
    }

    /// Appends `child` to `parent`, detaching it from any previous parent first.
    pub fn append_child(parent: &NodeRef, child: &NodeRef) -> Result<()> {
        if Rc::ptr_eq(parent, child) {
            return Err(StyleError::NotAChild);
        }
        if let Some(old_parent) = parent_node(child) {
            remove_child(&old_parent, child)?;
        }
        match &mut *parent.borrow_mut() {
            Node::DocumentRoot(root) => root.children.push(Rc::clone(child)),
            Node::Element(elem) => elem.children.push(Rc::clone(child)),
            _ => return Err(StyleError::NotAnElement),
        }
        if let Node::Element(ref mut child_elem) = *child.borrow_mut() {
            child_elem.parent = Some(Rc::downgrade(parent));
        }
        Ok(())
    }

    pub fn remove_child(parent: &NodeRef, child: &NodeRef) -> Result<NodeRef> {
        let removed = {
            let mut parent_borrow = parent.borrow_mut();
            let siblings = match &mut *parent_borrow {
                Node::DocumentRoot(root) => &mut root.children,
                Node::Element(elem) => &mut elem.children,
                _ => return Err(StyleError::NotAChild),
            };
            let index = siblings
                .iter()
                .position(|c| Rc::ptr_eq(c, child))
                .ok_or(StyleError::NotAChild)?;
            siblings.remove(index)
        };
        if let Node::Element(ref mut child_elem) = *removed.borrow_mut() {
            child_elem.parent = None;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::dom_tree::*;
    use crate::error::StyleError;

    const SVG_NS: &str = "http://www.w3.org/2000/svg";

    #[test]
    fn test_append_and_remove_child() {
        let doc = new_document(None);
        let svg = doc.create_element(SVG_NS, "svg");
        let rect = doc.create_element(SVG_NS, "rect");
        append_child(&doc.root, &svg).unwrap();
        append_child(&svg, &rect).unwrap();

        assert!(std::rc::Rc::ptr_eq(&parent_element(&rect).unwrap(), &svg));
        assert!(document_root(&rect).is_some());

        let removed = remove_child(&svg, &rect).unwrap();
        assert!(parent_node(&removed).is_none());
        assert!(matches!(
            remove_child(&svg, &rect),
            Err(StyleError::NotAChild)
        ));
    }

    #[test]
    fn test_attribute_crud_keeps_order() {
        let doc = new_document(None);
        let rect = doc.create_element(SVG_NS, "rect");
        set_attribute(&rect, "x", "1").unwrap();
        set_attribute(&rect, "fill", "red").unwrap();
        set_attribute(&rect, "x", "2").unwrap();
        if let Node::Element(ref elem) = *rect.borrow() {
            assert_eq!(
                elem.attributes,
                vec![
                    ("x".to_string(), "2".to_string()),
                    ("fill".to_string(), "red".to_string())
                ]
            );
        }
        assert_eq!(remove_attribute(&rect, "x").unwrap().as_deref(), Some("2"));
        assert_eq!(attribute(&rect, "x"), None);
    }

    #[test]
    fn test_pseudo_attributes() {
        let pi = ProcessingInstructionNode {
            target: "xml-stylesheet".to_string(),
            data: r#"type="text/css" href='a.css' media="print""#.to_string(),
        };
        assert_eq!(pi.pseudo_attribute("href").as_deref(), Some("a.css"));
        assert_eq!(pi.pseudo_attribute("media").as_deref(), Some("print"));
        assert_eq!(pi.pseudo_attribute("title"), None);
    }
}
