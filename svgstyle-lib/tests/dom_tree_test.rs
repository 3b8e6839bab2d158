use std::cell::RefCell;
use std::rc::Rc;
use svgstyle_lib::dom::dom_tree;

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub fn create_test_dom(svg: &str) -> dom_tree::Document {
        dom_tree::Document::parse_str(svg, None).unwrap()
    }

    fn collect_structure(node: &Rc<RefCell<dom_tree::Node>>) -> String {
        let mut output = String::new();
        traverse_node(node, 0, &mut output);
        output
    }

    fn traverse_node(node: &Rc<RefCell<dom_tree::Node>>, depth: usize, output: &mut String) {
        let node_ref = node.borrow();
        match &*node_ref {
            dom_tree::Node::DocumentRoot(root_node) => {
                for child in &root_node.children {
                    traverse_node(child, depth, output);
                }
            }
            dom_tree::Node::Element(elem_node) => {
                *output += &format!("{}<{}>\n", "  ".repeat(depth), elem_node.tag);
                for child in &elem_node.children {
                    traverse_node(child, depth + 1, output);
                }
            }
            dom_tree::Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    *output += &format!("{}{}\n", "  ".repeat(depth), trimmed);
                }
            }
            dom_tree::Node::ProcessingInstruction(pi) => {
                *output += &format!("{}<?{}?>\n", "  ".repeat(depth), pi.target);
            }
            dom_tree::Node::Comment(_) => {}
        }
    }

    #[test]
    fn test_basic_structure() {
        let svg = r#"<?xml-stylesheet href="a.css"?>
            <svg xmlns="http://www.w3.org/2000/svg">
                <title>Test</title>
                <g>
                    <rect/>
                    <text>Hello</text>
                </g>
            </svg>
        "#;

        let document = create_test_dom(svg);
        let structure = collect_structure(&document.root);

        let expected = r#"
<?xml-stylesheet?>
<svg>
  <title>
    Test
  <g>
    <rect>
    <text>
      Hello
"#;
        assert_eq!(structure.trim(), expected.trim());
    }

    #[test]
    fn test_mixed_content() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">
                <text>This is <tspan>bold</tspan> text.<!-- note --> Next.</text>
            </svg>"#;

        let document = create_test_dom(svg);
        let structure = collect_structure(&document.root);

        let expected = r#"
<svg>
  <text>
    This is
    <tspan>
      bold
    text.
    Next.
"#;
        assert_eq!(structure.trim(), expected.trim());
    }

    #[test]
    fn test_attributes() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
                <a xlink:href="https://example.com" target="_blank" data-test="123">Link</a>
            </svg>"##;

        let document = create_test_dom(svg);
        let svg_node = document.document_element().unwrap();
        let link = dom_tree::element_children(&svg_node).remove(0);

        let attributes = match &*link.borrow() {
            dom_tree::Node::Element(elem) => elem.attributes.clone(),
            _ => Vec::new(),
        };
        assert_eq!(
            attributes,
            vec![
                ("xlink:href".to_string(), "https://example.com".to_string()),
                ("target".to_string(), "_blank".to_string()),
                ("data-test".to_string(), "123".to_string())
            ]
        );
        assert!(Rc::ptr_eq(&dom_tree::parent_element(&link).unwrap(), &svg_node));
        assert_eq!(dom_tree::text_content(&link), "Link");
    }

    #[test]
    fn test_tree_edits() {
        let document = create_test_dom(r#"<svg xmlns="http://www.w3.org/2000/svg"><g id="a"/><g id="b"/></svg>"#);
        let a = document.get_element_by_id("a").unwrap();
        let b = document.get_element_by_id("b").unwrap();
        let circle = document.create_element("http://www.w3.org/2000/svg", "circle");

        dom_tree::append_child(&a, &circle).unwrap();
        dom_tree::append_child(&b, &circle).unwrap();
        assert!(dom_tree::element_children(&a).is_empty());
        assert!(Rc::ptr_eq(&dom_tree::parent_element(&circle).unwrap(), &b));
        assert!(dom_tree::remove_child(&a, &circle).is_err());
    }
}
