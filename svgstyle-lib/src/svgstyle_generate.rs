use crate::dom::dom_tree::{attribute, descendant_elements, tag_name, Document, NodeRef};
use crate::error::Result;
use crate::style::resolver::{ComputedStyle, StyleContext};

pub mod svg_style {
    use super::*;
    use log::info;
    use std::fmt::Write;

    /// One element's resolved style, labelled `tag` or `tag#id`.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ElementStyle {
        pub label: String,
        pub style: ComputedStyle,
    }

    /// Parses `svg_content` and computes the style of every element in
    /// document order. With `selector_id` only that element is resolved.
    pub fn generate(svg_content: &str, ctx: &StyleContext, selector_id: Option<&str>) -> Result<Vec<ElementStyle>> {
        let document = Document::parse_str(svg_content, None)?;
        generate_for_document(&document, ctx, selector_id)
    }

    pub fn generate_for_document(
        document: &Document,
        ctx: &StyleContext,
        selector_id: Option<&str>,
    ) -> Result<Vec<ElementStyle>> {
        let elements: Vec<NodeRef> = match selector_id {
            Some(id) => document.get_element_by_id(id).into_iter().collect(),
            None => descendant_elements(&document.root),
        };
        info!("resolving styles for {} elements", elements.len());

        elements
            .iter()
            .map(|element| {
                Ok(ElementStyle {
                    label: label(element),
                    style: ctx.computed_style(element)?,
                })
            })
            .collect()
    }

    /// `name: value` lines, one block per element.
    pub fn render(styles: &[ElementStyle]) -> String {
        let mut out = String::new();
        for element in styles {
            let _ = writeln!(out, "{} {{", element.label);
            for (name, value) in &element.style {
                let _ = writeln!(out, "  {}: {}", name, value);
            }
            out.push_str("}\n");
        }
        out
    }

    fn label(element: &NodeRef) -> String {
        let tag = tag_name(element).unwrap_or_default();
        match attribute(element, "id") {
            Some(id) => format!("{}#{}", tag, id),
            None => tag,
        }
    }
}
