//! Gathers the rules that currently apply to a document, in cascade order.

use crate::dom::dom_tree::{
    attribute, children, descendant_elements, document_root, text_content, Node, NodeRef,
};
use crate::style::media::Environment;
use crate::style::rule_model::{CssRule, RuleKind, SheetOrigin, StyleSheet};
use crate::style::stylesheet_parser::StylesheetParser;
use log::{debug, warn};
use std::rc::Rc;
use url::Url;

pub const USER_AGENT_STYLESHEET: &str = include_str!("user_agent.css");

/// Collects stylesheets and flattens them against one environment snapshot.
/// The output depends on the environment, so it must not outlive it.
#[derive(Debug, Clone, Copy)]
pub struct CascadeCollector<'a> {
    parser: &'a StylesheetParser,
    env: &'a Environment,
}

impl<'a> CascadeCollector<'a> {
    pub fn new(parser: &'a StylesheetParser, env: &'a Environment) -> Self {
        Self { parser, env }
    }

    /// Every rule applying to `element`'s document: user-agent rules, then
    /// `xml-stylesheet` instructions, `<link>` sheets and `<style>` sheets.
    /// Imports and media rules are expanded in place; media-gated content
    /// that does not match is left out entirely.
    pub fn collect_rules(&self, element: &NodeRef) -> Vec<Rc<CssRule>> {
        let mut rules = Vec::new();
        for sheet in self.style_sheets(element) {
            if self.sheet_applies(&sheet) {
                self.flatten(&sheet.css_rules(), &mut rules);
            }
        }
        rules
    }

    /// All candidate sheets in cascade order, before media filtering.
    pub fn style_sheets(&self, element: &NodeRef) -> Vec<Rc<StyleSheet>> {
        let mut sheets = vec![self.parser.parse_sheet(USER_AGENT_STYLESHEET, SheetOrigin::default())];
        let Some(root) = document_root(element) else {
            debug!("element is detached; only user-agent rules apply");
            return sheets;
        };
        let base_url = match &*root.borrow() {
            Node::DocumentRoot(doc) => doc.url.clone(),
            _ => None,
        };

        sheets.extend(self.processing_instruction_sheets(&root, base_url.as_ref()));

        let elements = descendant_elements(&root);
        sheets.extend(elements.iter().filter_map(|node| self.link_sheet(node, base_url.as_ref())));
        sheets.extend(elements.iter().filter_map(|node| self.style_element_sheet(node, base_url.as_ref())));
        sheets
    }

    fn sheet_applies(&self, sheet: &StyleSheet) -> bool {
        !sheet.disabled() && self.env.matches_media(&sheet.media.media_text())
    }

    fn flatten(&self, rules: &[Rc<CssRule>], out: &mut Vec<Rc<CssRule>>) {
        for rule in rules {
            match &rule.kind {
                RuleKind::Import { style_sheet, .. } => {
                    if self.sheet_applies(style_sheet) {
                        self.flatten(&style_sheet.css_rules(), out);
                    }
                }
                RuleKind::Media { media, css_rules } => {
                    if self.env.matches_media(&media.media_text()) {
                        self.flatten(&css_rules.borrow(), out);
                    }
                }
                _ => out.push(Rc::clone(rule)),
            }
        }
    }

    /// `<?xml-stylesheet?>` instructions that precede the root element.
    fn processing_instruction_sheets(&self, root: &NodeRef, base_url: Option<&Url>) -> Vec<Rc<StyleSheet>> {
        let mut sheets = Vec::new();
        for node in children(root) {
            let (href, media, title) = match &*node.borrow() {
                Node::Element(_) => break,
                Node::ProcessingInstruction(pi) if pi.target == "xml-stylesheet" => {
                    let kind = pi.pseudo_attribute("type").unwrap_or_default();
                    if !kind.is_empty() && kind != "text/css" {
                        continue;
                    }
                    if pi.pseudo_attribute("alternate").as_deref() == Some("yes") {
                        continue;
                    }
                    let Some(href) = pi.pseudo_attribute("href") else {
                        continue;
                    };
                    (href, pi.pseudo_attribute("media"), pi.pseudo_attribute("title"))
                }
                _ => continue,
            };
            let origin = SheetOrigin {
                owner_node: Some(Rc::downgrade(&node)),
                title,
                media: media.unwrap_or_default(),
                ..Default::default()
            };
            if let Some(sheet) = self.fetch_sheet(&href, base_url, origin) {
                sheets.push(sheet);
            }
        }
        sheets
    }

    /// `<link rel="stylesheet" href="...">`, skipping alternates.
    fn link_sheet(&self, node: &NodeRef, base_url: Option<&Url>) -> Option<Rc<StyleSheet>> {
        if local_name(node)? != "link" {
            return None;
        }
        let rel = attribute(node, "rel").unwrap_or_default().to_ascii_lowercase();
        let rels: Vec<&str> = rel.split_ascii_whitespace().collect();
        if !rels.contains(&"stylesheet") || rels.contains(&"alternate") {
            return None;
        }
        let href = attribute(node, "href")?;
        let origin = SheetOrigin {
            owner_node: Some(Rc::downgrade(node)),
            title: attribute(node, "title"),
            media: attribute(node, "media").unwrap_or_default(),
            ..Default::default()
        };
        self.fetch_sheet(&href, base_url, origin)
    }

    fn style_element_sheet(&self, node: &NodeRef, base_url: Option<&Url>) -> Option<Rc<StyleSheet>> {
        if local_name(node)? != "style" {
            return None;
        }
        let kind = attribute(node, "type").unwrap_or_default();
        if !kind.is_empty() && !kind.eq_ignore_ascii_case("text/css") {
            return None;
        }
        let origin = SheetOrigin {
            base_url: base_url.cloned(),
            owner_node: Some(Rc::downgrade(node)),
            title: attribute(node, "title"),
            media: attribute(node, "media").unwrap_or_default(),
            ..Default::default()
        };
        Some(self.parser.parse_sheet(&text_content(node), origin))
    }

    fn fetch_sheet(&self, href: &str, base_url: Option<&Url>, origin: SheetOrigin) -> Option<Rc<StyleSheet>> {
        let url = match base_url {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        match url {
            Ok(url) => Some(self.parser.parse_resource(&url, origin, None)),
            Err(e) => {
                warn!("skipping stylesheet {:?}: {}", href, e);
                None
            }
        }
    }
}

fn local_name(node: &NodeRef) -> Option<String> {
    match &*node.borrow() {
        Node::Element(elem) => Some(elem.qual_name.local.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::dom_tree::Document;
    use crate::style::properties::PropertyRegistry;
    use crate::style::rule_model::RuleKind;
    use pretty_assertions::assert_eq;

    fn selectors(rules: &[Rc<CssRule>]) -> Vec<String> {
        rules
            .iter()
            .filter_map(|rule| match &rule.kind {
                RuleKind::Style { selector_text, .. } => Some(selector_text.clone()),
                _ => None,
            })
            .collect()
    }

    const DOC: &str = r#"<?xml version="1.0"?>
<?xml-stylesheet type="text/css" href="data:text/css,%2Epi%7Bfill:red%7D"?>
<?xml-stylesheet alternate="yes" href="data:text/css,%2Ealt%7Bfill:red%7D"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:h="http://www.w3.org/1999/xhtml">
  <style media="print">.printed { fill: red }</style>
  <style>.screen { fill: blue } @media print { .inner { fill: green } }</style>
  <h:link rel="stylesheet" href="data:text/css,%2Elinked%7Bfill:red%7D"/>
  <h:link rel="alternate stylesheet" href="data:text/css,%2Ealtlink%7Bfill:red%7D"/>
  <rect id="r"/>
</svg>"#;

    #[test]
    fn test_collection_order_on_screen() {
        let doc = Document::parse_str(DOC, None).unwrap();
        let rect = doc.get_element_by_id("r").unwrap();
        let parser = StylesheetParser::new(PropertyRegistry::standard());
        let env = Environment::screen(800.0, 600.0);
        let rules = CascadeCollector::new(&parser, &env).collect_rules(&rect);

        let author: Vec<String> = selectors(&rules)
            .into_iter()
            .filter(|s| s.starts_with('.'))
            .collect();
        assert_eq!(author, vec![".pi", ".linked", ".screen"]);
        assert!(matches!(rules[0].kind, RuleKind::Namespace { .. }));
    }

    #[test]
    fn test_print_media_gating() {
        let doc = Document::parse_str(DOC, None).unwrap();
        let rect = doc.get_element_by_id("r").unwrap();
        let parser = StylesheetParser::new(PropertyRegistry::standard());
        let env = Environment::print(800.0, 600.0);
        let author: Vec<String> = selectors(&CascadeCollector::new(&parser, &env).collect_rules(&rect))
            .into_iter()
            .filter(|s| s.starts_with('.'))
            .collect();
        assert_eq!(author, vec![".pi", ".linked", ".printed", ".screen", ".inner"]);
    }
}
