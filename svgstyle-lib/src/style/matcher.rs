//! Folds a flattened rule list into per-property values for one element.

use crate::dom::dom_tree::NodeRef;
use crate::style::rule_model::{CssRule, RuleKind};
use crate::style::selector::{compile, NamespaceMap};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::rc::Rc;

pub type PropertyMap = BTreeMap<String, String>;

/// Declarations from matching rules, split by priority.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchedDeclarations {
    pub normal: PropertyMap,
    pub important: PropertyMap,
}

/// Walks `rules` once in source order. A later matching declaration always
/// replaces an earlier one, whatever the selectors' specificity. Important
/// declarations are also written to `important`.
///
/// A selector that fails to compile only skips its own rule.
pub fn match_rules(element: &NodeRef, rules: &[Rc<CssRule>]) -> MatchedDeclarations {
    let mut namespaces = NamespaceMap::new();
    let mut matched = MatchedDeclarations::default();

    for rule in rules {
        match &rule.kind {
            RuleKind::Namespace {
                namespace_uri,
                prefix: Some(prefix),
            } if !prefix.is_empty() => {
                namespaces.insert(prefix.clone(), namespace_uri.clone());
            }
            RuleKind::Namespace { .. } => {}
            RuleKind::Style { selector_text, style } => {
                let selectors = match compile(selector_text, &namespaces) {
                    Ok(selectors) => selectors,
                    Err(e) => {
                        warn!("skipping rule {:?}: {}", selector_text, e);
                        continue;
                    }
                };
                if !selectors.matches(element) {
                    continue;
                }
                for declaration in style.items() {
                    if declaration.important {
                        matched
                            .important
                            .insert(declaration.name.clone(), declaration.value.clone());
                    }
                    matched.normal.insert(declaration.name, declaration.value);
                }
            }
            _ => debug!("unhandled {} rule", rule.type_name()),
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::dom_tree::Document;
    use crate::style::properties::PropertyRegistry;
    use crate::style::stylesheet_parser::StylesheetParser;
    use pretty_assertions::assert_eq;

    fn rules(css: &str) -> Vec<Rc<CssRule>> {
        StylesheetParser::new(PropertyRegistry::standard()).parse_text(css, None, None)
    }

    fn rect() -> (Document, NodeRef) {
        let doc = Document::parse_str(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g class="a"><rect id="r" class="b"/></g></svg>"#,
            None,
        )
        .unwrap();
        let rect = doc.get_element_by_id("r").unwrap();
        (doc, rect)
    }

    #[test]
    fn test_source_order_beats_specificity() {
        let (_doc, rect) = rect();
        let matched = match_rules(&rect, &rules("#r.b { fill: red } rect { fill: blue }"));
        assert_eq!(matched.normal.get("fill").map(String::as_str), Some("blue"));
        assert!(matched.important.is_empty());
    }

    #[test]
    fn test_important_recorded_separately() {
        let (_doc, rect) = rect();
        let matched = match_rules(
            &rect,
            &rules("rect { stroke: red !important } .b { stroke: green }"),
        );
        assert_eq!(matched.normal.get("stroke").map(String::as_str), Some("green"));
        assert_eq!(matched.important.get("stroke").map(String::as_str), Some("red"));
    }

    #[test]
    fn test_later_declaration_in_block_wins() {
        let (_doc, rect) = rect();
        let matched = match_rules(&rect, &rules("rect { fill: red !important; fill: blue }"));
        assert_eq!(matched.normal.get("fill").map(String::as_str), Some("blue"));
        assert!(matched.important.is_empty());
    }

    #[test]
    fn test_bad_selector_skips_only_its_rule() {
        let (_doc, rect) = rect();
        let matched = match_rules(
            &rect,
            &rules("rect:hover { fill: red } g > rect { opacity: 0.5 } nope|rect { fill: green }"),
        );
        assert_eq!(matched.normal.get("opacity").map(String::as_str), Some("0.5"));
        assert_eq!(matched.normal.get("fill"), None);
    }

    #[test]
    fn test_namespace_prefix_applies_to_later_rules() {
        let (_doc, rect) = rect();
        let matched = match_rules(
            &rect,
            &rules("@namespace s url(http://www.w3.org/2000/svg); s|rect { fill: red } @namespace o url(urn:other); o|rect { fill: blue }"),
        );
        assert_eq!(matched.normal.get("fill").map(String::as_str), Some("red"));
    }
}
