use crate::dom::dom_tree::{
    children, element_children, is_element, parent_element, parent_node, Node, NodeRef,
};
use crate::style::tokens::{serialize, split_commas, tokenize, trim, BlockKind, ComponentValue};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Prefix to namespace URI, as declared by `@namespace` rules.
pub type NamespaceMap = HashMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid selector {0:?}")]
    Invalid(String),
    #[error("unsupported selector feature {0:?}")]
    Unsupported(String),
    #[error("unknown namespace prefix {0:?}")]
    UnknownNamespacePrefix(String),
}

// ------------------------------
// 1. Selector Structures
// ------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// `name` or `*|name`
    Any,
    /// `|name`
    NoNamespace,
    /// `prefix|name`
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSelector {
    pub namespace: NamespaceConstraint,
    /// `None` for the universal selector.
    pub name: Option<String>,
}

/// Supported attribute selector operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOperator {
    /// [attr="value"]
    Exact,
    /// [attr~="value"]
    Includes,
    /// [attr|="value"]
    DashMatch,
    /// [attr^="value"]
    Prefix,
    /// [attr$="value"]
    Suffix,
    /// [attr*="value"]
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    /// None means only an existence check.
    pub operator: Option<AttributeOperator>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    Root,
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Not(Vec<ComplexSelector>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub type_selector: Option<TypeSelector>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub pseudo_classes: Vec<PseudoClass>,
}

/// A key compound selector plus the parts to its left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub key: CompoundSelector,
    /// Ancestors with their combinators, in right-to-left order.
    pub ancestors: Vec<(Combinator, CompoundSelector)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Descendant combinator (a space).
    Descendant,
    /// Child combinator (`>`).
    Child,
    /// Adjacent sibling combinator (`+`).
    AdjacentSibling,
    /// General sibling combinator (`~`).
    GeneralSibling,
}

/// A comma-separated selector list; matches when any member matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(pub Vec<ComplexSelector>);

// ------------------------------
// 2. Selector Parsing
// ------------------------------

/// Compiles `selector_text` against the declared namespace prefixes.
pub fn compile(selector_text: &str, namespaces: &NamespaceMap) -> Result<SelectorList, SelectorError> {
    parse_selector_list(&tokenize(selector_text), namespaces)
}

fn parse_selector_list(
    values: &[ComponentValue],
    namespaces: &NamespaceMap,
) -> Result<SelectorList, SelectorError> {
    let mut selectors = Vec::new();
    for piece in split_commas(values) {
        if piece.is_empty() {
            return Err(SelectorError::Invalid(serialize(values)));
        }
        selectors.push(parse_complex_selector(piece, namespaces)?);
    }
    Ok(SelectorList(selectors))
}

fn parse_complex_selector(
    values: &[ComponentValue],
    namespaces: &NamespaceMap,
) -> Result<ComplexSelector, SelectorError> {
    let invalid = || SelectorError::Invalid(serialize(values));
    let mut compounds: Vec<CompoundSelector> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut saw_space = false;
    let mut explicit: Option<Combinator> = None;
    let mut i = 0;

    while i < values.len() {
        match &values[i] {
            ComponentValue::Whitespace => {
                saw_space = true;
                i += 1;
            }
            ComponentValue::Delim(c @ ('>' | '+' | '~')) => {
                if compounds.is_empty() || explicit.is_some() {
                    return Err(invalid());
                }
                explicit = Some(match c {
                    '>' => Combinator::Child,
                    '+' => Combinator::AdjacentSibling,
                    _ => Combinator::GeneralSibling,
                });
                i += 1;
            }
            _ => {
                if !compounds.is_empty() {
                    match explicit.take() {
                        Some(combinator) => combinators.push(combinator),
                        None if saw_space => combinators.push(Combinator::Descendant),
                        None => return Err(invalid()),
                    }
                }
                saw_space = false;
                let (compound, next) = parse_compound_selector(values, i, namespaces)?;
                compounds.push(compound);
                i = next;
            }
        }
    }
    if explicit.is_some() {
        return Err(invalid());
    }

    let key = compounds.pop().ok_or_else(invalid)?;
    let ancestors = combinators.into_iter().zip(compounds).rev().collect();
    Ok(ComplexSelector { key, ancestors })
}

/// Parses one compound selector starting at `start`; returns it with the
/// index of the first value after it.
fn parse_compound_selector(
    values: &[ComponentValue],
    start: usize,
    namespaces: &NamespaceMap,
) -> Result<(CompoundSelector, usize), SelectorError> {
    let mut compound = CompoundSelector::default();
    let mut i = start;

    while i < values.len() {
        match &values[i] {
            ComponentValue::Whitespace | ComponentValue::Delim('>' | '+' | '~') => break,
            ComponentValue::Ident(_) | ComponentValue::Delim('*' | '|') if i == start => {
                let (type_selector, next) = parse_type_selector(values, i, namespaces)?;
                compound.type_selector = Some(type_selector);
                i = next;
            }
            ComponentValue::Hash(id) => {
                compound.ids.push(id.clone());
                i += 1;
            }
            ComponentValue::Delim('.') => match values.get(i + 1) {
                Some(ComponentValue::Ident(class)) => {
                    compound.classes.push(class.clone());
                    i += 2;
                }
                _ => return Err(SelectorError::Invalid(serialize(&values[i..]))),
            },
            ComponentValue::Block {
                kind: BlockKind::Square,
                contents,
            } => {
                compound.attributes.push(parse_attribute_selector(contents)?);
                i += 1;
            }
            ComponentValue::Colon => {
                let pseudo = match values.get(i + 1) {
                    Some(ComponentValue::Ident(name)) => match name.to_ascii_lowercase().as_str() {
                        "root" => PseudoClass::Root,
                        "first-child" => PseudoClass::FirstChild,
                        "last-child" => PseudoClass::LastChild,
                        "only-child" => PseudoClass::OnlyChild,
                        "empty" => PseudoClass::Empty,
                        other => return Err(SelectorError::Unsupported(format!(":{}", other))),
                    },
                    Some(ComponentValue::Function { name, arguments })
                        if name.eq_ignore_ascii_case("not") =>
                    {
                        PseudoClass::Not(parse_selector_list(arguments, namespaces)?.0)
                    }
                    Some(other) => {
                        return Err(SelectorError::Unsupported(format!(":{}", other)))
                    }
                    None => return Err(SelectorError::Invalid(":".to_string())),
                };
                compound.pseudo_classes.push(pseudo);
                i += 2;
            }
            other => return Err(SelectorError::Invalid(other.to_css())),
        }
    }
    Ok((compound, i))
}

fn parse_type_selector(
    values: &[ComponentValue],
    start: usize,
    namespaces: &NamespaceMap,
) -> Result<(TypeSelector, usize), SelectorError> {
    let local_at = |index: usize| -> Result<Option<String>, SelectorError> {
        match values.get(index) {
            Some(ComponentValue::Ident(name)) => Ok(Some(name.clone())),
            Some(ComponentValue::Delim('*')) => Ok(None),
            _ => Err(SelectorError::Invalid(serialize(&values[start..]))),
        }
    };
    let has_bar = matches!(values.get(start + 1), Some(ComponentValue::Delim('|')));

    match &values[start] {
        ComponentValue::Delim('|') => Ok((
            TypeSelector {
                namespace: NamespaceConstraint::NoNamespace,
                name: local_at(start + 1)?,
            },
            start + 2,
        )),
        ComponentValue::Delim('*') if has_bar => Ok((
            TypeSelector {
                namespace: NamespaceConstraint::Any,
                name: local_at(start + 2)?,
            },
            start + 3,
        )),
        ComponentValue::Ident(prefix) if has_bar => {
            let uri = namespaces
                .get(prefix)
                .ok_or_else(|| SelectorError::UnknownNamespacePrefix(prefix.clone()))?;
            Ok((
                TypeSelector {
                    namespace: NamespaceConstraint::Uri(uri.clone()),
                    name: local_at(start + 2)?,
                },
                start + 3,
            ))
        }
        other => Ok((
            TypeSelector {
                namespace: NamespaceConstraint::Any,
                name: other.as_ident().map(str::to_string),
            },
            start + 1,
        )),
    }
}

fn parse_attribute_selector(contents: &[ComponentValue]) -> Result<AttributeSelector, SelectorError> {
    let contents = trim(contents);
    let invalid = || SelectorError::Invalid(format!("[{}]", serialize(contents)));
    let name = contents
        .first()
        .and_then(ComponentValue::as_ident)
        .ok_or_else(invalid)?
        .to_string();
    let rest = trim(&contents[1..]);
    if rest.is_empty() {
        return Ok(AttributeSelector {
            name,
            operator: None,
            value: None,
        });
    }

    let operator = match &rest[0] {
        ComponentValue::Delim('=') => AttributeOperator::Exact,
        ComponentValue::Other(op) => match op.as_str() {
            "~=" => AttributeOperator::Includes,
            "|=" => AttributeOperator::DashMatch,
            "^=" => AttributeOperator::Prefix,
            "$=" => AttributeOperator::Suffix,
            "*=" => AttributeOperator::Substring,
            _ => return Err(invalid()),
        },
        ComponentValue::Delim('|') => {
            return Err(SelectorError::Unsupported(format!("[{}]", serialize(contents))))
        }
        _ => return Err(invalid()),
    };
    let value_part = trim(&rest[1..]);
    let value = match value_part {
        [ComponentValue::Ident(v)] | [ComponentValue::String(v)] => v.clone(),
        [_, ..] if value_part.len() > 1 => {
            return Err(SelectorError::Unsupported(format!("[{}]", serialize(contents))))
        }
        _ => return Err(invalid()),
    };
    Ok(AttributeSelector {
        name,
        operator: Some(operator),
        value: Some(value),
    })
}

// ------------------------------
// 3. Selector Matching
// ------------------------------

impl SelectorList {
    pub fn matches(&self, element: &NodeRef) -> bool {
        is_element(element)
            && self
                .0
                .iter()
                .any(|complex| matches_complex_selector(element, complex))
    }
}

/// Matches right-to-left, backtracking over descendant and sibling candidates.
pub fn matches_complex_selector(candidate: &NodeRef, complex: &ComplexSelector) -> bool {
    matches_compound(candidate, &complex.key) && matches_ancestors(candidate, &complex.ancestors)
}

fn matches_ancestors(node: &NodeRef, ancestors: &[(Combinator, CompoundSelector)]) -> bool {
    let Some(((combinator, compound), rest)) = ancestors.split_first() else {
        return true;
    };
    let step = |other: &NodeRef| matches_compound(other, compound) && matches_ancestors(other, rest);
    match combinator {
        Combinator::Child => parent_element(node).map_or(false, |parent| step(&parent)),
        Combinator::Descendant => {
            let mut ancestor = parent_element(node);
            while let Some(current) = ancestor {
                if step(&current) {
                    return true;
                }
                ancestor = parent_element(&current);
            }
            false
        }
        Combinator::AdjacentSibling => get_prev_sibling(node).map_or(false, |sibling| step(&sibling)),
        Combinator::GeneralSibling => get_all_prev_siblings(node).iter().any(|s| step(s)),
    }
}

/// Returns true if the element matches every part of the compound selector.
pub fn matches_compound(node: &NodeRef, compound: &CompoundSelector) -> bool {
    {
        let borrowed = node.borrow();
        let elem = match &*borrowed {
            Node::Element(elem) => elem,
            _ => return false,
        };
        if let Some(type_selector) = &compound.type_selector {
            if let Some(name) = &type_selector.name {
                if elem.tag != *name {
                    return false;
                }
            }
            let namespace_ok = match &type_selector.namespace {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::NoNamespace => elem.namespace().is_empty(),
                NamespaceConstraint::Uri(uri) => elem.namespace() == uri,
            };
            if !namespace_ok {
                return false;
            }
        }
        for id in &compound.ids {
            if elem.get_attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !compound.classes.is_empty() {
            let class_attr = elem.get_attribute("class").unwrap_or("");
            let has_all = compound
                .classes
                .iter()
                .all(|class| class_attr.split_whitespace().any(|c| c == class));
            if !has_all {
                return false;
            }
        }
        for attr_sel in &compound.attributes {
            let Some(actual) = elem.get_attribute(&attr_sel.name) else {
                return false;
            };
            if !matches_attribute_value(actual, attr_sel) {
                return false;
            }
        }
    }
    compound
        .pseudo_classes
        .iter()
        .all(|pseudo| matches_pseudo_class(node, pseudo))
}

fn matches_attribute_value(actual: &str, attr_sel: &AttributeSelector) -> bool {
    let (Some(operator), Some(expected)) = (&attr_sel.operator, &attr_sel.value) else {
        return true;
    };
    match operator {
        AttributeOperator::Exact => actual == expected,
        AttributeOperator::Includes => {
            !expected.is_empty() && actual.split_whitespace().any(|word| word == expected)
        }
        AttributeOperator::DashMatch => {
            actual == expected || actual.starts_with(&format!("{}-", expected))
        }
        AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(expected.as_str()),
        AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(expected.as_str()),
        AttributeOperator::Substring => !expected.is_empty() && actual.contains(expected.as_str()),
    }
}

fn matches_pseudo_class(node: &NodeRef, pseudo: &PseudoClass) -> bool {
    match pseudo {
        PseudoClass::Root => parent_node(node).map_or(false, |parent| !is_element(&parent)),
        PseudoClass::FirstChild => get_prev_sibling(node).is_none() && parent_node(node).is_some(),
        PseudoClass::LastChild => get_next_sibling(node).is_none() && parent_node(node).is_some(),
        PseudoClass::OnlyChild => {
            parent_node(node).is_some()
                && get_prev_sibling(node).is_none()
                && get_next_sibling(node).is_none()
        }
        PseudoClass::Empty => children(node).iter().all(|child| {
            matches!(
                *child.borrow(),
                Node::Comment(_) | Node::ProcessingInstruction(_)
            )
        }),
        PseudoClass::Not(selectors) => !selectors
            .iter()
            .any(|complex| matches_complex_selector(node, complex)),
    }
}

/// Element siblings of `node` and its index among them.
fn element_siblings(node: &NodeRef) -> Option<(Vec<NodeRef>, usize)> {
    let siblings = element_children(&parent_node(node)?);
    let index = siblings.iter().position(|s| Rc::ptr_eq(s, node))?;
    Some((siblings, index))
}

fn get_prev_sibling(node: &NodeRef) -> Option<NodeRef> {
    let (siblings, index) = element_siblings(node)?;
    index.checked_sub(1).map(|i| Rc::clone(&siblings[i]))
}

fn get_next_sibling(node: &NodeRef) -> Option<NodeRef> {
    let (siblings, index) = element_siblings(node)?;
    siblings.get(index + 1).cloned()
}

/// Previous element siblings, nearest first.
fn get_all_prev_siblings(node: &NodeRef) -> Vec<NodeRef> {
    match element_siblings(node) {
        Some((siblings, index)) => siblings[..index].iter().rev().cloned().collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::dom_tree::{append_child, new_document, set_attribute, Document};

    const SVG_NS: &str = "http://www.w3.org/2000/svg";

    /// <svg><g class="a b"><rect id="r1"/><circle/><rect id="r2" data-k="x-y"/></g></svg>
    fn sample() -> (Document, Vec<NodeRef>) {
        let doc = new_document(None);
        let svg = doc.create_element(SVG_NS, "svg");
        let g = doc.create_element(SVG_NS, "g");
        let r1 = doc.create_element(SVG_NS, "rect");
        let circle = doc.create_element(SVG_NS, "circle");
        let r2 = doc.create_element(SVG_NS, "rect");
        append_child(&doc.root, &svg).unwrap();
        append_child(&svg, &g).unwrap();
        for child in [&r1, &circle, &r2] {
            append_child(&g, child).unwrap();
        }
        set_attribute(&g, "class", "a b").unwrap();
        set_attribute(&r1, "id", "r1").unwrap();
        set_attribute(&r2, "id", "r2").unwrap();
        set_attribute(&r2, "data-k", "x-y").unwrap();
        (doc, vec![svg, g, r1, circle, r2])
    }

    fn matches(selector: &str, node: &NodeRef) -> bool {
        compile(selector, &NamespaceMap::new()).unwrap().matches(node)
    }

    #[test]
    fn test_compound_and_combinators() {
        let (_doc, nodes) = sample();
        let (svg, g, r1, circle, r2) = (&nodes[0], &nodes[1], &nodes[2], &nodes[3], &nodes[4]);
        assert!(matches("svg > g.a.b rect#r1", r1));
        assert!(!matches("svg > rect", r1));
        assert!(matches("circle + rect", r2));
        assert!(!matches("circle + rect", r1));
        assert!(matches("#r1 ~ rect", r2));
        assert!(matches("svg g circle", circle));
        assert!(!matches("svg g", circle));
        assert!(matches(":root", svg));
        assert!(!matches(":root", g));
    }

    #[test]
    fn test_structural_and_attribute_pseudo() {
        let (_doc, nodes) = sample();
        let (r1, circle, r2) = (&nodes[2], &nodes[3], &nodes[4]);
        assert!(matches("rect:first-child", r1));
        assert!(matches("rect:last-child", r2));
        assert!(matches("circle:not(:first-child, :last-child)", circle));
        assert!(matches("[data-k|=x]", r2));
        assert!(matches("[data-k^='x-']", r2));
        assert!(!matches("[data-k~=x]", r2));
        assert!(matches("rect:empty", r1));
        assert!(matches("circle, ellipse", circle));
    }

    #[test]
    fn test_namespace_prefixes() {
        let (_doc, nodes) = sample();
        let mut namespaces = NamespaceMap::new();
        namespaces.insert("s".to_string(), SVG_NS.to_string());
        namespaces.insert("h".to_string(), "http://www.w3.org/1999/xhtml".to_string());
        assert!(compile("s|rect", &namespaces).unwrap().matches(&nodes[2]));
        assert!(!compile("h|rect", &namespaces).unwrap().matches(&nodes[2]));
        assert!(!compile("|rect", &namespaces).unwrap().matches(&nodes[2]));
        assert!(compile("*|*", &namespaces).unwrap().matches(&nodes[2]));
        assert_eq!(
            compile("x|rect", &namespaces),
            Err(SelectorError::UnknownNamespacePrefix("x".to_string()))
        );
    }

    #[test]
    fn test_unsupported_and_invalid() {
        let namespaces = NamespaceMap::new();
        assert!(matches!(
            compile("rect:hover", &namespaces),
            Err(SelectorError::Unsupported(_))
        ));
        assert!(matches!(
            compile("rect::before", &namespaces),
            Err(SelectorError::Unsupported(_))
        ));
        assert!(matches!(
            compile("rect >", &namespaces),
            Err(SelectorError::Invalid(_))
        ));
        assert!(matches!(compile("a,,b", &namespaces), Err(SelectorError::Invalid(_))));
    }
}
