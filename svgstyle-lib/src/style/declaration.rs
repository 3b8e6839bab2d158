use crate::dom::dom_tree::{attribute, is_element, remove_attribute, set_attribute, NodeRef, WeakNodeRef};
use crate::error::{Result, StyleError};
use crate::style::properties::PropertyLookup;
use crate::style::shorthand::{Shorthand, ShorthandEngine};
use crate::style::tokens::{parse_declaration_list, serialize, tokenize, ComponentValue};
use log::debug;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One `name: value [!important]` entry. Names are lower-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(name: String, value: String, important: bool) -> Self {
        Self {
            name,
            value,
            important,
        }
    }

    pub fn priority(&self) -> &'static str {
        if self.important {
            "important"
        } else {
            ""
        }
    }

    pub fn css_text(&self) -> String {
        if self.important {
            format!("{}: {} !important", self.name, self.value)
        } else {
            format!("{}: {}", self.name, self.value)
        }
    }
}

/// Replaces the entry with the same name in place, or appends. Returns
/// whether the list changed.
pub(crate) fn upsert(declarations: &mut Vec<Declaration>, declaration: Declaration) -> bool {
    match declarations.iter_mut().find(|d| d.name == declaration.name) {
        Some(existing) if *existing == declaration => false,
        Some(existing) => {
            *existing = declaration;
            true
        }
        None => {
            declarations.push(declaration);
            true
        }
    }
}

pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(Declaration::css_text)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses a declaration block. Shorthands are stored as their longhands;
/// invalid declarations are dropped one at a time. A later declaration of
/// a property replaces both value and priority of an earlier one.
pub fn parse_declarations(values: &[ComponentValue], engine: &ShorthandEngine) -> Vec<Declaration> {
    let mut out: Vec<Declaration> = Vec::new();
    for raw in parse_declaration_list(values) {
        if let Some(shorthand) = Shorthand::from_name(&raw.name) {
            engine.set_value(&mut out, shorthand, &raw.value, raw.important);
            continue;
        }
        if !engine.lookup().is_valid(&raw.name, &raw.value) {
            debug!("dropping invalid declaration {}: {}", raw.name, serialize(&raw.value));
            continue;
        }
        upsert(
            &mut out,
            Declaration::new(raw.name, serialize(&raw.value), raw.important),
        );
    }
    out
}

// ------------------------------
// Storage backends
// ------------------------------

pub trait DeclarationBackend: fmt::Debug {
    fn load(&self) -> Vec<Declaration>;
    fn store(&self, declarations: Vec<Declaration>) -> Result<()>;
}

/// Owns its declarations; used for rule bodies.
#[derive(Debug, Default)]
pub struct DetachedBackend {
    declarations: RefCell<Vec<Declaration>>,
}

impl DetachedBackend {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        Self {
            declarations: RefCell::new(declarations),
        }
    }
}

impl DeclarationBackend for DetachedBackend {
    fn load(&self) -> Vec<Declaration> {
        self.declarations.borrow().clone()
    }

    fn store(&self, declarations: Vec<Declaration>) -> Result<()> {
        *self.declarations.borrow_mut() = declarations;
        Ok(())
    }
}

/// Proxies an element's `style` attribute, re-parsing it on every read.
#[derive(Debug)]
pub struct AttributeBackend {
    owner: WeakNodeRef,
    engine: ShorthandEngine,
}

impl DeclarationBackend for AttributeBackend {
    fn load(&self) -> Vec<Declaration> {
        self.owner
            .upgrade()
            .and_then(|owner| attribute(&owner, "style"))
            .map(|text| parse_declarations(&tokenize(&text), &self.engine))
            .unwrap_or_default()
    }

    fn store(&self, declarations: Vec<Declaration>) -> Result<()> {
        let owner = self.owner.upgrade().ok_or(StyleError::NotAnElement)?;
        if declarations.is_empty() {
            remove_attribute(&owner, "style")?;
        } else {
            set_attribute(&owner, "style", &serialize_declarations(&declarations))?;
        }
        Ok(())
    }
}

// ------------------------------
// Declaration block
// ------------------------------

/// A declaration block over one of the storage backends, chosen at construction.
#[derive(Debug)]
pub struct StyleDeclaration {
    backend: Box<dyn DeclarationBackend>,
    engine: ShorthandEngine,
}

impl StyleDeclaration {
    pub fn new(backend: Box<dyn DeclarationBackend>, lookup: &'static dyn PropertyLookup) -> Self {
        Self {
            backend,
            engine: ShorthandEngine::new(lookup),
        }
    }

    pub fn detached(lookup: &'static dyn PropertyLookup) -> Self {
        Self::new(Box::new(DetachedBackend::default()), lookup)
    }

    pub fn from_declarations(declarations: Vec<Declaration>, lookup: &'static dyn PropertyLookup) -> Self {
        Self::new(Box::new(DetachedBackend::new(declarations)), lookup)
    }

    pub fn parse(text: &str, lookup: &'static dyn PropertyLookup) -> Self {
        let engine = ShorthandEngine::new(lookup);
        Self::from_declarations(parse_declarations(&tokenize(text), &engine), lookup)
    }

    /// Binds to `element`'s `style` attribute.
    pub fn for_element(element: &NodeRef, lookup: &'static dyn PropertyLookup) -> Result<Self> {
        if !is_element(element) {
            return Err(StyleError::NotAnElement);
        }
        let engine = ShorthandEngine::new(lookup);
        Ok(Self {
            backend: Box::new(AttributeBackend {
                owner: Rc::downgrade(element),
                engine,
            }),
            engine,
        })
    }

    pub fn length(&self) -> usize {
        self.backend.load().len()
    }

    pub fn item(&self, index: usize) -> Option<String> {
        self.backend.load().into_iter().nth(index).map(|d| d.name)
    }

    /// Declarations in order.
    pub fn items(&self) -> Vec<Declaration> {
        self.backend.load()
    }

    pub fn css_text(&self) -> String {
        serialize_declarations(&self.backend.load())
    }

    pub fn set_css_text(&self, text: &str) -> Result<()> {
        self.backend
            .store(parse_declarations(&tokenize(text), &self.engine))
    }

    pub fn get_property_value(&self, name: &str) -> String {
        let name = name.trim().to_ascii_lowercase();
        let declarations = self.backend.load();
        match Shorthand::from_name(&name) {
            Some(shorthand) => self.engine.get_value(&declarations, shorthand),
            None => declarations
                .into_iter()
                .find(|d| d.name == name)
                .map(|d| d.value)
                .unwrap_or_default(),
        }
    }

    pub fn get_property_priority(&self, name: &str) -> String {
        let name = name.trim().to_ascii_lowercase();
        let declarations = self.backend.load();
        match Shorthand::from_name(&name) {
            Some(shorthand) => self.engine.get_priority(&declarations, shorthand),
            None => declarations
                .iter()
                .find(|d| d.name == name)
                .map(|d| d.priority().to_string())
                .unwrap_or_default(),
        }
    }

    /// Sets a property. An empty value removes it; a value that does not
    /// parse for the property is ignored.
    pub fn set_property(&self, name: &str, value: &str, priority: &str) -> Result<()> {
        let important = match priority.trim().to_ascii_lowercase().as_str() {
            "" => false,
            "important" => true,
            _ => return Err(StyleError::InvalidPriority(priority.to_string())),
        };
        let name = normalize_name(name)?;
        if value.trim().is_empty() {
            self.remove_property(&name)?;
            return Ok(());
        }

        let tokens = tokenize(value);
        let mut declarations = self.backend.load();
        let changed = match Shorthand::from_name(&name) {
            Some(shorthand) => self
                .engine
                .set_value(&mut declarations, shorthand, &tokens, important),
            None if self.engine.lookup().is_valid(&name, &tokens) => upsert(
                &mut declarations,
                Declaration::new(name, serialize(&tokens), important),
            ),
            None => {
                debug!("ignoring invalid value {:?} for {}", value, name);
                false
            }
        };
        if changed {
            self.backend.store(declarations)?;
        }
        Ok(())
    }

    /// Removes a property (all longhands, for a shorthand) and returns its old value.
    pub fn remove_property(&self, name: &str) -> Result<String> {
        let name = normalize_name(name)?;
        let old_value = self.get_property_value(&name);
        let mut declarations = self.backend.load();
        let before = declarations.len();
        match Shorthand::from_name(&name) {
            Some(shorthand) => {
                let longhands = shorthand.flattened_longhands();
                declarations.retain(|d| !longhands.iter().any(|l| *l == d.name));
            }
            None => declarations.retain(|d| d.name != name),
        }
        if declarations.len() != before {
            self.backend.store(declarations)?;
        }
        Ok(old_value)
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim().to_ascii_lowercase();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StyleError::InvalidPropertyName(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::dom_tree::{append_child, new_document};
    use crate::style::properties::PropertyRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detached_block() {
        let style = StyleDeclaration::parse(
            "fill: red; stroke: blue !important; fill: green; opacity: banana",
            PropertyRegistry::standard(),
        );
        assert_eq!(style.css_text(), "fill: green; stroke: blue !important");
        assert_eq!(style.length(), 2);
        assert_eq!(style.item(1).as_deref(), Some("stroke"));
        assert_eq!(style.get_property_priority("STROKE"), "important");
        assert_eq!(style.get_property_value("opacity"), "");
    }

    #[test]
    fn test_later_declaration_replaces_important() {
        let style = StyleDeclaration::parse(
            "fill: red !important; fill: blue",
            PropertyRegistry::standard(),
        );
        assert_eq!(style.get_property_value("fill"), "blue");
        assert_eq!(style.get_property_priority("fill"), "");
        assert_eq!(style.css_text(), "fill: blue");
    }

    #[test]
    fn test_shorthand_after_important_longhand() {
        let style = StyleDeclaration::parse(
            "font-style: italic !important; font: 12px serif",
            PropertyRegistry::standard(),
        );
        assert_eq!(style.get_property_value("font-size"), "12px");
        assert_eq!(style.get_property_value("font-family"), "serif");
        assert_eq!(style.get_property_value("font-style"), "normal");
        assert_eq!(style.get_property_priority("font-style"), "");
        assert_eq!(style.get_property_value("font"), "12px serif");
    }

    #[test]
    fn test_shorthand_through_block() {
        let style = StyleDeclaration::detached(PropertyRegistry::standard());
        style.set_property("overflow", "hidden", "important").unwrap();
        assert_eq!(style.get_property_value("overflow-y"), "hidden");
        assert_eq!(style.get_property_value("overflow"), "hidden");
        assert_eq!(style.get_property_priority("overflow"), "important");
        assert_eq!(style.remove_property("overflow").unwrap(), "hidden");
        assert_eq!(style.length(), 0);
    }

    #[test]
    fn test_contract_errors() {
        let style = StyleDeclaration::detached(PropertyRegistry::standard());
        assert!(matches!(
            style.set_property("fill", "red", "urgent"),
            Err(StyleError::InvalidPriority(_))
        ));
        assert!(matches!(
            style.set_property("fi ll", "red", ""),
            Err(StyleError::InvalidPropertyName(_))
        ));
        style.set_property("stroke-width", "thick", "").unwrap();
        assert_eq!(style.length(), 0);
    }

    #[test]
    fn test_attribute_bound_block() {
        let doc = new_document(None);
        let rect = doc.create_element("http://www.w3.org/2000/svg", "rect");
        append_child(&doc.root, &rect).unwrap();
        let style = StyleDeclaration::for_element(&rect, PropertyRegistry::standard()).unwrap();

        style.set_property("fill", "white", "").unwrap();
        style.set_property("stroke", "blue", "").unwrap();
        style.set_property("stroke-width", "5", "").unwrap();
        assert_eq!(
            attribute(&rect, "style").as_deref(),
            Some("fill: white; stroke: blue; stroke-width: 5")
        );

        style.remove_property("stroke-width").unwrap();
        assert_eq!(style.css_text(), "fill: white; stroke: blue");
        assert_eq!(attribute(&rect, "style").as_deref(), Some("fill: white; stroke: blue"));

        style.remove_property("fill").unwrap();
        style.remove_property("stroke").unwrap();
        assert_eq!(attribute(&rect, "style"), None);
    }

    #[test]
    fn test_attribute_edits_are_seen() {
        let doc = new_document(None);
        let rect = doc.create_element("http://www.w3.org/2000/svg", "rect");
        let style = StyleDeclaration::for_element(&rect, PropertyRegistry::standard()).unwrap();
        set_attribute(&rect, "style", "fill:red").unwrap();
        assert_eq!(style.get_property_value("fill"), "red");
        assert!(StyleDeclaration::for_element(&doc.root, PropertyRegistry::standard()).is_err());
    }
}
