//! Parsed stylesheet data: sheets, rules, media lists.
//!
//! Rules point back at their sheet and enclosing rule through `Weak` links;
//! an import rule owns the sheet it loaded and that sheet's `owner_rule`
//! points back at it.

use crate::dom::dom_tree::{NodeRef, WeakNodeRef};
use crate::error::{Result, StyleError};
use crate::style::declaration::StyleDeclaration;
use crate::style::stylesheet_parser::StylesheetParser;
use crate::style::tokens::{serialize, split_commas, tokenize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use url::Url;

// ------------------------------
// Media lists
// ------------------------------

/// Ordered, trimmed media queries.
#[derive(Debug, Default)]
pub struct MediaList {
    media: RefCell<Vec<String>>,
}

impl MediaList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `text` at top-level commas.
    pub fn parse(text: &str) -> Self {
        let list = Self::new();
        list.set_media_text(text);
        list
    }

    pub fn media_text(&self) -> String {
        self.media.borrow().join(", ")
    }

    pub fn set_media_text(&self, text: &str) {
        let values = tokenize(text);
        *self.media.borrow_mut() = split_commas(&values)
            .into_iter()
            .map(serialize)
            .filter(|medium| !medium.is_empty())
            .collect();
    }

    pub fn len(&self) -> usize {
        self.media.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.borrow().is_empty()
    }

    pub fn item(&self, index: usize) -> Option<String> {
        self.media.borrow().get(index).cloned()
    }

    /// Appends `medium` unless it is already listed.
    pub fn append_medium(&self, medium: &str) {
        let medium = medium.trim();
        if medium.is_empty() || self.media.borrow().iter().any(|m| m == medium) {
            return;
        }
        self.media.borrow_mut().push(medium.to_string());
    }

    /// Returns whether `medium` was present.
    pub fn delete_medium(&self, medium: &str) -> bool {
        let medium = medium.trim();
        let mut media = self.media.borrow_mut();
        let before = media.len();
        media.retain(|m| m != medium);
        media.len() != before
    }
}

// ------------------------------
// Style sheets
// ------------------------------

/// Where a sheet came from. Everything a sheet knows about its context is fixed here.
#[derive(Debug, Default, Clone)]
pub struct SheetOrigin {
    pub href: Option<String>,
    /// Base for resolving `@import` URLs.
    pub base_url: Option<Url>,
    pub owner_node: Option<WeakNodeRef>,
    pub owner_rule: Weak<CssRule>,
    pub parent_style_sheet: Weak<StyleSheet>,
    pub title: Option<String>,
    pub media: String,
}

#[derive(Debug)]
pub struct StyleSheet {
    pub href: Option<String>,
    pub base_url: Option<Url>,
    pub title: Option<String>,
    pub media: MediaList,
    owner_node: Option<WeakNodeRef>,
    owner_rule: Weak<CssRule>,
    parent_style_sheet: Weak<StyleSheet>,
    disabled: Cell<bool>,
    css_rules: RefCell<Vec<Rc<CssRule>>>,
}

impl StyleSheet {
    pub fn new(origin: SheetOrigin) -> Rc<Self> {
        Rc::new(StyleSheet {
            href: origin.href,
            base_url: origin.base_url,
            title: origin.title,
            media: MediaList::parse(&origin.media),
            owner_node: origin.owner_node,
            owner_rule: origin.owner_rule,
            parent_style_sheet: origin.parent_style_sheet,
            disabled: Cell::new(false),
            css_rules: RefCell::new(Vec::new()),
        })
    }

    /// Always `text/css`.
    pub fn kind(&self) -> &'static str {
        "text/css"
    }

    pub fn owner_node(&self) -> Option<NodeRef> {
        self.owner_node.as_ref().and_then(Weak::upgrade)
    }

    pub fn owner_rule(&self) -> Option<Rc<CssRule>> {
        self.owner_rule.upgrade()
    }

    pub fn parent_style_sheet(&self) -> Option<Rc<StyleSheet>> {
        self.parent_style_sheet.upgrade()
    }

    pub fn disabled(&self) -> bool {
        self.disabled.get()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    pub fn css_rules(&self) -> Vec<Rc<CssRule>> {
        self.css_rules.borrow().clone()
    }

    pub(crate) fn set_rules(&self, rules: Vec<Rc<CssRule>>) {
        *self.css_rules.borrow_mut() = rules;
    }

    pub fn len(&self) -> usize {
        self.css_rules.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.css_rules.borrow().is_empty()
    }

    pub fn css_text(&self) -> String {
        self.css_rules
            .borrow()
            .iter()
            .map(|rule| rule.css_text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// URLs of this sheet and every sheet that imported it, innermost first.
    pub fn import_chain(&self) -> Vec<String> {
        let mut chain: Vec<String> = self.href.iter().cloned().collect();
        let mut parent = self.parent_style_sheet();
        while let Some(sheet) = parent {
            chain.extend(sheet.href.iter().cloned());
            parent = sheet.parent_style_sheet();
        }
        chain
    }

    /// Parses `text` and splices every resulting rule in at `index`.
    pub fn insert_rule(self: &Rc<Self>, parser: &StylesheetParser, text: &str, index: usize) -> Result<usize> {
        let len = self.len();
        if index > len {
            return Err(StyleError::IndexSize { index, len });
        }
        let parsed = parser.parse_text(text, Some(self), None);
        if parsed.is_empty() {
            return Err(StyleError::Syntax(text.to_string()));
        }
        // @import rules must precede every other rule
        let is_import = |rule: &Rc<CssRule>| matches!(rule.kind, RuleKind::Import { .. });
        let rules = self.css_rules();
        if parsed.iter().any(is_import) && rules[..index].iter().any(|r| !is_import(r)) {
            return Err(StyleError::MisplacedRule { index });
        }
        if parsed.iter().any(|r| !is_import(r)) && rules[index..].iter().any(is_import) {
            return Err(StyleError::MisplacedRule { index });
        }
        self.css_rules.borrow_mut().splice(index..index, parsed);
        Ok(index)
    }

    pub fn delete_rule(&self, index: usize) -> Result<()> {
        let mut rules = self.css_rules.borrow_mut();
        if index >= rules.len() {
            return Err(StyleError::IndexSize {
                index,
                len: rules.len(),
            });
        }
        rules.remove(index);
        Ok(())
    }
}

// ------------------------------
// Rules
// ------------------------------

#[derive(Debug)]
pub struct CssRule {
    pub parent_style_sheet: Weak<StyleSheet>,
    pub parent_rule: Weak<CssRule>,
    /// Serialization taken at parse time.
    pub css_text: String,
    pub kind: RuleKind,
}

#[derive(Debug)]
pub enum RuleKind {
    Style {
        selector_text: String,
        style: StyleDeclaration,
    },
    Media {
        media: MediaList,
        css_rules: RefCell<Vec<Rc<CssRule>>>,
    },
    Import {
        href: String,
        media: MediaList,
        style_sheet: Rc<StyleSheet>,
    },
    Namespace {
        namespace_uri: String,
        /// `None` for a default-namespace declaration.
        prefix: Option<String>,
    },
    FontFace {
        style: StyleDeclaration,
    },
    FontFeatureValues(FontFeatureValues),
}

/// Feature name to indices, per feature block of `@font-feature-values`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FontFeatureValues {
    pub font_family: String,
    pub annotation: BTreeMap<String, Vec<u32>>,
    pub character_variant: BTreeMap<String, Vec<u32>>,
    pub ornaments: BTreeMap<String, Vec<u32>>,
    pub styleset: BTreeMap<String, Vec<u32>>,
    pub stylistic: BTreeMap<String, Vec<u32>>,
    pub swash: BTreeMap<String, Vec<u32>>,
}

impl FontFeatureValues {
    /// The map for a feature block keyword such as `character-variant`.
    pub fn block_mut(&mut self, keyword: &str) -> Option<&mut BTreeMap<String, Vec<u32>>> {
        match keyword {
            "annotation" => Some(&mut self.annotation),
            "character-variant" => Some(&mut self.character_variant),
            "ornaments" => Some(&mut self.ornaments),
            "styleset" => Some(&mut self.styleset),
            "stylistic" => Some(&mut self.stylistic),
            "swash" => Some(&mut self.swash),
            _ => None,
        }
    }

    pub fn blocks(&self) -> [(&'static str, &BTreeMap<String, Vec<u32>>); 6] {
        [
            ("annotation", &self.annotation),
            ("character-variant", &self.character_variant),
            ("ornaments", &self.ornaments),
            ("styleset", &self.styleset),
            ("stylistic", &self.stylistic),
            ("swash", &self.swash),
        ]
    }
}

impl CssRule {
    /// CSSOM-style type name, e.g. `"style"` or `"font-feature-values"`.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            RuleKind::Style { .. } => "style",
            RuleKind::Media { .. } => "media",
            RuleKind::Import { .. } => "import",
            RuleKind::Namespace { .. } => "namespace",
            RuleKind::FontFace { .. } => "font-face",
            RuleKind::FontFeatureValues(_) => "font-feature-values",
        }
    }

    pub fn parent_style_sheet(&self) -> Option<Rc<StyleSheet>> {
        self.parent_style_sheet.upgrade()
    }

    pub fn parent_rule(&self) -> Option<Rc<CssRule>> {
        self.parent_rule.upgrade()
    }

    /// Child rules of a grouping rule; empty for everything else.
    pub fn css_rules(&self) -> Vec<Rc<CssRule>> {
        match &self.kind {
            RuleKind::Media { css_rules, .. } => css_rules.borrow().clone(),
            _ => Vec::new(),
        }
    }

    pub fn insert_rule(self: &Rc<Self>, parser: &StylesheetParser, text: &str, index: usize) -> Result<usize> {
        let RuleKind::Media { css_rules, .. } = &self.kind else {
            return Err(StyleError::NotGroupingRule);
        };
        let len = css_rules.borrow().len();
        if index > len {
            return Err(StyleError::IndexSize { index, len });
        }
        let sheet = self.parent_style_sheet();
        let parsed = parser.parse_text(text, sheet.as_ref(), Some(self));
        if parsed.is_empty() {
            return Err(StyleError::Syntax(text.to_string()));
        }
        css_rules.borrow_mut().splice(index..index, parsed);
        Ok(index)
    }

    pub fn delete_rule(&self, index: usize) -> Result<()> {
        let RuleKind::Media { css_rules, .. } = &self.kind else {
            return Err(StyleError::NotGroupingRule);
        };
        let mut rules = css_rules.borrow_mut();
        if index >= rules.len() {
            return Err(StyleError::IndexSize {
                index,
                len: rules.len(),
            });
        }
        rules.remove(index);
        Ok(())
    }
}
