//! Style resolution: cascade, inheritance and computed values for one element.

use crate::dom::dom_tree::{is_element, parent_element, Node, NodeRef};
use crate::error::{Result, StyleError};
use crate::loader::ResourceLoader;
use crate::style::cascade::CascadeCollector;
use crate::style::declaration::parse_declarations;
use crate::style::matcher::{match_rules, PropertyMap};
use crate::style::media::Environment;
use crate::style::properties::{
    inherited_properties, non_inherited_properties, PropertyLookup, PropertyRegistry, CSS_WIDE_KEYWORDS,
};
use crate::style::rule_model::CssRule;
use crate::style::shorthand::{Shorthand, ShorthandEngine};
use crate::style::stylesheet_parser::StylesheetParser;
use crate::style::tokens::{tokenize, trim, ComponentValue};
use crate::style::values::{parse_font_family, parse_font_feature_settings, Length, LengthContext, StyleValue};
use log::debug;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

pub type ComputedStyle = BTreeMap<String, StyleValue>;

/// Extra computed entries for one element type, e.g. resolved `x`/`y`/`width`/`height`.
pub type GeometryHook = Box<dyn Fn(&NodeRef, &ComputedStyle, &Environment) -> ComputedStyle>;

/// `font-size` keywords as multiples of the default size.
const FONT_SIZE_SCALE: [(&str, f64); 8] = [
    ("xx-small", 3.0 / 5.0),
    ("x-small", 3.0 / 4.0),
    ("small", 8.0 / 9.0),
    ("medium", 1.0),
    ("large", 6.0 / 5.0),
    ("x-large", 3.0 / 2.0),
    ("xx-large", 2.0),
    ("xxx-large", 3.0),
];
const FONT_SIZE_STEP: f64 = 1.2;

const VERTICAL_WRITING_MODES: &[&str] = &["vertical-rl", "vertical-lr", "tb", "tb-rl"];

// ------------------------------
// Context
// ------------------------------

/// Everything resolution depends on besides the document itself.
pub struct StyleContext {
    env: Environment,
    parser: StylesheetParser,
    lookup: &'static dyn PropertyLookup,
    geometry_hooks: HashMap<String, GeometryHook>,
}

impl fmt::Debug for StyleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleContext")
            .field("env", &self.env)
            .field("parser", &self.parser)
            .field("geometry_hooks", &self.geometry_hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StyleContext {
    pub fn new(env: Environment) -> Self {
        Self::with_property_lookup(env, PropertyRegistry::standard())
    }

    pub fn with_property_lookup(env: Environment, lookup: &'static dyn PropertyLookup) -> Self {
        Self {
            env,
            parser: StylesheetParser::new(lookup),
            lookup,
            geometry_hooks: HashMap::new(),
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn ResourceLoader>) -> Self {
        self.parser = StylesheetParser::new(self.lookup).with_loader(loader);
        self
    }

    /// Registers a hook for elements with local name `tag`. Its entries are merged
    /// over the computed style.
    pub fn with_geometry_hook<F>(mut self, tag: &str, hook: F) -> Self
    where
        F: Fn(&NodeRef, &ComputedStyle, &Environment) -> ComputedStyle + 'static,
    {
        self.geometry_hooks.insert(tag.to_string(), Box::new(hook));
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn parser(&self) -> &StylesheetParser {
        &self.parser
    }

    pub fn collector(&self) -> CascadeCollector<'_> {
        CascadeCollector::new(&self.parser, &self.env)
    }

    pub fn collect_rules(&self, element: &NodeRef) -> Vec<Rc<CssRule>> {
        self.collector().collect_rules(element)
    }

    /// Cascaded and inherited values, before any numeric resolution.
    pub fn inherited_style(&self, element: &NodeRef) -> Result<ComputedStyle> {
        Resolution::new(self, element)?.inherited(element)
    }

    pub fn computed_style(&self, element: &NodeRef) -> Result<ComputedStyle> {
        Resolution::new(self, element)?.computed(element)
    }
}

// ------------------------------
// Resolution
// ------------------------------

/// One resolution pass. Rules are collected once per document and each
/// element's merged declarations are computed at most once.
struct Resolution<'a> {
    ctx: &'a StyleContext,
    engine: ShorthandEngine,
    rules: Vec<Rc<CssRule>>,
    levels: RefCell<HashMap<*const RefCell<Node>, Rc<PropertyMap>>>,
}

#[derive(Debug, Clone)]
struct FontMetrics {
    font_size: f64,
    font_weight: f64,
    line_height: StyleValue,
}

impl<'a> Resolution<'a> {
    fn new(ctx: &'a StyleContext, element: &NodeRef) -> Result<Self> {
        if !is_element(element) {
            return Err(StyleError::NotAnElement);
        }
        Ok(Self {
            ctx,
            engine: ShorthandEngine::new(ctx.lookup),
            rules: ctx.collect_rules(element),
            levels: RefCell::new(HashMap::new()),
        })
    }

    /// Declarations applying to `node` itself, lowest precedence first:
    /// presentation attributes, cascaded normal values, inline normal
    /// declarations, cascaded important values, inline important declarations.
    fn level(&self, node: &NodeRef) -> Rc<PropertyMap> {
        let key = Rc::as_ptr(node);
        if let Some(hit) = self.levels.borrow().get(&key) {
            return Rc::clone(hit);
        }
        let merged = Rc::new(self.merge_level(node));
        self.levels.borrow_mut().insert(key, Rc::clone(&merged));
        merged
    }

    fn merge_level(&self, node: &NodeRef) -> PropertyMap {
        let attributes = match &*node.borrow() {
            Node::Element(elem) => elem.attributes.clone(),
            _ => Vec::new(),
        };
        let mut merged = PropertyMap::new();
        let mut inline = Vec::new();
        for (name, value) in &attributes {
            if name == "style" {
                inline = parse_declarations(&tokenize(value), &self.engine);
            } else if self.ctx.lookup.is_known(name) {
                self.insert_expanded(&mut merged, name, value.trim());
            }
        }

        let matched = match_rules(node, &self.rules);
        merged.extend(matched.normal);
        for declaration in inline.iter().filter(|d| !d.important) {
            merged.insert(declaration.name.clone(), declaration.value.clone());
        }
        merged.extend(matched.important);
        for declaration in inline.into_iter().filter(|d| d.important) {
            merged.insert(declaration.name, declaration.value);
        }
        merged
    }

    fn insert_expanded(&self, map: &mut PropertyMap, name: &str, value: &str) {
        let Some(shorthand) = Shorthand::from_name(name) else {
            map.insert(name.to_string(), value.to_string());
            return;
        };
        match self.engine.expand(shorthand, &tokenize(value)) {
            Some(longhands) => map.extend(longhands),
            None => debug!("ignoring invalid {} attribute {:?}", name, value),
        }
    }

    fn initial_value(&self, name: &str) -> String {
        let env = &self.ctx.env;
        match name {
            "font-family" => env.default_font_family.clone(),
            "color" => env.default_color.clone(),
            _ => self.ctx.lookup.initial_value(name).unwrap_or_default().to_string(),
        }
    }

    fn typed(&self, name: &str, value: String) -> StyleValue {
        match name {
            "font-family" => StyleValue::List(parse_font_family(&value)),
            _ => StyleValue::Keyword(value),
        }
    }

    fn inherited(&self, element: &NodeRef) -> Result<ComputedStyle> {
        let mut style = ComputedStyle::new();

        let own = self.level(element);
        for name in non_inherited_properties() {
            let value = match own.get(*name) {
                Some(value) if !is_css_wide(value) => value.clone(),
                _ => self.initial_value(name),
            };
            style.insert(name.to_string(), StyleValue::Keyword(value));
        }

        let mut unresolved: Vec<&'static str> = inherited_properties().to_vec();
        let mut display_none = false;
        let mut current = Some(Rc::clone(element));
        while let Some(node) = current {
            let level = self.level(&node);
            if level.get("display").map_or(false, |v| v.trim().eq_ignore_ascii_case("none")) {
                display_none = true;
            }
            if level.contains_key("marker") && unresolved.iter().any(|name| name.starts_with("marker-")) {
                return Err(StyleError::UnsupportedShorthand("marker".to_string()));
            }
            unresolved.retain(|name| {
                let Some(value) = level.get(*name) else {
                    return true;
                };
                let value = if value.eq_ignore_ascii_case("inherit") || value.eq_ignore_ascii_case("unset") {
                    return true;
                } else if value.eq_ignore_ascii_case("initial") {
                    self.initial_value(name)
                } else {
                    value.clone()
                };
                style.insert(name.to_string(), self.typed(name, value));
                false
            });
            current = parent_element(&node);
        }

        for name in unresolved {
            style.insert(name.to_string(), self.typed(name, self.initial_value(name)));
        }
        if display_none {
            style.insert("display".to_string(), StyleValue::keyword("none"));
        }
        Ok(style)
    }

    fn computed(&self, element: &NodeRef) -> Result<ComputedStyle> {
        let mut style = self.inherited(element)?;
        let env = &self.ctx.env;
        let metrics = self.font_metrics(element);
        let keyword = |style: &ComputedStyle, name: &str| {
            style
                .get(name)
                .and_then(StyleValue::as_keyword)
                .unwrap_or_default()
                .to_string()
        };

        style.insert("font-size".to_string(), StyleValue::Length(metrics.font_size));
        style.insert("font-weight".to_string(), StyleValue::Number(metrics.font_weight));
        style.insert("line-height".to_string(), metrics.line_height.clone());

        let adjust = keyword(&style, "font-size-adjust");
        if let Some(n) = single_number(&adjust) {
            style.insert("font-size-adjust".to_string(), StyleValue::Number(n));
        }

        let settings = keyword(&style, "font-feature-settings");
        let features = parse_font_feature_settings(&settings).unwrap_or_else(|| {
            debug!("ignoring invalid font-feature-settings {:?}", settings);
            Vec::new()
        });
        style.insert("font-feature-settings".to_string(), StyleValue::Features(features));

        let synthesis = normalize_font_synthesis(
            &keyword(&style, "font-synthesis-weight"),
            &keyword(&style, "font-synthesis-style"),
        );
        style.insert("font-synthesis".to_string(), StyleValue::keyword(synthesis));

        let base = LengthContext {
            font_size: metrics.font_size,
            root_font_size: self.root_font_size(element),
            viewport_width: f64::from(env.viewport_width),
            viewport_height: f64::from(env.viewport_height),
            percent_base: None,
        };

        let writing_mode = keyword(&style, "writing-mode");
        let inline_axis = if VERTICAL_WRITING_MODES.contains(&writing_mode.as_str()) {
            base.viewport_height
        } else {
            base.viewport_width
        };
        let inline_size = keyword(&style, "inline-size");
        if let Some(px) = resolve_length(&inline_size, &base, inline_axis) {
            style.insert("inline-size".to_string(), StyleValue::Length(px));
        }

        let diagonal = f64::from(env.diagonal());
        let stroke_width = keyword(&style, "stroke-width");
        if let Some(px) = resolve_length(&stroke_width, &base, diagonal) {
            style.insert("stroke-width".to_string(), StyleValue::Length(px));
        }
        let tab_size = keyword(&style, "tab-size");
        match single_number(&tab_size) {
            Some(n) => {
                style.insert("tab-size".to_string(), StyleValue::Number(n));
            }
            None => {
                if let Some(px) = resolve_length(&tab_size, &base, diagonal) {
                    style.insert("tab-size".to_string(), StyleValue::Length(px));
                }
            }
        }

        let local_name = match &*element.borrow() {
            Node::Element(elem) => elem.qual_name.local.to_string(),
            _ => String::new(),
        };
        if let Some(hook) = self.ctx.geometry_hooks.get(&local_name) {
            let extra = hook(element, &style, env);
            style.extend(extra);
        }
        Ok(style)
    }

    // ------------------------------
    // Font metrics, resolved from the root down
    // ------------------------------

    fn ancestry(element: &NodeRef) -> Vec<NodeRef> {
        let mut chain = vec![Rc::clone(element)];
        while let Some(parent) = chain.last().and_then(parent_element) {
            chain.push(parent);
        }
        chain.reverse();
        chain
    }

    fn root_font_size(&self, element: &NodeRef) -> f64 {
        match Self::ancestry(element).first() {
            Some(root) => self.font_metrics(root).font_size,
            None => f64::from(self.ctx.env.default_font_size),
        }
    }

    fn font_metrics(&self, element: &NodeRef) -> FontMetrics {
        let default_size = f64::from(self.ctx.env.default_font_size);
        let mut metrics = FontMetrics {
            font_size: default_size,
            font_weight: 400.0,
            line_height: StyleValue::keyword("normal"),
        };
        let mut root_font_size = default_size;
        for (depth, node) in Self::ancestry(element).iter().enumerate() {
            let level = self.level(node);
            let parent = metrics.clone();
            if let Some(value) = level.get("font-size") {
                metrics.font_size = self.resolve_font_size(value, parent.font_size, root_font_size);
            }
            if depth == 0 {
                root_font_size = metrics.font_size;
            }
            if let Some(value) = level.get("font-weight") {
                metrics.font_weight = resolve_font_weight(value, parent.font_weight);
            }
            if let Some(value) = level.get("line-height") {
                let ctx = LengthContext {
                    font_size: metrics.font_size,
                    root_font_size,
                    viewport_width: f64::from(self.ctx.env.viewport_width),
                    viewport_height: f64::from(self.ctx.env.viewport_height),
                    percent_base: Some(metrics.font_size),
                };
                metrics.line_height = resolve_line_height(value, &ctx, parent.line_height);
            }
        }
        metrics
    }

    fn resolve_font_size(&self, value: &str, parent: f64, root: f64) -> f64 {
        let default_size = f64::from(self.ctx.env.default_font_size);
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "inherit" | "unset" => return parent,
            "initial" => return default_size,
            "larger" => return parent * FONT_SIZE_STEP,
            "smaller" => return parent / FONT_SIZE_STEP,
            _ => {}
        }
        if let Some((_, scale)) = FONT_SIZE_SCALE.iter().find(|(name, _)| *name == value) {
            return default_size * scale;
        }
        let ctx = LengthContext {
            font_size: parent,
            root_font_size: root,
            viewport_width: f64::from(self.ctx.env.viewport_width),
            viewport_height: f64::from(self.ctx.env.viewport_height),
            percent_base: Some(parent),
        };
        match Length::parse(&value).and_then(|length| length.to_px(&ctx)) {
            Some(px) => px,
            None => {
                debug!("cannot resolve font-size {:?}; inheriting", value);
                parent
            }
        }
    }
}

// ------------------------------
// Value helpers
// ------------------------------

fn is_css_wide(value: &str) -> bool {
    CSS_WIDE_KEYWORDS.iter().any(|k| value.eq_ignore_ascii_case(k))
}

fn single_number(text: &str) -> Option<f64> {
    let values = tokenize(text);
    match trim(&values) {
        [ComponentValue::Number { value, .. }] => Some(f64::from(*value)),
        _ => None,
    }
}

/// Lengths and percentages to px; keywords and unresolvable values give `None`.
fn resolve_length(text: &str, base: &LengthContext, percent_base: f64) -> Option<f64> {
    let ctx = LengthContext {
        percent_base: Some(percent_base),
        ..*base
    };
    Length::parse(text)?.to_px(&ctx)
}

/// `bolder`/`lighter` follow the relative-weight table of CSS Fonts 4.
fn resolve_font_weight(value: &str, parent: f64) -> f64 {
    match value.trim().to_ascii_lowercase().as_str() {
        "inherit" | "unset" => parent,
        "initial" | "normal" => 400.0,
        "bold" => 700.0,
        "bolder" => match parent {
            p if p < 350.0 => 400.0,
            p if p < 550.0 => 700.0,
            p if p < 900.0 => 900.0,
            p => p,
        },
        "lighter" => match parent {
            p if p < 100.0 => p,
            p if p < 550.0 => 100.0,
            p if p < 750.0 => 400.0,
            _ => 700.0,
        },
        other => single_number(other)
            .filter(|n| (1.0..=1000.0).contains(n))
            .unwrap_or(parent),
    }
}

fn resolve_line_height(value: &str, ctx: &LengthContext, parent: StyleValue) -> StyleValue {
    let value = value.trim();
    if value.eq_ignore_ascii_case("inherit") || value.eq_ignore_ascii_case("unset") {
        return parent;
    }
    if value.eq_ignore_ascii_case("initial") || value.eq_ignore_ascii_case("normal") {
        return StyleValue::keyword("normal");
    }
    if let Some(n) = single_number(value) {
        return StyleValue::Number(n);
    }
    match Length::parse(value).and_then(|length| length.to_px(ctx)) {
        Some(px) => StyleValue::Length(px),
        None => parent,
    }
}

/// `none` only stands alone; otherwise the enabled kinds in canonical order.
fn normalize_font_synthesis(weight: &str, style: &str) -> String {
    let mut kinds = Vec::new();
    if weight.eq_ignore_ascii_case("auto") {
        kinds.push("weight");
    }
    if style.eq_ignore_ascii_case("auto") {
        kinds.push("style");
    }
    if kinds.is_empty() {
        "none".to_string()
    } else {
        kinds.join(" ")
    }
}
