//! Turns stylesheet text or fetched stylesheet resources into the rule model.

use crate::error::{Result, StyleError};
use crate::loader::{decode_stylesheet, DefaultLoader, ResourceLoader};
use crate::style::declaration::{parse_declarations, serialize_declarations, StyleDeclaration};
use crate::style::properties::PropertyLookup;
use crate::style::rule_model::{CssRule, FontFeatureValues, MediaList, RuleKind, SheetOrigin, StyleSheet};
use crate::style::shorthand::ShorthandEngine;
use crate::style::tokens::{parse_rule_list, serialize, tokenize, trim, ComponentValue, RawRule};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use url::Url;

type AtRuleHandler =
    fn(&StylesheetParser, &ParseContext, &[ComponentValue], Option<&[ComponentValue]>) -> Result<Option<Rc<CssRule>>>;

/// Recognised at-rules. Anything else is dropped.
const AT_RULES: [(&str, AtRuleHandler); 5] = [
    ("font-face", StylesheetParser::parse_font_face),
    ("font-feature-values", StylesheetParser::parse_font_feature_values),
    ("import", StylesheetParser::parse_import),
    ("media", StylesheetParser::parse_media),
    ("namespace", StylesheetParser::parse_namespace),
];

/// Where newly built rules attach.
struct ParseContext {
    sheet: Weak<StyleSheet>,
    parent_rule: Weak<CssRule>,
    base_url: Option<Url>,
    /// URLs of the sheets currently being loaded, used to break `@import` cycles.
    import_chain: Vec<String>,
}

pub struct StylesheetParser {
    loader: Box<dyn ResourceLoader>,
    engine: ShorthandEngine,
}

impl fmt::Debug for StylesheetParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StylesheetParser")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl StylesheetParser {
    pub fn new(lookup: &'static dyn PropertyLookup) -> Self {
        Self {
            loader: Box::new(DefaultLoader),
            engine: ShorthandEngine::new(lookup),
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn ResourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn lookup(&self) -> &'static dyn PropertyLookup {
        self.engine.lookup()
    }

    /// Parses a rule-list fragment. The rules point at `parent_sheet` and
    /// `parent_rule`; relative imports resolve against the sheet's base URL.
    ///
    /// An `@import` whose URL cannot be resolved discards the whole fragment.
    pub fn parse_text(
        &self,
        text: &str,
        parent_sheet: Option<&Rc<StyleSheet>>,
        parent_rule: Option<&Rc<CssRule>>,
    ) -> Vec<Rc<CssRule>> {
        let ctx = ParseContext {
            sheet: parent_sheet.map(Rc::downgrade).unwrap_or_default(),
            parent_rule: parent_rule.map(Rc::downgrade).unwrap_or_default(),
            base_url: parent_sheet.and_then(|sheet| sheet.base_url.clone()),
            import_chain: parent_sheet.map(|sheet| sheet.import_chain()).unwrap_or_default(),
        };
        match self.parse_rules(&ctx, &tokenize(text), parent_rule.is_none()) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("discarding stylesheet: {}", e);
                Vec::new()
            }
        }
    }

    /// Builds a sheet from inline text, e.g. the contents of a `<style>` element.
    pub fn parse_sheet(&self, text: &str, origin: SheetOrigin) -> Rc<StyleSheet> {
        let sheet = StyleSheet::new(origin);
        let rules = self.parse_text(text, Some(&sheet), None);
        sheet.set_rules(rules);
        sheet
    }

    /// Fetches, decodes and parses the sheet at `url`. Fetch and decode
    /// failures are logged and yield a sheet with no rules.
    pub fn parse_resource(&self, url: &Url, origin: SheetOrigin, encoding: Option<&str>) -> Rc<StyleSheet> {
        let chain = origin
            .parent_style_sheet
            .upgrade()
            .map(|parent| parent.import_chain())
            .unwrap_or_default();
        self.load_resource(url, origin, encoding, chain)
    }

    fn load_resource(
        &self,
        url: &Url,
        mut origin: SheetOrigin,
        encoding: Option<&str>,
        mut chain: Vec<String>,
    ) -> Rc<StyleSheet> {
        origin.href = Some(url.to_string());
        origin.base_url = Some(url.clone());
        let sheet = StyleSheet::new(origin);

        let text = match self
            .loader
            .fetch(url)
            .and_then(|res| decode_stylesheet(url.as_str(), &res.bytes, res.content_type.as_deref(), encoding))
        {
            Ok(text) => text,
            Err(e) => {
                warn!("could not load stylesheet: {}", e);
                return sheet;
            }
        };
        debug!("loaded stylesheet {} ({} bytes)", url, text.len());

        chain.push(url.to_string());
        let ctx = ParseContext {
            sheet: Rc::downgrade(&sheet),
            parent_rule: Weak::new(),
            base_url: Some(url.clone()),
            import_chain: chain,
        };
        match self.parse_rules(&ctx, &tokenize(&text), true) {
            Ok(rules) => sheet.set_rules(rules),
            Err(e) => warn!("discarding stylesheet {}: {}", url, e),
        }
        sheet
    }

    // ------------------------------
    // Rule lists
    // ------------------------------

    fn parse_rules(&self, ctx: &ParseContext, values: &[ComponentValue], top_level: bool) -> Result<Vec<Rc<CssRule>>> {
        let mut rules = Vec::new();
        // @import is only honoured before any other rule.
        let mut imports_allowed = top_level;
        for raw in parse_rule_list(values) {
            match raw {
                RawRule::Qualified { prelude, block } => {
                    imports_allowed = false;
                    rules.push(self.parse_style_rule(ctx, &prelude, &block));
                }
                RawRule::At { name, prelude, block } => {
                    if name == "charset" {
                        continue;
                    }
                    if name == "import" && !imports_allowed {
                        debug!("ignoring misplaced @import");
                        continue;
                    }
                    if name != "import" {
                        imports_allowed = false;
                    }
                    let Some((_, handler)) = AT_RULES.iter().find(|(keyword, _)| *keyword == name) else {
                        debug!("dropping unsupported at-rule @{}", name);
                        continue;
                    };
                    match handler(self, ctx, &prelude, block.as_deref())? {
                        Some(rule) => rules.push(rule),
                        None => debug!("dropping malformed @{} rule", name),
                    }
                }
            }
        }
        Ok(rules)
    }

    fn declaration_block(&self, block: &[ComponentValue]) -> StyleDeclaration {
        StyleDeclaration::from_declarations(parse_declarations(block, &self.engine), self.lookup())
    }

    fn parse_style_rule(&self, ctx: &ParseContext, prelude: &[ComponentValue], block: &[ComponentValue]) -> Rc<CssRule> {
        let selector_text = serialize(prelude);
        let style = self.declaration_block(block);
        let css_text = braced(&selector_text, &style.css_text());
        Rc::new(CssRule {
            parent_style_sheet: ctx.sheet.clone(),
            parent_rule: ctx.parent_rule.clone(),
            css_text,
            kind: RuleKind::Style { selector_text, style },
        })
    }

    // ------------------------------
    // At-rules
    // ------------------------------

    fn parse_font_face(
        &self,
        ctx: &ParseContext,
        _prelude: &[ComponentValue],
        block: Option<&[ComponentValue]>,
    ) -> Result<Option<Rc<CssRule>>> {
        let Some(block) = block else {
            return Ok(None);
        };
        let declarations = parse_declarations(block, &self.engine);
        let css_text = braced("@font-face", &serialize_declarations(&declarations));
        Ok(Some(Rc::new(CssRule {
            parent_style_sheet: ctx.sheet.clone(),
            parent_rule: ctx.parent_rule.clone(),
            css_text,
            kind: RuleKind::FontFace {
                style: StyleDeclaration::from_declarations(declarations, self.lookup()),
            },
        })))
    }

    /// `@font-feature-values Family { @styleset { name: 1 2; } ... }`
    fn parse_font_feature_values(
        &self,
        ctx: &ParseContext,
        prelude: &[ComponentValue],
        block: Option<&[ComponentValue]>,
    ) -> Result<Option<Rc<CssRule>>> {
        let Some(block) = block else {
            return Ok(None);
        };
        let font_family = family_name(prelude);
        if font_family.is_empty() {
            return Ok(None);
        }
        let mut values = FontFeatureValues {
            font_family,
            ..Default::default()
        };
        for raw in parse_rule_list(block) {
            let RawRule::At {
                name,
                block: Some(body),
                ..
            } = raw
            else {
                continue;
            };
            match values.block_mut(&name) {
                Some(map) => collect_feature_values(&body, map),
                None => debug!("ignoring unknown feature block @{}", name),
            }
        }

        let css_text = feature_values_text(&values);
        Ok(Some(Rc::new(CssRule {
            parent_style_sheet: ctx.sheet.clone(),
            parent_rule: ctx.parent_rule.clone(),
            css_text,
            kind: RuleKind::FontFeatureValues(values),
        })))
    }

    fn parse_import(
        &self,
        ctx: &ParseContext,
        prelude: &[ComponentValue],
        block: Option<&[ComponentValue]>,
    ) -> Result<Option<Rc<CssRule>>> {
        if block.is_some() {
            return Ok(None);
        }
        let Some((href, rest)) = prelude.split_first().and_then(|(first, rest)| Some((url_value(first)?, rest))) else {
            return Ok(None);
        };
        let media_text = serialize(rest);
        let url = match &ctx.base_url {
            Some(base) => base.join(&href),
            None => Url::parse(&href),
        }
        .map_err(|e| StyleError::InvalidUrl(format!("{}: {}", href, e)))?;

        let cyclic = ctx.import_chain.iter().any(|seen| seen == url.as_str());
        let css_text = if media_text.is_empty() {
            format!("@import {};", ComponentValue::Url(href.clone()))
        } else {
            format!("@import {} {};", ComponentValue::Url(href.clone()), media_text)
        };

        let rule = Rc::new_cyclic(|weak_rule| {
            let origin = SheetOrigin {
                owner_rule: weak_rule.clone(),
                parent_style_sheet: ctx.sheet.clone(),
                media: media_text.clone(),
                ..Default::default()
            };
            let style_sheet = if cyclic {
                warn!("skipping @import: {}", StyleError::ImportCycle(url.to_string()));
                StyleSheet::new(SheetOrigin {
                    href: Some(url.to_string()),
                    base_url: Some(url.clone()),
                    ..origin
                })
            } else {
                self.load_resource(&url, origin, None, ctx.import_chain.clone())
            };
            CssRule {
                parent_style_sheet: ctx.sheet.clone(),
                parent_rule: ctx.parent_rule.clone(),
                css_text,
                kind: RuleKind::Import {
                    href,
                    media: MediaList::parse(&media_text),
                    style_sheet,
                },
            }
        });
        Ok(Some(rule))
    }

    fn parse_media(
        &self,
        ctx: &ParseContext,
        prelude: &[ComponentValue],
        block: Option<&[ComponentValue]>,
    ) -> Result<Option<Rc<CssRule>>> {
        let Some(block) = block else {
            return Ok(None);
        };
        let media = MediaList::parse(&serialize(prelude));
        let mut failure = None;
        let rule = Rc::new_cyclic(|weak_rule: &Weak<CssRule>| {
            let child_ctx = ParseContext {
                sheet: ctx.sheet.clone(),
                parent_rule: weak_rule.clone(),
                base_url: ctx.base_url.clone(),
                import_chain: ctx.import_chain.clone(),
            };
            let children = self.parse_rules(&child_ctx, block, false).unwrap_or_else(|e| {
                failure = Some(e);
                Vec::new()
            });
            let mut css_text = format!("@media {} {{", media.media_text());
            for child in &children {
                css_text.push_str("\n  ");
                css_text.push_str(&child.css_text);
            }
            css_text.push_str("\n}");
            CssRule {
                parent_style_sheet: ctx.sheet.clone(),
                parent_rule: ctx.parent_rule.clone(),
                css_text,
                kind: RuleKind::Media {
                    media,
                    css_rules: children.into(),
                },
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(Some(rule)),
        }
    }

    /// First identifier is the prefix, first URL or string the namespace.
    fn parse_namespace(
        &self,
        ctx: &ParseContext,
        prelude: &[ComponentValue],
        block: Option<&[ComponentValue]>,
    ) -> Result<Option<Rc<CssRule>>> {
        if block.is_some() {
            return Ok(None);
        }
        let prefix = prelude.iter().find_map(ComponentValue::as_ident).map(str::to_string);
        let Some(namespace_uri) = prelude.iter().find_map(url_value) else {
            return Ok(None);
        };
        let css_text = match &prefix {
            Some(prefix) => format!("@namespace {} {};", prefix, ComponentValue::Url(namespace_uri.clone())),
            None => format!("@namespace {};", ComponentValue::Url(namespace_uri.clone())),
        };
        Ok(Some(Rc::new(CssRule {
            parent_style_sheet: ctx.sheet.clone(),
            parent_rule: ctx.parent_rule.clone(),
            css_text,
            kind: RuleKind::Namespace { namespace_uri, prefix },
        })))
    }
}

// ------------------------------
// Helpers
// ------------------------------

fn braced(head: &str, body: &str) -> String {
    if body.is_empty() {
        format!("{} {{ }}", head)
    } else {
        format!("{} {{ {} }}", head, body)
    }
}

/// `url(x)`, `url("x")` or a bare string.
fn url_value(value: &ComponentValue) -> Option<String> {
    match value {
        ComponentValue::Url(url) | ComponentValue::String(url) => Some(url.clone()),
        ComponentValue::Function { name, arguments } if name.eq_ignore_ascii_case("url") => {
            match trim(arguments) {
                [ComponentValue::String(url)] => Some(url.clone()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// A quoted family name, or identifiers joined by single spaces.
fn family_name(prelude: &[ComponentValue]) -> String {
    if let [ComponentValue::String(name)] = trim(prelude) {
        return name.clone();
    }
    prelude
        .iter()
        .filter_map(ComponentValue::as_ident)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads `name: int int ...;` entries. An entry with anything other than a
/// name, a colon and non-negative integers is dropped whole.
fn collect_feature_values(body: &[ComponentValue], map: &mut BTreeMap<String, Vec<u32>>) {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Name,
        Colon,
        Values,
        Invalid,
    }

    let mut state = State::Name;
    let mut name = String::new();
    let mut indices: Vec<u32> = Vec::new();

    for value in body.iter().filter(|v| !v.is_whitespace()) {
        if let ComponentValue::Semicolon = value {
            if state == State::Values && !indices.is_empty() {
                map.insert(std::mem::take(&mut name), std::mem::take(&mut indices));
            }
            name.clear();
            indices.clear();
            state = State::Name;
            continue;
        }
        state = match (state, value) {
            (State::Name, ComponentValue::Ident(ident)) => {
                name = ident.clone();
                State::Colon
            }
            (State::Colon, ComponentValue::Colon) => State::Values,
            (State::Values, ComponentValue::Number { int_value: Some(n), .. }) if *n >= 0 => {
                indices.push(*n as u32);
                State::Values
            }
            _ => State::Invalid,
        };
    }
    if state == State::Values && !indices.is_empty() {
        map.insert(name, indices);
    }
}

fn feature_values_text(values: &FontFeatureValues) -> String {
    let mut text = format!("@font-feature-values {} {{", values.font_family);
    for (keyword, map) in values.blocks() {
        if map.is_empty() {
            continue;
        }
        text.push_str(&format!(" @{} {{", keyword));
        for (name, indices) in map {
            let indices: Vec<String> = indices.iter().map(u32::to_string).collect();
            text.push_str(&format!(" {}: {};", name, indices.join(" ")));
        }
        text.push_str(" }");
    }
    text.push_str(" }");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::style::properties::PropertyRegistry;
    use pretty_assertions::assert_eq;

    fn parser() -> StylesheetParser {
        StylesheetParser::new(PropertyRegistry::standard())
    }

    #[test]
    fn test_style_rules_and_unknown_at_rules() {
        let sheet = parser().parse_sheet(
            "@charset \"utf-8\"; @page { margin: 1in } rect, circle { fill: red; bogus-prop: 3 } @keyframes x { }",
            SheetOrigin::default(),
        );
        assert_eq!(sheet.len(), 1);
        let rule = &sheet.css_rules()[0];
        assert_eq!(rule.type_name(), "style");
        assert_eq!(rule.css_text, "rect, circle { fill: red; bogus-prop: 3 }");
        let RuleKind::Style { selector_text, style } = &rule.kind else {
            panic!("expected a style rule");
        };
        assert_eq!(selector_text, "rect, circle");
        assert_eq!(style.get_property_value("fill"), "red");
    }

    #[test]
    fn test_font_feature_values() {
        let sheet = parser().parse_sheet(
            "@font-feature-values Bongo { @character-variant { alpha-2: 1 2; beta: x; } @swash { fancy: 3 } }",
            SheetOrigin::default(),
        );
        let rule = &sheet.css_rules()[0];
        let RuleKind::FontFeatureValues(values) = &rule.kind else {
            panic!("expected @font-feature-values");
        };
        assert_eq!(values.font_family, "Bongo");
        assert_eq!(values.character_variant.get("alpha-2"), Some(&vec![1, 2]));
        assert!(!values.character_variant.contains_key("beta"));
        assert_eq!(values.swash.get("fancy"), Some(&vec![3]));
        assert_eq!(
            rule.css_text,
            "@font-feature-values Bongo { @character-variant { alpha-2: 1 2; } @swash { fancy: 3; } }"
        );
    }

    #[test]
    fn test_namespace_and_media() {
        let sheet = parser().parse_sheet(
            "@namespace svg url(http://www.w3.org/2000/svg); @media screen, print { rect { fill: red } }",
            SheetOrigin::default(),
        );
        let rules = sheet.css_rules();
        assert!(matches!(
            &rules[0].kind,
            RuleKind::Namespace { namespace_uri, prefix: Some(prefix) }
                if namespace_uri == "http://www.w3.org/2000/svg" && prefix == "svg"
        ));
        let RuleKind::Media { media, .. } = &rules[1].kind else {
            panic!("expected @media");
        };
        assert_eq!(media.media_text(), "screen, print");
        assert_eq!(rules[1].css_text, "@media screen, print {\n  rect { fill: red }\n}");
        let child = &rules[1].css_rules()[0];
        assert!(Rc::ptr_eq(&child.parent_rule().unwrap(), &rules[1]));
        assert!(Rc::ptr_eq(&child.parent_style_sheet().unwrap(), &sheet));
    }

    #[test]
    fn test_import_loads_nested_sheet() {
        let loader = MemoryLoader::new()
            .with_resource("file:///css/a.css", Some("text/css"), b"@import 'b.css' print; rect { fill: red }")
            .with_resource("file:///css/b.css", Some("text/css"), b"circle { fill: blue }");
        let parser = parser().with_loader(Box::new(loader));
        let url = Url::parse("file:///css/a.css").unwrap();
        let sheet = parser.parse_resource(&url, SheetOrigin::default(), None);
        assert_eq!(sheet.href.as_deref(), Some("file:///css/a.css"));
        let rules = sheet.css_rules();
        assert_eq!(rules.len(), 2);
        let RuleKind::Import { href, media, style_sheet } = &rules[0].kind else {
            panic!("expected @import");
        };
        assert_eq!(href, "b.css");
        assert_eq!(media.media_text(), "print");
        assert_eq!(style_sheet.href.as_deref(), Some("file:///css/b.css"));
        assert_eq!(style_sheet.media.media_text(), "print");
        assert_eq!(style_sheet.len(), 1);
        assert!(Rc::ptr_eq(&style_sheet.owner_rule().unwrap(), &rules[0]));
        assert!(Rc::ptr_eq(&style_sheet.parent_style_sheet().unwrap(), &sheet));
    }

    #[test]
    fn test_import_cycle_yields_empty_sheet() {
        let loader = MemoryLoader::new()
            .with_resource("file:///a.css", None, b"@import url(b.css); rect { fill: red }")
            .with_resource("file:///b.css", None, b"@import url(a.css); circle { fill: blue }");
        let parser = parser().with_loader(Box::new(loader));
        let sheet = parser.parse_resource(&Url::parse("file:///a.css").unwrap(), SheetOrigin::default(), None);
        let RuleKind::Import { style_sheet: b, .. } = &sheet.css_rules()[0].kind else {
            panic!("expected @import");
        };
        assert_eq!(b.len(), 2);
        let RuleKind::Import { style_sheet: back, .. } = &b.css_rules()[0].kind else {
            panic!("expected @import");
        };
        assert!(back.is_empty());
    }

    #[test]
    fn test_failures_never_raise() {
        let parser = parser();
        // relative import with no base URL discards the whole text
        assert!(parser.parse_text("@import 'x.css'; rect { fill: red }", None, None).is_empty());
        // a missing resource is an empty sheet
        let missing = parser.parse_resource(
            &Url::parse("file:///does/not/exist.css").unwrap(),
            SheetOrigin::default(),
            None,
        );
        assert!(missing.is_empty());
        // misplaced imports are ignored, not fatal
        let rules = parser.parse_text("rect { } @import 'x.css';", None, None);
        assert_eq!(rules.len(), 1);
    }
}
