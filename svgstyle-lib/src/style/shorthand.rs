//! Expansion and serialization of the shorthand properties `font`,
//! `font-variant`, `font-synthesis` and `overflow`.

use crate::style::declaration::{upsert, Declaration};
use crate::style::properties::{css_wide_keyword, PropertyLookup, CSS_WIDE_KEYWORDS};
use crate::style::tokens::{serialize, tokenize, trim, ComponentValue};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shorthand {
    Font,
    FontVariant,
    FontSynthesis,
    Overflow,
}

/// `font` longhands in scan order. The two `-css2`/`-css3` entries are the
/// legacy-compat aliases, stored as `font-variant` and `font-stretch`.
const FONT: &[&str] = &[
    "font-style",
    "font-variant-css2",
    "font-weight",
    "font-stretch-css3",
    "font-size",
    "line-height",
    "font-family",
];
const FONT_VARIANT: &[&str] = &[
    "font-variant-ligatures",
    "font-variant-position",
    "font-variant-caps",
    "font-variant-numeric",
    "font-variant-alternates",
    "font-variant-east-asian",
];
const FONT_SYNTHESIS: &[&str] = &["font-synthesis-weight", "font-synthesis-style"];
const OVERFLOW: &[&str] = &["overflow-x", "overflow-y"];

impl Shorthand {
    pub const ALL: [Shorthand; 4] = [
        Shorthand::Font,
        Shorthand::FontVariant,
        Shorthand::FontSynthesis,
        Shorthand::Overflow,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "font" => Some(Shorthand::Font),
            "font-variant" => Some(Shorthand::FontVariant),
            "font-synthesis" => Some(Shorthand::FontSynthesis),
            "overflow" => Some(Shorthand::Overflow),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Shorthand::Font => "font",
            Shorthand::FontVariant => "font-variant",
            Shorthand::FontSynthesis => "font-synthesis",
            Shorthand::Overflow => "overflow",
        }
    }

    /// Direct longhands, aliases included.
    pub fn longhands(self) -> &'static [&'static str] {
        match self {
            Shorthand::Font => FONT,
            Shorthand::FontVariant => FONT_VARIANT,
            Shorthand::FontSynthesis => FONT_SYNTHESIS,
            Shorthand::Overflow => OVERFLOW,
        }
    }

    /// Stored longhand names with aliases renamed and nested shorthands flattened.
    pub fn flattened_longhands(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for longhand in self.longhands() {
            let name = storage_name(longhand);
            match Shorthand::from_name(name) {
                Some(nested) => out.extend(nested.flattened_longhands()),
                None => out.push(name),
            }
        }
        out
    }
}

/// Renames a legacy-compat alias to the name it is stored under.
fn storage_name(longhand: &'static str) -> &'static str {
    match longhand {
        "font-variant-css2" => "font-variant",
        "font-stretch-css3" => "font-stretch",
        other => other,
    }
}

/// Bidirectional shorthand/longhand mapping over a declaration list.
#[derive(Debug, Clone, Copy)]
pub struct ShorthandEngine {
    lookup: &'static dyn PropertyLookup,
}

impl ShorthandEngine {
    pub fn new(lookup: &'static dyn PropertyLookup) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &'static dyn PropertyLookup {
        self.lookup
    }

    /// Serializes `shorthand` from its longhands, or returns `""` when a
    /// longhand is missing or invalid, or their priorities disagree.
    pub fn get_value(&self, declarations: &[Declaration], shorthand: Shorthand) -> String {
        let mut values = Vec::with_capacity(shorthand.longhands().len());
        for longhand in shorthand.longhands() {
            let name = storage_name(longhand);
            let value = match Shorthand::from_name(name) {
                Some(nested) => self.get_value(declarations, nested),
                None => match declarations.iter().find(|d| d.name == name) {
                    Some(declaration) => declaration.value.clone(),
                    None => return String::new(),
                },
            };
            // Aliases validate against their own, narrower grammar.
            if value.is_empty() || !self.lookup.is_valid(longhand, &tokenize(&value)) {
                return String::new();
            }
            values.push(value);
        }
        if self.priority(declarations, shorthand).is_none() {
            return String::new();
        }

        if let Some(first) = values.first() {
            if CSS_WIDE_KEYWORDS.iter().any(|k| first.eq_ignore_ascii_case(k)) {
                return if values.iter().all(|v| v.eq_ignore_ascii_case(first)) {
                    first.to_ascii_lowercase()
                } else {
                    String::new()
                };
            }
        }
        if values
            .iter()
            .any(|v| CSS_WIDE_KEYWORDS.iter().any(|k| v.eq_ignore_ascii_case(k)))
        {
            return String::new();
        }

        match shorthand {
            Shorthand::Font => self.combine_font(&values),
            Shorthand::FontVariant => combine_font_variant(&values),
            Shorthand::FontSynthesis => combine_font_synthesis(&values),
            Shorthand::Overflow => {
                if values[0] == values[1] {
                    values[0].clone()
                } else {
                    format!("{} {}", values[0], values[1])
                }
            }
        }
    }

    /// `"important"` when every longhand is important, `""` otherwise.
    pub fn get_priority(&self, declarations: &[Declaration], shorthand: Shorthand) -> String {
        match self.priority(declarations, shorthand) {
            Some(true) => "important".to_string(),
            _ => String::new(),
        }
    }

    /// Shared importance of every longhand; `None` if one is missing or they disagree.
    fn priority(&self, declarations: &[Declaration], shorthand: Shorthand) -> Option<bool> {
        let mut shared = None;
        for longhand in shorthand.longhands() {
            let name = storage_name(longhand);
            let important = match Shorthand::from_name(name) {
                Some(nested) => self.priority(declarations, nested)?,
                None => declarations.iter().find(|d| d.name == name)?.important,
            };
            match shared {
                None => shared = Some(important),
                Some(previous) if previous != important => return None,
                Some(_) => {}
            }
        }
        shared
    }

    /// Expands `tokens` and writes the longhands whose value or priority differ.
    /// Returns whether anything changed; an unparseable value changes nothing.
    pub fn set_value(
        &self,
        declarations: &mut Vec<Declaration>,
        shorthand: Shorthand,
        tokens: &[ComponentValue],
        important: bool,
    ) -> bool {
        let Some(assignments) = self.expand(shorthand, tokens) else {
            debug!(
                "no {} expansion for {:?}",
                shorthand.name(),
                serialize(tokens)
            );
            return false;
        };
        let mut changed = false;
        for (name, value) in assignments {
            changed |= upsert(declarations, Declaration::new(name, value, important));
        }
        changed
    }

    /// Maps a shorthand value onto stored longhand names, in declaration order.
    pub fn expand(&self, shorthand: Shorthand, tokens: &[ComponentValue]) -> Option<Vec<(String, String)>> {
        if let Some(keyword) = css_wide_keyword(tokens) {
            return Some(
                shorthand
                    .flattened_longhands()
                    .into_iter()
                    .map(|name| (name.to_string(), keyword.to_string()))
                    .collect(),
            );
        }
        let parts: Vec<ComponentValue> = tokens.iter().filter(|v| !v.is_whitespace()).cloned().collect();
        if parts.is_empty() {
            return None;
        }
        match shorthand {
            Shorthand::Font => self.expand_font(trim(tokens)),
            Shorthand::FontVariant => self.expand_font_variant(&parts),
            Shorthand::FontSynthesis => expand_font_synthesis(&parts),
            Shorthand::Overflow => self.expand_overflow(&parts),
        }
    }

    fn accepts(&self, longhand: &str, values: &[ComponentValue]) -> bool {
        self.lookup
            .descriptor(longhand)
            .map_or(false, |d| d.grammar.accepts(values))
    }

    fn initial(&self, longhand: &str) -> String {
        self.lookup.initial_value(longhand).unwrap_or("").to_string()
    }

    /// Assigns each token to the first longhand whose grammar still accepts
    /// its accumulated tokens plus this one.
    fn scan(&self, longhands: &[&str], parts: &[ComponentValue]) -> Option<Vec<Vec<ComponentValue>>> {
        let mut slots: Vec<Vec<ComponentValue>> = vec![Vec::new(); longhands.len()];
        for part in parts {
            let slot = longhands.iter().enumerate().position(|(i, longhand)| {
                let mut candidate = slots[i].clone();
                candidate.push(part.clone());
                self.accepts(longhand, &candidate)
            })?;
            slots[slot].push(part.clone());
        }
        Some(slots)
    }

    fn expand_font(&self, tokens: &[ComponentValue]) -> Option<Vec<(String, String)>> {
        let prefix = &FONT[..4];
        let mut slots: Vec<Vec<ComponentValue>> = vec![Vec::new(); prefix.len()];
        let mut size: Option<&ComponentValue> = None;
        let mut line_height: Option<&ComponentValue> = None;
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            if token.is_whitespace() {
                i += 1;
                continue;
            }
            if size.is_none() {
                let slot = prefix.iter().enumerate().position(|(k, longhand)| {
                    let mut candidate = slots[k].clone();
                    candidate.push(token.clone());
                    self.accepts(longhand, &candidate)
                });
                match slot {
                    Some(k) => slots[k].push(token.clone()),
                    None if self.accepts("font-size", std::slice::from_ref(token)) => size = Some(token),
                    None => return None,
                }
                i += 1;
                continue;
            }
            if matches!(token, ComponentValue::Delim('/')) && line_height.is_none() {
                i += 1;
                while tokens.get(i).map_or(false, ComponentValue::is_whitespace) {
                    i += 1;
                }
                let value = tokens.get(i)?;
                if !self.accepts("line-height", std::slice::from_ref(value)) {
                    return None;
                }
                line_height = Some(value);
                i += 1;
                continue;
            }
            break;
        }

        let size = size?;
        let family = trim(&tokens[i..]);
        if family.is_empty() || !self.accepts("font-family", family) {
            return None;
        }

        let mut out = Vec::new();
        for (k, longhand) in prefix.iter().enumerate() {
            let value = if slots[k].is_empty() {
                self.initial(longhand)
            } else {
                join(&slots[k])
            };
            if *longhand == "font-variant-css2" {
                out.extend(self.expand_font_variant(&tokenize(&value))?);
            } else {
                out.push((storage_name(longhand).to_string(), value));
            }
        }
        out.push(("font-size".to_string(), size.to_css()));
        out.push((
            "line-height".to_string(),
            line_height.map_or_else(|| self.initial("line-height"), ComponentValue::to_css),
        ));
        out.push(("font-family".to_string(), serialize(family)));
        Some(out)
    }

    fn expand_font_variant(&self, parts: &[ComponentValue]) -> Option<Vec<(String, String)>> {
        let parts: Vec<ComponentValue> = parts.iter().filter(|v| !v.is_whitespace()).cloned().collect();
        let reset = |ligatures: &str| {
            FONT_VARIANT
                .iter()
                .map(|name| {
                    let value = if *name == "font-variant-ligatures" {
                        ligatures.to_string()
                    } else {
                        self.initial(name)
                    };
                    (name.to_string(), value)
                })
                .collect::<Vec<_>>()
        };
        if let [only] = parts.as_slice() {
            if only.is_ident("normal") {
                return Some(reset("normal"));
            }
            if only.is_ident("none") {
                return Some(reset("none"));
            }
        }
        let slots = self.scan(FONT_VARIANT, &parts)?;
        Some(
            FONT_VARIANT
                .iter()
                .zip(slots)
                .map(|(name, slot)| {
                    let value = if slot.is_empty() {
                        self.initial(name)
                    } else {
                        join(&slot)
                    };
                    (name.to_string(), value)
                })
                .collect(),
        )
    }

    fn expand_overflow(&self, parts: &[ComponentValue]) -> Option<Vec<(String, String)>> {
        let (x, y) = match parts {
            [x] => (x, x),
            [x, y] => (x, y),
            _ => return None,
        };
        if !self.accepts("overflow-x", std::slice::from_ref(x))
            || !self.accepts("overflow-y", std::slice::from_ref(y))
        {
            return None;
        }
        Some(vec![
            ("overflow-x".to_string(), x.to_css()),
            ("overflow-y".to_string(), y.to_css()),
        ])
    }

    fn combine_font(&self, values: &[String]) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (k, longhand) in FONT[..4].iter().enumerate() {
            if values[k] != self.initial(longhand) {
                parts.push(values[k].clone());
            }
        }
        // font-size is required by the grammar, so it is emitted even at its initial value.
        if values[5] == self.initial("line-height") {
            parts.push(values[4].clone());
        } else {
            parts.push(format!("{}/{}", values[4], values[5]));
        }
        parts.push(values[6].clone());
        parts.join(" ")
    }
}

fn combine_font_variant(values: &[String]) -> String {
    let (ligatures, rest) = match values.split_first() {
        Some(split) => split,
        None => return String::new(),
    };
    let rest_normal = rest.iter().all(|v| v == "normal");
    match ligatures.as_str() {
        "normal" if rest_normal => "normal".to_string(),
        "none" if rest_normal => "none".to_string(),
        "none" => String::new(),
        _ => values
            .iter()
            .filter(|v| *v != "normal")
            .cloned()
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn combine_font_synthesis(values: &[String]) -> String {
    match (values[0].as_str(), values[1].as_str()) {
        ("auto", "auto") => "weight style",
        ("auto", "none") => "weight",
        ("none", "auto") => "style",
        ("none", "none") => "none",
        _ => "",
    }
    .to_string()
}

fn expand_font_synthesis(parts: &[ComponentValue]) -> Option<Vec<(String, String)>> {
    let words: Option<Vec<String>> = parts
        .iter()
        .map(|v| v.as_ident().map(str::to_ascii_lowercase))
        .collect();
    let (weight, style) = match words?.join(" ").as_str() {
        "none" => ("none", "none"),
        "weight" => ("auto", "none"),
        "style" => ("none", "auto"),
        "weight style" | "style weight" => ("auto", "auto"),
        _ => return None,
    };
    Some(vec![
        ("font-synthesis-weight".to_string(), weight.to_string()),
        ("font-synthesis-style".to_string(), style.to_string()),
    ])
}

fn join(values: &[ComponentValue]) -> String {
    values
        .iter()
        .map(ComponentValue::to_css)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::properties::PropertyRegistry;
    use pretty_assertions::assert_eq;

    fn engine() -> ShorthandEngine {
        ShorthandEngine::new(PropertyRegistry::standard())
    }

    fn set(decls: &mut Vec<Declaration>, shorthand: Shorthand, value: &str, important: bool) -> bool {
        engine().set_value(decls, shorthand, &tokenize(value), important)
    }

    fn value_of<'a>(decls: &'a [Declaration], name: &str) -> Option<&'a str> {
        decls.iter().find(|d| d.name == name).map(|d| d.value.as_str())
    }

    #[test]
    fn test_font_expansion() {
        let mut decls = Vec::new();
        assert!(set(&mut decls, Shorthand::Font, "italic bold 12px/30px Georgia, serif", false));
        assert_eq!(value_of(&decls, "font-style"), Some("italic"));
        assert_eq!(value_of(&decls, "font-weight"), Some("bold"));
        assert_eq!(value_of(&decls, "font-size"), Some("12px"));
        assert_eq!(value_of(&decls, "line-height"), Some("30px"));
        assert_eq!(value_of(&decls, "font-family"), Some("Georgia, serif"));
        assert_eq!(value_of(&decls, "font-variant-caps"), Some("normal"));
        assert_eq!(value_of(&decls, "font-stretch"), Some("normal"));
        assert_eq!(value_of(&decls, "font-variant-css2"), None);
        assert_eq!(
            engine().get_value(&decls, Shorthand::Font),
            "italic bold 12px/30px Georgia, serif"
        );
    }

    #[test]
    fn test_font_requires_size_and_family() {
        let mut decls = Vec::new();
        assert!(!set(&mut decls, Shorthand::Font, "bold serif", false));
        assert!(!set(&mut decls, Shorthand::Font, "bold 12px", false));
        assert!(decls.is_empty());
        assert!(set(&mut decls, Shorthand::Font, "small-caps 10px serif", false));
        assert_eq!(value_of(&decls, "font-variant-caps"), Some("small-caps"));
        assert_eq!(engine().get_value(&decls, Shorthand::Font), "small-caps 10px serif");
    }

    #[test]
    fn test_font_serialization_outside_css2_subset() {
        let mut decls = Vec::new();
        set(&mut decls, Shorthand::Font, "12px serif", false);
        set(&mut decls, Shorthand::FontVariant, "all-small-caps", false);
        assert_eq!(engine().get_value(&decls, Shorthand::Font), "");
        set(&mut decls, Shorthand::FontVariant, "normal", false);
        decls.retain(|d| d.name != "font-stretch");
        decls.push(Declaration::new("font-stretch".to_string(), "50%".to_string(), false));
        assert_eq!(engine().get_value(&decls, Shorthand::Font), "");
    }

    #[test]
    fn test_set_value_reports_changes_only() {
        let mut decls = Vec::new();
        assert!(set(&mut decls, Shorthand::Overflow, "hidden", false));
        assert!(!set(&mut decls, Shorthand::Overflow, "hidden hidden", false));
        assert!(set(&mut decls, Shorthand::Overflow, "hidden hidden", true));
        assert!(!set(&mut decls, Shorthand::Overflow, "sideways", true));
        assert_eq!(engine().get_priority(&decls, Shorthand::Overflow), "important");
        assert!(set(&mut decls, Shorthand::Overflow, "hidden scroll", true));
        assert_eq!(engine().get_value(&decls, Shorthand::Overflow), "hidden scroll");
    }

    #[test]
    fn test_mixed_priority_is_ambiguous() {
        let mut decls = Vec::new();
        set(&mut decls, Shorthand::FontSynthesis, "weight", false);
        assert_eq!(engine().get_value(&decls, Shorthand::FontSynthesis), "weight");
        decls[1].important = true;
        assert_eq!(engine().get_value(&decls, Shorthand::FontSynthesis), "");
        assert_eq!(engine().get_priority(&decls, Shorthand::FontSynthesis), "");
    }

    #[test]
    fn test_font_synthesis_vocabulary() {
        let mut decls = Vec::new();
        assert!(set(&mut decls, Shorthand::FontSynthesis, "style weight", false));
        assert_eq!(engine().get_value(&decls, Shorthand::FontSynthesis), "weight style");
        assert!(!set(&mut decls, Shorthand::FontSynthesis, "weight none", false));
        assert!(set(&mut decls, Shorthand::FontSynthesis, "none", false));
        assert_eq!(value_of(&decls, "font-synthesis-weight"), Some("none"));
        assert_eq!(value_of(&decls, "font-synthesis-style"), Some("none"));
    }

    #[test]
    fn test_font_variant_none() {
        let mut decls = Vec::new();
        set(&mut decls, Shorthand::FontVariant, "none", false);
        assert_eq!(value_of(&decls, "font-variant-ligatures"), Some("none"));
        assert_eq!(engine().get_value(&decls, Shorthand::FontVariant), "none");

        let caps = decls
            .iter_mut()
            .find(|d| d.name == "font-variant-caps")
            .unwrap();
        caps.value = "small-caps".to_string();
        assert_eq!(engine().get_value(&decls, Shorthand::FontVariant), "");
    }

    #[test]
    fn test_font_variant_scan() {
        let mut decls = Vec::new();
        assert!(set(
            &mut decls,
            Shorthand::FontVariant,
            "small-caps common-ligatures contextual ordinal",
            false
        ));
        assert_eq!(
            value_of(&decls, "font-variant-ligatures"),
            Some("common-ligatures contextual")
        );
        assert_eq!(
            engine().get_value(&decls, Shorthand::FontVariant),
            "common-ligatures contextual small-caps ordinal"
        );
    }

    #[test]
    fn test_css_wide_keywords() {
        let mut decls = Vec::new();
        assert!(set(&mut decls, Shorthand::Font, "inherit", false));
        assert_eq!(decls.len(), Shorthand::Font.flattened_longhands().len());
        assert_eq!(engine().get_value(&decls, Shorthand::Font), "inherit");
        decls[0].value = "italic".to_string();
        assert_eq!(engine().get_value(&decls, Shorthand::Font), "");
    }
}
