//! Property descriptors: one per known property, keyed in a static registry.
//!
//! The registry is handed to declarations and the shorthand engine as a
//! `&'static dyn PropertyLookup`, so tests can substitute their own table.

use crate::style::tokens::{split_commas, trim, ComponentValue};
use std::collections::HashMap;
use std::sync::OnceLock;

/// One alternative of a single-value grammar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    Keyword(&'static [&'static str]),
    Length,
    Percentage,
    Number,
    /// Number within an inclusive range, e.g. `font-weight`.
    NumberIn(f32, f32),
    Color,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grammar {
    /// Exactly one component value matching any of the kinds.
    Single(&'static [ValueKind]),
    /// One or more distinct keywords from `words`, or one of `solo` on its own.
    KeywordSet {
        words: &'static [&'static str],
        solo: &'static [&'static str],
    },
    /// Comma-separated family names: a string or a run of identifiers each.
    FamilyList,
    /// Any non-empty value.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub inherited: bool,
    /// Tabulated initial value. Platform-supplied initials are overridden by the environment.
    pub initial: &'static str,
    pub grammar: Grammar,
    /// Shorthands accept anything here; their longhands are validated individually.
    pub shorthand: bool,
}

pub const CSS_WIDE_KEYWORDS: &[&str] = &["inherit", "initial", "unset"];

const LENGTH_UNITS: &[&str] = &[
    "px", "em", "ex", "ch", "rem", "vw", "vh", "vmin", "vmax", "cm", "mm", "q", "in", "pt", "pc",
];
const MATH_FUNCTIONS: &[&str] = &["calc", "min", "max", "clamp", "var", "env"];

pub const FONT_STYLE: &[&str] = &["normal", "italic", "oblique"];
pub const FONT_VARIANT_CSS2: &[&str] = &["normal", "small-caps"];
pub const FONT_WEIGHT: &[&str] = &["normal", "bold", "bolder", "lighter"];
pub const FONT_STRETCH: &[&str] = &[
    "normal",
    "ultra-condensed",
    "extra-condensed",
    "condensed",
    "semi-condensed",
    "semi-expanded",
    "expanded",
    "extra-expanded",
    "ultra-expanded",
];
pub const FONT_SIZE: &[&str] = &[
    "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large", "xxx-large",
    "larger", "smaller",
];
const OVERFLOW: &[&str] = &["visible", "hidden", "clip", "scroll", "auto"];
const AUTO_NONE: &[&str] = &["auto", "none"];
const NONE: &[&str] = &["none"];
const NORMAL: &[&str] = &["normal"];
const AUTO: &[&str] = &["auto"];
const FILL_RULE: &[&str] = &["nonzero", "evenodd"];

macro_rules! keywords {
    ($words:expr) => {
        Grammar::Single(&[ValueKind::Keyword($words)])
    };
}

const fn longhand(name: &'static str, inherited: bool, initial: &'static str, grammar: Grammar) -> PropertyDescriptor {
    PropertyDescriptor {
        name,
        inherited,
        initial,
        grammar,
        shorthand: false,
    }
}

const fn shorthand(name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor {
        name,
        inherited: false,
        initial: "",
        grammar: Grammar::Any,
        shorthand: true,
    }
}

static PROPERTIES: &[PropertyDescriptor] = &[
    // shorthands
    shorthand("font"),
    shorthand("font-variant"),
    shorthand("font-synthesis"),
    shorthand("overflow"),
    shorthand("marker"),
    // legacy-compat aliases used inside the `font` shorthand
    longhand("font-variant-css2", true, "normal", keywords!(FONT_VARIANT_CSS2)),
    longhand("font-stretch-css3", true, "normal", keywords!(FONT_STRETCH)),
    // not inherited
    longhand("alignment-baseline", false, "auto", Grammar::Any),
    longhand("baseline-shift", false, "0", Grammar::Any),
    longhand("clip", false, "auto", Grammar::Any),
    longhand("clip-path", false, "none", Grammar::Any),
    longhand("display", false, "inline", Grammar::Any),
    longhand("filter", false, "none", Grammar::Any),
    longhand("flood-color", false, "black", Grammar::Single(&[ValueKind::Color])),
    longhand("flood-opacity", false, "1", Grammar::Single(&[ValueKind::Number, ValueKind::Percentage])),
    longhand("inline-size", false, "auto", Grammar::Single(&[ValueKind::Keyword(AUTO), ValueKind::Length, ValueKind::Percentage])),
    longhand("lighting-color", false, "white", Grammar::Single(&[ValueKind::Color])),
    longhand("mask", false, "none", Grammar::Any),
    longhand("opacity", false, "1", Grammar::Single(&[ValueKind::Number, ValueKind::Percentage])),
    longhand("overflow-x", false, "visible", keywords!(OVERFLOW)),
    longhand("overflow-y", false, "visible", keywords!(OVERFLOW)),
    longhand("stop-color", false, "black", Grammar::Single(&[ValueKind::Color])),
    longhand("stop-opacity", false, "1", Grammar::Single(&[ValueKind::Number, ValueKind::Percentage])),
    longhand("text-decoration", false, "none", Grammar::Any),
    longhand("unicode-bidi", false, "normal", Grammar::Any),
    // inherited
    longhand("clip-rule", true, "nonzero", keywords!(FILL_RULE)),
    longhand("color", true, "black", Grammar::Single(&[ValueKind::Color])),
    longhand("color-interpolation", true, "sRGB", keywords!(&["auto", "sRGB", "linearRGB"])),
    longhand("color-interpolation-filters", true, "linearRGB", keywords!(&["auto", "sRGB", "linearRGB"])),
    longhand("color-rendering", true, "auto", keywords!(&["auto", "optimizeSpeed", "optimizeQuality"])),
    longhand("cursor", true, "auto", Grammar::Any),
    longhand("direction", true, "ltr", keywords!(&["ltr", "rtl"])),
    longhand("dominant-baseline", true, "auto", Grammar::Any),
    longhand("fill", true, "black", Grammar::Any),
    longhand("fill-opacity", true, "1", Grammar::Single(&[ValueKind::Number, ValueKind::Percentage])),
    longhand("fill-rule", true, "nonzero", keywords!(FILL_RULE)),
    longhand("font-family", true, "sans-serif", Grammar::FamilyList),
    longhand("font-feature-settings", true, "normal", Grammar::Any),
    longhand("font-kerning", true, "auto", keywords!(&["auto", "normal", "none"])),
    longhand("font-size", true, "medium", Grammar::Single(&[ValueKind::Keyword(FONT_SIZE), ValueKind::Length, ValueKind::Percentage])),
    longhand("font-size-adjust", true, "none", Grammar::Single(&[ValueKind::Keyword(NONE), ValueKind::Number])),
    longhand("font-stretch", true, "normal", Grammar::Single(&[ValueKind::Keyword(FONT_STRETCH), ValueKind::Percentage])),
    longhand("font-style", true, "normal", keywords!(FONT_STYLE)),
    longhand("font-synthesis-style", true, "auto", keywords!(AUTO_NONE)),
    longhand("font-synthesis-weight", true, "auto", keywords!(AUTO_NONE)),
    longhand("font-variant-alternates", true, "normal", Grammar::KeywordSet { words: &["historical-forms"], solo: NORMAL }),
    longhand("font-variant-caps", true, "normal", keywords!(&["normal", "small-caps", "all-small-caps", "petite-caps", "all-petite-caps", "unicase", "titling-caps"])),
    longhand("font-variant-east-asian", true, "normal", Grammar::KeywordSet {
        words: &["jis78", "jis83", "jis90", "jis04", "simplified", "traditional", "full-width", "proportional-width", "ruby"],
        solo: NORMAL,
    }),
    longhand("font-variant-ligatures", true, "normal", Grammar::KeywordSet {
        words: &[
            "common-ligatures", "no-common-ligatures", "discretionary-ligatures", "no-discretionary-ligatures",
            "historical-ligatures", "no-historical-ligatures", "contextual", "no-contextual",
        ],
        solo: &["normal", "none"],
    }),
    longhand("font-variant-numeric", true, "normal", Grammar::KeywordSet {
        words: &[
            "lining-nums", "oldstyle-nums", "proportional-nums", "tabular-nums",
            "diagonal-fractions", "stacked-fractions", "ordinal", "slashed-zero",
        ],
        solo: NORMAL,
    }),
    longhand("font-variant-position", true, "normal", keywords!(&["normal", "sub", "super"])),
    longhand("font-weight", true, "normal", Grammar::Single(&[ValueKind::Keyword(FONT_WEIGHT), ValueKind::NumberIn(1.0, 1000.0)])),
    longhand("glyph-orientation-vertical", true, "auto", Grammar::Any),
    longhand("image-rendering", true, "auto", keywords!(&["auto", "optimizeSpeed", "optimizeQuality", "pixelated", "crisp-edges", "smooth"])),
    longhand("letter-spacing", true, "normal", Grammar::Single(&[ValueKind::Keyword(NORMAL), ValueKind::Length])),
    longhand("line-height", true, "normal", Grammar::Single(&[ValueKind::Keyword(NORMAL), ValueKind::Number, ValueKind::Length, ValueKind::Percentage])),
    longhand("marker-end", true, "none", Grammar::Single(&[ValueKind::Keyword(NONE), ValueKind::Url])),
    longhand("marker-mid", true, "none", Grammar::Single(&[ValueKind::Keyword(NONE), ValueKind::Url])),
    longhand("marker-start", true, "none", Grammar::Single(&[ValueKind::Keyword(NONE), ValueKind::Url])),
    longhand("paint-order", true, "normal", Grammar::Any),
    longhand("pointer-events", true, "visiblePainted", Grammar::Any),
    longhand("shape-rendering", true, "auto", keywords!(&["auto", "optimizeSpeed", "crispEdges", "geometricPrecision"])),
    longhand("stroke", true, "none", Grammar::Any),
    longhand("stroke-dasharray", true, "none", Grammar::Any),
    longhand("stroke-dashoffset", true, "0", Grammar::Single(&[ValueKind::Length, ValueKind::Percentage, ValueKind::Number])),
    longhand("stroke-linecap", true, "butt", keywords!(&["butt", "round", "square"])),
    longhand("stroke-linejoin", true, "miter", keywords!(&["miter", "miter-clip", "round", "bevel", "arcs"])),
    longhand("stroke-miterlimit", true, "4", Grammar::Single(&[ValueKind::Number])),
    longhand("stroke-opacity", true, "1", Grammar::Single(&[ValueKind::Number, ValueKind::Percentage])),
    longhand("stroke-width", true, "1", Grammar::Single(&[ValueKind::Length, ValueKind::Percentage, ValueKind::Number])),
    longhand("tab-size", true, "8", Grammar::Single(&[ValueKind::Number, ValueKind::Length])),
    longhand("text-anchor", true, "start", keywords!(&["start", "middle", "end"])),
    longhand("text-orientation", true, "mixed", keywords!(&["mixed", "upright", "sideways"])),
    longhand("text-rendering", true, "auto", keywords!(&["auto", "optimizeSpeed", "optimizeLegibility", "geometricPrecision"])),
    longhand("visibility", true, "visible", keywords!(&["visible", "hidden", "collapse"])),
    longhand("white-space", true, "normal", keywords!(&["normal", "pre", "nowrap", "pre-wrap", "break-spaces", "pre-line"])),
    longhand("word-spacing", true, "normal", Grammar::Single(&[ValueKind::Keyword(NORMAL), ValueKind::Length])),
    longhand("writing-mode", true, "horizontal-tb", keywords!(&[
        "horizontal-tb", "vertical-rl", "vertical-lr", "lr", "lr-tb", "rl", "rl-tb", "tb", "tb-rl",
    ])),
];

/// Longhand aliases that only exist inside shorthand grammars.
pub const ALIASES: &[&str] = &["font-variant-css2", "font-stretch-css3"];

fn table(inherited: bool) -> Vec<&'static str> {
    PROPERTIES
        .iter()
        .filter(|d| d.inherited == inherited && !d.shorthand && !ALIASES.contains(&d.name))
        .map(|d| d.name)
        .collect()
}

/// Longhands resolved by walking up the ancestors.
pub fn inherited_properties() -> &'static [&'static str] {
    static TABLE: OnceLock<Vec<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| table(true))
}

/// Longhands read from the element alone.
pub fn non_inherited_properties() -> &'static [&'static str] {
    static TABLE: OnceLock<Vec<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| table(false))
}

/// Lookup capability over property descriptors.
pub trait PropertyLookup: std::fmt::Debug {
    fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor>;

    fn is_known(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    fn initial_value(&self, name: &str) -> Option<&str> {
        self.descriptor(name).map(|d| d.initial)
    }

    /// CSS-wide keywords are valid for every property. Unknown properties
    /// accept any non-empty value.
    fn is_valid(&self, name: &str, values: &[ComponentValue]) -> bool {
        if is_css_wide_keyword(values) {
            return true;
        }
        match self.descriptor(name) {
            Some(descriptor) => descriptor.grammar.accepts(values),
            None => !trim(values).is_empty(),
        }
    }
}

#[derive(Debug)]
pub struct PropertyRegistry {
    by_name: HashMap<&'static str, &'static PropertyDescriptor>,
}

impl PropertyRegistry {
    /// The built-in SVG/CSS property table, built once per process.
    pub fn standard() -> &'static PropertyRegistry {
        static REGISTRY: OnceLock<PropertyRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| PropertyRegistry {
            by_name: PROPERTIES.iter().map(|d| (d.name, d)).collect(),
        })
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static PropertyDescriptor> + '_ {
        self.by_name.values().copied()
    }
}

impl PropertyLookup for PropertyRegistry {
    fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_name.get(name).copied()
    }
}

pub fn is_css_wide_keyword(values: &[ComponentValue]) -> bool {
    css_wide_keyword(values).is_some()
}

/// The CSS-wide keyword if `values` is exactly one of them.
pub fn css_wide_keyword(values: &[ComponentValue]) -> Option<&'static str> {
    match trim(values) {
        [ComponentValue::Ident(word)] => CSS_WIDE_KEYWORDS
            .iter()
            .find(|k| word.eq_ignore_ascii_case(k))
            .copied(),
        _ => None,
    }
}

impl Grammar {
    pub fn accepts(&self, values: &[ComponentValue]) -> bool {
        let parts: Vec<&ComponentValue> = values.iter().filter(|v| !v.is_whitespace()).collect();
        if parts.is_empty() {
            return false;
        }
        match self {
            Grammar::Single(kinds) => parts.len() == 1 && kinds.iter().any(|k| k.accepts(parts[0])),
            Grammar::KeywordSet { words, solo } => {
                let idents: Option<Vec<&str>> = parts.iter().map(|v| v.as_ident()).collect();
                let Some(idents) = idents else {
                    return false;
                };
                if let [only] = idents.as_slice() {
                    if solo.iter().any(|s| only.eq_ignore_ascii_case(s)) {
                        return true;
                    }
                }
                idents.iter().enumerate().all(|(i, word)| {
                    words.iter().any(|w| word.eq_ignore_ascii_case(w))
                        && !idents[..i].iter().any(|prev| prev.eq_ignore_ascii_case(word))
                })
            }
            Grammar::FamilyList => split_commas(values).iter().all(|family| match family {
                [ComponentValue::String(_)] => true,
                [] => false,
                names => names
                    .iter()
                    .all(|v| v.is_whitespace() || v.as_ident().is_some()),
            }),
            Grammar::Any => true,
        }
    }
}

impl ValueKind {
    pub fn accepts(&self, value: &ComponentValue) -> bool {
        let math = matches!(value, ComponentValue::Function { name, .. }
            if MATH_FUNCTIONS.iter().any(|f| name.eq_ignore_ascii_case(f)));
        match self {
            ValueKind::Keyword(words) => value
                .as_ident()
                .map_or(false, |word| words.iter().any(|w| word.eq_ignore_ascii_case(w))),
            ValueKind::Length => {
                math || match value {
                    ComponentValue::Dimension { unit, .. } => {
                        LENGTH_UNITS.iter().any(|u| unit.eq_ignore_ascii_case(u))
                    }
                    ComponentValue::Number { value, .. } => *value == 0.0,
                    _ => false,
                }
            }
            ValueKind::Percentage => math || matches!(value, ComponentValue::Percentage { .. }),
            ValueKind::Number => math || matches!(value, ComponentValue::Number { .. }),
            ValueKind::NumberIn(min, max) => {
                math || matches!(value, ComponentValue::Number { value, .. } if value >= min && value <= max)
            }
            ValueKind::Color => match value {
                ComponentValue::Hash(hex) => {
                    matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
                }
                ComponentValue::Ident(word) => !CSS_WIDE_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)),
                ComponentValue::Function { name, .. } => [
                    "rgb", "rgba", "hsl", "hsla", "hwb", "lab", "lch", "oklab", "oklch", "color", "var",
                ]
                .iter()
                .any(|f| name.eq_ignore_ascii_case(f)),
                _ => false,
            },
            ValueKind::Url => match value {
                ComponentValue::Url(_) => true,
                ComponentValue::Function { name, .. } => name.eq_ignore_ascii_case("url"),
                _ => false,
            },
        }
    }
}
