//! Computed values and the unit arithmetic needed to produce them.

use crate::style::tokens::{split_commas, tokenize, trim, ComponentValue};
use cssparser::serialize_identifier;
use std::fmt;

// ------------------------------
// Computed values
// ------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    /// Anything kept as authored, e.g. `red` or `url(#m)`.
    Keyword(String),
    Number(f64),
    /// Absolute length in px.
    Length(f64),
    /// `font-family`
    List(Vec<String>),
    /// `font-feature-settings`
    Features(Vec<(String, u32)>),
}

impl StyleValue {
    pub fn keyword(value: impl Into<String>) -> Self {
        StyleValue::Keyword(value.into())
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            StyleValue::Keyword(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            StyleValue::Number(n) | StyleValue::Length(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Keyword(value) => f.write_str(value),
            StyleValue::Number(n) => f.write_str(&format_number(*n)),
            StyleValue::Length(n) => write!(f, "{}px", format_number(*n)),
            StyleValue::List(families) => {
                for (i, family) in families.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_family(family, f)?;
                }
                Ok(())
            }
            StyleValue::Features(features) if features.is_empty() => f.write_str("normal"),
            StyleValue::Features(features) => {
                for (i, (tag, value)) in features.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "\"{}\" {}", tag, value)?;
                }
                Ok(())
            }
        }
    }
}

/// Family names that need quoting to survive re-parsing are quoted.
fn write_family(family: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut escaped = String::new();
    let plain = serialize_identifier(family, &mut escaped).is_ok() && escaped == family && !family.is_empty();
    if plain {
        f.write_str(family)
    } else {
        write!(f, "\"{}\"", family.replace('"', "\\\""))
    }
}

/// Shortest decimal form, at most four fractional digits.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let text = format!("{:.4}", n);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

// ------------------------------
// Lengths
// ------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// `px` or a unitless number
    Px,
    Pt,
    Pc,
    In,
    Cm,
    Mm,
    Q,
    Em,
    Ex,
    Rem,
    Vw,
    Vh,
    Vmin,
    Vmax,
    Percent,
}

impl LengthUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        let unit = match unit.to_ascii_lowercase().as_str() {
            "px" => LengthUnit::Px,
            "pt" => LengthUnit::Pt,
            "pc" => LengthUnit::Pc,
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            "q" => LengthUnit::Q,
            "em" => LengthUnit::Em,
            "ex" => LengthUnit::Ex,
            "rem" => LengthUnit::Rem,
            "vw" => LengthUnit::Vw,
            "vh" => LengthUnit::Vh,
            "vmin" => LengthUnit::Vmin,
            "vmax" => LengthUnit::Vmax,
            _ => return None,
        };
        Some(unit)
    }

    /// Units per inch for the context-free units.
    fn per_inch(self) -> Option<f64> {
        match self {
            LengthUnit::Px => Some(96.0),
            LengthUnit::Pt => Some(72.0),
            LengthUnit::Pc => Some(6.0),
            LengthUnit::In => Some(1.0),
            LengthUnit::Cm => Some(2.54),
            LengthUnit::Mm => Some(25.4),
            LengthUnit::Q => Some(101.6),
            _ => None,
        }
    }
}

/// What relative units are measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthContext {
    pub font_size: f64,
    pub root_font_size: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// 100% in px; `None` leaves percentages unresolved.
    pub percent_base: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    /// Parses a single number, percentage or dimension. Bare numbers are px.
    pub fn parse(text: &str) -> Option<Self> {
        let values = tokenize(text);
        match trim(&values) {
            [ComponentValue::Number { value, .. }] => Some(Length {
                value: *value as f64,
                unit: LengthUnit::Px,
            }),
            [ComponentValue::Percentage { value, .. }] => Some(Length {
                value: *value as f64,
                unit: LengthUnit::Percent,
            }),
            [ComponentValue::Dimension { value, unit, .. }] => Some(Length {
                value: *value as f64,
                unit: LengthUnit::parse(unit)?,
            }),
            _ => None,
        }
    }

    pub fn to_px(&self, ctx: &LengthContext) -> Option<f64> {
        if let Some(per_inch) = self.unit.per_inch() {
            return Some(self.value * 96.0 / per_inch);
        }
        let px = match self.unit {
            LengthUnit::Em => self.value * ctx.font_size,
            // no font metrics: x-height is taken as half the em
            LengthUnit::Ex => self.value * ctx.font_size / 2.0,
            LengthUnit::Rem => self.value * ctx.root_font_size,
            LengthUnit::Vw => self.value * ctx.viewport_width / 100.0,
            LengthUnit::Vh => self.value * ctx.viewport_height / 100.0,
            LengthUnit::Vmin => self.value * ctx.viewport_width.min(ctx.viewport_height) / 100.0,
            LengthUnit::Vmax => self.value * ctx.viewport_width.max(ctx.viewport_height) / 100.0,
            LengthUnit::Percent => self.value * ctx.percent_base? / 100.0,
            _ => return None,
        };
        Some(px)
    }
}

// ------------------------------
// List-valued properties
// ------------------------------

/// `"Times New Roman", serif` becomes `["Times New Roman", "serif"]`.
/// Unquoted names made of several identifiers are joined by single spaces.
pub fn parse_font_family(text: &str) -> Vec<String> {
    let values = tokenize(text);
    split_commas(&values)
        .into_iter()
        .filter_map(|piece| match piece {
            [ComponentValue::String(name)] => Some(name.clone()),
            _ => {
                let words: Vec<&str> = piece
                    .iter()
                    .filter(|v| !v.is_whitespace())
                    .map(ComponentValue::as_ident)
                    .collect::<Option<_>>()?;
                (!words.is_empty()).then(|| words.join(" "))
            }
        })
        .collect()
}

/// `"liga" 0, "smcp"` becomes `[("liga", 0), ("smcp", 1)]`. `normal` is the
/// empty list. A malformed entry invalidates the whole value.
pub fn parse_font_feature_settings(text: &str) -> Option<Vec<(String, u32)>> {
    let values = tokenize(text);
    if let [only] = trim(&values) {
        if only.is_ident("normal") {
            return Some(Vec::new());
        }
    }
    let mut features = Vec::new();
    for piece in split_commas(&values) {
        let parts: Vec<&ComponentValue> = piece.iter().filter(|v| !v.is_whitespace()).collect();
        let (tag, setting) = match parts.as_slice() {
            [ComponentValue::String(tag)] => (tag, 1),
            [ComponentValue::String(tag), ComponentValue::Number { int_value: Some(n), .. }] if *n >= 0 => {
                (tag, *n as u32)
            }
            [ComponentValue::String(tag), switch] if switch.is_ident("on") => (tag, 1),
            [ComponentValue::String(tag), switch] if switch.is_ident("off") => (tag, 0),
            _ => return None,
        };
        if tag.len() != 4 || !tag.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
            return None;
        }
        features.push((tag.clone(), setting));
    }
    Some(features)
}
