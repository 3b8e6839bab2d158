//! Environment snapshot and media-query evaluation.
//!
//! An [`Environment`] is an explicit, immutable description of the output
//! device. Style resolution is a pure function of the document and the
//! environment it is given, so callers that change viewport or media type
//! simply build a new snapshot.

use crate::style::tokens::{split_commas, tokenize, trim, BlockKind, ComponentValue};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    All,
    Screen,
    Print,
    /// A syntactically valid type this evaluator never matches (`tv`, `speech`, ...).
    Other,
}

impl MediaType {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "all" => MediaType::All,
            "screen" => MediaType::Screen,
            "print" => MediaType::Print,
            _ => MediaType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
}

/// The device and platform state style resolution runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub media_type: MediaType,
    /// Viewport width in CSS pixels
    pub viewport_width: f32,
    /// Viewport height in CSS pixels
    pub viewport_height: f32,
    pub device_pixel_ratio: f32,
    /// Bits per color component (0 on monochrome devices)
    pub color_depth: u32,
    pub monochrome_depth: u32,
    pub prefers_color_scheme: Option<ColorScheme>,
    /// Platform defaults used as initial values of inherited font and color properties.
    pub default_font_family: String,
    pub default_font_size: f32,
    pub default_color: String,
}

impl Environment {
    pub fn screen(width: f32, height: f32) -> Self {
        Self {
            media_type: MediaType::Screen,
            viewport_width: width,
            viewport_height: height,
            device_pixel_ratio: 1.0,
            color_depth: 8,
            monochrome_depth: 0,
            prefers_color_scheme: None,
            default_font_family: "sans-serif".to_string(),
            default_font_size: 16.0,
            default_color: "black".to_string(),
        }
    }

    pub fn print(width: f32, height: f32) -> Self {
        Self {
            media_type: MediaType::Print,
            ..Self::screen(width, height)
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    pub fn with_device_pixel_ratio(mut self, dpr: f32) -> Self {
        self.device_pixel_ratio = dpr;
        self
    }

    pub fn with_color_depth(mut self, bits: u32) -> Self {
        self.color_depth = bits;
        self
    }

    pub fn with_monochrome_depth(mut self, bits: u32) -> Self {
        self.monochrome_depth = bits;
        self
    }

    pub fn with_color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.prefers_color_scheme = Some(scheme);
        self
    }

    pub fn with_default_font_family(mut self, family: &str) -> Self {
        self.default_font_family = family.to_string();
        self
    }

    pub fn with_default_font_size(mut self, size: f32) -> Self {
        self.default_font_size = size;
        self
    }

    pub fn with_default_color(mut self, color: &str) -> Self {
        self.default_color = color.to_string();
        self
    }

    /// Normalized viewport diagonal, `sqrt(w² + h²) / sqrt(2)`.
    pub fn diagonal(&self) -> f32 {
        (self.viewport_width.powi(2) + self.viewport_height.powi(2)).sqrt()
            / std::f32::consts::SQRT_2
    }

    /// Evaluates a comma-separated media query list. An empty list matches;
    /// a malformed query counts as not matching.
    pub fn matches_media(&self, media_text: &str) -> bool {
        if media_text.trim().is_empty() {
            return true;
        }
        let values = tokenize(media_text);
        split_commas(&values)
            .into_iter()
            .any(|query| match MediaQuery::parse(query) {
                Some(query) => self.evaluate(&query),
                None => {
                    debug!("ignoring malformed media query in {:?}", media_text);
                    false
                }
            })
    }

    pub fn evaluate(&self, query: &MediaQuery) -> bool {
        let type_matches = match query.media_type {
            None | Some(MediaType::All) => true,
            Some(media_type) => media_type == self.media_type,
        };
        let matched = type_matches && query.features.iter().all(|f| self.evaluate_feature(f));
        if query.negated {
            !matched
        } else {
            matched
        }
    }

    fn evaluate_feature(&self, feature: &MediaFeature) -> bool {
        match feature {
            MediaFeature::Boolean(name) => match name {
                RangeFeature::Grid => false,
                other => self.actual(*other) != 0.0,
            },
            MediaFeature::Range { name, op, value } => {
                let actual = self.actual(*name);
                let tolerance = match name {
                    RangeFeature::Width | RangeFeature::Height => 0.5,
                    _ => 0.01,
                };
                match op {
                    ComparisonOp::Eq => (actual - value).abs() < tolerance,
                    ComparisonOp::Lt => actual < *value,
                    ComparisonOp::Le => actual <= *value,
                    ComparisonOp::Gt => actual > *value,
                    ComparisonOp::Ge => actual >= *value,
                }
            }
            MediaFeature::Orientation(portrait) => {
                (self.viewport_height >= self.viewport_width) == *portrait
            }
            MediaFeature::PrefersColorScheme(scheme) => self.prefers_color_scheme == Some(*scheme),
        }
    }

    fn actual(&self, feature: RangeFeature) -> f32 {
        match feature {
            RangeFeature::Width => self.viewport_width,
            RangeFeature::Height => self.viewport_height,
            RangeFeature::AspectRatio => {
                if self.viewport_height == 0.0 {
                    0.0
                } else {
                    self.viewport_width / self.viewport_height
                }
            }
            RangeFeature::Resolution => self.device_pixel_ratio,
            RangeFeature::Color => self.color_depth as f32,
            RangeFeature::Monochrome => self.monochrome_depth as f32,
            RangeFeature::Grid => 0.0,
        }
    }
}

// ------------------------------
// Query parsing
// ------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFeature {
    Width,
    Height,
    AspectRatio,
    /// In dppx
    Resolution,
    Color,
    Monochrome,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// `a < b` is `b > a`.
    fn flipped(self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
            ComparisonOp::Eq => ComparisonOp::Eq,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaFeature {
    /// `(color)`, `(width)`: true when the feature is non-zero.
    Boolean(RangeFeature),
    Range {
        name: RangeFeature,
        op: ComparisonOp,
        value: f32,
    },
    /// `true` for portrait
    Orientation(bool),
    PrefersColorScheme(ColorScheme),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaQuery {
    pub negated: bool,
    pub media_type: Option<MediaType>,
    pub features: Vec<MediaFeature>,
}

impl MediaQuery {
    /// Parses one query of a list, e.g. `only screen and (min-width: 600px)`.
    pub fn parse(values: &[ComponentValue]) -> Option<Self> {
        let parts: Vec<&ComponentValue> = trim(values)
            .iter()
            .filter(|v| !v.is_whitespace())
            .collect();
        let mut query = MediaQuery {
            negated: false,
            media_type: None,
            features: Vec::new(),
        };
        let mut i = 0;
        if let Some(word) = parts.first().and_then(|v| v.as_ident()) {
            if word.eq_ignore_ascii_case("not") || word.eq_ignore_ascii_case("only") {
                query.negated = word.eq_ignore_ascii_case("not");
                i += 1;
                // `not`/`only` must be followed by a media type.
                parts.get(i)?.as_ident()?;
            }
        }
        if let Some(name) = parts.get(i).and_then(|v| v.as_ident()) {
            if name.eq_ignore_ascii_case("and") {
                return None;
            }
            query.media_type = Some(MediaType::parse(name));
            i += 1;
        }
        let mut expect_feature = query.media_type.is_none();
        while i < parts.len() {
            if !expect_feature {
                if !parts[i].is_ident("and") {
                    return None;
                }
                expect_feature = true;
                i += 1;
                continue;
            }
            match parts[i] {
                ComponentValue::Block {
                    kind: BlockKind::Paren,
                    contents,
                } => query.features.extend(parse_feature(contents)?),
                _ => return None,
            }
            expect_feature = false;
            i += 1;
        }
        if expect_feature {
            return None;
        }
        Some(query)
    }
}

fn range_feature(name: &str) -> Option<RangeFeature> {
    Some(match name {
        "width" => RangeFeature::Width,
        "height" => RangeFeature::Height,
        "aspect-ratio" => RangeFeature::AspectRatio,
        "resolution" => RangeFeature::Resolution,
        "color" => RangeFeature::Color,
        "monochrome" => RangeFeature::Monochrome,
        "grid" => RangeFeature::Grid,
        _ => return None,
    })
}

/// A two-sided range yields one feature per bound.
fn parse_feature(contents: &[ComponentValue]) -> Option<Vec<MediaFeature>> {
    let parts: Vec<&ComponentValue> = contents.iter().filter(|v| !v.is_whitespace()).collect();
    match parts.as_slice() {
        [ComponentValue::Ident(name)] => {
            range_feature(&name.to_ascii_lowercase()).map(|f| vec![MediaFeature::Boolean(f)])
        }
        [ComponentValue::Ident(name), ComponentValue::Colon, value @ ..] => {
            parse_plain_feature(&name.to_ascii_lowercase(), value).map(|f| vec![f])
        }
        _ => parse_range_feature(&parts),
    }
}

fn parse_plain_feature(name: &str, value: &[&ComponentValue]) -> Option<MediaFeature> {
    match name {
        "orientation" => match value {
            [v] if v.is_ident("portrait") => Some(MediaFeature::Orientation(true)),
            [v] if v.is_ident("landscape") => Some(MediaFeature::Orientation(false)),
            _ => None,
        },
        "prefers-color-scheme" => match value {
            [v] if v.is_ident("light") => Some(MediaFeature::PrefersColorScheme(ColorScheme::Light)),
            [v] if v.is_ident("dark") => Some(MediaFeature::PrefersColorScheme(ColorScheme::Dark)),
            _ => None,
        },
        _ => {
            let (op, base) = if let Some(base) = name.strip_prefix("min-") {
                (ComparisonOp::Ge, base)
            } else if let Some(base) = name.strip_prefix("max-") {
                (ComparisonOp::Le, base)
            } else {
                (ComparisonOp::Eq, name)
            };
            let feature = range_feature(base)?;
            if feature == RangeFeature::Grid && op != ComparisonOp::Eq {
                return None;
            }
            Some(MediaFeature::Range {
                name: feature,
                op,
                value: feature_value(feature, value)?,
            })
        }
    }
}

/// `(width >= 600px)`, `(400px < width)` or `(400px <= width < 800px)`.
fn parse_range_feature(parts: &[&ComponentValue]) -> Option<Vec<MediaFeature>> {
    let (op_start, op, op_len) = find_comparison(parts)?;
    let left = &parts[..op_start];
    let right = &parts[op_start + op_len..];
    if let [ComponentValue::Ident(name)] = left {
        if find_comparison(right).is_some() {
            return None;
        }
        let feature = range_feature(&name.to_ascii_lowercase())?;
        return Some(vec![MediaFeature::Range {
            name: feature,
            op,
            value: feature_value(feature, right)?,
        }]);
    }
    match find_comparison(right) {
        None => {
            let [ComponentValue::Ident(name)] = right else {
                return None;
            };
            let feature = range_feature(&name.to_ascii_lowercase())?;
            Some(vec![MediaFeature::Range {
                name: feature,
                op: op.flipped(),
                value: feature_value(feature, left)?,
            }])
        }
        Some((second_start, second, second_len)) => {
            let [ComponentValue::Ident(name)] = &right[..second_start] else {
                return None;
            };
            // both bounds must point the same way
            let ascending = |op: ComparisonOp| matches!(op, ComparisonOp::Lt | ComparisonOp::Le);
            let descending = |op: ComparisonOp| matches!(op, ComparisonOp::Gt | ComparisonOp::Ge);
            if !(ascending(op) && ascending(second) || descending(op) && descending(second)) {
                return None;
            }
            let feature = range_feature(&name.to_ascii_lowercase())?;
            if feature == RangeFeature::Grid {
                return None;
            }
            let upper = &right[second_start + second_len..];
            Some(vec![
                MediaFeature::Range {
                    name: feature,
                    op: op.flipped(),
                    value: feature_value(feature, left)?,
                },
                MediaFeature::Range {
                    name: feature,
                    op: second,
                    value: feature_value(feature, upper)?,
                },
            ])
        }
    }
}

fn find_comparison(parts: &[&ComponentValue]) -> Option<(usize, ComparisonOp, usize)> {
    for (i, part) in parts.iter().enumerate() {
        let next_is_eq = matches!(parts.get(i + 1), Some(ComponentValue::Delim('=')));
        let found = match part {
            ComponentValue::Delim('<') if next_is_eq => Some((ComparisonOp::Le, 2)),
            ComponentValue::Delim('<') => Some((ComparisonOp::Lt, 1)),
            ComponentValue::Delim('>') if next_is_eq => Some((ComparisonOp::Ge, 2)),
            ComponentValue::Delim('>') => Some((ComparisonOp::Gt, 1)),
            ComponentValue::Delim('=') => Some((ComparisonOp::Eq, 1)),
            _ => None,
        };
        if let Some((op, len)) = found {
            return Some((i, op, len));
        }
    }
    None
}

fn feature_value(feature: RangeFeature, value: &[&ComponentValue]) -> Option<f32> {
    match feature {
        RangeFeature::Width | RangeFeature::Height => match value {
            [ComponentValue::Dimension { value, unit, .. }] => media_length_px(*value, unit),
            [ComponentValue::Number { value, .. }] if *value == 0.0 => Some(0.0),
            _ => None,
        },
        RangeFeature::AspectRatio => match value {
            [ComponentValue::Number { value: w, .. }, ComponentValue::Delim('/'), ComponentValue::Number { value: h, .. }]
                if *h != 0.0 =>
            {
                Some(w / h)
            }
            [ComponentValue::Number { value, .. }] => Some(*value),
            _ => None,
        },
        RangeFeature::Resolution => match value {
            [ComponentValue::Dimension { value, unit, .. }] => {
                match unit.to_ascii_lowercase().as_str() {
                    "dppx" | "x" => Some(*value),
                    "dpi" => Some(value / 96.0),
                    "dpcm" => Some(value * 2.54 / 96.0),
                    _ => None,
                }
            }
            _ => None,
        },
        RangeFeature::Color | RangeFeature::Monochrome | RangeFeature::Grid => match value {
            [ComponentValue::Number {
                int_value: Some(n), ..
            }] if *n >= 0 => Some(*n as f32),
            _ => None,
        },
    }
}

/// Media queries resolve font-relative units against the initial font size of 16px.
fn media_length_px(value: f32, unit: &str) -> Option<f32> {
    Some(match unit.to_ascii_lowercase().as_str() {
        "px" => value,
        "em" | "rem" => value * 16.0,
        "in" => value * 96.0,
        "cm" => value * 96.0 / 2.54,
        "mm" => value * 96.0 / 25.4,
        "q" => value * 96.0 / 101.6,
        "pt" => value * 96.0 / 72.0,
        "pc" => value * 16.0,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_media_types() {
        let screen = Environment::screen(800.0, 600.0);
        let print = Environment::print(800.0, 600.0);
        assert!(screen.matches_media(""));
        assert!(screen.matches_media("screen"));
        assert!(!screen.matches_media("print"));
        assert!(print.matches_media("print"));
        assert!(screen.matches_media("print, screen"));
        assert!(screen.matches_media("not print"));
        assert!(!screen.matches_media("tv"));
        assert!(screen.matches_media("all"));
    }

    #[test]
    fn test_width_features() {
        let env = Environment::screen(800.0, 600.0);
        assert!(env.matches_media("(min-width: 600px)"));
        assert!(!env.matches_media("screen and (max-width: 600px)"));
        assert!(env.matches_media("(width >= 800px)"));
        assert!(env.matches_media("(700px < width)"));
        assert!(!env.matches_media("(height > 40em)"));
        assert!(env.matches_media("(orientation: landscape)"));
        assert!(env.matches_media("(min-aspect-ratio: 4/3)"));
    }

    #[test]
    fn test_two_sided_ranges() {
        let env = Environment::screen(800.0, 600.0);
        assert!(env.matches_media("(400px <= width < 900px)"));
        assert!(env.matches_media("(400px < width <= 800px)"));
        assert!(!env.matches_media("(400px <= width < 800px)"));
        assert!(env.matches_media("(1000px > width >= 800px)"));
        assert!(!env.matches_media("screen and (100px < height < 500px)"));
        // mixed directions are malformed
        assert!(!env.matches_media("(400px < width > 100px)"));
        assert!(!env.matches_media("(400px = width = 400px)"));

        let query = MediaQuery::parse(&tokenize("(400px <= width < 900px)")).unwrap();
        assert_eq!(
            query.features,
            vec![
                MediaFeature::Range { name: RangeFeature::Width, op: ComparisonOp::Ge, value: 400.0 },
                MediaFeature::Range { name: RangeFeature::Width, op: ComparisonOp::Lt, value: 900.0 },
            ]
        );
    }

    #[test]
    fn test_device_features() {
        let env = Environment::screen(800.0, 600.0)
            .with_device_pixel_ratio(2.0)
            .with_color_scheme(ColorScheme::Dark);
        assert!(env.matches_media("(min-resolution: 2dppx)"));
        assert!(env.matches_media("(resolution: 192dpi)"));
        assert!(env.matches_media("(color)"));
        assert!(!env.matches_media("(monochrome)"));
        assert!(env.matches_media("(grid: 0)"));
        assert!(!env.matches_media("(grid)"));
        assert!(env.matches_media("(prefers-color-scheme: dark)"));
    }

    #[test]
    fn test_malformed_is_false() {
        let env = Environment::screen(800.0, 600.0);
        assert!(!env.matches_media("(min-width: red)"));
        assert!(!env.matches_media("screen and"));
        assert!(!env.matches_media("(unknown-feature: 1)"));
        assert!(env.matches_media("(bogus), screen"));
    }
}
