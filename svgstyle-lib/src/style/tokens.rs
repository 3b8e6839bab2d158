use cssparser::{serialize_string, ParseError, Parser, ParserInput, ToCss, Token};
use std::fmt;

// ------------------------------
// 1. Owned component values
// ------------------------------

/// Bracket flavour of a simple block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `( ... )`
    Paren,
    /// `[ ... ]`
    Square,
    /// `{ ... }`
    Curly,
}

/// A CSS component value with owned data, detached from the input buffer.
/// Numeric variants keep the tokenizer's own serialization in `repr`.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    Ident(String),
    AtKeyword(String),
    Hash(String),
    String(String),
    Url(String),
    Delim(char),
    Number {
        value: f32,
        int_value: Option<i32>,
        repr: String,
    },
    /// `value` is in percent units, so `50%` holds `50.0`.
    Percentage { value: f32, repr: String },
    Dimension {
        value: f32,
        unit: String,
        repr: String,
    },
    Whitespace,
    Colon,
    Semicolon,
    Comma,
    Function {
        name: String,
        arguments: Vec<ComponentValue>,
    },
    Block {
        kind: BlockKind,
        contents: Vec<ComponentValue>,
    },
    /// Anything else (CDO/CDC, unmatched closing brackets, bad strings and urls).
    Other(String),
}

impl ComponentValue {
    pub fn is_whitespace(&self) -> bool {
        matches!(self, ComponentValue::Whitespace)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            ComponentValue::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_ident(&self, expected: &str) -> bool {
        self.as_ident()
            .map_or(false, |name| name.eq_ignore_ascii_case(expected))
    }

    pub fn to_css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentValue::Ident(name) => f.write_str(name),
            ComponentValue::AtKeyword(name) => write!(f, "@{}", name),
            ComponentValue::Hash(name) => write!(f, "#{}", name),
            ComponentValue::String(value) => serialize_string(value, f),
            ComponentValue::Url(value) => {
                f.write_str("url(")?;
                serialize_string(value, f)?;
                f.write_str(")")
            }
            ComponentValue::Delim(c) => write!(f, "{}", c),
            ComponentValue::Number { repr, .. }
            | ComponentValue::Percentage { repr, .. }
            | ComponentValue::Dimension { repr, .. } => f.write_str(repr),
            ComponentValue::Whitespace => f.write_str(" "),
            ComponentValue::Colon => f.write_str(":"),
            ComponentValue::Semicolon => f.write_str(";"),
            ComponentValue::Comma => f.write_str(","),
            ComponentValue::Function { name, arguments } => {
                write!(f, "{}(", name)?;
                for value in arguments {
                    write!(f, "{}", value)?;
                }
                f.write_str(")")
            }
            ComponentValue::Block { kind, contents } => {
                let (open, close) = match kind {
                    BlockKind::Paren => ("(", ")"),
                    BlockKind::Square => ("[", "]"),
                    BlockKind::Curly => ("{", "}"),
                };
                f.write_str(open)?;
                for value in contents {
                    write!(f, "{}", value)?;
                }
                f.write_str(close)
            }
            ComponentValue::Other(text) => f.write_str(text),
        }
    }
}

/// Tokenizes `text` into component values. Comments are dropped; whitespace
/// runs are kept as single `Whitespace` values.
pub fn tokenize(text: &str) -> Vec<ComponentValue> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    collect(&mut parser)
}

fn collect<'i, 't>(parser: &mut Parser<'i, 't>) -> Vec<ComponentValue> {
    let mut out = Vec::new();
    loop {
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let value = match token {
            Token::Function(ref name) => ComponentValue::Function {
                name: name.to_string(),
                arguments: nested(parser),
            },
            Token::ParenthesisBlock => ComponentValue::Block {
                kind: BlockKind::Paren,
                contents: nested(parser),
            },
            Token::SquareBracketBlock => ComponentValue::Block {
                kind: BlockKind::Square,
                contents: nested(parser),
            },
            Token::CurlyBracketBlock => ComponentValue::Block {
                kind: BlockKind::Curly,
                contents: nested(parser),
            },
            ref leaf => from_leaf(leaf),
        };
        out.push(value);
    }
    out
}

fn nested<'i, 't>(parser: &mut Parser<'i, 't>) -> Vec<ComponentValue> {
    parser
        .parse_nested_block(|p| Ok::<_, ParseError<'i, ()>>(collect(p)))
        .unwrap_or_default()
}

fn from_leaf(token: &Token<'_>) -> ComponentValue {
    match token {
        Token::Ident(name) => ComponentValue::Ident(name.to_string()),
        Token::AtKeyword(name) => ComponentValue::AtKeyword(name.to_string()),
        Token::Hash(name) | Token::IDHash(name) => ComponentValue::Hash(name.to_string()),
        Token::QuotedString(value) => ComponentValue::String(value.to_string()),
        Token::UnquotedUrl(value) => ComponentValue::Url(value.to_string()),
        Token::Delim(c) => ComponentValue::Delim(*c),
        Token::Number {
            value, int_value, ..
        } => ComponentValue::Number {
            value: *value,
            int_value: *int_value,
            repr: token.to_css_string(),
        },
        Token::Percentage {
            unit_value,
            int_value,
            ..
        } => ComponentValue::Percentage {
            value: int_value.map_or(*unit_value * 100.0, |i| i as f32),
            repr: token.to_css_string(),
        },
        Token::Dimension { value, unit, .. } => ComponentValue::Dimension {
            value: *value,
            unit: unit.to_string(),
            repr: token.to_css_string(),
        },
        Token::WhiteSpace(_) => ComponentValue::Whitespace,
        Token::Colon => ComponentValue::Colon,
        Token::Semicolon => ComponentValue::Semicolon,
        Token::Comma => ComponentValue::Comma,
        other => ComponentValue::Other(other.to_css_string()),
    }
}

// ------------------------------
// 2. Rule and declaration grammar
// ------------------------------

/// One top-level item of a rule list, before any interpretation of its prelude.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRule {
    At {
        name: String,
        prelude: Vec<ComponentValue>,
        block: Option<Vec<ComponentValue>>,
    },
    Qualified {
        prelude: Vec<ComponentValue>,
        block: Vec<ComponentValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDeclaration {
    pub name: String,
    pub value: Vec<ComponentValue>,
    pub important: bool,
}

/// Splits a rule list into at-rules and qualified rules. A qualified rule
/// without a block at end of input is dropped.
pub fn parse_rule_list(values: &[ComponentValue]) -> Vec<RawRule> {
    let mut rules = Vec::new();
    let mut i = 0;
    while i < values.len() {
        match &values[i] {
            ComponentValue::Whitespace | ComponentValue::Semicolon => i += 1,
            ComponentValue::Other(text) if text == "<!--" || text == "-->" => i += 1,
            ComponentValue::AtKeyword(name) => {
                let mut prelude = Vec::new();
                let mut block = None;
                i += 1;
                while i < values.len() {
                    match &values[i] {
                        ComponentValue::Semicolon => {
                            i += 1;
                            break;
                        }
                        ComponentValue::Block {
                            kind: BlockKind::Curly,
                            contents,
                        } => {
                            block = Some(contents.clone());
                            i += 1;
                            break;
                        }
                        other => prelude.push(other.clone()),
                    }
                    i += 1;
                }
                rules.push(RawRule::At {
                    name: name.to_ascii_lowercase(),
                    prelude: trim(&prelude).to_vec(),
                    block,
                });
            }
            _ => {
                let mut prelude = Vec::new();
                let mut block = None;
                while i < values.len() {
                    if let ComponentValue::Block {
                        kind: BlockKind::Curly,
                        contents,
                    } = &values[i]
                    {
                        block = Some(contents.clone());
                        i += 1;
                        break;
                    }
                    prelude.push(values[i].clone());
                    i += 1;
                }
                if let Some(block) = block {
                    rules.push(RawRule::Qualified {
                        prelude: trim(&prelude).to_vec(),
                        block,
                    });
                }
            }
        }
    }
    rules
}

/// Parses a declaration list such as a rule body or a `style` attribute.
/// Malformed declarations are skipped one at a time.
pub fn parse_declaration_list(values: &[ComponentValue]) -> Vec<RawDeclaration> {
    values
        .split(|v| matches!(v, ComponentValue::Semicolon))
        .filter_map(parse_declaration)
        .collect()
}

fn parse_declaration(chunk: &[ComponentValue]) -> Option<RawDeclaration> {
    let chunk = trim(chunk);
    let name = chunk.first()?.as_ident()?.to_ascii_lowercase();
    let rest = trim(&chunk[1..]);
    if !matches!(rest.first(), Some(ComponentValue::Colon)) {
        return None;
    }
    let mut value = trim(&rest[1..]);
    let mut important = false;
    if let Some((last, before)) = value.split_last() {
        if last.is_ident("important") {
            let before = trim(before);
            if let Some((ComponentValue::Delim('!'), head)) = before.split_last() {
                important = true;
                value = trim(head);
            }
        }
    }
    Some(RawDeclaration {
        name,
        value: value.to_vec(),
        important,
    })
}

// ------------------------------
// 3. Helpers
// ------------------------------

pub fn trim(values: &[ComponentValue]) -> &[ComponentValue] {
    let start = values
        .iter()
        .position(|v| !v.is_whitespace())
        .unwrap_or(values.len());
    let end = values
        .iter()
        .rposition(|v| !v.is_whitespace())
        .map_or(start, |i| i + 1);
    &values[start..end.max(start)]
}

/// Serializes a component value list, trimmed.
pub fn serialize(values: &[ComponentValue]) -> String {
    trim(values).iter().map(ComponentValue::to_css).collect()
}

/// Splits on top-level commas, trimming each piece.
pub fn split_commas(values: &[ComponentValue]) -> Vec<&[ComponentValue]> {
    values
        .split(|v| matches!(v, ComponentValue::Comma))
        .map(trim)
        .collect()
}
