pub mod cascade;
pub mod declaration;
pub mod matcher;
pub mod media;
pub mod properties;
pub mod resolver;
pub mod rule_model;
pub mod selector;
pub mod shorthand;
pub mod stylesheet_parser;
pub mod tokens;
pub mod values;
