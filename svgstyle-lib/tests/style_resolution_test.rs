use pretty_assertions::assert_eq;
use svgstyle_lib::dom::dom_tree::{attribute, set_attribute};
use svgstyle_lib::style::declaration::StyleDeclaration;
use svgstyle_lib::style::properties::{inherited_properties, PropertyLookup, PropertyRegistry};
use svgstyle_lib::style::rule_model::{RuleKind, SheetOrigin};
use svgstyle_lib::{ComputedStyle, Document, Environment, MemoryLoader, StyleContext, StyleValue};

fn keyword<'s>(style: &'s ComputedStyle, name: &str) -> &'s str {
    style.get(name).and_then(StyleValue::as_keyword).unwrap_or("<missing>")
}

#[test]
fn shorthand_values_read_back_after_set() {
    let style = StyleDeclaration::detached(PropertyRegistry::standard());
    style.set_property("overflow", "hidden auto", "").unwrap();
    style.set_property("font-synthesis", "style weight", "").unwrap();
    style.set_property("font", "italic bold 12px/30px Georgia, serif", "").unwrap();
    assert_eq!(style.get_property_value("overflow"), "hidden auto");
    assert_eq!(style.get_property_value("font-synthesis"), "weight style");
    assert_eq!(style.get_property_value("font"), "italic bold 12px/30px Georgia, serif");

    // one longhand with a different priority leaves no shorthand form
    style.set_property("overflow-y", "auto", "important").unwrap();
    assert_eq!(style.get_property_value("overflow"), "");
    assert_eq!(style.get_property_priority("overflow"), "");

    // a missing longhand does too
    style.remove_property("font-style").unwrap();
    assert_eq!(style.get_property_value("font"), "");
}

#[test]
fn later_rule_wins_regardless_of_specificity() {
    let doc = Document::parse_str(
        r#"<svg xmlns="http://www.w3.org/2000/svg">
             <style>
               svg #target.shape { fill: red }
               rect { fill: blue }
             </style>
             <rect id="target" class="shape"/>
           </svg>"#,
        None,
    )
    .unwrap();
    let ctx = StyleContext::new(Environment::screen(800.0, 600.0));
    let style = ctx.inherited_style(&doc.get_element_by_id("target").unwrap()).unwrap();
    assert_eq!(keyword(&style, "fill"), "blue");
}

#[test]
fn important_value_beats_later_normal_value() {
    let doc = Document::parse_str(
        r#"<svg xmlns="http://www.w3.org/2000/svg">
             <style>
               rect { stroke: red !important }
               #target { stroke: green }
             </style>
             <rect id="target" stroke="yellow"/>
           </svg>"#,
        None,
    )
    .unwrap();
    let ctx = StyleContext::new(Environment::screen(800.0, 600.0));
    let style = ctx.inherited_style(&doc.get_element_by_id("target").unwrap()).unwrap();
    assert_eq!(keyword(&style, "stroke"), "red");
}

#[test]
fn unsupplied_inherited_properties_take_initial_values() {
    let doc = Document::parse_str(
        r#"<svg xmlns="http://www.w3.org/2000/svg"><g fill="inherit"><rect id="target" stroke="inherit"/></g></svg>"#,
        None,
    )
    .unwrap();
    let env = Environment::screen(800.0, 600.0);
    let ctx = StyleContext::new(env.clone());
    let style = ctx.inherited_style(&doc.get_element_by_id("target").unwrap()).unwrap();
    let registry = PropertyRegistry::standard();

    for name in inherited_properties() {
        let expected = match *name {
            "font-family" => StyleValue::List(vec![env.default_font_family.clone()]),
            "color" => StyleValue::keyword(env.default_color.clone()),
            _ => StyleValue::keyword(registry.initial_value(name).unwrap_or_default()),
        };
        assert_eq!(style.get(*name), Some(&expected), "{}", name);
    }
}

#[test]
fn print_stylesheet_only_applies_to_print() {
    let doc = Document::parse_str(
        r#"<svg xmlns="http://www.w3.org/2000/svg">
             <style media="print">rect { fill: black }</style>
             <rect id="target" fill="orange"/>
           </svg>"#,
        None,
    )
    .unwrap();
    let rect = doc.get_element_by_id("target").unwrap();

    let screen = StyleContext::new(Environment::screen(800.0, 600.0));
    let print = StyleContext::new(Environment::print(800.0, 600.0));
    let print_rules = |ctx: &StyleContext| {
        ctx.collect_rules(&rect)
            .iter()
            .filter(|rule| matches!(&rule.kind, RuleKind::Style { selector_text, .. } if selector_text == "rect"))
            .count()
    };
    assert_eq!(print_rules(&screen), 0);
    assert_eq!(print_rules(&print), 1);
    assert_eq!(keyword(&screen.inherited_style(&rect).unwrap(), "fill"), "orange");
    assert_eq!(keyword(&print.inherited_style(&rect).unwrap(), "fill"), "black");
}

#[test]
fn font_feature_values_rule_is_parsed() {
    let ctx = StyleContext::new(Environment::screen(800.0, 600.0));
    let sheet = ctx.parser().parse_sheet(
        "@font-feature-values Bongo { @character-variant { alpha-2: 1 2; } }",
        SheetOrigin::default(),
    );
    let rules = sheet.css_rules();
    assert_eq!(rules.len(), 1);
    match &rules[0].kind {
        RuleKind::FontFeatureValues(values) => {
            assert_eq!(values.font_family, "Bongo");
            assert_eq!(values.character_variant.get("alpha-2"), Some(&vec![1, 2]));
        }
        other => panic!("unexpected rule {:?}", other),
    }
}

#[test]
fn inline_style_edits_track_the_attribute() {
    let doc = Document::parse_str(r#"<svg xmlns="http://www.w3.org/2000/svg"><rect id="target"/></svg>"#, None).unwrap();
    let rect = doc.get_element_by_id("target").unwrap();
    let style = StyleDeclaration::for_element(&rect, PropertyRegistry::standard()).unwrap();

    style.set_property("fill", "white", "").unwrap();
    style.set_property("stroke", "blue", "").unwrap();
    style.set_property("stroke-width", "5", "").unwrap();
    style.remove_property("stroke-width").unwrap();

    let names: Vec<String> = style.items().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["fill", "stroke"]);
    assert_eq!(attribute(&rect, "style").as_deref(), Some("fill: white; stroke: blue"));

    style.remove_property("fill").unwrap();
    style.remove_property("stroke").unwrap();
    assert_eq!(attribute(&rect, "style"), None);
}

#[test]
fn font_variant_none_needs_normal_longhands() {
    let style = StyleDeclaration::detached(PropertyRegistry::standard());
    style.set_property("font-variant", "none", "").unwrap();
    assert_eq!(style.get_property_value("font-variant"), "none");

    style.set_property("font-variant-numeric", "oldstyle-nums", "").unwrap();
    assert_eq!(style.get_property_value("font-variant"), "");
}

#[test]
fn computed_style_is_idempotent() {
    let loader = MemoryLoader::new()
        .with_resource("file:///styles/base.css", Some("text/css"), b"@import url(theme.css); g { font-size: 150% }")
        .with_resource("file:///styles/theme.css", Some("text/css"), b"text { font-weight: bolder; stroke-width: 2% }");
    let doc = Document::parse_str(
        r#"<?xml-stylesheet href="base.css"?>
           <svg xmlns="http://www.w3.org/2000/svg" font-size="12px">
             <g><text id="target" style="line-height: 1.5em">hi</text></g>
           </svg>"#,
        Some(url::Url::parse("file:///styles/drawing.svg").unwrap()),
    )
    .unwrap();
    let ctx = StyleContext::new(Environment::screen(640.0, 480.0)).with_loader(Box::new(loader));
    let text = doc.get_element_by_id("target").unwrap();

    let first = ctx.computed_style(&text).unwrap();
    let second = ctx.computed_style(&text).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get("font-size"), Some(&StyleValue::Length(18.0)));
    assert_eq!(first.get("font-weight"), Some(&StyleValue::Number(700.0)));
    assert_eq!(first.get("line-height"), Some(&StyleValue::Length(27.0)));

    // an edit to the element is picked up by the next resolution
    set_attribute(&text, "style", "line-height: 2").unwrap();
    let third = ctx.computed_style(&text).unwrap();
    assert_eq!(third.get("line-height"), Some(&StyleValue::Number(2.0)));
}
