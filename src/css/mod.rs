//! In-memory stylesheet model.
//!
//! A parsed stylesheet is a flat list of [`Rule`]s; at-rules may nest
//! further rules (`@media`, `@keyframes`) or carry declarations directly
//! (`@font-face`, `@page`). The model does no cascade resolution: rules are
//! kept in document order and rendered back out canonically.

mod parsing;
pub mod transform;

pub use parsing::parse_declarations;

/// What kind of rule this is. Style rules render as `selector { ... }`,
/// at-rules as `@keyword prelude { ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    Style,
    Media,
    Keyframes,
    FontFace,
    /// Any other at-rule, holding its keyword (e.g. `page`, `supports`).
    Other(String),
}

impl RuleKind {
    fn from_at_keyword(name: &str) -> RuleKind {
        match name {
            "media" => RuleKind::Media,
            "keyframes" => RuleKind::Keyframes,
            "font-face" => RuleKind::FontFace,
            other => RuleKind::Other(other.to_string()),
        }
    }

    /// The `@` keyword rendered ahead of the prelude, if any.
    fn keyword(&self) -> Option<String> {
        match self {
            RuleKind::Style => None,
            RuleKind::Media => Some("@media".to_string()),
            RuleKind::Keyframes => Some("@keyframes".to_string()),
            RuleKind::FontFace => Some("@font-face".to_string()),
            RuleKind::Other(name) => Some(format!("@{name}")),
        }
    }
}

/// A single `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Declaration {
        Declaration {
            property: property.into(),
            value: value.into(),
            important: false,
        }
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&self.property);
        out.push_str(": ");
        out.push_str(&self.value);
        if self.important {
            out.push_str(" !important");
        }
    }
}

/// A style rule or at-rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    /// Selector text for style rules, prelude text for at-rules.
    pub selector: String,
    pub declarations: Vec<Declaration>,
    /// Nested rules; empty for style rules.
    pub rules: Vec<Rule>,
}

impl Rule {
    pub fn style(selector: impl Into<String>, declarations: Vec<Declaration>) -> Rule {
        Rule {
            kind: RuleKind::Style,
            selector: selector.into(),
            declarations,
            rules: Vec::new(),
        }
    }
}

/// A parsed stylesheet: rules in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Parse a CSS text blob. Unparseable rules are dropped, as browsers do.
    pub fn parse(css: &str) -> Stylesheet {
        Stylesheet {
            rules: parsing::parse_rules(css),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Canonical textual form: four-space indent per nesting level, one
    /// declaration per line. A rule whose body renders empty is omitted
    /// entirely, selector line included.
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for rule in &self.rules {
            render_rule(&mut rendered, rule, 0);
        }
        rendered
    }
}

fn render_rule(out: &mut String, rule: &Rule, indent_level: usize) {
    const INDENT: &str = "    ";
    let base_indent = INDENT.repeat(indent_level);

    let mut children = String::new();
    for declaration in &rule.declarations {
        children.push_str(&base_indent);
        children.push_str(INDENT);
        declaration.render_into(&mut children);
        children.push_str(";\n");
    }
    for nested in &rule.rules {
        render_rule(&mut children, nested, indent_level + 1);
    }
    if children.is_empty() {
        return;
    }

    out.push_str(&base_indent);
    if let Some(keyword) = rule.kind.keyword() {
        out.push_str(&keyword);
        out.push(' ');
    }
    if !rule.selector.is_empty() {
        out.push_str(&rule.selector);
        out.push(' ');
    }
    out.push_str("{\n");
    out.push_str(&children);
    out.push_str(&base_indent);
    out.push_str("}\n");
}
