//! Stylesheet cleanup operations.
//!
//! These reduce a book's styling to a vocabulary a constrained reading
//! device renders well, and append replacement rules for the structures the
//! reduction leaves bare. All of them work on the parsed rule model; none
//! touch the markup tree.

use regex_lite::{Captures, Regex};

use super::{Declaration, Rule, RuleKind, Stylesheet};
use crate::util::{clean_path, join_path};

/// Properties that survive the general allow-list filter.
///
/// "font-decoration" is not standard CSS, but it shows up in real book
/// stylesheets, so it stays on the list.
const SIMPLE_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "content",
    "display",
    "font-style",
    "font-weight",
    "font-decoration",
    "text-align",
    "text-transform",
    "white-space",
];

/// Rewrite every `url(...)` reference so a rule list written relative to
/// `current_dir` still resolves once it is interpreted relative to
/// `target_dir`.
///
/// Works lexically: climb from the target directory up to the package root,
/// rejoin the current directory, and resolve each URL against the combined
/// relative base. All three url notations are accepted and re-emitted
/// double-quoted.
pub fn rebase_urls(ss: &mut Stylesheet, current_dir: &str, target_dir: &str) {
    let current_dir = clean_path(current_dir);
    let target_dir = clean_path(target_dir);

    let climb_to_root = "../".repeat(target_dir.split('/').count());
    let rel_to_current = clean_path(&join_path(&climb_to_root, &current_dir));

    let url_pattern = Regex::new(r#"url\("(.+?)"\)|url\('(.+?)'\)|url\((.+?)\)"#).unwrap();
    for rule in &mut ss.rules {
        rebase_rule_urls(rule, &url_pattern, &rel_to_current);
    }
}

fn rebase_rule_urls(rule: &mut Rule, url_pattern: &Regex, rel_to_current: &str) {
    for nested in &mut rule.rules {
        rebase_rule_urls(nested, url_pattern, rel_to_current);
    }
    for declaration in &mut rule.declarations {
        declaration.value = url_pattern
            .replace_all(&declaration.value, |caps: &Captures| {
                let url = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map_or("", |m| m.as_str());
                format!("url(\"{}\")", clean_path(&join_path(rel_to_current, url)))
            })
            .into_owned();
    }
}

/// Drop all top-level `@media` rules. Media queries target capabilities the
/// output device does not have.
pub fn remove_media_rules(ss: &mut Stylesheet) {
    ss.rules.retain(|rule| rule.kind != RuleKind::Media);
}

/// Drop all top-level `@keyframes` rules.
pub fn remove_keyframe_rules(ss: &mut Stylesheet) {
    ss.rules.retain(|rule| rule.kind != RuleKind::Keyframes);
}

/// Drop all top-level `@font-face` rules.
pub fn remove_font_face_rules(ss: &mut Stylesheet) {
    ss.rules.retain(|rule| rule.kind != RuleKind::FontFace);
}

/// Remove color declarations everywhere; e-ink has nothing to do with them.
pub fn remove_colors(ss: &mut Stylesheet) {
    for rule in &mut ss.rules {
        strip_declarations(rule, &|declaration| {
            declaration.property == "color" || declaration.property == "background-color"
        });
    }
}

/// Remove `text-align: justify`; the device justifies body text itself.
pub fn remove_text_align_justify(ss: &mut Stylesheet) {
    for rule in &mut ss.rules {
        strip_declarations(rule, &|declaration| {
            declaration.property == "text-align" && declaration.value == "justify"
        });
    }
}

/// Keep only declarations in the general allow-list, recursing into nested
/// rules first.
pub fn keep_simple_styles(ss: &mut Stylesheet) {
    for rule in &mut ss.rules {
        keep_rule_simple_styles(rule);
    }
}

fn keep_rule_simple_styles(rule: &mut Rule) {
    for nested in &mut rule.rules {
        keep_rule_simple_styles(nested);
    }
    rule.declarations
        .retain(|declaration| SIMPLE_PROPERTIES.contains(&declaration.property.as_str()));
}

fn strip_declarations(rule: &mut Rule, predicate: &dyn Fn(&Declaration) -> bool) {
    for nested in &mut rule.rules {
        strip_declarations(nested, predicate);
    }
    rule.declarations.retain(|declaration| !predicate(declaration));
}

/// A fixed rule block: selector plus (property, value, important) triples.
type FixedBlock = (&'static str, &'static [(&'static str, &'static str, bool)]);

const HEADING_BLOCKS: &[FixedBlock] = &[
    (
        "h1, h2, h3, h4, h5, h6",
        &[
            ("font-weight", "bold", false),
            ("-webkit-hyphens", "none", true),
            ("hyphens", "none", true),
            ("page-break-inside", "avoid", false),
            ("page-break-after", "avoid", false),
        ],
    ),
    // To distinguish smaller headings from body text
    ("h5, h6", &[("text-transform", "uppercase", false)]),
];

const FIGURE_BLOCKS: &[FixedBlock] = &[(
    ".figure, figure",
    &[("page-break-inside", "avoid", false)],
)];

const ASIDE_BLOCKS: &[FixedBlock] = &[(
    r#"aside, .aside, .box, .boxg, .note, .note1, sidebar, .sidebar1, [data-type="note"], [data-type="tip"], [data-type="warning"]"#,
    &[
        ("border", "1px dotted #ddd", false),
        ("padding", "0em 1em", true),
        ("margin-top", "1em", true),
        ("margin-bottom", "1em", true),
        ("page-break-inside", "avoid", false),
    ],
)];

const TABLE_BLOCKS: &[FixedBlock] = &[
    ("table", &[("border-collapse", "collapse", false)]),
    ("td, th", &[("padding", "0 0.5em", false)]),
];

fn append_blocks(ss: &mut Stylesheet, blocks: &[FixedBlock]) {
    for (selector, declarations) in blocks {
        ss.rules.push(Rule::style(
            *selector,
            declarations
                .iter()
                .map(|(property, value, important)| Declaration {
                    property: (*property).to_string(),
                    value: (*value).to_string(),
                    important: *important,
                })
                .collect(),
        ));
    }
}

pub fn add_heading_styles(ss: &mut Stylesheet) {
    append_blocks(ss, HEADING_BLOCKS);
}

pub fn add_figure_styles(ss: &mut Stylesheet) {
    append_blocks(ss, FIGURE_BLOCKS);
}

pub fn add_aside_styles(ss: &mut Stylesheet) {
    append_blocks(ss, ASIDE_BLOCKS);
}

pub fn add_table_styles(ss: &mut Stylesheet) {
    append_blocks(ss, TABLE_BLOCKS);
}
