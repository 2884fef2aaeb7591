//! Style extraction: inline `style` attributes and per-image styling become
//! synthesized class rules, so they survive the stylesheet reduction.

use kuchiki::{Attributes, ElementData, NodeDataRef, NodeRef, Selectors};

use super::html::select_all;
use crate::css::{Declaration, Rule, RuleKind, Stylesheet, parse_declarations};

/// Layout-affecting properties rescued for images. Wider than the general
/// allow-list: `width`, `height`, and margins have to survive for images
/// even though the general filter drops them.
const IMAGE_LAYOUT_PROPERTIES: &[&str] = &[
    "content",
    "display",
    "height",
    "margin",
    "margin-bottom",
    "margin-left",
    "margin-right",
    "margin-top",
    "text-align",
    "width",
];

/// Move every inline `style` attribute into a synthesized class rule.
///
/// Class names are `reprint_<tag>_<n>` with `n` increasing in tree order,
/// so a given document always produces the same names. The extracted
/// declarations are all marked `!important`: they carried the highest
/// effective precedence while inline.
pub fn extract_inline_styles(document: &NodeRef, ss: &mut Stylesheet) {
    for (index, element) in select_all(document, "[style]").iter().enumerate() {
        let class_name = format!("reprint_{}_{}", element.name.local, index);
        let style_text = {
            let mut attributes = element.attributes.borrow_mut();
            let style_text = attributes.get("style").map(str::to_string).unwrap_or_default();
            attributes.remove("style");
            add_class(&mut attributes, &class_name);
            style_text
        };

        let mut declarations = parse_declarations(&style_text);
        for declaration in &mut declarations {
            declaration.important = true;
        }
        ss.rules.push(Rule::style(format!(".{class_name}"), declarations));
    }
}

/// Rescue layout styling for images into a separate stylesheet before the
/// general allow-list filter destroys it.
///
/// For each `img`, every style rule whose selector matches the element
/// contributes its layout-allow-listed declarations to a synthesized
/// `reprint_images_<n>` class. The immediate parent gets the same
/// treatment when it is a `figure` or `span` wrapper. Matching is boolean
/// per rule in document order, with no specificity or cascade weighting;
/// later matches simply append, so the last one wins when rendered.
pub fn extract_image_styles(document: &NodeRef, ss: &Stylesheet) -> Stylesheet {
    let mut image_sheet = Stylesheet::default();

    // Compile each selector once. A selector kuchiki cannot compile can
    // never match an element here, so it is skipped.
    let compiled: Vec<(Selectors, &Rule)> = ss
        .rules
        .iter()
        .filter(|rule| rule.kind == RuleKind::Style)
        .filter_map(|rule| {
            Selectors::compile(&rule.selector)
                .ok()
                .map(|selectors| (selectors, rule))
        })
        .collect();

    let mut wrapper_index = 0usize;
    for (image_index, image) in select_all(document, "img").iter().enumerate() {
        let declarations = matching_layout_declarations(image, &compiled);
        if !declarations.is_empty() {
            let class_name = format!("reprint_images_{image_index}");
            add_class(&mut image.attributes.borrow_mut(), &class_name);
            image_sheet
                .rules
                .push(Rule::style(format!(".{class_name}"), declarations));
        }

        let Some(wrapper) = image
            .as_node()
            .parent()
            .and_then(NodeRef::into_element_ref)
        else {
            continue;
        };
        if !matches!(wrapper.name.local.as_ref(), "figure" | "span") {
            continue;
        }
        let declarations = matching_layout_declarations(&wrapper, &compiled);
        if declarations.is_empty() {
            continue;
        }
        let class_name = format!("reprint_images_{image_index}_{wrapper_index}");
        wrapper_index += 1;
        add_class(&mut wrapper.attributes.borrow_mut(), &class_name);
        image_sheet
            .rules
            .push(Rule::style(format!(".{class_name}"), declarations));
    }

    image_sheet
}

fn matching_layout_declarations(
    element: &NodeDataRef<ElementData>,
    rules: &[(Selectors, &Rule)],
) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for (selectors, rule) in rules {
        if selectors.matches(element) {
            declarations.extend(
                rule.declarations
                    .iter()
                    .filter(|declaration| {
                        IMAGE_LAYOUT_PROPERTIES.contains(&declaration.property.as_str())
                    })
                    .cloned(),
            );
        }
    }
    declarations
}

fn add_class(attributes: &mut Attributes, class_name: &str) {
    let updated = match attributes.get("class") {
        Some(existing) if !existing.trim().is_empty() => format!("{existing} {class_name}"),
        _ => class_name.to_string(),
    };
    attributes.insert("class", updated);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::TendrilSink;

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html)
    }

    #[test]
    fn test_extract_inline_styles() {
        let document = parse(
            "<html><body>\n<h1 style=\"text-align: center;\">Heading</h1>\n</body></html>",
        );
        let mut ss = Stylesheet::default();
        extract_inline_styles(&document, &mut ss);

        let heading = document.select_first("h1").unwrap();
        let attributes = heading.attributes.borrow();
        assert_eq!(attributes.get("class"), Some("reprint_h1_0"));
        assert_eq!(attributes.get("style"), None);

        assert_eq!(
            ss.render(),
            ".reprint_h1_0 {\n    text-align: center !important;\n}\n"
        );
    }

    #[test]
    fn test_extract_inline_styles_numbering_and_existing_class() {
        let document = parse(
            r#"<html><body>
<p style="margin: 0">One</p>
<p class="lead" style="text-indent: 2em">Two</p>
</body></html>"#,
        );
        let mut ss = Stylesheet::default();
        extract_inline_styles(&document, &mut ss);

        let paragraphs = select_all(&document, "p");
        assert_eq!(
            paragraphs[0].attributes.borrow().get("class"),
            Some("reprint_p_0")
        );
        assert_eq!(
            paragraphs[1].attributes.borrow().get("class"),
            Some("lead reprint_p_1")
        );
        assert_eq!(ss.rules.len(), 2);
        assert_eq!(ss.rules[1].selector, ".reprint_p_1");
        assert!(ss.rules[1].declarations[0].important);
    }

    #[test]
    fn test_extract_image_styles() {
        let document = parse(
            r#"<html><body>
<figure class="fig"><img src="pic.png"/></figure>
</body></html>"#,
        );
        let ss = Stylesheet::parse(
            "img { width: 100%; }\nfigure { width: 2em; line-height: 1.5; }",
        );
        let image_sheet = extract_image_styles(&document, &ss);

        let image = document.select_first("img").unwrap();
        assert_eq!(
            image.attributes.borrow().get("class"),
            Some("reprint_images_0")
        );
        let figure = document.select_first("figure").unwrap();
        assert_eq!(
            figure.attributes.borrow().get("class"),
            Some("fig reprint_images_0_0")
        );

        assert_eq!(
            image_sheet.render(),
            ".reprint_images_0 {\n    width: 100%;\n}\n.reprint_images_0_0 {\n    width: 2em;\n}\n"
        );
    }

    #[test]
    fn test_extract_image_styles_ignores_unmatched_images() {
        let document = parse(r#"<html><body><img src="pic.png"/></body></html>"#);
        let ss = Stylesheet::parse(".banner img { width: 100%; }");
        let image_sheet = extract_image_styles(&document, &ss);

        assert!(image_sheet.is_empty());
        let image = document.select_first("img").unwrap();
        assert_eq!(image.attributes.borrow().get("class"), None);
    }

    #[test]
    fn test_extract_image_styles_last_match_wins_in_order() {
        let document = parse(r#"<html><body><img class="wide" src="pic.png"/></body></html>"#);
        let ss = Stylesheet::parse("img { width: 50%; }\n.wide { width: 100%; }");
        let image_sheet = extract_image_styles(&document, &ss);

        let declarations = &image_sheet.rules[0].declarations;
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[1].value, "100%");
    }

    #[test]
    fn test_extract_image_styles_skips_non_wrapper_parent() {
        let document = parse(r#"<html><body><div><img src="pic.png"/></div></body></html>"#);
        let ss = Stylesheet::parse("div { width: 10em; } img { width: 100%; }");
        let image_sheet = extract_image_styles(&document, &ss);

        assert_eq!(image_sheet.rules.len(), 1);
        assert_eq!(image_sheet.rules[0].selector, ".reprint_images_0");
    }
}
