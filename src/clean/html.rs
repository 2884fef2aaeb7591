//! Structural cleanup passes over a parsed content document.
//!
//! Each pass runs a selector query, collects its matches up front, then
//! mutates the tree. Where deletion would break internal fragment links,
//! the element's id survives on an empty anchor put in its place.

use html5ever::{QualName, local_name, namespace_url, ns};
use kuchiki::{Attribute, ElementData, ExpandedName, NodeDataRef, NodeRef};
use regex_lite::{Captures, Regex};

/// Inline wrappers that carry styling but no content of their own.
const INLINE_STYLE_TAGS: &[&str] = &["b", "em", "i", "span", "strong", "u"];

/// Void elements per the HTML spec; their self-closing form is valid as-is.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Expand self-closing syntax on non-void elements into explicit open/close
/// pairs.
///
/// The HTML parser follows void-element rules, so an XHTML `<div/>` would
/// otherwise swallow the rest of the document into the div.
pub fn expand_self_closing_tags(html: &str) -> String {
    let pattern = Regex::new(r"<(\w+)(\b[^>]*?)?/>").unwrap();
    pattern
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[1];
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                caps[0].to_string()
            } else {
                format!("<{tag}{attrs}></{tag}>")
            }
        })
        .into_owned()
}

/// Delete spans with no child elements and only-whitespace text.
pub fn remove_empty_spans(document: &NodeRef) {
    for span in select_all(document, "span") {
        let node = span.as_node();
        if element_child_count(node) == 0 && node.text_contents().trim().is_empty() {
            node.detach();
        }
    }
}

/// Delete divs with no child elements and only-whitespace text.
///
/// A div carrying an id is replaced by an empty anchor with the same id
/// instead, since links elsewhere in the book may target it.
pub fn remove_empty_divs(document: &NodeRef) {
    for div in select_all(document, "div") {
        let node = div.as_node();
        if element_child_count(node) > 0 || !node.text_contents().trim().is_empty() {
            continue;
        }
        let id = div.attributes.borrow().get("id").map(str::to_string);
        match id {
            Some(id) if !id.is_empty() => {
                node.insert_after(anchor_node(&id));
                node.detach();
            }
            _ => node.detach(),
        }
    }
}

/// Remove paragraphs and list items that hold nothing but a line break and
/// inert inline wrappers.
pub fn remove_line_breaks(document: &NodeRef) {
    for br in select_all(document, "p > br, li > br") {
        let Some(parent) = br.as_node().parent() else {
            continue;
        };
        if !parent.text_contents().trim().is_empty() {
            continue;
        }
        let all_inert = parent
            .children()
            .filter(|child| child != br.as_node())
            .filter_map(NodeRef::into_element_ref)
            .all(|element| INLINE_STYLE_TAGS.contains(&element.name.local.as_ref()));
        if all_inert {
            parent.detach();
        }
    }
}

/// Unwrap divs and blockquotes that do nothing but contain the whole body.
///
/// Repeats until the body no longer consists of a single wrapper, so
/// arbitrarily nested wrapper chains collapse completely. Ids move onto an
/// anchor prepended to the unwrapped content.
pub fn remove_containers(document: &NodeRef) {
    let Ok(body) = document.select_first("body") else {
        return;
    };
    let body = body.as_node().clone();

    loop {
        let children: Vec<NodeDataRef<ElementData>> = body
            .children()
            .filter_map(NodeRef::into_element_ref)
            .filter(|element| {
                !(element.name.local.as_ref() == "a"
                    && element.attributes.borrow().contains("id"))
            })
            .collect();
        if children.len() != 1 {
            return;
        }
        let container = &children[0];
        if !matches!(container.name.local.as_ref(), "div" | "blockquote") {
            return;
        }

        let node = container.as_node();
        let mut replacements: Vec<NodeRef> = Vec::new();
        {
            let attributes = container.attributes.borrow();
            if let Some(id) = attributes.get("id")
                && !id.is_empty()
            {
                replacements.push(anchor_node(id));
            }
        }
        // Child nodes, not child elements: text must move too.
        replacements.extend(node.children());
        for replacement in replacements {
            node.insert_before(replacement);
        }
        node.detach();
    }
}

/// Unwrap `b`/`strong` inside headings; headings are already bold and the
/// doubled weight renders badly.
pub fn remove_bold_in_headings(document: &NodeRef) {
    for heading in select_all(document, "h1, h2, h3, h4, h5, h6") {
        for bold in select_all(heading.as_node(), "b, strong") {
            unwrap_element(bold.as_node());
        }
    }
}

/// Unwrap blockquotes inside headings and list items, where they are an
/// indentation hack rather than a quotation.
pub fn remove_excess_blockquotes(document: &NodeRef) {
    for element in select_all(document, "h1, h2, h3, h4, h5, h6, li") {
        for blockquote in select_all(element.as_node(), "blockquote") {
            unwrap_element(blockquote.as_node());
        }
    }
}

/// Run a selector query and collect the matches so the tree can be mutated
/// while walking the result.
pub(crate) fn select_all(node: &NodeRef, selectors: &str) -> Vec<NodeDataRef<ElementData>> {
    node.select(selectors)
        .expect("selector must compile")
        .collect()
}

fn element_child_count(node: &NodeRef) -> usize {
    node.children()
        .filter(|child| child.as_element().is_some())
        .count()
}

/// Replace an element by its own child nodes, in place.
fn unwrap_element(node: &NodeRef) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        node.insert_before(child);
    }
    node.detach();
}

fn anchor_node(id: &str) -> NodeRef {
    NodeRef::new_element(
        QualName::new(None, ns!(html), local_name!("a")),
        vec![(
            ExpandedName::new(ns!(), local_name!("id")),
            Attribute {
                prefix: None,
                value: id.to_string(),
            },
        )],
    )
}
