//! The cleaning pipeline.
//!
//! Each content document is decomposed into a markup tree plus one merged
//! stylesheet, both are cleaned, and the result is reassembled with the
//! reduced styles inlined into the document head. Stylesheets consumed by
//! the merge are dropped from the book afterwards.

pub mod html;
pub mod styles;

use std::collections::HashSet;

use html5ever::{QualName, local_name, namespace_url, ns};
use kuchiki::traits::TendrilSink;
use kuchiki::{Attribute, ExpandedName, NodeRef};
use percent_encoding::percent_decode_str;

use crate::book::{Book, Resource};
use crate::css::{Stylesheet, transform};
use crate::error::{Error, Result};
use crate::util::{clean_path, join_path, parent_dir};

pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// A content document pulled apart for cleaning.
#[derive(Debug)]
struct DecomposedPage {
    document: NodeRef,
    stylesheet: Stylesheet,
    /// Paths of linked stylesheet resources merged into the page.
    consumed_paths: Vec<String>,
}

/// Clean every content document in the book.
///
/// Documents are independent of one another; any single failure aborts the
/// whole run. Consumed stylesheet resources are removed from the book and
/// the rewritten documents appended in their place, keeping their original
/// paths.
pub fn clean_book(book: &mut Book) -> Result<()> {
    let mut replacements: Vec<Resource> = Vec::new();
    let mut deletable: HashSet<String> = HashSet::new();

    for resource in &book.resources {
        if resource.media_type != XHTML_MEDIA_TYPE {
            continue;
        }
        let DecomposedPage {
            document,
            mut stylesheet,
            consumed_paths,
        } = decompose_page(resource, book)?;

        clean_page(&document, &mut stylesheet)?;

        replacements.push(Resource {
            id: resource.id.clone(),
            path: resource.path.clone(),
            media_type: resource.media_type.clone(),
            data: serialize_document(&document)?.into_bytes(),
        });
        deletable.insert(resource.path.clone());
        deletable.extend(consumed_paths);
    }

    book.resources.retain(|resource| !deletable.contains(&resource.path));
    book.resources.extend(replacements);
    Ok(())
}

/// Parse a page and pull its styling out into one merged rule list.
///
/// Inline `<style>` text is taken as-is; each `<link rel=stylesheet>` target
/// is resolved against the page's directory, parsed, and rebased so its
/// relative URLs keep working from the page's location. The style and link
/// nodes are removed from the tree.
fn decompose_page(page: &Resource, book: &Book) -> Result<DecomposedPage> {
    let text = String::from_utf8(page.data.clone())?;
    let document = kuchiki::parse_html().one(html::expand_self_closing_tags(&text));

    let style_nodes = html::select_all(&document, "style");
    let link_nodes = html::select_all(&document, "link[rel=stylesheet]");

    let mut merged_styles = String::new();
    for style in &style_nodes {
        merged_styles.push_str(&style.as_node().text_contents());
    }

    let page_dir = parent_dir(&page.path);
    let mut consumed_paths = Vec::new();
    for link in &link_nodes {
        let href = link
            .attributes
            .borrow()
            .get("href")
            .map(str::to_string)
            .ok_or_else(|| Error::MalformedReference("link missing href attribute".to_string()))?;
        let href = percent_decode_str(&href).decode_utf8_lossy().into_owned();
        let stylesheet_path = clean_path(&join_path(&page_dir, &href));

        let stylesheet_resource = book.resource_by_path(&stylesheet_path)?;
        let css_text = String::from_utf8(stylesheet_resource.data.clone())?;
        let mut linked = Stylesheet::parse(&css_text);
        transform::rebase_urls(&mut linked, &parent_dir(&stylesheet_path), &page_dir);
        merged_styles.push_str(&linked.render());

        consumed_paths.push(stylesheet_resource.path.clone());
    }

    for node in style_nodes.iter().chain(link_nodes.iter()) {
        node.as_node().detach();
    }

    Ok(DecomposedPage {
        document,
        stylesheet: Stylesheet::parse(&merged_styles),
        consumed_paths,
    })
}

/// Run the fixed cleanup sequence over one decomposed page and re-inject
/// the surviving styles into its head.
fn clean_page(document: &NodeRef, ss: &mut Stylesheet) -> Result<()> {
    styles::extract_inline_styles(document, ss);
    // Runs against the unfiltered rules: sizing information has to be
    // rescued before the allow-list filter throws it away.
    let image_sheet = styles::extract_image_styles(document, ss);

    transform::remove_media_rules(ss);
    transform::remove_keyframe_rules(ss);
    transform::remove_font_face_rules(ss);
    transform::remove_colors(ss);
    transform::remove_text_align_justify(ss);

    transform::keep_simple_styles(ss);
    transform::add_heading_styles(ss);
    transform::add_figure_styles(ss);
    transform::add_aside_styles(ss);
    transform::add_table_styles(ss);

    html::remove_empty_spans(document);
    html::remove_empty_divs(document);
    html::remove_line_breaks(document);
    html::remove_containers(document);
    html::remove_bold_in_headings(document);
    html::remove_excess_blockquotes(document);

    append_style_element(document, &ss.render())?;
    let rendered_image_styles = image_sheet.render();
    if !rendered_image_styles.is_empty() {
        append_style_element(document, &rendered_image_styles)?;
    }
    Ok(())
}

fn append_style_element(document: &NodeRef, css_text: &str) -> Result<()> {
    let head = document
        .select_first("head")
        .map_err(|()| Error::Serialization("document has no head element".to_string()))?;
    let style = NodeRef::new_element(
        QualName::new(None, ns!(html), local_name!("style")),
        vec![(
            ExpandedName::new(ns!(), local_name!("type")),
            Attribute {
                prefix: None,
                value: "text/css".to_string(),
            },
        )],
    );
    style.append(NodeRef::new_text(css_text));
    head.as_node().append(style);
    Ok(())
}

fn serialize_document(document: &NodeRef) -> Result<String> {
    let mut bytes = Vec::new();
    document
        .serialize(&mut bytes)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
