//! Format-agnostic ebook model shared by the reader, the cleaning pipeline,
//! and the writer.

use crate::error::{Error, Result};

/// An ebook: metadata, resources, reading order, and navigation.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub title: String,
    /// Value of the package's unique identifier.
    pub identifier: String,
    pub creators: Vec<String>,
    pub publisher: String,
    pub language: String,
    pub subjects: Vec<String>,
    pub rights: String,
    pub source: String,
    pub dates: Vec<Date>,
    /// Free-form name/value metadata carried through from the package.
    pub metas: Vec<Meta>,
    pub resources: Vec<Resource>,
    pub spine: Vec<SpineItem>,
    /// Manifest id of the cover image, when the package declares one.
    pub cover_image_id: Option<String>,
    pub toc: Vec<TocEntry>,
}

/// A resource (content document, image, stylesheet, font, etc.).
///
/// The path is the resource's identity within the book and stays stable
/// across the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    pub path: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// An entry in the reading order. `id` matches some [`Resource::id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub id: String,
    pub linear: bool,
}

/// A table of contents entry (hierarchical).
///
/// `href` is a resource path plus an optional `#fragment`; `play_order` is
/// carried through from the source package, never recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocEntry {
    pub id: String,
    pub play_order: u32,
    pub label: String,
    pub href: String,
    pub children: Vec<TocEntry>,
}

/// Free-form name/value metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub name: String,
    pub content: String,
}

/// A dated publishing event, e.g. `publication` or `modification`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Date {
    pub event: String,
    pub value: String,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resource by its package path.
    pub fn resource_by_path(&self, path: &str) -> Result<&Resource> {
        self.resources
            .iter()
            .find(|resource| resource.path == path)
            .ok_or_else(|| Error::ResourceNotFound(path.to_string()))
    }
}
