//! # reprint
//!
//! Rework an EPUB's styling for constrained e-ink reading devices.
//!
//! Book stylesheets tend to be written for phone and tablet apps: colors,
//! custom fonts, media queries, pixel-tuned layout. On a small e-ink screen
//! most of that renders badly or not at all. reprint strips each content
//! document down to a small, safe styling vocabulary and injects a fixed set
//! of replacement rules, while keeping reading order, navigation, and
//! internal links intact.
//!
//! ## Quick Start
//!
//! ```no_run
//! use reprint::{clean_book, read_epub, write_epub};
//!
//! let mut book = read_epub("input.epub")?;
//! clean_book(&mut book)?;
//! write_epub(&book, "output.epub")?;
//! # Ok::<(), reprint::Error>(())
//! ```
//!
//! The [`Book`] struct is the central data type: resources addressed by
//! package path, a spine, a navigation tree, and bibliographic metadata.
//! The cleaning pipeline replaces the contents of every content document in
//! place and drops stylesheet resources it has inlined.

pub mod book;
pub mod clean;
pub mod css;
pub mod epub;
pub mod error;
pub(crate) mod util;

pub use book::{Book, Date, Meta, Resource, SpineItem, TocEntry};
pub use clean::clean_book;
pub use epub::{read_epub, write_epub};
pub use error::{Error, Result};
