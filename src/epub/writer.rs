//! Writing a [`Book`] back out as an EPUB 2 archive.
//!
//! The container descriptor, package document, and NCX are re-derived from
//! the book's resources, spine, and navigation tree; the writer refuses a
//! book whose spine or navigation references resources that no longer
//! exist.

use std::io::{Seek, Write};
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::book::{Book, TocEntry};
use crate::error::{Error, Result};

/// Write a [`Book`] to an EPUB file on disk.
pub fn write_epub<P: AsRef<Path>>(book: &Book, path: P) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_epub_to_writer(book, file)
}

/// Write a [`Book`] to any [`Write`] + [`Seek`] destination.
pub fn write_epub_to_writer<W: Write + Seek>(book: &Book, writer: W) -> Result<()> {
    validate_package(book)?;

    let mut zip = ZipWriter::new(writer);
    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    // The mimetype must be the first entry and must be uncompressed.
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("content.opf", options_deflate)?;
    zip.write_all(generate_opf(book).as_bytes())?;

    zip.start_file("toc.ncx", options_deflate)?;
    zip.write_all(generate_ncx(book).as_bytes())?;

    for resource in &book.resources {
        zip.start_file(resource.path.as_str(), options_deflate)?;
        zip.write_all(&resource.data)?;
    }

    zip.finish()?;
    Ok(())
}

/// Every spine id and navigation href must still resolve; a dangling
/// reference here means the pipeline deleted something it should not have.
fn validate_package(book: &Book) -> Result<()> {
    for item in &book.spine {
        if !book.resources.iter().any(|resource| resource.id == item.id) {
            return Err(Error::MalformedReference(format!(
                "spine item {} has no matching resource",
                item.id
            )));
        }
    }
    validate_toc_entries(&book.toc, book)
}

fn validate_toc_entries(entries: &[TocEntry], book: &Book) -> Result<()> {
    for entry in entries {
        let path = match entry.href.split_once('#') {
            Some((path, _fragment)) => path,
            None => entry.href.as_str(),
        };
        if book.resource_by_path(path).is_err() {
            return Err(Error::MalformedReference(format!(
                "navigation entry {:?} points at missing resource {path}",
                entry.label
            )));
        }
        validate_toc_entries(&entry.children, book)?;
    }
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const IDENTIFIER_ID: &str = "PrimaryIdentifier";

fn generate_opf(book: &Book) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="PrimaryIdentifier">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
    );

    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&book.title)
    ));
    opf.push_str(&format!(
        "    <dc:identifier id=\"{}\">{}</dc:identifier>\n",
        IDENTIFIER_ID,
        escape_xml(&book.identifier)
    ));
    for creator in &book.creators {
        opf.push_str(&format!(
            "    <dc:creator>{}</dc:creator>\n",
            escape_xml(creator)
        ));
    }
    if !book.publisher.is_empty() {
        opf.push_str(&format!(
            "    <dc:publisher>{}</dc:publisher>\n",
            escape_xml(&book.publisher)
        ));
    }
    if !book.language.is_empty() {
        opf.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            escape_xml(&book.language)
        ));
    }
    for subject in &book.subjects {
        opf.push_str(&format!(
            "    <dc:subject>{}</dc:subject>\n",
            escape_xml(subject)
        ));
    }
    if !book.rights.is_empty() {
        opf.push_str(&format!(
            "    <dc:rights>{}</dc:rights>\n",
            escape_xml(&book.rights)
        ));
    }
    if !book.source.is_empty() {
        opf.push_str(&format!(
            "    <dc:source>{}</dc:source>\n",
            escape_xml(&book.source)
        ));
    }
    for date in &book.dates {
        if date.event.is_empty() {
            opf.push_str(&format!("    <dc:date>{}</dc:date>\n", escape_xml(&date.value)));
        } else {
            opf.push_str(&format!(
                "    <dc:date opf:event=\"{}\">{}</dc:date>\n",
                escape_xml(&date.event),
                escape_xml(&date.value)
            ));
        }
    }
    if let Some(ref cover_image_id) = book.cover_image_id {
        opf.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            escape_xml(cover_image_id)
        ));
    }

    opf.push_str("  </metadata>\n  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    for resource in &book.resources {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
            escape_xml(&resource.id),
            escape_xml(&resource.path),
            escape_xml(&resource.media_type)
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    for item in &book.spine {
        let linear = if item.linear { "yes" } else { "no" };
        opf.push_str(&format!(
            "    <itemref idref=\"{}\" linear=\"{}\"/>\n",
            escape_xml(&item.id),
            linear
        ));
    }

    opf.push_str("  </spine>\n</package>\n");
    opf
}

fn generate_ncx(book: &Book) -> String {
    let max_depth = book.toc.iter().map(toc_depth).max().unwrap_or(0);

    let mut ncx = String::new();
    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
    );
    ncx.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        escape_xml(&book.identifier)
    ));
    ncx.push_str(&format!(
        "    <meta name=\"dtb:depth\" content=\"{max_depth}\"/>\n"
    ));
    ncx.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    ncx.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
    ncx.push_str("  </head>\n");
    ncx.push_str(&format!(
        "  <docTitle>\n    <text>{}</text>\n  </docTitle>\n",
        escape_xml(&book.title)
    ));
    ncx.push_str(&format!(
        "  <docAuthor>\n    <text>{}</text>\n  </docAuthor>\n",
        escape_xml(&book.creators.join(", "))
    ));
    ncx.push_str("  <navMap>\n");
    for entry in &book.toc {
        write_nav_point(&mut ncx, entry, 2);
    }
    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

/// Play order is carried through from the source package, never recomputed.
fn write_nav_point(ncx: &mut String, entry: &TocEntry, indent: usize) {
    let indent_str = "  ".repeat(indent);

    ncx.push_str(&format!(
        "{}<navPoint id=\"{}\" playOrder=\"{}\">\n",
        indent_str,
        escape_xml(&entry.id),
        entry.play_order
    ));
    ncx.push_str(&format!(
        "{}  <navLabel>\n{}    <text>{}</text>\n{}  </navLabel>\n",
        indent_str,
        indent_str,
        escape_xml(&entry.label),
        indent_str
    ));
    ncx.push_str(&format!(
        "{}  <content src=\"{}\"/>\n",
        indent_str,
        escape_xml(&entry.href)
    ));

    for child in &entry.children {
        write_nav_point(ncx, child, indent + 1);
    }

    ncx.push_str(&format!("{indent_str}</navPoint>\n"));
}

fn toc_depth(entry: &TocEntry) -> usize {
    1 + entry.children.iter().map(toc_depth).max().unwrap_or(0)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Resource, SpineItem};

    fn book_with_chapter() -> Book {
        let mut book = Book::new();
        book.title = "Test Book".to_string();
        book.identifier = "urn:isbn:1234567890".to_string();
        book.resources.push(Resource {
            id: "ch1".to_string(),
            path: "text/ch1.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
            data: b"<html><body/></html>".to_vec(),
        });
        book.spine.push(SpineItem {
            id: "ch1".to_string(),
            linear: true,
        });
        book.toc.push(TocEntry {
            id: "np1".to_string(),
            play_order: 1,
            label: "Chapter 1".to_string(),
            href: "text/ch1.xhtml".to_string(),
            children: Vec::new(),
        });
        book
    }

    #[test]
    fn test_generate_opf() {
        let opf = generate_opf(&book_with_chapter());
        assert!(opf.contains("<dc:title>Test Book</dc:title>"), "{opf}");
        assert!(
            opf.contains(
                "<item id=\"ch1\" href=\"text/ch1.xhtml\" media-type=\"application/xhtml+xml\"/>"
            ),
            "{opf}"
        );
        assert!(opf.contains("<itemref idref=\"ch1\" linear=\"yes\"/>"), "{opf}");
    }

    #[test]
    fn test_generate_ncx_carries_play_order() {
        let mut book = book_with_chapter();
        book.toc[0].play_order = 7;
        let ncx = generate_ncx(&book);
        assert!(ncx.contains("playOrder=\"7\""), "{ncx}");
        assert!(ncx.contains("<meta name=\"dtb:depth\" content=\"1\"/>"), "{ncx}");
    }

    #[test]
    fn test_validate_rejects_dangling_spine_item() {
        let mut book = book_with_chapter();
        book.spine.push(SpineItem {
            id: "missing".to_string(),
            linear: true,
        });
        assert!(matches!(
            validate_package(&book),
            Err(Error::MalformedReference(_))
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_toc_href() {
        let mut book = book_with_chapter();
        book.toc.push(TocEntry {
            id: "np2".to_string(),
            play_order: 2,
            label: "Gone".to_string(),
            href: "text/gone.xhtml#top".to_string(),
            children: Vec::new(),
        });
        assert!(matches!(
            validate_package(&book),
            Err(Error::MalformedReference(_))
        ));
    }

    #[test]
    fn test_validate_accepts_fragment_hrefs() {
        let mut book = book_with_chapter();
        book.toc[0].href = "text/ch1.xhtml#start".to_string();
        assert!(validate_package(&book).is_ok());
    }
}
