//! Reading EPUB archives into the [`Book`] model.

use std::io::{Read, Seek};
use std::path::Path;

use percent_encoding::percent_decode_str;
use zip::ZipArchive;
use zip::result::ZipError;

use super::parser::{self, NcxNavPoint, OpfPackage};
use crate::book::{Book, Date, Meta, Resource, SpineItem, TocEntry};
use crate::error::{Error, Result};
use crate::util::{clean_path, join_path, parent_dir};

/// Read an EPUB file from disk into a [`Book`].
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Book> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<Book> {
    let mut archive = ZipArchive::new(reader)?;

    let container = read_archive_file(&mut archive, "META-INF/container.xml")?;
    let opf_path = parser::parse_container_xml(&container)?;
    let opf_dir = parent_dir(&opf_path);

    let opf_text = String::from_utf8(read_archive_file(&mut archive, &opf_path)?)?;
    let package = parser::parse_opf(&opf_text)?;

    // The NCX is metadata, not a resource; locate it by media type.
    let ncx_item = package
        .manifest
        .iter()
        .find(|item| item.media_type == parser::NCX_MEDIA_TYPE)
        .ok_or_else(|| Error::InvalidEpub("missing toc.ncx".to_string()))?;
    let ncx_path = resolve_href(&opf_dir, &ncx_item.href);
    let ncx_text = String::from_utf8(read_archive_file(&mut archive, &ncx_path)?)?;
    let nav_points = parser::parse_ncx(&ncx_text)?;
    let toc = build_toc_entries(nav_points, &ncx_path)?;

    let mut resources = Vec::new();
    for item in &package.manifest {
        // The OPF and NCX are carried as parsed metadata, not as resources.
        if item.media_type == parser::NCX_MEDIA_TYPE
            || item.media_type == parser::OPF_MEDIA_TYPE
        {
            continue;
        }
        let path = resolve_href(&opf_dir, &item.href);
        resources.push(Resource {
            id: item.id.clone(),
            path: path.clone(),
            media_type: item.media_type.clone(),
            data: read_archive_file(&mut archive, &path)?,
        });
    }

    let spine = build_spine_items(&package)?;
    let identifier = resolve_unique_identifier(&package)?;
    let cover_image_id = resolve_cover_image_id(&package)?;

    let metadata = package.metadata;
    Ok(Book {
        title: metadata.title,
        identifier,
        creators: metadata.creators,
        publisher: metadata.publisher,
        language: metadata.language,
        subjects: metadata.subjects,
        rights: metadata.rights,
        source: metadata.source,
        dates: metadata
            .dates
            .into_iter()
            .map(|date| Date {
                event: date.event,
                value: date.value,
            })
            .collect(),
        metas: metadata
            .metas
            .into_iter()
            .map(|meta| Meta {
                name: meta.name,
                content: meta.content,
            })
            .collect(),
        resources,
        spine,
        cover_image_id,
        toc,
    })
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(path).map_err(|e| match e {
        ZipError::FileNotFound => Error::InvalidEpub(format!("missing archive entry {path}")),
        other => Error::Zip(other),
    })?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Resolve a (possibly percent-encoded) manifest href against a directory.
fn resolve_href(base_dir: &str, href: &str) -> String {
    let decoded = percent_decode_str(href).decode_utf8_lossy();
    clean_path(&join_path(base_dir, &decoded))
}

fn build_spine_items(package: &OpfPackage) -> Result<Vec<SpineItem>> {
    package
        .spine
        .iter()
        .map(|itemref| {
            let linear = match itemref.linear.as_str() {
                "yes" | "" => true,
                "no" => false,
                other => {
                    return Err(Error::MalformedMetadata(format!(
                        "unexpected value for linear: {other}"
                    )));
                }
            };
            Ok(SpineItem {
                id: itemref.idref.clone(),
                linear,
            })
        })
        .collect()
}

fn build_toc_entries(nav_points: Vec<NcxNavPoint>, ncx_path: &str) -> Result<Vec<TocEntry>> {
    nav_points
        .into_iter()
        .map(|nav_point| {
            let play_order = nav_point.play_order.parse::<u32>().map_err(|_| {
                Error::MalformedMetadata(format!(
                    "invalid playOrder {:?} on navPoint {}",
                    nav_point.play_order, nav_point.id
                ))
            })?;
            Ok(TocEntry {
                id: nav_point.id,
                play_order,
                label: nav_point.label,
                href: resolve_href(&parent_dir(ncx_path), &nav_point.src),
                children: build_toc_entries(nav_point.children, ncx_path)?,
            })
        })
        .collect()
}

fn resolve_unique_identifier(package: &OpfPackage) -> Result<String> {
    package
        .metadata
        .identifiers
        .iter()
        .find(|identifier| identifier.id == package.unique_identifier)
        .map(|identifier| identifier.value.clone())
        .ok_or_else(|| Error::InvalidEpub("can't find unique identifier".to_string()))
}

fn resolve_cover_image_id(package: &OpfPackage) -> Result<Option<String>> {
    let Some(cover_meta) = package
        .metadata
        .metas
        .iter()
        .find(|meta| meta.name == "cover")
    else {
        return Ok(None);
    };

    package
        .manifest
        .iter()
        .find(|item| item.id == cover_meta.content || item.href == cover_meta.content)
        .map(|item| Some(item.id.clone()))
        .ok_or_else(|| {
            Error::MalformedReference("can't find cover manifest item".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_href(".", "ch1.xhtml"), "ch1.xhtml");
        assert_eq!(resolve_href("OEBPS", "My%20Chapter.xhtml"), "OEBPS/My Chapter.xhtml");
        assert_eq!(resolve_href("a/b", "../c.css"), "a/c.css");
    }

    #[test]
    fn test_build_toc_entries_rejects_bad_play_order() {
        let nav_points = vec![NcxNavPoint {
            id: "np1".to_string(),
            play_order: "first".to_string(),
            label: "Chapter 1".to_string(),
            src: "ch1.xhtml".to_string(),
            children: Vec::new(),
        }];
        assert!(matches!(
            build_toc_entries(nav_points, "toc.ncx"),
            Err(Error::MalformedMetadata(_))
        ));
    }

    #[test]
    fn test_build_toc_entries_keeps_fragment() {
        let nav_points = vec![NcxNavPoint {
            id: "np1".to_string(),
            play_order: "1".to_string(),
            label: "Chapter 1".to_string(),
            src: "ch1.xhtml#sec2".to_string(),
            children: Vec::new(),
        }];
        let toc = build_toc_entries(nav_points, "OEBPS/toc.ncx").unwrap();
        assert_eq!(toc[0].href, "OEBPS/ch1.xhtml#sec2");
        assert_eq!(toc[0].play_order, 1);
    }
}
