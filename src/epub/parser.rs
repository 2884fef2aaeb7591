//! EPUB XML parsing (container.xml, OPF package document, NCX).

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Parsed OPF package document.
#[derive(Debug, Default)]
pub struct OpfPackage {
    pub unique_identifier: String,
    pub metadata: OpfMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItemRef>,
}

#[derive(Debug, Default)]
pub struct OpfMetadata {
    pub title: String,
    pub identifiers: Vec<OpfIdentifier>,
    pub creators: Vec<String>,
    pub publisher: String,
    pub language: String,
    pub subjects: Vec<String>,
    pub rights: String,
    pub source: String,
    pub dates: Vec<OpfDate>,
    pub metas: Vec<OpfMeta>,
}

#[derive(Debug)]
pub struct OpfIdentifier {
    pub id: String,
    pub value: String,
}

#[derive(Debug)]
pub struct OpfDate {
    pub event: String,
    pub value: String,
}

#[derive(Debug)]
pub struct OpfMeta {
    pub name: String,
    pub content: String,
}

#[derive(Debug)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

#[derive(Debug)]
pub struct SpineItemRef {
    pub idref: String,
    /// Raw `linear` attribute value; empty when absent.
    pub linear: String,
}

/// A navPoint from the NCX navigation map.
#[derive(Debug, Default)]
pub struct NcxNavPoint {
    pub id: String,
    /// Raw `playOrder` attribute text; validated by the reader.
    pub play_order: String,
    pub label: String,
    pub src: String,
    pub children: Vec<NcxNavPoint>,
}

/// Parse META-INF/container.xml and return the OPF path of the first
/// rootfile.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "no rootfile found in container.xml".to_string(),
    ))
}

/// Parse an OPF package document.
pub fn parse_opf(content: &str) -> Result<OpfPackage> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut package = OpfPackage::default();

    let mut in_metadata = false;
    let mut current_element: Option<String> = None;
    // id / event attribute of the dc element currently being read.
    let mut current_attr = String::new();
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"package" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"unique-identifier" {
                                package.unique_identifier =
                                    String::from_utf8(attr.value.to_vec())?;
                            }
                        }
                    }
                    b"metadata" => in_metadata = true,
                    b"title" | b"creator" | b"language" | b"publisher" | b"subject"
                    | b"rights" | b"source" => {
                        if in_metadata {
                            current_element = Some(String::from_utf8_lossy(local).to_string());
                            buf_text.clear();
                        }
                    }
                    b"identifier" | b"date" => {
                        if in_metadata {
                            current_element = Some(String::from_utf8_lossy(local).to_string());
                            current_attr.clear();
                            buf_text.clear();
                            let wanted: &[u8] =
                                if local == b"identifier" { b"id" } else { b"event" };
                            for attr in e.attributes().flatten() {
                                if local_name(attr.key.as_ref()) == wanted {
                                    current_attr = String::from_utf8(attr.value.to_vec())?;
                                }
                            }
                        }
                    }
                    b"item" => package.manifest.push(parse_manifest_item(&e)?),
                    b"itemref" => package.spine.push(parse_spine_itemref(&e)?),
                    b"meta" => {
                        if let Some(meta) = parse_opf_meta(&e)? {
                            package.metadata.metas.push(meta);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"item" => package.manifest.push(parse_manifest_item(&e)?),
                    b"itemref" => package.spine.push(parse_spine_itemref(&e)?),
                    b"meta" => {
                        if let Some(meta) = parse_opf_meta(&e)? {
                            package.metadata.metas.push(meta);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if let Some(ref element) = current_element {
                    let metadata = &mut package.metadata;
                    match element.as_str() {
                        "title" => metadata.title = buf_text.clone(),
                        "creator" => metadata.creators.push(buf_text.clone()),
                        "language" => metadata.language = buf_text.clone(),
                        "publisher" => metadata.publisher = buf_text.clone(),
                        "subject" => metadata.subjects.push(buf_text.clone()),
                        "rights" => metadata.rights = buf_text.clone(),
                        "source" => metadata.source = buf_text.clone(),
                        "identifier" => metadata.identifiers.push(OpfIdentifier {
                            id: current_attr.clone(),
                            value: buf_text.clone(),
                        }),
                        "date" => metadata.dates.push(OpfDate {
                            event: current_attr.clone(),
                            value: buf_text.clone(),
                        }),
                        _ => {}
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(package)
}

fn parse_manifest_item(e: &quick_xml::events::BytesStart) -> Result<ManifestItem> {
    let mut id = String::new();
    let mut href = String::new();
    let mut media_type = String::new();

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"id" => id = String::from_utf8(attr.value.to_vec())?,
            b"href" => href = String::from_utf8(attr.value.to_vec())?,
            b"media-type" => media_type = String::from_utf8(attr.value.to_vec())?,
            _ => {}
        }
    }

    Ok(ManifestItem {
        id,
        href,
        media_type,
    })
}

fn parse_spine_itemref(e: &quick_xml::events::BytesStart) -> Result<SpineItemRef> {
    let mut idref = String::new();
    let mut linear = String::new();

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"idref" => idref = String::from_utf8(attr.value.to_vec())?,
            b"linear" => linear = String::from_utf8(attr.value.to_vec())?,
            _ => {}
        }
    }

    Ok(SpineItemRef { idref, linear })
}

fn parse_opf_meta(e: &quick_xml::events::BytesStart) -> Result<Option<OpfMeta>> {
    let mut name = String::new();
    let mut content = String::new();

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"name" => name = String::from_utf8(attr.value.to_vec())?,
            b"content" => content = String::from_utf8(attr.value.to_vec())?,
            _ => {}
        }
    }

    // EPUB3 property metas have no name attribute; skip them.
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(OpfMeta { name, content }))
}

/// Parse an NCX table of contents into its navPoint tree.
pub fn parse_ncx(content: &str) -> Result<Vec<NcxNavPoint>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // The root state collects top-level navPoints.
    let mut stack: Vec<NcxNavPoint> = vec![NcxNavPoint::default()];
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"navPoint" => {
                        let mut nav_point = NcxNavPoint::default();
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"id" => {
                                    nav_point.id = String::from_utf8(attr.value.to_vec())?;
                                }
                                b"playOrder" => {
                                    nav_point.play_order =
                                        String::from_utf8(attr.value.to_vec())?;
                                }
                                _ => {}
                            }
                        }
                        stack.push(nav_point);
                    }
                    b"text" => in_text = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"content" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src"
                            && let Some(state) = stack.last_mut()
                        {
                            state.src = String::from_utf8(attr.value.to_vec())?;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        state.label.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"text" => in_text = false,
                    b"navPoint" => {
                        if let Some(finished) = stack.pop()
                            && let Some(parent) = stack.last_mut()
                        {
                            parent.children.push(finished);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(stack.pop().map(|root| root.children).unwrap_or_default())
}

/// Strip a UTF-8 BOM if present.
fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract the local name from a namespaced XML name
/// (e.g. "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references quick-xml reports as general references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}
