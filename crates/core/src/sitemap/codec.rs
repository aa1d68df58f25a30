//! Sitemap XML codec.
//!
//! `decode` reads a `<urlset>` into a [`SitemapDocument`]; `encode` writes it
//! back with an XML declaration and two-space indentation. Anything the model
//! does not interpret is carried through as [`XmlElement`]s, so
//! `decode(encode(doc)) == doc` holds for every document this crate builds.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use super::model::{ChangeFreq, Priority, SitemapDocument, UrlField, UrlRecord, XmlElement};
use crate::Error;

const ROOT_TAG: &str = "urlset";
const URL_TAG: &str = "url";

/// Parse sitemap XML.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the input is not well-formed XML,
/// its root is not `<urlset>`, the root holds anything but `<url>` records,
/// or a record has no (or more than one) `<loc>`.
pub fn decode(raw: &str) -> Result<SitemapDocument, Error> {
    let root = parse_tree(raw)?;
    if root.name != ROOT_TAG {
        return Err(malformed(format!("expected <{ROOT_TAG}> root element, found <{}>", root.name)));
    }
    if !root.text.is_empty() {
        return Err(malformed(format!("unexpected text inside <{ROOT_TAG}>")));
    }

    let urls = root
        .children
        .into_iter()
        .map(url_from_element)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SitemapDocument { root_attrs: root.attrs, urls })
}

/// Serialize a document to sitemap XML.
pub fn encode(doc: &SitemapDocument) -> Result<String, Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(&mut writer, Event::Start(start_tag(ROOT_TAG, &doc.root_attrs)))?;

    for url in &doc.urls {
        emit(&mut writer, Event::Start(start_tag(URL_TAG, &url.attrs)))?;
        for field in &url.fields {
            match field {
                UrlField::Loc(loc) => write_text_element(&mut writer, "loc", loc)?,
                UrlField::Lastmod(lastmod) => write_text_element(&mut writer, "lastmod", lastmod)?,
                UrlField::Changefreq(changefreq) => write_text_element(&mut writer, "changefreq", changefreq.as_str())?,
                UrlField::Priority(priority) => write_text_element(&mut writer, "priority", priority.as_text())?,
                UrlField::Other(element) => write_element(&mut writer, element)?,
            }
        }
        emit(&mut writer, Event::End(BytesEnd::new(URL_TAG)))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new(ROOT_TAG)))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| Error::Io(format!("encoded sitemap is not UTF-8: {e}")))
}

fn malformed(reason: impl std::fmt::Display) -> Error {
    Error::MalformedDocument(reason.to_string())
}

/// Build the element tree for the whole input, checking well-formedness.
fn parse_tree(raw: &str) -> Result<XmlElement, Error> {
    let mut reader = Reader::from_str(raw);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| malformed(format!("{e} at byte {}", reader.buffer_position())))?;
        match event {
            Event::Start(e) => stack.push(open_element(&reader, &e)?),
            Event::Empty(e) => {
                let element = open_element(&reader, &e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| malformed("unmatched closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e).map_err(malformed)?;
                push_text(&mut stack, &text)?;
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e).map_err(malformed)?;
                push_text(&mut stack, &resolve_entity(&entity)?)?;
            }
            Event::CData(e) => {
                let text = reader.decoder().decode(&e).map_err(malformed)?;
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unexpected end of document inside <{}>", open.name)));
    }
    root.ok_or_else(|| malformed("document has no root element"))
}

fn open_element(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Result<XmlElement, Error> {
    let decoder = reader.decoder();
    let name = decoder.decode(e.name().as_ref()).map_err(malformed)?.into_owned();

    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = decoder.decode(attr.key.as_ref()).map_err(malformed)?.into_owned();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        attrs.push((key, value));
    }

    Ok(XmlElement { name, attrs, ..Default::default() })
}

/// Close `element`: trim its text and hand it to its parent, or make it the root.
fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, mut element: XmlElement) -> Result<(), Error> {
    let trimmed = element.text.trim();
    if trimmed.len() != element.text.len() {
        element.text = trimmed.to_string();
    }

    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(malformed(format!("second root element <{}>", element.name))),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), Error> {
    match stack.last_mut() {
        Some(open) => open.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(malformed("text outside the root element")),
    }
    Ok(())
}

fn resolve_entity(entity: &str) -> Result<String, Error> {
    let resolved = match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        s if s.starts_with("#x") || s.starts_with("#X") => u32::from_str_radix(&s[2..], 16).ok().and_then(char::from_u32),
        s if s.starts_with('#') => s[1..].parse::<u32>().ok().and_then(char::from_u32),
        _ => None,
    };
    resolved
        .map(String::from)
        .ok_or_else(|| malformed(format!("undefined entity &{entity};")))
}

fn url_from_element(element: XmlElement) -> Result<UrlRecord, Error> {
    if element.name != URL_TAG {
        return Err(malformed(format!("unexpected <{}> inside <{ROOT_TAG}>", element.name)));
    }
    if !element.text.is_empty() {
        return Err(malformed(format!("unexpected text inside <{URL_TAG}>")));
    }

    let mut fields = Vec::with_capacity(element.children.len());
    let mut locs = 0usize;
    for child in element.children {
        let field = field_from_element(child);
        if let UrlField::Loc(loc) = &field {
            if loc.is_empty() {
                return Err(malformed("<url> has an empty <loc>"));
            }
            locs += 1;
        }
        fields.push(field);
    }

    match locs {
        0 => Err(malformed("<url> is missing <loc>")),
        1 => Ok(UrlRecord { attrs: element.attrs, fields }),
        _ => Err(malformed("<url> has more than one <loc>")),
    }
}

/// Interpret a `<url>` child when it has the plain shape the protocol allows.
fn field_from_element(child: XmlElement) -> UrlField {
    if !child.is_simple() {
        return UrlField::Other(child);
    }

    match child.name.as_str() {
        "loc" => UrlField::Loc(child.text),
        "lastmod" => UrlField::Lastmod(child.text),
        "changefreq" => match child.text.parse::<ChangeFreq>() {
            Ok(changefreq) if changefreq.as_str() == child.text => UrlField::Changefreq(changefreq),
            _ => UrlField::Other(child),
        },
        "priority" => match Priority::parse(&child.text) {
            Some(priority) => UrlField::Priority(priority),
            None => UrlField::Other(child),
        },
        _ => UrlField::Other(child),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), Error> {
    writer
        .write_event(event)
        .map_err(|e| Error::Io(format!("failed to write sitemap XML: {e}")))
}

fn start_tag<'a>(name: &'a str, attrs: &'a [(String, String)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    start
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), Error> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), Error> {
    let start = start_tag(&element.name, &element.attrs);
    if element.text.is_empty() && element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    if !element.text.is_empty() {
        emit(writer, Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIC_SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/</loc>
    <lastmod>2024-01-15T10:00:00Z</lastmod>
    <changefreq>daily</changefreq>
    <priority>1.0</priority>
  </url>
  <url>
    <loc>https://example.com/about</loc>
    <priority>0.70</priority>
    <image:image>
      <image:loc>https://example.com/team.png</image:loc>
    </image:image>
  </url>
</urlset>
"#;

    #[test]
    fn test_decode_static_sitemap() {
        let doc = decode(STATIC_SITEMAP).unwrap();
        assert_eq!(doc.urls.len(), 2);
        assert_eq!(doc.root_attrs.len(), 2);

        let home = &doc.urls[0];
        assert_eq!(home.loc(), "https://example.com/");
        assert_eq!(home.lastmod(), Some("2024-01-15T10:00:00Z"));
        assert_eq!(home.changefreq(), Some(ChangeFreq::Daily));
        assert_eq!(home.priority().map(Priority::value), Some(1.0));

        let about = &doc.urls[1];
        assert_eq!(about.priority().map(Priority::as_text), Some("0.70"));
        let UrlField::Other(image) = &about.fields[2] else { panic!("expected extension element") };
        assert_eq!(image.name, "image:image");
        assert_eq!(image.children[0].text, "https://example.com/team.png");
    }

    #[test]
    fn test_round_trip_full_and_bare_records() {
        let mut full = UrlRecord::new("https://example.com/pricing?plan=pro&seats=5")
            .with_lastmod("2024-02-01")
            .with_changefreq(ChangeFreq::Monthly)
            .with_priority(Priority::new(0.8).unwrap());
        full.attrs.push(("data-source".to_string(), "generator".to_string()));
        full.fields.push(UrlField::Other(XmlElement {
            name: "image:image".to_string(),
            attrs: Vec::new(),
            text: String::new(),
            children: vec![XmlElement::new("image:loc").with_text("https://example.com/a.png")],
        }));
        let bare = UrlRecord::new("https://example.com/contact");

        let doc = SitemapDocument { urls: vec![full, bare], ..Default::default() };
        let encoded = encode(&doc).unwrap();
        assert_eq!(decode(&encoded).unwrap(), doc);
    }

    #[test]
    fn test_reencode_preserves_source_document() {
        let doc = decode(STATIC_SITEMAP).unwrap();
        let again = decode(&encode(&doc).unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_encode_layout() {
        let doc = SitemapDocument {
            urls: vec![UrlRecord::new("/").with_priority(Priority::new(0.5).unwrap())],
            ..Default::default()
        };
        let xml = encode(&doc).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<loc>/</loc>"));
        assert!(xml.contains("<priority>0.5</priority>"));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn test_escaped_text_round_trips() {
        let xml = r#"<urlset><url><loc>https://example.com/?a=1&amp;b=&#50;</loc></url></urlset>"#;
        let doc = decode(xml).unwrap();
        assert_eq!(doc.urls[0].loc(), "https://example.com/?a=1&b=2");
        assert_eq!(decode(&encode(&doc).unwrap()).unwrap(), doc);
    }

    #[test]
    fn test_unrecognised_changefreq_is_preserved() {
        let xml = "<urlset><url><loc>/</loc><changefreq>sometimes</changefreq></url></urlset>";
        let doc = decode(xml).unwrap();
        assert_eq!(doc.urls[0].changefreq(), None);
        assert!(encode(&doc).unwrap().contains("<changefreq>sometimes</changefreq>"));
    }

    #[test]
    fn test_decode_rejects_malformed_markup() {
        let result = decode("<urlset><url><loc>/</url></urlset>");
        assert!(matches!(result, Err(Error::MalformedDocument(_))));

        let result = decode("<urlset><url><loc>/</loc></url>");
        assert!(matches!(result, Err(Error::MalformedDocument(_))));

        let result = decode("");
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_root() {
        let result = decode("<sitemapindex><sitemap><loc>/a.xml</loc></sitemap></sitemapindex>");
        assert!(matches!(result, Err(Error::MalformedDocument(msg)) if msg.contains("urlset")));
    }

    #[test]
    fn test_decode_rejects_url_without_loc() {
        let result = decode("<urlset><url><priority>0.5</priority></url></urlset>");
        assert!(matches!(result, Err(Error::MalformedDocument(msg)) if msg.contains("missing <loc>")));
    }

    #[test]
    fn test_decode_rejects_undefined_entity() {
        let result = decode("<urlset><url><loc>/&nbsp;</loc></url></urlset>");
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_decode_empty_urlset() {
        let doc = decode(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"/>"#).unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc, SitemapDocument::new());
    }
}
