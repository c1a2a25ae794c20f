//! Element tree for the tool-use wire format, built on quick-xml events.

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

/// A decoded element: attributes, child elements and the concatenation of its
/// direct text (entity references and CDATA already resolved).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

static START_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_.:-]*)[\s/>]").expect("valid regex"));

/// Locate the first start tag and return its byte offset and local name.
pub(crate) fn first_start_tag(input: &str) -> Option<(usize, &str)> {
    let caps = START_TAG_RE.captures(input)?;
    let whole = caps.get(0)?;
    let name = caps.get(1)?.as_str();
    let local = name.rsplit(':').next().unwrap_or(name);
    Some((whole.start(), local))
}

/// Decode the element starting at `offset`. Text before the element was already
/// skipped by the caller; anything after the element closes is ignored.
pub(crate) fn read_element(input: &str, offset: usize) -> Result<Element, String> {
    let mut reader = Reader::from_str(&input[offset..]);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        let event = reader.read_event().map_err(|err| err.to_string())?;
        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without matching start tag".to_string())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = text.unescape().map_err(|err| err.to_string())?;
                    current.text.push_str(&decoded);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = stack.last_mut() {
                    let raw = cdata.into_inner();
                    let decoded = std::str::from_utf8(&raw).map_err(|err| err.to_string())?;
                    current.text.push_str(decoded);
                }
            }
            Event::Eof => {
                let open = stack
                    .first()
                    .map(|element| element.name.clone())
                    .unwrap_or_default();
                return Err(format!("unexpected end of input inside <{open}>"));
            }
            _ => {}
        }
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, String> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        attrs.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Escape text for element content or attribute values.
pub(crate) fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}
