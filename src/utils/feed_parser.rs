//! Quick-XML based RSS/Atom parser
//!
//! Streams a feed document once and extracts only the channel and entry
//! fields that become episodes. Accepts RSS 2.0, RSS 1.0 (`rdf:RDF`) and
//! Atom 1.0 roots; anything else is rejected as malformed.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::errors::{SourceError, SourceResult};
use crate::models::{Feed, FeedEntry};

const SOURCE_TYPE: &str = "feed";
const ROOT_ELEMENTS: &[&str] = &["rss", "rdf:RDF", "feed"];

#[derive(Default)]
struct ChannelFields {
    title: Option<String>,
    itunes_image: Option<String>,
    image_url: Option<String>,
    logo: Option<String>,
    icon: Option<String>,
}

#[derive(Default)]
struct EntryFields {
    guid: Option<String>,
    title: Option<String>,
    description: Option<String>,
    content_encoded: Option<String>,
    itunes_summary: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    link: Option<String>,
    alternate_link: Option<String>,
    enclosure_url: Option<String>,
    pub_date: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    dc_date: Option<String>,
}

impl EntryFields {
    fn into_entry(self) -> FeedEntry {
        let link = self.link.or(self.alternate_link).or(self.enclosure_url);
        FeedEntry {
            guid: self.guid.or_else(|| link.clone()),
            title: self.title.unwrap_or_default(),
            description: self
                .description
                .or(self.content_encoded)
                .or(self.itunes_summary)
                .or(self.summary)
                .or(self.content)
                .unwrap_or_default(),
            link: link.unwrap_or_default(),
            published_at_raw: self
                .pub_date
                .or(self.published)
                .or(self.updated)
                .or(self.dc_date),
        }
    }
}

/// Keep the first non-empty value seen for a field
fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

fn is_entry_element(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// Parse an RSS or Atom document into a [`Feed`]
pub fn parse_feed(content: &str) -> SourceResult<Feed> {
    let mut reader = Reader::from_str(content.trim_start_matches('\u{feff}'));

    let mut channel = ChannelFields::default();
    let mut entries = Vec::new();
    let mut current_entry: Option<EntryFields> = None;

    let mut element_stack: Vec<String> = Vec::new();
    let mut text_stack: Vec<String> = Vec::new();
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e)?;
                if element_stack.is_empty() {
                    check_root(&name, &mut root_seen)?;
                }

                if is_entry_element(&name) && current_entry.is_none() {
                    current_entry = Some(EntryFields::default());
                }
                handle_attributes(
                    &name,
                    e,
                    element_stack.last().map(String::as_str),
                    &mut channel,
                    current_entry.as_mut(),
                );

                element_stack.push(name);
                text_stack.push(String::new());
            }

            Ok(Event::End(_)) => {
                let Some(name) = element_stack.pop() else {
                    return Err(parse_error("closing tag without matching opening tag"));
                };
                let raw_text = text_stack.pop().unwrap_or_default();
                let text = raw_text.trim();
                let parent = element_stack.last().map(String::as_str);

                // Markup nested in an entry field (Atom xhtml content) folds into that field
                if current_entry.is_some()
                    && !is_entry_element(&name)
                    && parent.is_some_and(|p| !is_entry_element(p))
                {
                    if let Some(buffer) = text_stack.last_mut() {
                        buffer.push_str(&raw_text);
                    }
                }

                if is_entry_element(&name) && parent.is_some_and(|p| !is_entry_element(p)) {
                    if let Some(entry) = current_entry.take() {
                        entries.push(entry.into_entry());
                    }
                } else if let Some(entry) = current_entry.as_mut() {
                    if parent.is_some_and(is_entry_element) {
                        assign_entry_field(entry, &name, text);
                    }
                } else {
                    let grandparent = element_stack
                        .len()
                        .checked_sub(2)
                        .and_then(|i| element_stack.get(i))
                        .map(String::as_str);
                    assign_channel_field(&mut channel, &name, text, parent, grandparent);
                }
            }

            Ok(Event::Empty(ref e)) => {
                let name = element_name(e)?;
                if element_stack.is_empty() {
                    check_root(&name, &mut root_seen)?;
                }
                let parent = element_stack.last().map(String::as_str);

                if is_entry_element(&name) && current_entry.is_none() {
                    entries.push(EntryFields::default().into_entry());
                } else {
                    handle_attributes(&name, e, parent, &mut channel, current_entry.as_mut());
                }
            }

            Ok(Event::Text(e)) => {
                if let Some(buffer) = text_stack.last_mut() {
                    let text = std::str::from_utf8(&e)
                        .map_err(|e| parse_error(format!("Invalid UTF-8 in text: {e}")))?;
                    buffer.push_str(&decode_entities(text));
                }
            }

            Ok(Event::CData(e)) => {
                if let Some(buffer) = text_stack.last_mut() {
                    let text = std::str::from_utf8(&e)
                        .map_err(|e| parse_error(format!("Invalid UTF-8 in CDATA: {e}")))?;
                    buffer.push_str(text);
                }
            }

            Ok(Event::GeneralRef(e)) => {
                if let Some(buffer) = text_stack.last_mut() {
                    let entity = std::str::from_utf8(&e)
                        .map_err(|e| parse_error(format!("Invalid UTF-8 in entity: {e}")))?;
                    match resolve_entity(entity) {
                        Some(resolved) => buffer.push(resolved),
                        None => {
                            buffer.push('&');
                            buffer.push_str(entity);
                            buffer.push(';');
                        }
                    }
                }
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(parse_error(format!(
                    "XML parsing error at position {}: {e}",
                    reader.error_position()
                )));
            }

            _ => {} // Declarations, comments, processing instructions, doctype
        }
    }

    if !root_seen {
        return Err(parse_error("document has no root element"));
    }
    if let Some(open) = element_stack.last() {
        return Err(parse_error(format!(
            "unexpected end of document inside <{open}>"
        )));
    }

    Ok(Feed {
        title: channel.title.unwrap_or_default(),
        image: channel
            .itunes_image
            .or(channel.image_url)
            .or(channel.logo)
            .or(channel.icon),
        entries,
    })
}

fn parse_error<M: Into<String>>(message: M) -> SourceError {
    SourceError::parse_error(SOURCE_TYPE, message)
}

fn element_name(element: &BytesStart) -> SourceResult<String> {
    std::str::from_utf8(element.name().as_ref())
        .map(str::to_string)
        .map_err(|e| parse_error(format!("Invalid UTF-8 in XML element name: {e}")))
}

fn check_root(name: &str, root_seen: &mut bool) -> SourceResult<()> {
    if *root_seen {
        return Err(parse_error(format!(
            "unexpected second root element <{name}>"
        )));
    }
    if !ROOT_ELEMENTS.contains(&name) {
        return Err(parse_error(format!(
            "root element <{name}> is not rss, rdf:RDF or feed"
        )));
    }
    *root_seen = true;
    Ok(())
}

fn handle_attributes(
    name: &str,
    element: &BytesStart,
    parent: Option<&str>,
    channel: &mut ChannelFields,
    entry: Option<&mut EntryFields>,
) {
    match (name, entry) {
        ("link", Some(entry)) if parent.is_some_and(is_entry_element) => {
            let attrs = parse_attributes(element);
            let Some(href) = attrs.get("href") else {
                return;
            };
            match attrs.get("rel").map(String::as_str).unwrap_or("alternate") {
                "alternate" => set_once(&mut entry.alternate_link, href.trim()),
                "enclosure" => set_once(&mut entry.enclosure_url, href.trim()),
                _ => {}
            }
        }
        ("enclosure", Some(entry)) if parent.is_some_and(is_entry_element) => {
            if let Some(url) = parse_attributes(element).get("url") {
                set_once(&mut entry.enclosure_url, url.trim());
            }
        }
        ("itunes:image", None) if parent == Some("channel") => {
            if let Some(href) = parse_attributes(element).get("href") {
                set_once(&mut channel.itunes_image, href.trim());
            }
        }
        _ => {}
    }
}

fn assign_entry_field(entry: &mut EntryFields, name: &str, text: &str) {
    let slot = match name {
        "guid" | "id" => &mut entry.guid,
        "title" => &mut entry.title,
        "description" => &mut entry.description,
        "content:encoded" => &mut entry.content_encoded,
        "itunes:summary" => &mut entry.itunes_summary,
        "summary" => &mut entry.summary,
        "content" => &mut entry.content,
        "link" => &mut entry.link,
        "pubDate" => &mut entry.pub_date,
        "published" => &mut entry.published,
        "updated" => &mut entry.updated,
        "dc:date" => &mut entry.dc_date,
        _ => return,
    };
    set_once(slot, text);
}

fn assign_channel_field(
    channel: &mut ChannelFields,
    name: &str,
    text: &str,
    parent: Option<&str>,
    grandparent: Option<&str>,
) {
    match (name, parent) {
        ("title", Some("channel" | "feed")) => set_once(&mut channel.title, text),
        ("url", Some("image")) if grandparent == Some("channel") => {
            set_once(&mut channel.image_url, text)
        }
        // RSS 1.0 puts <image> beside <channel> under the root
        ("url", Some("image")) if grandparent == Some("rdf:RDF") => {
            set_once(&mut channel.image_url, text)
        }
        ("logo", Some("feed")) => set_once(&mut channel.logo, text),
        ("icon", Some("feed")) => set_once(&mut channel.icon, text),
        _ => {}
    }
}

/// Parse XML attributes into a HashMap, decoding entity references in values
fn parse_attributes(element: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();

    for attr in element.attributes().flatten() {
        if let (Ok(key), Ok(value)) = (
            std::str::from_utf8(attr.key.as_ref()),
            std::str::from_utf8(&attr.value),
        ) {
            attrs.insert(key.to_string(), decode_entities(value).into_owned());
        }
    }
    attrs
}

/// Resolve a predefined or numeric entity name (without `&` and `;`)
fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Replace entity references in `input`; unknown references are kept verbatim
fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        let resolved = tail
            .find(';')
            .and_then(|end| resolve_entity(&tail[1..end]).map(|c| (c, end)));
        match resolved {
            Some((c, end)) => {
                output.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                output.push('&');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    Cow::Owned(output)
}
