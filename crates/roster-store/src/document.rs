//! Tree-document backend: the collection is an XML document.
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <players>
//!   <player>
//!     <id>1</id>
//!     <nick>Ann</nick>
//!     <experience>10</experience>
//!     <lifeLevel>1</lifeLevel>
//!     <coins>0</coins>
//!   </player>
//! </players>
//! ```
//!
//! Every operation parses the file into an element tree. Mutations attach,
//! detach, or substitute one `<player>` subtree and serialize the whole tree
//! back. Root children that are not `<player>` elements are carried through
//! untouched. Comments and processing instructions are not preserved. Text
//! beside child elements (mixed content) is rejected as corrupt.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::fsio::{BackingFile, OpenGuard};
use crate::player::Player;
use crate::traits::PlayerStore;

/// Name of the document root element.
pub const ROOT_ELEMENT: &str = "players";

/// Name of the element holding one record.
pub const RECORD_ELEMENT: &str = "player";

const INDENT: &str = "  ";

/// Player store over an XML document.
#[derive(Debug)]
pub struct DocumentStore {
    file: BackingFile,
}

impl DocumentStore {
    /// Open (or create) a document at `path`. A new file holds an empty root.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, false)
    }

    /// Open (or create) a document, optionally syncing after every write.
    pub fn open_with(path: &Path, sync_writes: bool) -> StoreResult<Self> {
        let initial = Document::empty().render()?;
        Ok(Self {
            file: BackingFile::open(path, &initial, sync_writes)?,
        })
    }

    /// Path of the document file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Parse the document and decode every record, keyed by the index of its
    /// element among the root's children.
    fn load(&self, bytes: &[u8]) -> StoreResult<(Document, Vec<(usize, Player)>)> {
        let decoded = std::str::from_utf8(bytes)
            .map_err(|e| format!("not UTF-8: {e}"))
            .and_then(Document::parse)
            .and_then(|doc| doc.records().map(|records| (doc, records)));
        decoded.map_err(|reason| {
            warn!(path = %self.path().display(), %reason, "undecodable document");
            StoreError::corrupt(self.path(), reason)
        })
    }

    fn save(&self, guard: &OpenGuard<'_>, doc: &Document) -> StoreResult<()> {
        self.file.rewrite(guard, &doc.render()?)
    }
}

impl PlayerStore for DocumentStore {
    fn add(&self, player: &Player) -> StoreResult<bool> {
        player.check_insertable()?;
        let guard = self.file.lock()?;
        let (mut doc, records) = self.load(&self.file.read(&guard)?)?;
        if records.iter().any(|(_, p)| p.id == player.id) {
            return Ok(false);
        }
        doc.root.children.push(record_element(player));
        self.save(&guard, &doc)?;
        debug!(id = player.id, "document record attached");
        Ok(true)
    }

    fn remove(&self, id: i32) -> StoreResult<bool> {
        let guard = self.file.lock()?;
        if id <= 0 {
            return Ok(false);
        }
        let (mut doc, records) = self.load(&self.file.read(&guard)?)?;
        let Some(&(index, _)) = records.iter().find(|(_, p)| p.id == id) else {
            return Ok(false);
        };
        doc.root.children.remove(index);
        self.save(&guard, &doc)?;
        debug!(id, "document record detached");
        Ok(true)
    }

    fn update(&self, id: i32, player: &Player) -> StoreResult<()> {
        player.check_replaces(id)?;
        let guard = self.file.lock()?;
        let (mut doc, records) = self.load(&self.file.read(&guard)?)?;
        let Some(&(index, _)) = records.iter().find(|(_, p)| p.is_live() && p.id == id) else {
            return Ok(());
        };
        doc.root.children[index] = record_element(player);
        self.save(&guard, &doc)?;
        debug!(id, "document record replaced");
        Ok(())
    }

    fn get(&self, id: i32) -> StoreResult<Option<Player>> {
        let guard = self.file.lock()?;
        let (_, records) = self.load(&self.file.read(&guard)?)?;
        Ok(records
            .into_iter()
            .map(|(_, p)| p)
            .find(|p| p.is_live() && p.id == id))
    }

    fn list(&self) -> StoreResult<Vec<Player>> {
        let guard = self.file.lock()?;
        let (_, records) = self.load(&self.file.read(&guard)?)?;
        Ok(records
            .into_iter()
            .map(|(_, p)| p)
            .filter(Player::is_live)
            .collect())
    }

    fn close(&self) -> StoreResult<()> {
        self.file.close();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

/// One element of the parsed document. Text is kept only for leaf elements.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    fn leaf(name: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new(name)
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[derive(Debug)]
struct Document {
    root: Element,
}

impl Document {
    fn empty() -> Self {
        Self {
            root: Element::new(ROOT_ELEMENT),
        }
    }

    /// Parse a whole document. Whitespace-only input is an empty collection.
    fn parse(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        let mut reader = Reader::from_str(text);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?
            {
                Event::Start(start) => stack.push(open_element(&start)?),
                Event::Empty(start) => attach(&mut stack, &mut root, open_element(&start)?)?,
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| "closing tag without an open element".to_string())?;
                    if !element.children.is_empty() {
                        if !element.text.trim().is_empty() {
                            return Err(format!(
                                "<{}> mixes text with child elements",
                                element.name
                            ));
                        }
                        element.text.clear();
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let raw = data.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|e| format!("CDATA is not UTF-8: {e}"))?;
                    push_text(&mut stack, text)?;
                }
                Event::Eof => break,
                // Declaration, comments, processing instructions, doctype.
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }
        let root = root.ok_or_else(|| "no root element".to_string())?;
        if root.name != ROOT_ELEMENT {
            return Err(format!(
                "root element is <{}>, expected <{ROOT_ELEMENT}>",
                root.name
            ));
        }
        Ok(Self { root })
    }

    /// Decode every `<player>` child of the root.
    fn records(&self) -> Result<Vec<(usize, Player)>, String> {
        self.root
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.name == RECORD_ELEMENT)
            .enumerate()
            .map(|(nth, (index, child))| {
                element_record(child)
                    .map(|player| (index, player))
                    .map_err(|reason| format!("record {}: {reason}", nth + 1))
            })
            .collect()
    }

    fn render(&self) -> StoreResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        write_document(&mut writer, &self.root)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(writer.into_inner())
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, String> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| format!("element name is not UTF-8: {e}"))?
        .to_string();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("<{}>: {e}", element.name))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| format!("attribute name is not UTF-8: {e}"))?
            .to_string();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(format!("second root element <{}>", element.name));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), String> {
    match stack.last_mut() {
        Some(open) => open.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err("text outside the root element".to_string()),
    }
    Ok(())
}

fn write_document(writer: &mut Writer<Vec<u8>>, root: &Element) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;
    write_element(writer, root, 0)?;
    writer.write_event(Event::Text(BytesText::new("\n")))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    depth: usize,
) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    if element.children.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    } else {
        let inner = format!("\n{}", INDENT.repeat(depth + 1));
        for child in &element.children {
            writer.write_event(Event::Text(BytesText::new(&inner)))?;
            write_element(writer, child, depth + 1)?;
        }
        let outer = format!("\n{}", INDENT.repeat(depth));
        writer.write_event(Event::Text(BytesText::new(&outer)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

// ---------------------------------------------------------------------------
// Record mapping
// ---------------------------------------------------------------------------

fn record_element(player: &Player) -> Element {
    Element {
        children: vec![
            Element::leaf("id", player.id.to_string()),
            Element::leaf("nick", player.nick.as_str()),
            Element::leaf("experience", player.experience.to_string()),
            Element::leaf("lifeLevel", player.life_level.to_string()),
            Element::leaf("coins", player.coins.to_string()),
        ],
        ..Element::new(RECORD_ELEMENT)
    }
}

fn element_record(element: &Element) -> Result<Player, String> {
    Ok(Player {
        id: int_leaf(element, "id")?,
        nick: leaf(element, "nick")?.to_string(),
        experience: int_leaf(element, "experience")?,
        life_level: int_leaf(element, "lifeLevel")?,
        coins: int_leaf(element, "coins")?,
    })
}

fn leaf<'a>(element: &'a Element, name: &str) -> Result<&'a str, String> {
    element
        .child(name)
        .map(|c| c.text.as_str())
        .ok_or_else(|| format!("missing <{name}>"))
}

fn int_leaf(element: &Element, name: &str) -> Result<i32, String> {
    let text = leaf(element, name)?;
    text.trim()
        .parse()
        .map_err(|e| format!("<{name}> value {text:?}: {e}"))
}
