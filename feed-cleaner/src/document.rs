use crate::types::{CleanerError, Result};
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::fmt;
use tracing::debug;

/// Index of a node inside its [`FeedDocument`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed XML tree.
///
/// Nodes keep a parent link so a matched element can be detached in place.
/// Detached nodes stay in the arena but are no longer reachable from the root,
/// so they are skipped by traversal and serialization.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    nodes: Vec<Node>,
    root: NodeId,
}

impl FeedDocument {
    /// Parses raw feed bytes. Whitespace-only text between elements is dropped.
    ///
    /// Content is decoded with the encoding named in the XML declaration (or BOM),
    /// UTF-8 otherwise; undecodable bytes are a parse error.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();

        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let id = push_element(&mut nodes, &stack, &mut root, &e, reader.decoder())?;
                    stack.push(id);
                }
                Ok(Event::Empty(e)) => {
                    push_element(&mut nodes, &stack, &mut root, &e, reader.decoder())?;
                }
                Ok(Event::End(_)) => {
                    if stack.pop().is_none() {
                        return Err(CleanerError::Parse("closing tag without matching start".to_string()));
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(parse_error)?;
                    if !text.trim().is_empty() {
                        match stack.last() {
                            Some(&parent) => {
                                push_child(&mut nodes, parent, NodeKind::Text(text.into_owned()));
                            }
                            None => {
                                return Err(CleanerError::Parse("text outside of the root element".to_string()))
                            }
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = reader.decoder().decode(&e).map_err(parse_error)?.into_owned();
                    match stack.last() {
                        Some(&parent) => {
                            push_child(&mut nodes, parent, NodeKind::CData(text));
                        }
                        None => return Err(CleanerError::Parse("CDATA outside of the root element".to_string())),
                    }
                }
                Ok(Event::Comment(e)) => {
                    // Prolog and epilog comments are not kept.
                    if let Some(&parent) = stack.last() {
                        let text = reader.decoder().decode(&e).map_err(parse_error)?.into_owned();
                        push_child(&mut nodes, parent, NodeKind::Comment(text));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CleanerError::Parse(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                // Declaration, doctype and processing instructions are regenerated or dropped.
                Ok(_) => {}
            }
            buf.clear();
        }

        if let Some(&open) = stack.last() {
            let name = element_name(&nodes[open].kind).unwrap_or_default();
            return Err(CleanerError::Parse(format!("unclosed element <{}>", name)));
        }

        let root = root.ok_or_else(|| CleanerError::Parse("document has no root element".to_string()))?;
        debug!("Parsed feed document with {} nodes", nodes.len());

        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    /// Element name, `None` for text-like nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        element_name(&self.nodes[id].kind)
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(move |&child| self.name(child).is_some())
    }

    /// Text that precedes the first child element or comment, like an ElementTree `.text`.
    pub fn text(&self, id: NodeId) -> Option<String> {
        let mut text = String::new();
        for &child in &self.nodes[id].children {
            match &self.nodes[child].kind {
                NodeKind::Text(t) | NodeKind::CData(t) => text.push_str(t),
                NodeKind::Comment(_) | NodeKind::Element { .. } => break,
            }
        }

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// All nodes of the subtree rooted at `id`, in document order, `id` first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            out.push(current);
            pending.extend(self.nodes[current].children.iter().rev().copied());
        }
        out
    }

    /// Every element reachable from the root with the given name, root included.
    pub fn elements_named(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.name(id) == Some(name))
            .collect()
    }

    pub fn element_count(&self) -> usize {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.name(id).is_some())
            .count()
    }

    /// Unlinks `id` (and with it its subtree) from its parent.
    /// Returns `false` when the node has no parent.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes[id].parent else {
            return false;
        };
        self.nodes[parent].children.retain(|&child| child != id);
        self.nodes[id].parent = None;
        true
    }

    /// UTF-8, two-space indented, with an XML declaration.
    pub fn to_pretty_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        self.write_node(&mut writer, self.root)?;

        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<()> {
        let node = &self.nodes[id];
        let event = match &node.kind {
            NodeKind::Element { name, attributes } => {
                let start = BytesStart::new(name.as_str())
                    .with_attributes(attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())));

                if node.children.is_empty() {
                    Event::Empty(start)
                } else {
                    writer.write_event(Event::Start(start)).map_err(write_error)?;
                    for &child in &node.children {
                        self.write_node(writer, child)?;
                    }
                    Event::End(BytesEnd::new(name.as_str()))
                }
            }
            NodeKind::Text(text) => Event::Text(BytesText::new(text)),
            NodeKind::CData(text) => Event::CData(BytesCData::new(text.as_str())),
            NodeKind::Comment(text) => Event::Comment(BytesText::from_escaped(text.as_str())),
        };

        writer.write_event(event).map_err(write_error)
    }
}

fn push_element(
    nodes: &mut Vec<Node>,
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    start: &BytesStart<'_>,
    decoder: Decoder,
) -> Result<NodeId> {
    let name = decoder.decode(start.name().as_ref()).map_err(parse_error)?.into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(parse_error)?;
        let key = decoder.decode(attr.key.as_ref()).map_err(parse_error)?.into_owned();
        let value = attr.decode_and_unescape_value(decoder).map_err(parse_error)?.into_owned();
        attributes.push((key, value));
    }

    let kind = NodeKind::Element { name, attributes };
    match stack.last() {
        Some(&parent) => Ok(push_child(nodes, parent, kind)),
        None if root.is_some() => Err(CleanerError::Parse("more than one root element".to_string())),
        None => {
            nodes.push(Node {
                kind,
                parent: None,
                children: Vec::new(),
            });
            let id = nodes.len() - 1;
            *root = Some(id);
            Ok(id)
        }
    }
}

fn push_child(nodes: &mut Vec<Node>, parent: NodeId, kind: NodeKind) -> NodeId {
    nodes.push(Node {
        kind,
        parent: Some(parent),
        children: Vec::new(),
    });
    let id = nodes.len() - 1;
    nodes[parent].children.push(id);
    id
}

fn element_name(kind: &NodeKind) -> Option<&str> {
    match kind {
        NodeKind::Element { name, .. } => Some(name.as_str()),
        _ => None,
    }
}

fn parse_error(e: impl fmt::Display) -> CleanerError {
    CleanerError::Parse(e.to_string())
}

fn write_error(e: impl fmt::Display) -> CleanerError {
    CleanerError::XmlWrite(e.to_string())
}
