//! The representation graph: arena-allocated nodes addressed by index.
//!
//! Ownership in the graph is shared and may be cyclic, so nodes never hold
//! references to each other; they hold [`NodeId`] indexes into the arena.

use std::collections::HashSet;
use std::io::Write;

use crate::anchors::SerializationOptions;
use crate::construct::{ConstructionContext, Expected};
use crate::error::{ConstructionError, Mark, SerializationError};
use crate::event::{Event, EventData};
use crate::presenter::{present, PresenterOptions};
use crate::represent::SerializationContext;
use crate::stream::{EventBuffer, EventProducer, EventStream};
use crate::tags::{
    DEFAULT_MAPPING_TAG, DEFAULT_SCALAR_TAG, DEFAULT_SEQUENCE_TAG, NON_SPECIFIC_TAG,
};
use crate::{CollectionStyle, ScalarStyle};

/// Handle of a node in a [`Dom`] arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The arena index; doubles as the node's stable object identity for
    /// anchor bookkeeping.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of the representation graph.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Node {
    /// The node tag. Nodes built without one get the default tag of their
    /// kind.
    pub tag: Option<String>,
    pub data: NodeData,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

#[derive(Clone, Debug)]
pub enum NodeData {
    Scalar {
        value: String,
        style: ScalarStyle,
    },
    Sequence {
        items: Vec<NodeId>,
        style: CollectionStyle,
    },
    Mapping {
        pairs: Vec<(NodeId, NodeId)>,
        style: CollectionStyle,
    },
}

/// A document's representation graph.
#[derive(Clone, Debug, Default)]
pub struct Dom {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Dom {
    pub fn new() -> Dom {
        Dom::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Create a scalar node. A missing tag defaults to `!!str`.
    #[must_use]
    pub fn add_scalar(&mut self, tag: Option<&str>, value: &str, style: ScalarStyle) -> NodeId {
        self.push_node(Node {
            tag: Some(String::from(tag.unwrap_or(DEFAULT_SCALAR_TAG))),
            data: NodeData::Scalar {
                value: String::from(value),
                style,
            },
            start_mark: Mark::default(),
            end_mark: Mark::default(),
        })
    }

    /// Create an empty sequence node. A missing tag defaults to `!!seq`.
    #[must_use]
    pub fn add_sequence(&mut self, tag: Option<&str>, style: CollectionStyle) -> NodeId {
        self.push_node(Node {
            tag: Some(String::from(tag.unwrap_or(DEFAULT_SEQUENCE_TAG))),
            data: NodeData::Sequence {
                items: Vec::new(),
                style,
            },
            start_mark: Mark::default(),
            end_mark: Mark::default(),
        })
    }

    /// Create an empty mapping node. A missing tag defaults to `!!map`.
    #[must_use]
    pub fn add_mapping(&mut self, tag: Option<&str>, style: CollectionStyle) -> NodeId {
        self.push_node(Node {
            tag: Some(String::from(tag.unwrap_or(DEFAULT_MAPPING_TAG))),
            data: NodeData::Mapping {
                pairs: Vec::new(),
                style,
            },
            start_mark: Mark::default(),
            end_mark: Mark::default(),
        })
    }

    /// Append an item to a sequence node.
    pub fn push_item(&mut self, sequence: NodeId, item: NodeId) {
        assert!(item.0 < self.nodes.len());
        let NodeData::Sequence { items, .. } = &mut self.nodes[sequence.0].data else {
            panic!("push_item target is not a sequence");
        };
        items.push(item);
    }

    /// Append a key/value pair to a mapping node.
    pub fn push_pair(&mut self, mapping: NodeId, key: NodeId, value: NodeId) {
        assert!(key.0 < self.nodes.len() && value.0 < self.nodes.len());
        let NodeData::Mapping { pairs, .. } = &mut self.nodes[mapping.0].data else {
            panic!("push_pair target is not a mapping");
        };
        pairs.push((key, value));
    }

    /// Structural equality of two nodes within this arena.
    pub fn nodes_equal(&self, a: NodeId, b: NodeId) -> bool {
        let mut visited = HashSet::new();
        node_eq(self, self, a, b, &mut visited)
    }
}

/// Structural node equality with a visited set of index pairs, so cyclic
/// graphs terminate. Identical indexes in the same arena short-circuit.
fn node_eq(
    left_dom: &Dom,
    right_dom: &Dom,
    left: NodeId,
    right: NodeId,
    visited: &mut HashSet<(usize, usize)>,
) -> bool {
    if std::ptr::eq(left_dom, right_dom) && left == right {
        return true;
    }
    if !visited.insert((left.0, right.0)) {
        // Already under comparison further up the stack; assuming equality
        // here is what terminates cycles.
        return true;
    }
    let a = left_dom.node(left);
    let b = right_dom.node(right);
    if a.tag != b.tag {
        return false;
    }
    match (&a.data, &b.data) {
        (
            NodeData::Scalar { value: va, .. },
            NodeData::Scalar { value: vb, .. },
        ) => va == vb,
        (
            NodeData::Sequence { items: ia, .. },
            NodeData::Sequence { items: ib, .. },
        ) => {
            ia.len() == ib.len()
                && ia
                    .iter()
                    .zip(ib)
                    .all(|(x, y)| node_eq(left_dom, right_dom, *x, *y, visited))
        }
        (
            NodeData::Mapping { pairs: pa, .. },
            NodeData::Mapping { pairs: pb, .. },
        ) => {
            pa.len() == pb.len()
                && pa.iter().zip(pb).all(|((ka, va), (kb, vb))| {
                    node_eq(left_dom, right_dom, *ka, *kb, visited)
                        && node_eq(left_dom, right_dom, *va, *vb, visited)
                })
        }
        _ => false,
    }
}

impl PartialEq for Dom {
    fn eq(&self, other: &Dom) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                let mut visited = HashSet::new();
                node_eq(self, other, a, b, &mut visited)
            }
            _ => false,
        }
    }
}

enum Frame {
    Sequence(NodeId),
    Mapping(NodeId, Option<NodeId>),
}

/// Build the representation graph of the stream's single document.
///
/// Anchors are registered before their node's children are read, so
/// self-referential structures resolve during construction. A second
/// document in the stream fails with
/// [`ConstructionError::TrailingDocument`]; duplicate mapping keys fail at
/// the second key's position.
pub fn load_dom<P: EventProducer>(
    stream: &mut EventStream<P>,
) -> Result<Dom, ConstructionError> {
    let mut ctx = ConstructionContext::new(stream);
    ctx.expect(Expected::StreamStart)?;
    if matches!(ctx.input.peek()?.data, EventData::StreamEnd) {
        ctx.input.next()?;
        return Ok(Dom::new());
    }
    ctx.expect(Expected::DocumentStart)?;

    let mut dom = Dom::new();
    let mut frames: Vec<Frame> = Vec::new();
    loop {
        let event = ctx.input.next()?;
        let start_mark = event.start_mark;
        let end_mark = event.end_mark;
        match event.data {
            EventData::DocumentEnd { .. } => {
                if !frames.is_empty() {
                    return Err(ConstructionError::problem(
                        "document ended inside a collection",
                        start_mark,
                    ));
                }
                break;
            }
            EventData::Scalar {
                anchor,
                mut tag,
                value,
                style,
            } => {
                if tag.is_none() || tag.as_deref() == Some(NON_SPECIFIC_TAG) {
                    tag = Some(String::from(DEFAULT_SCALAR_TAG));
                }
                let id = dom.push_node(Node {
                    tag,
                    data: NodeData::Scalar { value, style },
                    start_mark,
                    end_mark,
                });
                if let Some(anchor) = anchor {
                    let tag = dom.node(id).tag.clone();
                    ctx.bind_anchor(&anchor, tag.as_deref(), id.index());
                }
                attach(&mut dom, &mut frames, id, start_mark)?;
            }
            EventData::SequenceStart { anchor, mut tag, style } => {
                if tag.is_none() || tag.as_deref() == Some(NON_SPECIFIC_TAG) {
                    tag = Some(String::from(DEFAULT_SEQUENCE_TAG));
                }
                let id = dom.push_node(Node {
                    tag,
                    data: NodeData::Sequence {
                        items: Vec::new(),
                        style,
                    },
                    start_mark,
                    end_mark,
                });
                if let Some(anchor) = anchor {
                    let tag = dom.node(id).tag.clone();
                    ctx.bind_anchor(&anchor, tag.as_deref(), id.index());
                }
                attach(&mut dom, &mut frames, id, start_mark)?;
                frames.push(Frame::Sequence(id));
            }
            EventData::SequenceEnd => {
                let Some(Frame::Sequence(id)) = frames.pop() else {
                    return Err(ConstructionError::problem(
                        "unexpected SEQUENCE-END",
                        start_mark,
                    ));
                };
                dom.nodes[id.0].end_mark = end_mark;
            }
            EventData::MappingStart { anchor, mut tag, style } => {
                if tag.is_none() || tag.as_deref() == Some(NON_SPECIFIC_TAG) {
                    tag = Some(String::from(DEFAULT_MAPPING_TAG));
                }
                let id = dom.push_node(Node {
                    tag,
                    data: NodeData::Mapping {
                        pairs: Vec::new(),
                        style,
                    },
                    start_mark,
                    end_mark,
                });
                if let Some(anchor) = anchor {
                    let tag = dom.node(id).tag.clone();
                    ctx.bind_anchor(&anchor, tag.as_deref(), id.index());
                }
                attach(&mut dom, &mut frames, id, start_mark)?;
                frames.push(Frame::Mapping(id, None));
            }
            EventData::MappingEnd => {
                let Some(Frame::Mapping(id, pending)) = frames.pop() else {
                    return Err(ConstructionError::problem(
                        "unexpected MAPPING-END",
                        start_mark,
                    ));
                };
                if pending.is_some() {
                    return Err(ConstructionError::problem(
                        "mapping ended after a key without a value",
                        start_mark,
                    ));
                }
                dom.nodes[id.0].end_mark = end_mark;
                check_duplicate_keys(&dom, id)?;
            }
            EventData::Alias { anchor } => {
                let id = NodeId(ctx.resolve_alias(&anchor, start_mark)?.handle);
                attach(&mut dom, &mut frames, id, start_mark)?;
            }
            EventData::StreamStart
            | EventData::StreamEnd
            | EventData::DocumentStart { .. } => {
                return Err(ConstructionError::problem(
                    "unexpected event inside a document",
                    start_mark,
                ));
            }
        }
    }

    let event = ctx.input.next()?;
    match event.data {
        EventData::StreamEnd => Ok(dom),
        EventData::DocumentStart { .. } => Err(ConstructionError::TrailingDocument {
            mark: event.start_mark,
        }),
        _ => Err(ConstructionError::problem(
            "expected STREAM-END after the document",
            event.start_mark,
        )),
    }
}

fn attach(
    dom: &mut Dom,
    frames: &mut Vec<Frame>,
    id: NodeId,
    mark: Mark,
) -> Result<(), ConstructionError> {
    match frames.last_mut() {
        None => {
            if dom.root.is_some() {
                return Err(ConstructionError::problem(
                    "multiple root nodes in one document",
                    mark,
                ));
            }
            dom.root = Some(id);
        }
        Some(Frame::Sequence(sequence)) => {
            let sequence = *sequence;
            dom.push_item(sequence, id);
        }
        Some(Frame::Mapping(mapping, pending)) => match pending.take() {
            None => *pending = Some(id),
            Some(key) => {
                let mapping = *mapping;
                dom.push_pair(mapping, key, id);
            }
        },
    }
    Ok(())
}

fn check_duplicate_keys(dom: &Dom, mapping: NodeId) -> Result<(), ConstructionError> {
    let NodeData::Mapping { pairs, .. } = &dom.node(mapping).data else {
        unreachable!("caller verified the node kind");
    };
    for (second, (key, _)) in pairs.iter().enumerate() {
        for (earlier, _) in pairs.iter().take(second) {
            if dom.nodes_equal(*earlier, *key) {
                return Err(ConstructionError::DuplicateKey {
                    mark: dom.node(*key).start_mark,
                });
            }
        }
    }
    Ok(())
}

/// Serialize the graph into a buffered event sequence, applying the anchor
/// style from `options`.
pub fn dom_to_events(
    dom: &Dom,
    options: SerializationOptions,
) -> Result<EventBuffer, SerializationError> {
    let mut buffer = EventBuffer::new();
    buffer.push(Event::stream_start());
    buffer.push(Event::document_start(true, None, &[]));
    if let Some(root) = dom.root() {
        let mut ctx = SerializationContext::new(&mut buffer, options);
        dump_node(dom, root, &mut ctx)?;
        ctx.finish();
    }
    buffer.push(Event::document_end(false));
    buffer.push(Event::stream_end());
    Ok(buffer)
}

fn dump_node(
    dom: &Dom,
    id: NodeId,
    ctx: &mut SerializationContext<'_>,
) -> Result<(), SerializationError> {
    if ctx.begin_ref(id.index())? {
        return Ok(());
    }
    let node = dom.node(id);
    match &node.data {
        NodeData::Scalar { value, style } => {
            let tag = explicit_tag(node.tag.as_deref(), DEFAULT_SCALAR_TAG);
            ctx.put(Event::scalar(None, tag, value, *style));
        }
        NodeData::Sequence { items, style } => {
            let tag = explicit_tag(node.tag.as_deref(), DEFAULT_SEQUENCE_TAG);
            ctx.put(Event::sequence_start(None, tag, *style));
            for item in items {
                dump_node(dom, *item, ctx)?;
            }
            ctx.put(Event::sequence_end());
        }
        NodeData::Mapping { pairs, style } => {
            let tag = explicit_tag(node.tag.as_deref(), DEFAULT_MAPPING_TAG);
            ctx.put(Event::mapping_start(None, tag, *style));
            for (key, value) in pairs {
                dump_node(dom, *key, ctx)?;
                dump_node(dom, *value, ctx)?;
            }
            ctx.put(Event::mapping_end());
        }
    }
    ctx.end_ref(id.index());
    Ok(())
}

/// A node carrying its kind's default tag presents without one.
fn explicit_tag<'t>(tag: Option<&'t str>, default: &str) -> Option<&'t str> {
    match tag {
        Some(tag) if tag == default => None,
        other => other,
    }
}

/// Present the graph as YAML (or JSON, per the presenter options).
pub fn dump_dom<W: Write>(
    dom: &Dom,
    writer: W,
    presenter_options: PresenterOptions,
    serialization_options: SerializationOptions,
) -> Result<W, SerializationError> {
    let buffer = dom_to_events(dom, serialization_options)?;
    let mut stream = EventStream::new(buffer);
    Ok(present(&mut stream, writer, presenter_options)?)
}
