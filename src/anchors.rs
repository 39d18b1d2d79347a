//! Anchor and alias bookkeeping for serialization passes.
//!
//! The manager's state lives for one pass over one document and is rebuilt
//! for the next.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::SerializationError;
use crate::event::EventData;
use crate::stream::EventBuffer;

/// How anchors are produced when a value graph is serialized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AnchorStyle {
    /// Emit no anchors or aliases at all. Graphs with shared nodes are
    /// duplicated; cyclic graphs fail serialization.
    None,
    /// Emit an anchor only on nodes that are actually referenced again,
    /// with compact names. Requires a rewrite pass over the event buffer.
    #[default]
    Tidy,
    /// Emit an anchor on every node at first emission.
    Always,
}

/// Options for a serialization pass.
#[derive(Copy, Clone, Debug, Default)]
#[non_exhaustive]
pub struct SerializationOptions {
    pub anchor_style: AnchorStyle,
}

impl SerializationOptions {
    pub fn new(anchor_style: AnchorStyle) -> SerializationOptions {
        SerializationOptions { anchor_style }
    }
}

/// Monotonic generator of anchor names: `a`, `b`, …, `z`, `aa`, `ab`, ….
#[derive(Debug, Default)]
pub struct AnchorNames {
    next: u64,
}

impl AnchorNames {
    pub fn new() -> AnchorNames {
        AnchorNames::default()
    }

    pub fn next_name(&mut self) -> String {
        let mut n = self.next;
        self.next += 1;
        let mut name = Vec::new();
        loop {
            name.push(b'a' + (n % 26) as u8);
            n /= 26;
            if n == 0 {
                break;
            }
            n -= 1;
        }
        name.reverse();
        String::from_utf8(name).expect("anchor names are ASCII")
    }
}

/// The set of nodes currently being serialized, keyed by object identity.
///
/// Used under [`AnchorStyle::None`]: re-entering a live node means the
/// graph is cyclic and cannot be written without aliases.
#[derive(Debug, Default)]
pub struct CycleGuard {
    live: HashSet<usize>,
}

impl CycleGuard {
    pub fn new() -> CycleGuard {
        CycleGuard::default()
    }

    /// Mark `identity` as being serialized.
    pub fn enter(&mut self, identity: usize) -> Result<(), SerializationError> {
        if !self.live.insert(identity) {
            return Err(SerializationError::CyclicGraph);
        }
        Ok(())
    }

    /// Unmark `identity` once its subtree is fully written.
    pub fn leave(&mut self, identity: usize) {
        self.live.remove(&identity);
    }
}

/// Outcome of visiting a node during an anchored serialization pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnchorVisit {
    /// First visit; serialize the node with this (tentative) anchor.
    First(String),
    /// The node was serialized before; emit an alias to this anchor.
    Revisit(String),
}

/// Per-pass record of which object received which tentative anchor and
/// whether anything referenced it again.
#[derive(Debug, Default)]
pub struct AnchorLedger {
    by_identity: HashMap<usize, String>,
    referenced: HashMap<String, bool>,
    names: AnchorNames,
}

impl AnchorLedger {
    pub fn new() -> AnchorLedger {
        AnchorLedger::default()
    }

    /// Record a visit to `identity`, assigning a tentative anchor on the
    /// first one and flipping the referenced flag on every later one.
    pub fn visit(&mut self, identity: usize) -> AnchorVisit {
        if let Some(name) = self.by_identity.get(&identity) {
            self.referenced.insert(name.clone(), true);
            AnchorVisit::Revisit(name.clone())
        } else {
            let name = self.names.next_name();
            self.by_identity.insert(identity, name.clone());
            self.referenced.insert(name.clone(), false);
            AnchorVisit::First(name)
        }
    }

    fn tentative_state(&self, anchor: &str) -> Option<bool> {
        self.referenced.get(anchor).copied()
    }
}

/// The tidy second pass: walk the buffered events, promote referenced
/// tentative anchors to compact final names, clear unreferenced ones, and
/// remap alias targets identically.
pub fn rewrite_tidy_anchors(buffer: &mut EventBuffer, ledger: &AnchorLedger) {
    let mut names = AnchorNames::new();
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut kept = 0usize;
    let mut cleared = 0usize;

    for event in buffer.events_mut() {
        match &mut event.data {
            EventData::Scalar { anchor, .. }
            | EventData::SequenceStart { anchor, .. }
            | EventData::MappingStart { anchor, .. } => {
                let Some(name) = anchor.as_deref() else {
                    continue;
                };
                match ledger.tentative_state(name) {
                    Some(true) => {
                        let compact = renames
                            .entry(String::from(name))
                            .or_insert_with(|| names.next_name())
                            .clone();
                        *anchor = Some(compact);
                        kept += 1;
                    }
                    Some(false) => {
                        *anchor = None;
                        cleared += 1;
                    }
                    // Not one of ours; leave it alone.
                    None => {}
                }
            }
            EventData::Alias { anchor } => {
                if let Some(compact) = renames.get(anchor.as_str()) {
                    *anchor = compact.clone();
                }
            }
            _ => {}
        }
    }
    debug!("tidy anchors: kept {kept}, cleared {cleared}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::{CollectionStyle, ScalarStyle};
    use pretty_assertions::assert_eq;

    #[test]
    fn anchor_names_roll_over_after_z() {
        let mut names = AnchorNames::new();
        let first: Vec<String> = (0..4).map(|_| names.next_name()).collect();
        assert_eq!(first, ["a", "b", "c", "d"]);
        let mut names = AnchorNames::new();
        let all: Vec<String> = (0..28).map(|_| names.next_name()).collect();
        assert_eq!(all[25], "z");
        assert_eq!(all[26], "aa");
        assert_eq!(all[27], "ab");
    }

    #[test]
    fn cycle_guard_rejects_reentry() {
        let mut guard = CycleGuard::new();
        guard.enter(1).unwrap();
        guard.enter(2).unwrap();
        assert!(matches!(
            guard.enter(1),
            Err(SerializationError::CyclicGraph)
        ));
        guard.leave(2);
        guard.enter(2).unwrap();
    }

    #[test]
    fn ledger_tracks_references() {
        let mut ledger = AnchorLedger::new();
        assert_eq!(ledger.visit(10), AnchorVisit::First(String::from("a")));
        assert_eq!(ledger.visit(20), AnchorVisit::First(String::from("b")));
        assert_eq!(ledger.visit(10), AnchorVisit::Revisit(String::from("a")));
        assert_eq!(ledger.tentative_state("a"), Some(true));
        assert_eq!(ledger.tentative_state("b"), Some(false));
    }

    #[test]
    fn rewrite_keeps_referenced_and_clears_the_rest() {
        let mut ledger = AnchorLedger::new();
        // Nodes 1 (root) and 2 (shared child); only 2 is revisited.
        let AnchorVisit::First(root_anchor) = ledger.visit(1) else {
            panic!("first visit")
        };
        let AnchorVisit::First(child_anchor) = ledger.visit(2) else {
            panic!("first visit")
        };
        let AnchorVisit::Revisit(alias_target) = ledger.visit(2) else {
            panic!("revisit")
        };

        let mut buffer = EventBuffer::new();
        buffer.push(Event::sequence_start(
            Some(&root_anchor),
            None,
            CollectionStyle::Any,
        ));
        buffer.push(Event::scalar(
            Some(&child_anchor),
            None,
            "shared",
            ScalarStyle::Plain,
        ));
        buffer.push(Event::alias(&alias_target));
        buffer.push(Event::sequence_end());

        rewrite_tidy_anchors(&mut buffer, &ledger);

        let events: Vec<Event> = {
            let mut stream = crate::stream::EventStream::new(buffer);
            std::iter::from_fn(|| stream.next().ok()).collect()
        };
        assert_eq!(
            events[0],
            Event::sequence_start(None, None, CollectionStyle::Any)
        );
        assert_eq!(
            events[1],
            Event::scalar(Some("a"), None, "shared", ScalarStyle::Plain)
        );
        assert_eq!(events[2], Event::alias("a"));
    }

    #[test]
    fn rewrite_leaves_foreign_anchors_alone() {
        let ledger = AnchorLedger::new();
        let mut buffer = EventBuffer::new();
        buffer.push(Event::scalar(
            Some("user"),
            None,
            "x",
            ScalarStyle::Plain,
        ));
        rewrite_tidy_anchors(&mut buffer, &ledger);
        let mut stream = crate::stream::EventStream::new(buffer);
        assert_eq!(
            stream.next().unwrap(),
            Event::scalar(Some("user"), None, "x", ScalarStyle::Plain)
        );
    }
}
