//! Representation framing: the context a value mapping emits events
//! through, and the scalar type guesser shared with the JSON presenter.

use std::collections::HashMap;

use log::trace;
use regex::Regex;

use crate::anchors::{
    rewrite_tidy_anchors, AnchorLedger, AnchorStyle, AnchorVisit, CycleGuard, SerializationOptions,
};
use crate::error::SerializationError;
use crate::event::{Event, EventData};
use crate::stream::EventBuffer;
use crate::{CollectionStyle, ScalarStyle};

/// What a scalar's content looks like under the core schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeGuess {
    Null,
    BoolTrue,
    BoolFalse,
    Int,
    Float,
    FloatInf,
    FloatNan,
    Timestamp,
    Unknown,
}

/// Core-schema scalar recognition with patterns compiled once.
#[derive(Debug)]
pub struct TypeGuesser {
    int: Regex,
    float: Regex,
    float_inf: Regex,
    float_nan: Regex,
    timestamp: Regex,
}

impl Default for TypeGuesser {
    fn default() -> TypeGuesser {
        TypeGuesser::new()
    }
}

impl TypeGuesser {
    pub fn new() -> TypeGuesser {
        TypeGuesser {
            int: Regex::new(r"^[-+]?[0-9]+$|^0o[0-7]+$|^0x[0-9a-fA-F]+$")
                .expect("int pattern compiles"),
            float: Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$")
                .expect("float pattern compiles"),
            float_inf: Regex::new(r"^[-+]?(\.inf|\.Inf|\.INF)$").expect("inf pattern compiles"),
            float_nan: Regex::new(r"^(\.nan|\.NaN|\.NAN)$").expect("nan pattern compiles"),
            timestamp: Regex::new(
                r"^[0-9]{4}-[0-9]{2}-[0-9]{2}([Tt ][0-9]{1,2}:[0-9]{2}:[0-9]{2}(\.[0-9]*)?( ?(Z|[-+][0-9]{1,2}(:[0-9]{2})?))?)?$",
            )
            .expect("timestamp pattern compiles"),
        }
    }

    pub fn guess(&self, value: &str) -> TypeGuess {
        match value {
            "" | "~" | "null" | "Null" | "NULL" => return TypeGuess::Null,
            "true" | "True" | "TRUE" => return TypeGuess::BoolTrue,
            "false" | "False" | "FALSE" => return TypeGuess::BoolFalse,
            _ => {}
        }
        if self.int.is_match(value) {
            TypeGuess::Int
        } else if self.float.is_match(value) {
            TypeGuess::Float
        } else if self.float_inf.is_match(value) {
            TypeGuess::FloatInf
        } else if self.float_nan.is_match(value) {
            TypeGuess::FloatNan
        } else if self.timestamp.is_match(value) {
            TypeGuess::Timestamp
        } else {
            TypeGuess::Unknown
        }
    }
}

/// The context a representation pass emits events through.
///
/// It owns the anchor bookkeeping for the pass and the event buffer being
/// filled. Anchors are attached through a one-shot interception: visiting a
/// fresh shared node arms `pending_anchor`, and the very next [`put`]
/// carries it. This keeps emission order intact for self-referential
/// values.
///
/// [`put`]: SerializationContext::put
pub struct SerializationContext<'a> {
    out: &'a mut EventBuffer,
    anchor_style: AnchorStyle,
    guard: CycleGuard,
    ledger: AnchorLedger,
    pending_anchor: Option<String>,
    guesser: Option<TypeGuesser>,
    /// Style override applied to the next scalar event only.
    pub scalar_style_hint: Option<ScalarStyle>,
    /// Style override applied to the next collection start only.
    pub collection_style_hint: Option<CollectionStyle>,
}

impl<'a> SerializationContext<'a> {
    pub fn new(out: &'a mut EventBuffer, options: SerializationOptions) -> SerializationContext<'a> {
        SerializationContext {
            out,
            anchor_style: options.anchor_style,
            guard: CycleGuard::new(),
            ledger: AnchorLedger::new(),
            pending_anchor: None,
            guesser: None,
            scalar_style_hint: None,
            collection_style_hint: None,
        }
    }

    /// The pass's scalar type guesser, compiled on first use.
    pub fn guesser(&mut self) -> &TypeGuesser {
        self.guesser.get_or_insert_with(TypeGuesser::new)
    }

    /// Emit one event, attaching any pending anchor and one-shot style
    /// hints to it.
    pub fn put(&mut self, mut event: Event) {
        match &mut event.data {
            EventData::Scalar { anchor, style, .. } => {
                if anchor.is_none() {
                    *anchor = self.pending_anchor.take();
                }
                if *style == ScalarStyle::Any {
                    if let Some(hint) = self.scalar_style_hint.take() {
                        *style = hint;
                    }
                }
            }
            EventData::SequenceStart { anchor, style, .. }
            | EventData::MappingStart { anchor, style, .. } => {
                if anchor.is_none() {
                    *anchor = self.pending_anchor.take();
                }
                if *style == CollectionStyle::Any {
                    if let Some(hint) = self.collection_style_hint.take() {
                        *style = hint;
                    }
                }
            }
            _ => {}
        }
        self.out.push(event);
    }

    /// Announce that the object with the given stable identity is about to
    /// be represented.
    ///
    /// Returns `true` when an alias was emitted instead and the caller must
    /// skip the object's body. Under [`AnchorStyle::None`] re-entering a
    /// live object fails with [`SerializationError::CyclicGraph`].
    pub fn begin_ref(&mut self, identity: usize) -> Result<bool, SerializationError> {
        match self.anchor_style {
            AnchorStyle::None => {
                self.guard.enter(identity)?;
                Ok(false)
            }
            AnchorStyle::Tidy | AnchorStyle::Always => match self.ledger.visit(identity) {
                AnchorVisit::First(anchor) => {
                    trace!("object {identity} gets anchor {anchor}");
                    self.pending_anchor = Some(anchor);
                    Ok(false)
                }
                AnchorVisit::Revisit(anchor) => {
                    self.put(Event::alias(&anchor));
                    Ok(true)
                }
            },
        }
    }

    /// Close the object opened by the matching [`begin_ref`].
    ///
    /// [`begin_ref`]: SerializationContext::begin_ref
    pub fn end_ref(&mut self, identity: usize) {
        if self.anchor_style == AnchorStyle::None {
            self.guard.leave(identity);
        }
    }

    /// Finish the pass. Under [`AnchorStyle::Tidy`] this runs the rewrite
    /// that compacts referenced anchors and clears unreferenced ones.
    pub fn finish(self) {
        if self.anchor_style == AnchorStyle::Tidy {
            rewrite_tidy_anchors(self.out, &self.ledger);
        }
    }
}

/// A value that can emit the events representing itself.
pub trait RepresentChild {
    fn represent_child(&self, ctx: &mut SerializationContext<'_>)
        -> Result<(), SerializationError>;
}

impl RepresentChild for i64 {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        let mut buffer = itoa::Buffer::new();
        ctx.put(Event::scalar(
            None,
            None,
            buffer.format(*self),
            ScalarStyle::Plain,
        ));
        Ok(())
    }
}

impl RepresentChild for f64 {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        let text = if self.is_nan() {
            String::from(".nan")
        } else if *self == f64::INFINITY {
            String::from(".inf")
        } else if *self == f64::NEG_INFINITY {
            String::from("-.inf")
        } else {
            let mut buffer = ryu::Buffer::new();
            String::from(buffer.format(*self))
        };
        ctx.put(Event::scalar(None, None, &text, ScalarStyle::Plain));
        Ok(())
    }
}

impl RepresentChild for bool {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        let text = if *self { "true" } else { "false" };
        ctx.put(Event::scalar(None, None, text, ScalarStyle::Plain));
        Ok(())
    }
}

impl RepresentChild for str {
    /// Strings whose content would re-resolve to another core type are
    /// quoted so they stay strings.
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        let style = if self.is_empty() || ctx.guesser().guess(self) != TypeGuess::Unknown {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::Any
        };
        ctx.put(Event::scalar(None, None, self, style));
        Ok(())
    }
}

impl RepresentChild for String {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        self.as_str().represent_child(ctx)
    }
}

impl<T: RepresentChild> RepresentChild for Option<T> {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        match self {
            Some(value) => value.represent_child(ctx),
            None => {
                ctx.put(Event::scalar(None, None, "null", ScalarStyle::Plain));
                Ok(())
            }
        }
    }
}

impl<T: RepresentChild> RepresentChild for Vec<T> {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        ctx.put(Event::sequence_start(None, None, CollectionStyle::Any));
        for item in self {
            item.represent_child(ctx)?;
        }
        ctx.put(Event::sequence_end());
        Ok(())
    }
}

impl<K: RepresentChild, V: RepresentChild> RepresentChild for HashMap<K, V> {
    fn represent_child(
        &self,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializationError> {
        ctx.put(Event::mapping_start(None, None, CollectionStyle::Any));
        for (key, value) in self {
            key.represent_child(ctx)?;
            value.represent_child(ctx)?;
        }
        ctx.put(Event::mapping_end());
        Ok(())
    }
}
