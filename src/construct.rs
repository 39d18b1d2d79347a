//! Construction framing: the context a value mapping reads events through
//! while building native values or DOM nodes.

use std::collections::HashMap;

use crate::error::{ConstructionError, Mark};
use crate::event::{Event, EventData};
use crate::stream::{EventProducer, EventStream};
use crate::ScalarStyle;

/// What an anchor currently refers to: the node's tag and an opaque handle
/// chosen by the builder (a DOM node index, an arena slot, …).
#[derive(Clone, Debug)]
pub struct AnchorBinding {
    pub tag: Option<String>,
    pub handle: usize,
}

/// A scalar event pulled apart for construction.
#[derive(Clone, Debug)]
pub struct ScalarValue {
    pub anchor: Option<String>,
    pub tag: Option<String>,
    pub value: String,
    pub style: ScalarStyle,
    pub mark: Mark,
}

/// The context a construction pass reads events through.
///
/// Builders register every anchored node here before descending into its
/// children, so aliases inside a node can refer back to the node itself.
pub struct ConstructionContext<'a, P: EventProducer> {
    pub input: &'a mut EventStream<P>,
    anchors: HashMap<String, AnchorBinding>,
}

impl<'a, P: EventProducer> ConstructionContext<'a, P> {
    pub fn new(input: &'a mut EventStream<P>) -> ConstructionContext<'a, P> {
        ConstructionContext {
            input,
            anchors: HashMap::new(),
        }
    }

    /// Bind `anchor` to a node handle. Anchors may repeat within a
    /// document; the most recent binding wins.
    pub fn bind_anchor(&mut self, anchor: &str, tag: Option<&str>, handle: usize) {
        self.anchors.insert(
            String::from(anchor),
            AnchorBinding {
                tag: tag.map(String::from),
                handle,
            },
        );
    }

    /// Resolve an alias target to its binding.
    pub fn resolve_alias(
        &self,
        anchor: &str,
        mark: Mark,
    ) -> Result<&AnchorBinding, ConstructionError> {
        self.anchors.get(anchor).ok_or_else(|| {
            ConstructionError::UnknownAlias {
                anchor: String::from(anchor),
                mark,
            }
        })
    }

    fn problem(&self, problem: &'static str, mark: Mark) -> ConstructionError {
        ConstructionError::Problem {
            problem,
            mark,
            line: self.input.last_token_context(),
        }
    }

    /// Pull the next event and require it to be a scalar.
    pub fn expect_scalar(&mut self) -> Result<ScalarValue, ConstructionError> {
        let event = self.input.next()?;
        let mark = event.start_mark;
        match event.data {
            EventData::Scalar {
                anchor,
                tag,
                value,
                style,
            } => Ok(ScalarValue {
                anchor,
                tag,
                value,
                style,
                mark,
            }),
            _ => Err(self.problem("expected a scalar value", mark)),
        }
    }

    /// Pull the next event and require the given kind, returning its marks.
    pub fn expect(&mut self, wanted: Expected) -> Result<Event, ConstructionError> {
        let event = self.input.next()?;
        let matched = matches!(
            (&event.data, wanted),
            (EventData::StreamStart, Expected::StreamStart)
                | (EventData::StreamEnd, Expected::StreamEnd)
                | (EventData::DocumentStart { .. }, Expected::DocumentStart)
                | (EventData::DocumentEnd { .. }, Expected::DocumentEnd)
                | (EventData::SequenceStart { .. }, Expected::SequenceStart)
                | (EventData::SequenceEnd, Expected::SequenceEnd)
                | (EventData::MappingStart { .. }, Expected::MappingStart)
                | (EventData::MappingEnd, Expected::MappingEnd)
        );
        if matched {
            Ok(event)
        } else {
            Err(self.problem(wanted.description(), event.start_mark))
        }
    }
}

/// Event kinds a builder can demand from the context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    SequenceStart,
    SequenceEnd,
    MappingStart,
    MappingEnd,
}

impl Expected {
    fn description(self) -> &'static str {
        match self {
            Expected::StreamStart => "expected STREAM-START",
            Expected::StreamEnd => "expected STREAM-END",
            Expected::DocumentStart => "expected DOCUMENT-START",
            Expected::DocumentEnd => "expected DOCUMENT-END",
            Expected::SequenceStart => "expected SEQUENCE-START",
            Expected::SequenceEnd => "expected SEQUENCE-END",
            Expected::MappingStart => "expected MAPPING-START",
            Expected::MappingEnd => "expected MAPPING-END",
        }
    }
}

/// A value that can build itself from events, consuming everything up to
/// and including its closing event.
pub trait ConstructChild: Sized {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError>;
}

pub(crate) fn parse_int(value: &str) -> Option<i64> {
    if let Some(hex) = value.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(octal) = value.strip_prefix("0o") {
        i64::from_str_radix(octal, 8).ok()
    } else {
        value.parse::<i64>().ok()
    }
}

impl ConstructChild for i64 {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError> {
        let scalar = ctx.expect_scalar()?;
        match parse_int(&scalar.value) {
            Some(number) => {
                *target = number;
                Ok(())
            }
            None => Err(ctx.problem("expected an integer scalar", scalar.mark)),
        }
    }
}

impl ConstructChild for f64 {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError> {
        let scalar = ctx.expect_scalar()?;
        let parsed = match scalar.value.as_str() {
            ".inf" | "+.inf" | ".Inf" | "+.Inf" | ".INF" | "+.INF" => Some(f64::INFINITY),
            "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
            ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
            other => other.parse::<f64>().ok(),
        };
        match parsed {
            Some(number) => {
                *target = number;
                Ok(())
            }
            None => Err(ctx.problem("expected a float scalar", scalar.mark)),
        }
    }
}

impl ConstructChild for bool {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError> {
        let scalar = ctx.expect_scalar()?;
        match scalar.value.as_str() {
            "true" | "True" | "TRUE" => {
                *target = true;
                Ok(())
            }
            "false" | "False" | "FALSE" => {
                *target = false;
                Ok(())
            }
            _ => Err(ctx.problem("expected a boolean scalar", scalar.mark)),
        }
    }
}

impl ConstructChild for String {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError> {
        let scalar = ctx.expect_scalar()?;
        *target = scalar.value;
        Ok(())
    }
}

impl<T: ConstructChild + Default> ConstructChild for Option<T> {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError> {
        let is_null = matches!(
            &ctx.input.peek()?.data,
            EventData::Scalar { value, tag, style, .. }
                if *style == ScalarStyle::Plain
                    && tag.is_none()
                    && matches!(value.as_str(), "" | "~" | "null" | "Null" | "NULL")
        );
        if is_null {
            ctx.input.next()?;
            *target = None;
        } else {
            let mut value = T::default();
            T::construct_child(ctx, &mut value)?;
            *target = Some(value);
        }
        Ok(())
    }
}

impl<T: ConstructChild + Default> ConstructChild for Vec<T> {
    fn construct_child<P: EventProducer>(
        ctx: &mut ConstructionContext<'_, P>,
        target: &mut Self,
    ) -> Result<(), ConstructionError> {
        ctx.expect(Expected::SequenceStart)?;
        target.clear();
        loop {
            if matches!(ctx.input.peek()?.data, EventData::SequenceEnd) {
                ctx.input.next()?;
                return Ok(());
            }
            let mut item = T::default();
            T::construct_child(ctx, &mut item)?;
            target.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::EventBuffer;
    use pretty_assertions::assert_eq;

    fn stream_of(events: Vec<Event>) -> EventStream<EventBuffer> {
        EventStream::new(events.into_iter().collect())
    }

    fn plain(value: &str) -> Event {
        Event::scalar(None, None, value, ScalarStyle::Plain)
    }

    #[test]
    fn constructs_primitives() {
        let mut stream = stream_of(vec![
            plain("42"),
            plain("0x10"),
            plain("2.5"),
            plain("-.inf"),
            plain("true"),
            plain("hello"),
        ]);
        let mut ctx = ConstructionContext::new(&mut stream);
        let mut int = 0i64;
        i64::construct_child(&mut ctx, &mut int).unwrap();
        assert_eq!(int, 42);
        i64::construct_child(&mut ctx, &mut int).unwrap();
        assert_eq!(int, 16);
        let mut float = 0f64;
        f64::construct_child(&mut ctx, &mut float).unwrap();
        assert_eq!(float, 2.5);
        f64::construct_child(&mut ctx, &mut float).unwrap();
        assert_eq!(float, f64::NEG_INFINITY);
        let mut flag = false;
        bool::construct_child(&mut ctx, &mut flag).unwrap();
        assert!(flag);
        let mut text = String::new();
        String::construct_child(&mut ctx, &mut text).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn construct_sequence_of_ints() {
        let mut stream = stream_of(vec![
            Event::sequence_start(None, None, crate::CollectionStyle::Any),
            plain("1"),
            plain("2"),
            plain("3"),
            Event::sequence_end(),
        ]);
        let mut ctx = ConstructionContext::new(&mut stream);
        let mut items: Vec<i64> = Vec::new();
        Vec::construct_child(&mut ctx, &mut items).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn optional_null_consumes_the_event() {
        let mut stream = stream_of(vec![plain("null"), plain("7")]);
        let mut ctx = ConstructionContext::new(&mut stream);
        let mut maybe: Option<i64> = Some(1);
        Option::construct_child(&mut ctx, &mut maybe).unwrap();
        assert_eq!(maybe, None);
        Option::construct_child(&mut ctx, &mut maybe).unwrap();
        assert_eq!(maybe, Some(7));
    }

    #[test]
    fn wrong_kind_reports_the_mark() {
        let mut stream = stream_of(vec![
            Event::sequence_start(None, None, crate::CollectionStyle::Any)
                .at(Mark::new(3, 5), Mark::new(3, 6)),
        ]);
        let mut ctx = ConstructionContext::new(&mut stream);
        let mut int = 0i64;
        let err = i64::construct_child(&mut ctx, &mut int).unwrap_err();
        assert_eq!(err.to_string(), "line 3 column 5: expected a scalar value");
    }

    #[test]
    fn anchors_rebind_to_the_most_recent_node() {
        let mut stream = stream_of(vec![]);
        let mut ctx = ConstructionContext::new(&mut stream);
        ctx.bind_anchor("a", None, 1);
        ctx.bind_anchor("a", None, 2);
        assert_eq!(ctx.resolve_alias("a", Mark::default()).unwrap().handle, 2);
        assert!(matches!(
            ctx.resolve_alias("missing", Mark::default()),
            Err(ConstructionError::UnknownAlias { .. })
        ));
    }
}
