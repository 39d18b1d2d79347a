//! Lazy pull access to a sequence of events.

use std::collections::VecDeque;

use crate::error::StreamError;
use crate::event::Event;

/// A source of events. Well-formedness of the produced sequence is the
/// producer's obligation; consumers may assume it.
pub trait EventProducer {
    /// Produce the next event, `Ok(None)` once the sequence is finished.
    fn next_event(&mut self) -> Result<Option<Event>, StreamError>;

    /// The content of the input line the producer last worked on, for
    /// diagnostics. Producers without a text backing report `None`.
    fn last_line(&self) -> Option<String> {
        None
    }
}

/// The function-backed producer: wraps any `FnMut` yielding events.
pub struct FnProducer<F>(F);

impl<F> FnProducer<F>
where
    F: FnMut() -> Result<Option<Event>, StreamError>,
{
    pub fn new(produce: F) -> FnProducer<F> {
        FnProducer(produce)
    }
}

impl<F> EventProducer for FnProducer<F>
where
    F: FnMut() -> Result<Option<Event>, StreamError>,
{
    fn next_event(&mut self) -> Result<Option<Event>, StreamError> {
        (self.0)()
    }
}

/// An in-memory ordered sequence of events with an append side and a read
/// cursor. Representation writes into one of these; the anchor rewrite pass
/// walks it before it is drained.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: VecDeque<Event>,
}

impl EventBuffer {
    pub fn new() -> EventBuffer {
        EventBuffer::default()
    }

    /// Append an event behind the read cursor.
    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Mutable access to the buffered events, front to back.
    pub fn events_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.events.iter_mut()
    }
}

impl EventProducer for EventBuffer {
    fn next_event(&mut self) -> Result<Option<Event>, StreamError> {
        Ok(self.events.pop_front())
    }
}

impl FromIterator<Event> for EventBuffer {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> EventBuffer {
        EventBuffer {
            events: iter.into_iter().collect(),
        }
    }
}

/// A pull iterator over events with a one-element peek window.
///
/// The stream is single-threaded and not restartable; dropping it aborts
/// whatever pipeline it fed.
pub struct EventStream<P: EventProducer> {
    producer: P,
    peeked: Option<Event>,
}

impl<F> EventStream<FnProducer<F>>
where
    F: FnMut() -> Result<Option<Event>, StreamError>,
{
    /// Wrap a generator-like closure as a stream.
    pub fn from_fn(produce: F) -> EventStream<FnProducer<F>> {
        EventStream::new(FnProducer::new(produce))
    }
}

impl<P: EventProducer> EventStream<P> {
    pub fn new(producer: P) -> EventStream<P> {
        EventStream {
            producer,
            peeked: None,
        }
    }

    /// Consume and return the next event.
    ///
    /// Pulling past the end of the producer's sequence fails with
    /// [`StreamError::Exhausted`]; a well-formed stream ends at STREAM-END
    /// and consumers stop there.
    pub fn next(&mut self) -> Result<Event, StreamError> {
        if let Some(event) = self.peeked.take() {
            return Ok(event);
        }
        self.producer.next_event()?.ok_or(StreamError::Exhausted)
    }

    /// Return the next event without consuming it. Idempotent.
    pub fn peek(&mut self) -> Result<&Event, StreamError> {
        if self.peeked.is_none() {
            let event = self.producer.next_event()?.ok_or(StreamError::Exhausted)?;
            self.peeked = Some(event);
        }
        Ok(self.peeked.as_ref().expect("peek slot filled above"))
    }

    /// Overwrite the peek slot. The next `next()`/`peek()` sees `event`.
    ///
    /// Consumers with their own lookahead use this to hand an event back.
    pub fn push_peek(&mut self, event: Event) {
        self.peeked = Some(event);
    }

    /// The content of the input line behind the current position, for
    /// diagnostics.
    pub fn last_token_context(&self) -> Option<String> {
        self.producer.last_line()
    }

    /// Give back the wrapped producer, dropping any peeked event.
    pub fn into_inner(self) -> P {
        self.producer
    }
}
