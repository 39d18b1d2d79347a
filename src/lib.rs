#![doc = include_str!("../README.md")]
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::match_wildcard_for_single_variants,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::too_many_lines
)]
#![deny(unsafe_code)]

mod anchors;
mod construct;
mod document;
mod error;
mod event;
mod inspector;
mod presenter;
mod represent;
mod stream;
mod tags;

pub use crate::anchors::{
    rewrite_tidy_anchors, AnchorLedger, AnchorNames, AnchorStyle, AnchorVisit, CycleGuard,
    SerializationOptions,
};
pub use crate::construct::{
    AnchorBinding, ConstructChild, ConstructionContext, Expected, ScalarValue,
};
pub use crate::document::{dom_to_events, dump_dom, load_dom, Dom, Node, NodeData, NodeId};
pub use crate::error::{
    ConstructionError, Mark, NotationError, PresenterError, SerializationError, StreamError,
};
pub use crate::event::{Event, EventData};
pub use crate::inspector::{inspect_scalar, ScalarInspection};
pub use crate::presenter::{
    present, present_to_string, NewlineStyle, OutputVersion, PresentationStyle, Presenter,
    PresenterOptions,
};
pub use crate::represent::{RepresentChild, SerializationContext, TypeGuess, TypeGuesser};
pub use crate::stream::{EventBuffer, EventProducer, EventStream, FnProducer};
pub use crate::tags::*;

/// Scalar presentation styles.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum ScalarStyle {
    /// Let the presenter choose the style.
    #[default]
    Any,
    /// The plain scalar style.
    Plain,
    /// The single-quoted scalar style.
    SingleQuoted,
    /// The double-quoted scalar style.
    DoubleQuoted,
    /// The literal scalar style.
    Literal,
    /// The folded scalar style.
    Folded,
}

/// Sequence and mapping presentation styles.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum CollectionStyle {
    /// Let the presenter choose the style.
    #[default]
    Any,
    /// The block collection style.
    Block,
    /// The flow collection style.
    Flow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanity() {
        let mut emitted = vec![
            Event::stream_end(),
            Event::document_end(false),
            Event::scalar(None, None, "hello world", ScalarStyle::Any),
            Event::document_start(true, None, &[]),
            Event::stream_start(),
        ];
        let mut stream = EventStream::from_fn(move || Ok(emitted.pop()));
        let out = present(&mut stream, Vec::new(), PresenterOptions::default()).unwrap();
        assert_eq!(
            core::str::from_utf8(&out),
            Ok("%YAML 1.2\n--- \nhello world\n")
        );
    }

    #[test]
    fn multiline_plain_scalar_folds() {
        let out = present_to_string(
            [
                Event::stream_start(),
                Event::document_start(true, None, &[]),
                Event::scalar(
                    None,
                    None,
                    "1st non-empty\n2nd non-empty 3rd non-empty",
                    ScalarStyle::Plain,
                ),
                Event::document_end(false),
                Event::stream_end(),
            ],
            PresenterOptions {
                output_version: OutputVersion::None,
                ..PresenterOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "--- \n1st non-empty\n\n  2nd non-empty 3rd non-empty\n");
    }
}
