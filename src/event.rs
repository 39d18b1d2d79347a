use crate::error::{Mark, NotationError};
use crate::tags::TagHandle;
use crate::{CollectionStyle, ScalarStyle};

/// The event structure.
///
/// Equality compares the event data only; marks are diagnostic and two
/// events differing solely in position compare equal.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Event {
    /// The event data.
    pub data: EventData,
    /// The beginning of the event.
    pub start_mark: Mark,
    /// The end of the event.
    pub end_mark: Mark,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventData {
    StreamStart,
    StreamEnd,
    /// The document parameters (for DOCUMENT-START).
    DocumentStart {
        /// Whether the `---` directives-end marker was (or should be)
        /// present. Stylistic; the presenter may override it.
        explicit: bool,
        /// A `%YAML` directive value, e.g. `1.2`.
        version: Option<String>,
        /// The tag handles declared for this document.
        handles: Vec<TagHandle>,
    },
    /// The document end parameters (for DOCUMENT-END).
    DocumentEnd {
        /// Whether the `...` document-end marker was (or should be) present.
        explicit: bool,
    },
    /// The alias parameters (for ALIAS).
    Alias {
        /// The target anchor.
        anchor: String,
    },
    /// The scalar parameters (for SCALAR).
    Scalar {
        /// The anchor.
        anchor: Option<String>,
        /// The tag. `None` is the `?` non-specific tag; the `!` non-specific
        /// tag is the literal string `!`.
        tag: Option<String>,
        /// The scalar value.
        value: String,
        /// The scalar style.
        style: ScalarStyle,
    },
    /// The sequence parameters (for SEQUENCE-START).
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    },
    SequenceEnd,
    /// The mapping parameters (for MAPPING-START).
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    },
    MappingEnd,
}

impl PartialEq for Event {
    fn eq(&self, other: &Event) -> bool {
        self.data == other.data
    }
}

impl Eq for Event {}

impl Event {
    /// Make an event from its data, with default marks.
    pub fn new(data: EventData) -> Event {
        Event {
            data,
            start_mark: Mark::default(),
            end_mark: Mark::default(),
        }
    }

    /// Attach source positions to the event.
    #[must_use]
    pub fn at(mut self, start_mark: Mark, end_mark: Mark) -> Event {
        self.start_mark = start_mark;
        self.end_mark = end_mark;
        self
    }

    /// Create the STREAM-START event.
    pub fn stream_start() -> Event {
        Event::new(EventData::StreamStart)
    }

    /// Create the STREAM-END event.
    pub fn stream_end() -> Event {
        Event::new(EventData::StreamEnd)
    }

    /// Create the DOCUMENT-START event.
    ///
    /// The `explicit` argument is stylistic and may be ignored by the
    /// presenter.
    pub fn document_start(
        explicit: bool,
        version: Option<&str>,
        handles_in: &[TagHandle],
    ) -> Event {
        Event::new(EventData::DocumentStart {
            explicit,
            version: version.map(String::from),
            handles: handles_in.to_vec(),
        })
    }

    /// Create the DOCUMENT-END event.
    pub fn document_end(explicit: bool) -> Event {
        Event::new(EventData::DocumentEnd { explicit })
    }

    /// Create an ALIAS event.
    pub fn alias(anchor: &str) -> Event {
        Event::new(EventData::Alias {
            anchor: String::from(anchor),
        })
    }

    /// Create a SCALAR event.
    ///
    /// The `style` argument may be ignored by the presenter.
    pub fn scalar(
        anchor: Option<&str>,
        tag: Option<&str>,
        value: &str,
        style: ScalarStyle,
    ) -> Event {
        Event::new(EventData::Scalar {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            value: String::from(value),
            style,
        })
    }

    /// Create a SEQUENCE-START event.
    pub fn sequence_start(
        anchor: Option<&str>,
        tag: Option<&str>,
        style: CollectionStyle,
    ) -> Event {
        Event::new(EventData::SequenceStart {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            style,
        })
    }

    /// Create a SEQUENCE-END event.
    pub fn sequence_end() -> Event {
        Event::new(EventData::SequenceEnd)
    }

    /// Create a MAPPING-START event.
    pub fn mapping_start(
        anchor: Option<&str>,
        tag: Option<&str>,
        style: CollectionStyle,
    ) -> Event {
        Event::new(EventData::MappingStart {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            style,
        })
    }

    /// Create a MAPPING-END event.
    pub fn mapping_end() -> Event {
        Event::new(EventData::MappingEnd)
    }

    /// Parse the one-line conformance notation produced by [`Display`].
    ///
    /// Document directives and tag handles are not part of the notation, so
    /// a parsed DOCUMENT-START carries none.
    ///
    /// [`Display`]: std::fmt::Display
    pub fn from_notation(line: &str) -> Result<Event, NotationError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("+STR") {
            if rest.is_empty() {
                return Ok(Event::stream_start());
            }
        } else if let Some(rest) = line.strip_prefix("-STR") {
            if rest.is_empty() {
                return Ok(Event::stream_end());
            }
        } else if let Some(rest) = line.strip_prefix("+DOC") {
            return Ok(Event::document_start(rest.starts_with(" ---"), None, &[]));
        } else if let Some(rest) = line.strip_prefix("-DOC") {
            return Ok(Event::document_end(rest.starts_with(" ...")));
        } else if let Some(rest) = line.strip_prefix("+SEQ") {
            let style = flow_marker_style(rest, "[]");
            return Ok(Event::sequence_start(
                notation_anchor('&', rest),
                notation_tag(rest),
                style,
            ));
        } else if line.starts_with("-SEQ") {
            return Ok(Event::sequence_end());
        } else if let Some(rest) = line.strip_prefix("+MAP") {
            let style = flow_marker_style(rest, "{}");
            return Ok(Event::mapping_start(
                notation_anchor('&', rest),
                notation_tag(rest),
                style,
            ));
        } else if line.starts_with("-MAP") {
            return Ok(Event::mapping_end());
        } else if let Some(rest) = line.strip_prefix("=ALI") {
            if let Some(anchor) = notation_anchor('*', rest) {
                return Ok(Event::alias(anchor));
            }
        } else if let Some(rest) = line.strip_prefix("=VAL") {
            let (style, value, properties) = notation_value(rest)?;
            return Ok(Event::scalar(
                notation_anchor('&', properties),
                notation_tag(properties),
                &value,
                style,
            ));
        }
        Err(NotationError::Unrecognized {
            line: String::from(line),
        })
    }
}

impl std::fmt::Display for Event {
    /// The canonical one-line text form used by conformance tests.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            EventData::StreamStart => f.write_str("+STR"),
            EventData::StreamEnd => f.write_str("-STR"),
            EventData::DocumentStart { explicit, .. } => {
                f.write_str("+DOC")?;
                if *explicit {
                    f.write_str(" ---")?;
                }
                Ok(())
            }
            EventData::DocumentEnd { explicit } => {
                f.write_str("-DOC")?;
                if *explicit {
                    f.write_str(" ...")?;
                }
                Ok(())
            }
            EventData::Alias { anchor } => write!(f, "=ALI *{anchor}"),
            EventData::SequenceStart { anchor, tag, style } => {
                f.write_str("+SEQ")?;
                if *style == CollectionStyle::Flow {
                    f.write_str(" []")?;
                }
                write_properties(f, anchor, tag, true)
            }
            EventData::SequenceEnd => f.write_str("-SEQ"),
            EventData::MappingStart { anchor, tag, style } => {
                f.write_str("+MAP")?;
                if *style == CollectionStyle::Flow {
                    f.write_str(" {}")?;
                }
                write_properties(f, anchor, tag, true)
            }
            EventData::MappingEnd => f.write_str("-MAP"),
            EventData::Scalar {
                anchor,
                tag,
                value,
                style,
            } => {
                f.write_str("=VAL")?;
                // The `!` non-specific tag matters only where a plain scalar
                // would otherwise resolve differently; quoted scalars always
                // resolve to !!str, so the marker is dropped for them.
                let quoted = matches!(
                    style,
                    ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted
                );
                write_properties(f, anchor, tag, !quoted)?;
                let marker = match style {
                    ScalarStyle::Any | ScalarStyle::Plain => " :",
                    ScalarStyle::SingleQuoted => " '",
                    ScalarStyle::DoubleQuoted => " \"",
                    ScalarStyle::Literal => " |",
                    ScalarStyle::Folded => " >",
                };
                f.write_str(marker)?;
                for ch in value.chars() {
                    match ch {
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        '\x08' => f.write_str("\\b")?,
                        '\0' => f.write_str("\\0")?,
                        other => std::fmt::Write::write_char(f, other)?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn write_properties(
    f: &mut std::fmt::Formatter<'_>,
    anchor: &Option<String>,
    tag: &Option<String>,
    show_non_specific: bool,
) -> std::fmt::Result {
    if let Some(anchor) = anchor {
        write!(f, " &{anchor}")?;
    }
    match tag.as_deref() {
        Some(crate::tags::NON_SPECIFIC_TAG) if show_non_specific => f.write_str(" <!>"),
        Some(crate::tags::NON_SPECIFIC_TAG) | None => Ok(()),
        Some(tag) => write!(f, " <{tag}>"),
    }
}

fn flow_marker_style(rest: &str, marker: &str) -> CollectionStyle {
    for token in rest.split(' ') {
        if token == marker {
            return CollectionStyle::Flow;
        }
    }
    CollectionStyle::Any
}

fn notation_anchor(sigil: char, rest: &str) -> Option<&str> {
    let (_, from_sigil) = rest.split_once(sigil)?;
    if let Some((until_space, _)) = from_sigil.split_once(' ') {
        Some(until_space)
    } else if !from_sigil.is_empty() {
        Some(from_sigil)
    } else {
        None
    }
}

fn notation_tag(rest: &str) -> Option<&str> {
    let (_, from_angle) = rest.split_once('<')?;
    let (until_angle, _) = from_angle.split_once('>')?;
    if until_angle == "!" {
        Some(crate::tags::NON_SPECIFIC_TAG)
    } else {
        Some(until_angle)
    }
}

/// Scan past anchor and tag tokens to the style marker, then unescape the
/// remainder of the line. Returns the style, the unescaped content, and the
/// slice preceding the marker (which holds the anchor and tag tokens).
fn notation_value(rest: &str) -> Result<(ScalarStyle, String, &str), NotationError> {
    let mut remainder = rest;
    let (style, escaped) = loop {
        let Some(tail) = remainder.strip_prefix(' ') else {
            return Err(NotationError::Unrecognized {
                line: String::from(rest),
            });
        };
        let style = match tail.chars().next() {
            Some(':') => ScalarStyle::Plain,
            Some('\'') => ScalarStyle::SingleQuoted,
            Some('"') => ScalarStyle::DoubleQuoted,
            Some('|') => ScalarStyle::Literal,
            Some('>') => ScalarStyle::Folded,
            _ => {
                // An anchor or tag token; skip to the next space.
                remainder = match tail.split_once(' ') {
                    Some((token, _)) => &tail[token.len()..],
                    None => "",
                };
                continue;
            }
        };
        break (style, &tail[1..]);
    };
    let properties = &rest[..rest.len() - escaped.len() - 2];
    let mut value = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let escape = chars.next().ok_or(NotationError::UnterminatedEscape)?;
            value.push(match escape {
                '\\' => '\\',
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                'b' => '\x08',
                '0' => '\0',
                other => return Err(NotationError::BadEscape { escape: other }),
            });
        } else {
            value.push(ch);
        }
    }
    Ok((style, value, properties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::STR_TAG;
    use pretty_assertions::assert_eq;

    #[test]
    fn equality_ignores_marks() {
        let a = Event::scalar(None, None, "x", ScalarStyle::Plain);
        let b = Event::scalar(None, None, "x", ScalarStyle::Plain)
            .at(Mark::new(4, 2), Mark::new(4, 3));
        assert_eq!(a, b);
        assert_ne!(a, Event::scalar(None, None, "y", ScalarStyle::Plain));
    }

    #[test]
    fn notation_basic_forms() {
        assert_eq!(Event::stream_start().to_string(), "+STR");
        assert_eq!(Event::stream_end().to_string(), "-STR");
        assert_eq!(Event::document_start(true, None, &[]).to_string(), "+DOC ---");
        assert_eq!(Event::document_end(false).to_string(), "-DOC");
        assert_eq!(Event::document_end(true).to_string(), "-DOC ...");
        assert_eq!(Event::sequence_end().to_string(), "-SEQ");
        assert_eq!(Event::mapping_end().to_string(), "-MAP");
        assert_eq!(Event::alias("a").to_string(), "=ALI *a");
    }

    #[test]
    fn notation_scalar_styles_and_escapes() {
        let plain = Event::scalar(None, None, "a\tb\nc", ScalarStyle::Plain);
        assert_eq!(plain.to_string(), "=VAL :a\\tb\\nc");
        let double = Event::scalar(Some("x"), Some(STR_TAG), "hi", ScalarStyle::DoubleQuoted);
        assert_eq!(double.to_string(), "=VAL &x <tag:yaml.org,2002:str> \"hi");
        let folded = Event::scalar(None, None, "a\\b", ScalarStyle::Folded);
        assert_eq!(folded.to_string(), "=VAL >a\\\\b");
    }

    #[test]
    fn notation_non_specific_tag_visibility() {
        let plain = Event::scalar(None, Some("!"), "x", ScalarStyle::Plain);
        assert_eq!(plain.to_string(), "=VAL <!> :x");
        let quoted = Event::scalar(None, Some("!"), "x", ScalarStyle::SingleQuoted);
        assert_eq!(quoted.to_string(), "=VAL 'x");
    }

    #[test]
    fn notation_collections_show_flow_markers() {
        let seq = Event::sequence_start(Some("s"), None, CollectionStyle::Flow);
        assert_eq!(seq.to_string(), "+SEQ [] &s");
        let map = Event::mapping_start(None, Some(crate::tags::MAP_TAG), CollectionStyle::Any);
        assert_eq!(map.to_string(), "+MAP <tag:yaml.org,2002:map>");
    }

    #[test]
    fn notation_round_trip() {
        let events = [
            Event::stream_start(),
            Event::document_start(true, None, &[]),
            Event::mapping_start(Some("m"), None, CollectionStyle::Any),
            Event::scalar(None, None, "key", ScalarStyle::Plain),
            Event::scalar(None, Some(STR_TAG), "tab\there", ScalarStyle::DoubleQuoted),
            Event::scalar(None, None, "line\nfeed", ScalarStyle::Literal),
            Event::scalar(None, None, "a&b <c> *d", ScalarStyle::Plain),
            Event::alias("m"),
            Event::mapping_end(),
            Event::document_end(false),
            Event::stream_end(),
        ];
        for event in events {
            let line = event.to_string();
            let reparsed = Event::from_notation(&line).expect("notation parses");
            assert_eq!(reparsed, event, "round-trip of {line:?}");
        }
    }

    #[test]
    fn notation_rejects_garbage() {
        assert!(Event::from_notation("?WHAT").is_err());
        assert!(Event::from_notation("=VAL").is_err());
    }
}
