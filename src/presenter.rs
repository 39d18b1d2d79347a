//! The presenter: a state machine turning a well-formed event stream into a
//! conforming YAML (or strict JSON) character stream.

use std::collections::VecDeque;
use std::io::Write;

use log::{debug, trace};

use crate::error::PresenterError;
use crate::event::{Event, EventData};
use crate::inspector::inspect_scalar;
use crate::represent::{TypeGuess, TypeGuesser};
use crate::stream::{EventProducer, EventStream};
use crate::tags::{validate_handle, TagHandle, TagHandles, NON_SPECIFIC_TAG};
use crate::tags::{BOOL_TAG, FLOAT_TAG, INT_TAG, NULL_TAG};
use crate::{CollectionStyle, ScalarStyle};

/// The column budget of an output line.
const LINE_WIDTH: usize = 80;
/// Canonical double-quoted scalars break with a `\` continuation here.
const CANONICAL_BREAK: usize = 79;
/// A buffered collection this compact (and purely scalar) is laid out flow.
const FLOW_SCORE_LIMIT: usize = 60;

/// Overall presentation flavor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PresentationStyle {
    /// Flow everywhere, as few characters as reasonable.
    Minimal,
    /// Flow everywhere, one item per line, every scalar double-quoted.
    Canonical,
    /// Block layout with compact flow for small scalar-only collections.
    #[default]
    Default,
    /// Strict JSON. Events that JSON cannot express fail.
    Json,
    /// Block layout without any flow compaction.
    BlockOnly,
}

/// Which character sequence terminates output lines.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NewlineStyle {
    #[default]
    Lf,
    CrLf,
    OsDefault,
}

/// Which `%YAML` directive to emit at each document start.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputVersion {
    #[default]
    V1_2,
    V1_1,
    /// Emit no version directive.
    None,
}

/// Presentation options.
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct PresenterOptions {
    pub style: PresentationStyle,
    /// Columns added per nesting level; clamped to 1..=9.
    pub indentation_step: usize,
    pub newlines: NewlineStyle,
    pub output_version: OutputVersion,
}

impl Default for PresenterOptions {
    fn default() -> PresenterOptions {
        PresenterOptions {
            style: PresentationStyle::default(),
            indentation_step: 2,
            newlines: NewlineStyle::default(),
            output_version: OutputVersion::default(),
        }
    }
}

impl PresenterOptions {
    pub fn with_style(style: PresentationStyle) -> PresenterOptions {
        PresenterOptions {
            style,
            ..PresenterOptions::default()
        }
    }
}

/// Layout positions of the item state machine. The state on top of the
/// stack names the position just emitted; the next item's separator is
/// derived from it. An empty stack is the document root.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DumperState {
    BlockExplicitMapKey,
    BlockImplicitMapKey,
    BlockMapValue,
    BlockInlineMap,
    BlockSequenceItem,
    FlowImplicitMapKey,
    FlowMapValue,
    FlowExplicitMapKey,
    FlowSequenceItem,
    FlowMapStart,
    FlowSequenceStart,
}

#[derive(Copy, Clone, Debug)]
struct CollectionScan {
    count: usize,
    score: usize,
    all_scalar: bool,
}

enum MappingMode {
    Flow,
    /// Block layout, first key continues the current line.
    Inline,
    /// Block layout, first key starts on a fresh line.
    Opened,
}

/// The presenter. Events are pushed in with [`emit`](Presenter::emit); a
/// bounded run (one collection) may be buffered to decide flow versus block
/// layout before anything is written for it.
pub struct Presenter<W: Write> {
    out: W,
    opts: PresenterOptions,
    queue: VecDeque<Event>,
    states: Vec<DumperState>,
    indents: Vec<i64>,
    indent: i64,
    flow_level: usize,
    column: usize,
    line: u64,
    whitespace: bool,
    indention: bool,
    opened: bool,
    closed: bool,
    documents_started: usize,
    ended_explicitly: bool,
    handles: TagHandles,
    guesser: Option<TypeGuesser>,
}

impl<W: Write> Presenter<W> {
    pub fn new(out: W, options: PresenterOptions) -> Presenter<W> {
        let mut opts = options;
        if !(1..=9).contains(&opts.indentation_step) {
            opts.indentation_step = 2;
        }
        Presenter {
            out,
            opts,
            queue: VecDeque::with_capacity(16),
            states: Vec::with_capacity(16),
            indents: Vec::with_capacity(16),
            indent: -1,
            flow_level: 0,
            column: 0,
            line: 0,
            whitespace: true,
            indention: true,
            opened: false,
            closed: false,
            documents_started: 0,
            ended_explicitly: false,
            handles: TagHandles::new(),
            guesser: None,
        }
    }

    /// Present one event.
    ///
    /// The presenter may hold the event back until the end of the collection
    /// it opens has been seen; buffered events are drained in order once the
    /// layout decision is made.
    pub fn emit(&mut self, event: Event) -> Result<(), PresenterError> {
        self.queue.push_back(event);
        while !self.pending_lookahead() {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            self.process(event)?;
        }
        Ok(())
    }

    /// Flush and hand back the sink. Fails if the stream was left open.
    pub fn finish(mut self) -> Result<W, PresenterError> {
        if !self.closed || !self.queue.is_empty() {
            return Err(PresenterError::Layout(
                "stream ended before all collections were closed",
            ));
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn json(&self) -> bool {
        self.opts.style == PresentationStyle::Json
    }

    fn canonical(&self) -> bool {
        self.opts.style == PresentationStyle::Canonical
    }

    // Lookahead management ------------------------------------------------

    /// Whether the front of the queue must wait for more events before it
    /// can be processed.
    fn pending_lookahead(&self) -> bool {
        let Some(front) = self.queue.front() else {
            return false;
        };
        let style = match &front.data {
            EventData::SequenceStart { style, .. } | EventData::MappingStart { style, .. } => {
                *style
            }
            _ => return false,
        };
        if !matches!(
            self.opts.style,
            PresentationStyle::Default | PresentationStyle::BlockOnly
        ) {
            return false;
        }
        if self.flow_level > 0 || style == CollectionStyle::Flow {
            return false;
        }
        !self.queue_contains_matching_close()
    }

    fn queue_contains_matching_close(&self) -> bool {
        let mut level = 0i64;
        for event in &self.queue {
            match &event.data {
                EventData::StreamStart
                | EventData::DocumentStart { .. }
                | EventData::SequenceStart { .. }
                | EventData::MappingStart { .. } => level += 1,
                EventData::StreamEnd
                | EventData::DocumentEnd { .. }
                | EventData::SequenceEnd
                | EventData::MappingEnd => level -= 1,
                _ => {}
            }
            if level == 0 {
                return true;
            }
        }
        false
    }

    /// Tally the direct children of the collection whose start event was
    /// just popped. Only called once the matching close is buffered.
    fn scan_queued_collection(&self) -> CollectionScan {
        let mut level = 1i64;
        let mut count = 0usize;
        let mut score = 0usize;
        let mut all_scalar = true;
        for event in &self.queue {
            match &event.data {
                EventData::Scalar { value, .. } => {
                    if level == 1 {
                        count += 1;
                        score += 2 + value.chars().count();
                    }
                }
                EventData::Alias { .. } => {
                    if level == 1 {
                        count += 1;
                        score += 6;
                    }
                }
                EventData::SequenceStart { .. } | EventData::MappingStart { .. } => {
                    if level == 1 {
                        count += 1;
                        all_scalar = false;
                    }
                    level += 1;
                }
                EventData::SequenceEnd | EventData::MappingEnd => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        CollectionScan {
            count,
            score,
            all_scalar,
        }
    }

    // Event dispatch ------------------------------------------------------

    fn process(&mut self, event: Event) -> Result<(), PresenterError> {
        match event.data {
            EventData::StreamStart => self.process_stream_start(),
            EventData::StreamEnd => self.process_stream_end(),
            EventData::DocumentStart {
                explicit,
                version,
                handles,
            } => self.process_document_start(explicit, version, handles),
            EventData::DocumentEnd { explicit } => self.process_document_end(explicit),
            EventData::Alias { anchor } => self.process_alias(&anchor),
            EventData::Scalar {
                anchor,
                tag,
                value,
                style,
            } => self.process_scalar(anchor, tag, &value, style),
            EventData::SequenceStart { anchor, tag, style } => {
                self.process_sequence_start(anchor, tag, style)
            }
            EventData::SequenceEnd => self.process_sequence_end(),
            EventData::MappingStart { anchor, tag, style } => {
                self.process_mapping_start(anchor, tag, style)
            }
            EventData::MappingEnd => self.process_mapping_end(),
        }
    }

    fn process_stream_start(&mut self) -> Result<(), PresenterError> {
        if self.opened {
            return Err(PresenterError::Layout("unexpected second STREAM-START"));
        }
        self.opened = true;
        Ok(())
    }

    fn process_stream_end(&mut self) -> Result<(), PresenterError> {
        if !self.opened || !self.states.is_empty() {
            return Err(PresenterError::Layout("unexpected STREAM-END"));
        }
        self.closed = true;
        self.out.flush()?;
        Ok(())
    }

    fn process_document_start(
        &mut self,
        _explicit: bool,
        version: Option<String>,
        handles: Vec<TagHandle>,
    ) -> Result<(), PresenterError> {
        if !self.opened || self.closed {
            return Err(PresenterError::Layout("DOCUMENT-START outside a stream"));
        }
        self.indent = -1;
        if self.json() {
            if self.documents_started > 0 {
                return Err(PresenterError::Json("JSON permits a single document"));
            }
            self.documents_started += 1;
            return Ok(());
        }
        trace!("document {} starts", self.documents_started + 1);

        if self.documents_started > 0 && !self.ended_explicitly {
            if self.column > 0 {
                self.put_break()?;
            }
            self.put_str("...")?;
            self.put_break()?;
        }
        self.ended_explicitly = false;

        self.handles.reset();
        for handle in handles {
            validate_handle(&handle.handle).map_err(PresenterError::Layout)?;
            self.handles.register(handle);
        }

        let version_text = match self.opts.output_version {
            OutputVersion::None => None,
            OutputVersion::V1_2 => Some(version.unwrap_or_else(|| String::from("1.2"))),
            OutputVersion::V1_1 => Some(version.unwrap_or_else(|| String::from("1.1"))),
        };
        if let Some(version) = version_text {
            if self.column > 0 {
                self.put_break()?;
            }
            self.put_str("%YAML ")?;
            self.put_str(&version)?;
            self.put_break()?;
        }
        let custom: Vec<TagHandle> = self.handles.custom().cloned().collect();
        for handle in custom {
            self.put_str("%TAG ")?;
            self.put_str(&handle.handle)?;
            self.put_char(' ')?;
            self.put_str(&handle.prefix)?;
            self.put_break()?;
        }

        self.put_str("--- ")?;
        self.whitespace = true;
        self.indention = false;
        self.documents_started += 1;
        Ok(())
    }

    fn process_document_end(&mut self, explicit: bool) -> Result<(), PresenterError> {
        if !self.states.is_empty() {
            return Err(PresenterError::Layout("DOCUMENT-END inside a collection"));
        }
        if self.json() {
            if explicit {
                return Err(PresenterError::Json(
                    "the document end marker has no JSON form",
                ));
            }
            if self.column > 0 {
                self.put_break()?;
            }
            return Ok(());
        }
        if self.column > 0 {
            self.put_break()?;
        }
        if explicit {
            self.put_str("...")?;
            self.put_break()?;
            self.ended_explicitly = true;
        }
        self.handles.reset();
        Ok(())
    }

    fn process_alias(&mut self, anchor: &str) -> Result<(), PresenterError> {
        if self.json() {
            return Err(PresenterError::Json("aliases cannot be represented in JSON"));
        }
        validate_anchor(anchor)?;
        self.start_item(false)?;
        self.write_indicator("*", true, false, false)?;
        self.put_str(anchor)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn process_scalar(
        &mut self,
        anchor: Option<String>,
        tag: Option<String>,
        value: &str,
        style: ScalarStyle,
    ) -> Result<(), PresenterError> {
        self.start_item(false)?;
        let in_key = self.in_key_position();
        if self.json() {
            return self.write_json_scalar(tag.as_deref(), value, in_key);
        }
        self.emit_node_properties(anchor.as_deref(), tag.as_deref())?;
        let chosen = self.choose_scalar_style(value, style, in_key);
        self.increase_indent(true);
        let written = match chosen {
            ScalarStyle::Plain => self.write_plain_scalar(value, !in_key),
            ScalarStyle::SingleQuoted => self.write_single_quoted_scalar(value, !in_key),
            ScalarStyle::DoubleQuoted => self.write_double_quoted_scalar(value, !in_key),
            ScalarStyle::Literal => self.write_literal_scalar(value),
            ScalarStyle::Folded => self.write_folded_scalar(value),
            ScalarStyle::Any => unreachable!("a concrete style was chosen above"),
        };
        self.decrease_indent();
        written
    }

    fn process_sequence_start(
        &mut self,
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    ) -> Result<(), PresenterError> {
        if self.json() && self.json_key_position() {
            return Err(PresenterError::Json("mappings may only use scalar keys"));
        }
        self.start_item(true)?;
        self.emit_node_properties(anchor.as_deref(), tag.as_deref())?;
        if self.sequence_mode_is_flow(style) {
            self.write_indicator("[", true, true, false)?;
            self.increase_indent(true);
            self.flow_level += 1;
            self.states.push(DumperState::FlowSequenceStart);
        } else {
            self.increase_indent(false);
            self.states.push(DumperState::BlockSequenceItem);
        }
        Ok(())
    }

    fn process_sequence_end(&mut self) -> Result<(), PresenterError> {
        match self.states.pop() {
            Some(DumperState::FlowSequenceStart) => {
                self.decrease_indent();
                self.flow_level -= 1;
                self.write_indicator("]", false, false, false)
            }
            Some(DumperState::FlowSequenceItem) => {
                self.decrease_indent();
                self.flow_level -= 1;
                if self.canonical() {
                    self.write_indicator(",", false, false, false)?;
                    self.write_indent()?;
                } else if self.json() {
                    self.write_indent()?;
                }
                self.write_indicator("]", false, false, false)
            }
            Some(DumperState::BlockSequenceItem) => {
                self.decrease_indent();
                Ok(())
            }
            _ => Err(PresenterError::Layout("unexpected SEQUENCE-END")),
        }
    }

    fn process_mapping_start(
        &mut self,
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    ) -> Result<(), PresenterError> {
        if self.json() && self.json_key_position() {
            return Err(PresenterError::Json("mappings may only use scalar keys"));
        }
        let value_position = matches!(
            self.states.last(),
            Some(DumperState::BlockImplicitMapKey | DumperState::BlockExplicitMapKey)
        );
        self.start_item(true)?;
        self.emit_node_properties(anchor.as_deref(), tag.as_deref())?;
        match self.mapping_mode(style, value_position) {
            MappingMode::Flow => {
                self.write_indicator("{", true, true, false)?;
                self.increase_indent(true);
                self.flow_level += 1;
                self.states.push(DumperState::FlowMapStart);
            }
            MappingMode::Inline => {
                self.increase_indent(false);
                self.states.push(DumperState::BlockInlineMap);
            }
            MappingMode::Opened => {
                self.increase_indent(false);
                self.states.push(DumperState::BlockMapValue);
            }
        }
        Ok(())
    }

    fn process_mapping_end(&mut self) -> Result<(), PresenterError> {
        match self.states.pop() {
            Some(DumperState::FlowMapStart) => {
                self.decrease_indent();
                self.flow_level -= 1;
                self.write_indicator("}", false, false, false)
            }
            Some(DumperState::FlowMapValue) => {
                self.decrease_indent();
                self.flow_level -= 1;
                if self.canonical() {
                    self.write_indicator(",", false, false, false)?;
                    self.write_indent()?;
                } else if self.json() {
                    self.write_indent()?;
                }
                self.write_indicator("}", false, false, false)
            }
            Some(DumperState::BlockMapValue) => {
                self.decrease_indent();
                Ok(())
            }
            _ => Err(PresenterError::Layout("unexpected MAPPING-END")),
        }
    }

    // Layout decisions ----------------------------------------------------

    fn sequence_mode_is_flow(&self, style: CollectionStyle) -> bool {
        if matches!(
            self.opts.style,
            PresentationStyle::Json | PresentationStyle::Canonical | PresentationStyle::Minimal
        ) || self.flow_level > 0
            || style == CollectionStyle::Flow
        {
            return true;
        }
        let scan = self.scan_queued_collection();
        if scan.count == 0 {
            return true;
        }
        if style == CollectionStyle::Block || self.opts.style == PresentationStyle::BlockOnly {
            return false;
        }
        let flow = scan.all_scalar && scan.score <= FLOW_SCORE_LIMIT;
        debug!(
            "sequence with {} children scored {}: {}",
            scan.count,
            scan.score,
            if flow { "flow" } else { "block" }
        );
        flow
    }

    fn mapping_mode(&self, style: CollectionStyle, value_position: bool) -> MappingMode {
        if matches!(
            self.opts.style,
            PresentationStyle::Json | PresentationStyle::Canonical | PresentationStyle::Minimal
        ) || self.flow_level > 0
            || style == CollectionStyle::Flow
        {
            return MappingMode::Flow;
        }
        let scan = self.scan_queued_collection();
        if scan.count == 0 {
            return MappingMode::Flow;
        }
        if !value_position && scan.all_scalar && scan.count % 2 == 0 {
            MappingMode::Inline
        } else {
            MappingMode::Opened
        }
    }

    // The item boundary ---------------------------------------------------

    /// Advance the layout state machine and write the separator that must
    /// precede the next node. `is_object` marks the node as a collection.
    fn start_item(&mut self, is_object: bool) -> Result<(), PresenterError> {
        use DumperState::*;
        let canonical = self.canonical();
        let json = self.json();
        match self.states.pop() {
            None => {
                // Document root: content begins on a fresh line after the
                // directives-end marker.
                if !json {
                    self.write_indent()?;
                }
            }
            Some(BlockSequenceItem) => {
                self.write_indent()?;
                self.write_indicator("-", true, false, true)?;
                self.states.push(BlockSequenceItem);
            }
            Some(BlockImplicitMapKey) => {
                self.write_indicator(":", false, false, false)?;
                self.states.push(BlockMapValue);
            }
            Some(BlockExplicitMapKey) => {
                self.write_indent()?;
                self.write_indicator(":", true, false, true)?;
                self.states.push(BlockMapValue);
            }
            Some(BlockMapValue) => {
                self.write_indent()?;
                if is_object || canonical {
                    self.write_indicator("?", true, false, true)?;
                    self.states.push(BlockExplicitMapKey);
                } else {
                    self.states.push(BlockImplicitMapKey);
                }
            }
            Some(BlockInlineMap) => {
                self.states.push(BlockImplicitMapKey);
            }
            Some(FlowSequenceStart) => {
                if canonical || json {
                    self.write_indent()?;
                }
                self.states.push(FlowSequenceItem);
            }
            Some(FlowSequenceItem) => {
                self.write_indicator(",", false, false, false)?;
                if canonical || json || self.column > LINE_WIDTH {
                    self.write_indent()?;
                }
                self.states.push(FlowSequenceItem);
            }
            Some(FlowMapStart) => {
                if canonical || json {
                    self.write_indent()?;
                }
                if (canonical || is_object) && !json {
                    self.write_indicator("?", true, false, false)?;
                    self.states.push(FlowExplicitMapKey);
                } else {
                    self.states.push(FlowImplicitMapKey);
                }
            }
            Some(FlowImplicitMapKey) => {
                self.write_indicator(":", false, false, false)?;
                self.states.push(FlowMapValue);
            }
            Some(FlowExplicitMapKey) => {
                self.write_indent()?;
                self.write_indicator(":", true, false, false)?;
                self.states.push(FlowMapValue);
            }
            Some(FlowMapValue) => {
                self.write_indicator(",", false, false, false)?;
                if json {
                    self.write_indent()?;
                    self.states.push(FlowImplicitMapKey);
                } else if canonical || is_object {
                    self.write_indent()?;
                    self.write_indicator("?", true, false, false)?;
                    self.states.push(FlowExplicitMapKey);
                } else {
                    if self.column > LINE_WIDTH {
                        self.write_indent()?;
                    }
                    self.states.push(FlowImplicitMapKey);
                }
            }
        }
        Ok(())
    }

    /// Whether the node being emitted right now is a mapping key.
    fn in_key_position(&self) -> bool {
        matches!(
            self.states.last(),
            Some(
                DumperState::BlockImplicitMapKey
                    | DumperState::BlockExplicitMapKey
                    | DumperState::FlowImplicitMapKey
                    | DumperState::FlowExplicitMapKey
            )
        )
    }

    /// Whether the next node would land in key position of a JSON mapping.
    fn json_key_position(&self) -> bool {
        matches!(
            self.states.last(),
            Some(DumperState::FlowMapStart | DumperState::FlowMapValue)
        )
    }

    // Node properties -----------------------------------------------------

    fn emit_node_properties(
        &mut self,
        anchor: Option<&str>,
        tag: Option<&str>,
    ) -> Result<(), PresenterError> {
        if self.json() {
            return Ok(());
        }
        if let Some(tag) = tag {
            if tag.is_empty() {
                return Err(PresenterError::Layout("tag value must not be empty"));
            }
            if tag == NON_SPECIFIC_TAG {
                self.write_indicator("!", true, false, false)?;
            } else {
                let found = self
                    .handles
                    .search_handle(tag)
                    .map(|(handle, len)| (String::from(handle), len));
                if let Some((handle, prefix_len)) = found {
                    self.write_tag_handle(&handle)?;
                    self.write_tag_content(&tag[prefix_len..])?;
                } else {
                    self.write_indicator("!<", true, false, false)?;
                    self.write_tag_content(tag)?;
                    self.write_indicator(">", false, false, false)?;
                }
            }
        }
        if let Some(anchor) = anchor {
            validate_anchor(anchor)?;
            self.write_indicator("&", true, false, false)?;
            self.put_str(anchor)?;
            self.whitespace = false;
            self.indention = false;
        }
        Ok(())
    }

    // Scalar styles -------------------------------------------------------

    fn choose_scalar_style(
        &self,
        value: &str,
        requested: ScalarStyle,
        in_key: bool,
    ) -> ScalarStyle {
        if self.canonical() {
            return ScalarStyle::DoubleQuoted;
        }
        let mut style = requested;
        if style == ScalarStyle::Any {
            style = inspect_scalar(value, self.indent.max(0) as usize).style;
        }
        if matches!(style, ScalarStyle::Literal | ScalarStyle::Folded)
            && (self.flow_level > 0 || in_key)
        {
            style = ScalarStyle::DoubleQuoted;
        }
        // The single-quoted writer has no escape mechanism; anything it
        // cannot carry verbatim must be double-quoted.
        if style == ScalarStyle::SingleQuoted && value.chars().any(|ch| !is_printable(ch)) {
            style = ScalarStyle::DoubleQuoted;
        }
        if style == ScalarStyle::Plain && in_key && value.contains('\n') {
            style = ScalarStyle::DoubleQuoted;
        }
        if value.is_empty() && requested == ScalarStyle::Any {
            style = ScalarStyle::DoubleQuoted;
        }
        style
    }

    // Low-level writing ---------------------------------------------------

    fn put_char(&mut self, ch: char) -> Result<(), PresenterError> {
        let mut buffer = [0u8; 4];
        self.out.write_all(ch.encode_utf8(&mut buffer).as_bytes())?;
        self.column += 1;
        Ok(())
    }

    fn put_str(&mut self, text: &str) -> Result<(), PresenterError> {
        self.out.write_all(text.as_bytes())?;
        self.column += text.chars().count();
        Ok(())
    }

    fn put_break(&mut self) -> Result<(), PresenterError> {
        let newline = match self.opts.newlines {
            NewlineStyle::Lf => "\n",
            NewlineStyle::CrLf => "\r\n",
            NewlineStyle::OsDefault => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        };
        self.out.write_all(newline.as_bytes())?;
        self.column = 0;
        self.line += 1;
        self.whitespace = true;
        self.indention = true;
        Ok(())
    }

    /// Move to the current indentation column, breaking the line unless it
    /// is already fresh.
    fn write_indent(&mut self) -> Result<(), PresenterError> {
        let indent = self.indent.max(0) as usize;
        if !self.indention
            || self.column > indent
            || (self.column == indent && !self.whitespace)
        {
            self.put_break()?;
        }
        while self.column < indent {
            self.put_char(' ')?;
        }
        self.whitespace = true;
        self.indention = true;
        Ok(())
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        is_whitespace: bool,
        is_indention: bool,
    ) -> Result<(), PresenterError> {
        if need_whitespace && !self.whitespace {
            self.put_char(' ')?;
        }
        self.put_str(indicator)?;
        self.whitespace = is_whitespace;
        self.indention = self.indention && is_indention;
        Ok(())
    }

    fn increase_indent(&mut self, flow: bool) {
        self.indents.push(self.indent);
        if self.indent < 0 {
            self.indent = if flow {
                self.opts.indentation_step as i64
            } else {
                0
            };
        } else {
            self.indent += self.opts.indentation_step as i64;
        }
    }

    fn decrease_indent(&mut self) {
        self.indent = self.indents.pop().unwrap_or(-1);
    }

    fn write_tag_handle(&mut self, handle: &str) -> Result<(), PresenterError> {
        if !self.whitespace {
            self.put_char(' ')?;
        }
        self.put_str(handle)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_tag_content(&mut self, content: &str) -> Result<(), PresenterError> {
        for ch in content.chars() {
            if ch.is_ascii_alphanumeric()
                || matches!(
                    ch,
                    '_' | '-'
                        | ';'
                        | '/'
                        | '?'
                        | ':'
                        | '@'
                        | '&'
                        | '='
                        | '+'
                        | '$'
                        | ','
                        | '.'
                        | '~'
                        | '*'
                        | '\''
                        | '('
                        | ')'
                        | '['
                        | ']'
                )
            {
                self.put_char(ch)?;
                continue;
            }
            // URI escape
            let mut buffer = [0u8; 4];
            for byte in ch.encode_utf8(&mut buffer).bytes() {
                self.put_str(&format!("%{byte:02X}"))?;
            }
        }
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    // Scalar writers ------------------------------------------------------

    fn write_plain_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), PresenterError> {
        if !self.whitespace && (!value.is_empty() || self.flow_level > 0) {
            self.put_char(' ')?;
        }
        let mut spaces = false;
        let mut breaks = false;
        let mut chars = value.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == ' ' {
                if allow_breaks
                    && !spaces
                    && self.column > LINE_WIDTH
                    && chars.peek().is_some_and(|next| *next != ' ')
                {
                    self.write_indent()?;
                } else {
                    self.put_char(ch)?;
                }
                spaces = true;
            } else if ch == '\n' {
                // The first break of a run doubles so the fold re-parses as
                // a single line feed.
                if !breaks {
                    self.put_break()?;
                }
                self.put_break()?;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                self.put_char(ch)?;
                self.indention = false;
                spaces = false;
                breaks = false;
            }
        }
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_single_quoted_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), PresenterError> {
        self.write_indicator("'", true, false, false)?;
        let mut spaces = false;
        let mut breaks = false;
        let mut first = true;
        let mut chars = value.chars().peekable();
        while let Some(ch) = chars.next() {
            let last = chars.peek().is_none();
            if ch == ' ' {
                if allow_breaks
                    && !spaces
                    && !first
                    && !last
                    && self.column > LINE_WIDTH
                    && chars.peek().is_some_and(|next| *next != ' ')
                {
                    self.write_indent()?;
                } else {
                    self.put_char(ch)?;
                }
                spaces = true;
            } else if ch == '\n' {
                if !breaks {
                    self.put_break()?;
                }
                self.put_break()?;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                if ch == '\'' {
                    self.put_char('\'')?;
                }
                self.put_char(ch)?;
                self.indention = false;
                spaces = false;
                breaks = false;
            }
            first = false;
        }
        if breaks {
            self.write_indent()?;
        }
        self.write_indicator("'", false, false, false)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_double_quoted_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), PresenterError> {
        let canonical = self.canonical();
        self.write_indicator("\"", true, false, false)?;
        let mut spaces = false;
        let mut first = true;
        let mut chars = value.chars().peekable();
        while let Some(ch) = chars.next() {
            if let Some(escaped) = escape_double_quoted(ch) {
                if canonical && self.column + escaped.chars().count() >= CANONICAL_BREAK {
                    self.put_char('\\')?;
                    self.put_break()?;
                    self.write_indent()?;
                }
                self.put_str(&escaped)?;
                spaces = false;
            } else if ch == ' ' {
                if allow_breaks
                    && !spaces
                    && !first
                    && self.column > LINE_WIDTH
                    && chars.peek().is_some()
                {
                    self.write_indent()?;
                    if chars.peek() == Some(&' ') {
                        self.put_char('\\')?;
                    }
                } else {
                    self.put_char(ch)?;
                }
                spaces = true;
            } else {
                if canonical && self.column >= CANONICAL_BREAK {
                    self.put_char('\\')?;
                    self.put_break()?;
                    self.write_indent()?;
                }
                self.put_char(ch)?;
                self.indention = false;
                spaces = false;
            }
            first = false;
        }
        self.write_indicator("\"", false, false, false)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_block_scalar_hints(&mut self, value: &str) -> Result<(), PresenterError> {
        let first = value.chars().next();
        if first.is_some_and(|ch| ch == ' ' || ch == '\t' || is_break(ch)) {
            let digit = char::from_digit(self.opts.indentation_step as u32, 10)
                .expect("indentation step was clamped to one digit");
            let mut hint = [0u8; 1];
            let hint = digit.encode_utf8(&mut hint);
            self.write_indicator(hint, false, false, false)?;
        }
        if value.is_empty() {
            self.write_indicator("-", false, false, false)?;
        } else {
            let mut rev = value.chars().rev();
            let last = rev.next();
            let before_last = rev.next();
            if last != Some('\n') {
                self.write_indicator("-", false, false, false)?;
            } else if before_last == Some('\n') || before_last.is_none() {
                self.write_indicator("+", false, false, false)?;
            }
        }
        Ok(())
    }

    fn write_literal_scalar(&mut self, value: &str) -> Result<(), PresenterError> {
        self.write_indicator("|", true, false, false)?;
        self.write_block_scalar_hints(value)?;
        self.put_break()?;
        let mut breaks = true;
        for ch in value.chars() {
            if ch == '\n' {
                self.put_break()?;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                    breaks = false;
                }
                self.put_char(ch)?;
                self.indention = false;
                self.whitespace = false;
            }
        }
        Ok(())
    }

    fn write_folded_scalar(&mut self, value: &str) -> Result<(), PresenterError> {
        self.write_indicator(">", true, false, false)?;
        self.write_block_scalar_hints(value)?;
        self.put_break()?;
        let mut breaks = true;
        let mut leading_spaces = true;
        let mut chars = value.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\n' {
                if !breaks && !leading_spaces {
                    // A folded break re-parses as a space; double it when a
                    // real line feed must survive before more content.
                    let mut rest = chars.clone();
                    while rest.peek() == Some(&'\n') {
                        rest.next();
                    }
                    if rest.peek().is_some_and(|next| *next != ' ' && *next != '\t') {
                        self.put_break()?;
                    }
                }
                self.put_break()?;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                    leading_spaces = ch == ' ' || ch == '\t';
                }
                if !breaks
                    && ch == ' '
                    && self.column > LINE_WIDTH
                    && chars.peek().is_some_and(|next| *next != ' ')
                {
                    self.write_indent()?;
                } else {
                    self.put_char(ch)?;
                }
                self.indention = false;
                self.whitespace = false;
                breaks = false;
            }
        }
        Ok(())
    }

    // JSON ----------------------------------------------------------------

    fn write_json_scalar(
        &mut self,
        tag: Option<&str>,
        value: &str,
        in_key: bool,
    ) -> Result<(), PresenterError> {
        // JSON mapping keys are always strings.
        if in_key || value.is_empty() {
            return self.write_json_string(value);
        }
        let guess = self.guesser.get_or_insert_with(TypeGuesser::new).guess(value);
        match guess {
            TypeGuess::Null if json_tag_compatible(tag, NULL_TAG) => {
                self.write_json_literal("null")
            }
            TypeGuess::BoolTrue if json_tag_compatible(tag, BOOL_TAG) => {
                self.write_json_literal("true")
            }
            TypeGuess::BoolFalse if json_tag_compatible(tag, BOOL_TAG) => {
                self.write_json_literal("false")
            }
            TypeGuess::Int if json_tag_compatible(tag, INT_TAG) => self.write_json_int(value),
            TypeGuess::Float if json_tag_compatible(tag, FLOAT_TAG) => {
                self.write_json_float(value)
            }
            TypeGuess::FloatInf | TypeGuess::FloatNan if json_tag_compatible(tag, FLOAT_TAG) => {
                Err(PresenterError::Json(
                    "NaN and infinite floats have no JSON form",
                ))
            }
            _ => self.write_json_string(value),
        }
    }

    fn write_json_literal(&mut self, text: &str) -> Result<(), PresenterError> {
        if !self.whitespace {
            self.put_char(' ')?;
        }
        self.put_str(text)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_json_int(&mut self, value: &str) -> Result<(), PresenterError> {
        let parsed = if let Some(hex) = value.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else if let Some(octal) = value.strip_prefix("0o") {
            i64::from_str_radix(octal, 8)
        } else {
            value.parse::<i64>()
        };
        match parsed {
            Ok(number) => {
                let mut buffer = itoa::Buffer::new();
                self.write_json_literal(buffer.format(number))
            }
            Err(_) => {
                // Out of i64 range. Plain decimal digit runs are still valid
                // JSON; radix forms are not and fall back to a string.
                let trimmed = value.strip_prefix('+').unwrap_or(value);
                let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    self.write_json_literal(trimmed)
                } else {
                    self.write_json_string(value)
                }
            }
        }
    }

    fn write_json_float(&mut self, value: &str) -> Result<(), PresenterError> {
        match value.parse::<f64>() {
            Ok(number) if number.is_finite() => {
                let mut buffer = ryu::Buffer::new();
                let text = String::from(buffer.format(number));
                self.write_json_literal(&text)
            }
            _ => Err(PresenterError::Json(
                "NaN and infinite floats have no JSON form",
            )),
        }
    }

    fn write_json_string(&mut self, value: &str) -> Result<(), PresenterError> {
        if !self.whitespace {
            self.put_char(' ')?;
        }
        self.put_char('"')?;
        for ch in value.chars() {
            match ch {
                '"' => self.put_str("\\\"")?,
                '\\' => self.put_str("\\\\")?,
                '\n' => self.put_str("\\n")?,
                '\r' => self.put_str("\\r")?,
                '\t' => self.put_str("\\t")?,
                '\x08' => self.put_str("\\b")?,
                '\x0C' => self.put_str("\\f")?,
                control if (control as u32) < 0x20 => {
                    self.put_str(&format!("\\u{:04x}", control as u32))?;
                }
                other => self.put_char(other)?,
            }
        }
        self.put_char('"')?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }
}

fn json_tag_compatible(tag: Option<&str>, uri: &str) -> bool {
    match tag {
        None => true,
        Some(tag) => tag == uri,
    }
}

fn escape_double_quoted(ch: char) -> Option<String> {
    let simple = match ch {
        '\0' => "\\0",
        '\x07' => "\\a",
        '\x08' => "\\b",
        '\t' => "\\t",
        '\n' => "\\n",
        '\x0B' => "\\v",
        '\x0C' => "\\f",
        '\r' => "\\r",
        '\x1B' => "\\e",
        '"' => "\\\"",
        '\\' => "\\\\",
        '\u{0085}' => "\\N",
        '\u{00A0}' => "\\_",
        '\u{2028}' => "\\L",
        '\u{2029}' => "\\P",
        _ => {
            if is_printable(ch) {
                return None;
            }
            let code = ch as u32;
            return Some(if code <= 0xFF {
                format!("\\x{code:02X}")
            } else if code <= 0xFFFF {
                format!("\\u{code:04X}")
            } else {
                format!("\\U{code:08X}")
            });
        }
    };
    Some(String::from(simple))
}

fn is_printable(ch: char) -> bool {
    matches!(ch,
        '\x0a'
        | '\x20'..='\x7e'
        | '\u{00a0}'..='\u{d7ff}'
        | '\u{e000}'..='\u{fffd}'
        | '\u{10000}'..='\u{10ffff}')
        && !matches!(ch, '\u{feff}')
}

fn is_break(ch: char) -> bool {
    matches!(ch, '\r' | '\n' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

fn validate_anchor(anchor: &str) -> Result<(), PresenterError> {
    if anchor.is_empty() {
        return Err(PresenterError::Layout("anchor value must not be empty"));
    }
    for ch in anchor.chars() {
        if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
            return Err(PresenterError::Layout(
                "anchor value must contain alphanumerical characters only",
            ));
        }
    }
    Ok(())
}

/// Drain `stream` through a presenter into `writer`.
///
/// This is the whole-stream transformation path: every event from
/// STREAM-START to STREAM-END is presented, and the sink is returned.
pub fn present<P: EventProducer, W: Write>(
    stream: &mut EventStream<P>,
    writer: W,
    options: PresenterOptions,
) -> Result<W, PresenterError> {
    let mut presenter = Presenter::new(writer, options);
    loop {
        let event = stream.next()?;
        let done = matches!(event.data, EventData::StreamEnd);
        presenter.emit(event)?;
        if done {
            break;
        }
    }
    presenter.finish()
}

/// Present a complete in-memory event sequence to a string.
pub fn present_to_string(
    events: impl IntoIterator<Item = Event>,
    options: PresenterOptions,
) -> Result<String, PresenterError> {
    let buffer: crate::stream::EventBuffer = events.into_iter().collect();
    let mut stream = EventStream::new(buffer);
    let bytes = present(&mut stream, Vec::new(), options)?;
    Ok(String::from_utf8(bytes).expect("the presenter writes UTF-8"))
}
