//! Round-trip and invariant checks over event streams and graphs.

use indoc::indoc;
use pretty_assertions::assert_eq;
use yaml_stream::{
    dom_to_events, load_dom, present_to_string, AnchorStyle, CollectionStyle, ConstructionError,
    Dom, Event, EventBuffer, EventData, EventStream, NodeData, PresentationStyle,
    PresenterOptions, ScalarStyle, SerializationOptions,
};

fn document(body: Vec<Event>) -> Vec<Event> {
    let mut events = vec![Event::stream_start(), Event::document_start(true, None, &[])];
    events.extend(body);
    events.push(Event::document_end(false));
    events.push(Event::stream_end());
    events
}

fn plain(value: &str) -> Event {
    Event::scalar(None, None, value, ScalarStyle::Any)
}

fn sample_stream() -> Vec<Event> {
    document(vec![
        Event::mapping_start(None, None, CollectionStyle::Any),
        plain("title"),
        plain("fixtures"),
        plain("entries"),
        Event::sequence_start(None, None, CollectionStyle::Any),
        Event::scalar(Some("first"), None, "one", ScalarStyle::Any),
        Event::alias("first"),
        plain("two"),
        Event::sequence_end(),
        plain("notes"),
        Event::scalar(
            None,
            None,
            indoc! {"
                first line
                second line
            "},
            ScalarStyle::Literal,
        ),
        Event::mapping_end(),
    ])
}

#[test]
fn notation_round_trips_a_whole_stream() {
    for event in sample_stream() {
        let line = event.to_string();
        let reparsed = Event::from_notation(&line)
            .unwrap_or_else(|err| panic!("{line:?} failed to re-parse: {err}"));
        assert_eq!(reparsed, event, "round-trip of {line:?}");
    }
}

#[test]
fn presenting_is_deterministic_and_idempotent() {
    for style in [
        PresentationStyle::Minimal,
        PresentationStyle::Canonical,
        PresentationStyle::Default,
        PresentationStyle::BlockOnly,
    ] {
        let options = PresenterOptions::with_style(style);
        let first = present_to_string(sample_stream(), options).unwrap();
        let second = present_to_string(sample_stream(), options).unwrap();
        assert_eq!(first, second, "style {style:?}");
    }
}

#[test]
fn alias_free_streams_present_in_every_style() {
    let alias_free = document(vec![
        Event::sequence_start(None, None, CollectionStyle::Any),
        plain("x"),
        plain("y"),
        Event::sequence_end(),
    ]);
    for style in [
        PresentationStyle::Minimal,
        PresentationStyle::Canonical,
        PresentationStyle::Default,
        PresentationStyle::Json,
        PresentationStyle::BlockOnly,
    ] {
        present_to_string(alias_free.clone(), PresenterOptions::with_style(style))
            .unwrap_or_else(|err| panic!("style {style:?} failed: {err}"));
    }
}

#[test]
fn tidy_anchors_exactly_the_nodes_with_in_degree_two() {
    // shared appears twice, lonely once; only shared may carry an anchor.
    let mut dom = Dom::new();
    let seq = dom.add_sequence(None, CollectionStyle::Any);
    let shared = dom.add_sequence(None, CollectionStyle::Any);
    let inner = dom.add_scalar(None, "leaf", ScalarStyle::Any);
    let lonely = dom.add_scalar(None, "lonely", ScalarStyle::Any);
    dom.push_item(shared, inner);
    dom.push_item(seq, shared);
    dom.push_item(seq, lonely);
    dom.push_item(seq, shared);
    dom.set_root(seq);

    let buffer = dom_to_events(&dom, SerializationOptions::new(AnchorStyle::Tidy)).unwrap();
    let mut anchored: Vec<String> = Vec::new();
    let mut aliased: Vec<String> = Vec::new();
    for event in buffer.iter() {
        match &event.data {
            EventData::Scalar { anchor, .. }
            | EventData::SequenceStart { anchor, .. }
            | EventData::MappingStart { anchor, .. } => {
                if let Some(anchor) = anchor {
                    anchored.push(anchor.clone());
                }
            }
            EventData::Alias { anchor } => aliased.push(anchor.clone()),
            _ => {}
        }
    }
    assert_eq!(anchored, ["a"], "only the shared node is anchored");
    assert_eq!(aliased, ["a"]);
}

#[test]
fn dom_survives_a_dump_and_load_cycle() {
    let mut dom = Dom::new();
    let map = dom.add_mapping(None, CollectionStyle::Any);
    let key = dom.add_scalar(None, "items", ScalarStyle::Any);
    let seq = dom.add_sequence(None, CollectionStyle::Any);
    let a = dom.add_scalar(None, "a", ScalarStyle::Any);
    let b = dom.add_scalar(Some("tag:example.com,2000:custom"), "b", ScalarStyle::Any);
    dom.push_item(seq, a);
    dom.push_item(seq, b);
    dom.push_item(seq, a);
    dom.push_pair(map, key, seq);
    dom.set_root(map);

    let buffer = dom_to_events(&dom, SerializationOptions::default()).unwrap();
    let mut stream = EventStream::new(buffer);
    let reloaded = load_dom(&mut stream).unwrap();
    assert_eq!(dom, reloaded);
}

#[test]
fn cyclic_dom_survives_a_tidy_dump_and_load_cycle() {
    let mut dom = Dom::new();
    let map = dom.add_mapping(None, CollectionStyle::Any);
    let key = dom.add_scalar(None, "me", ScalarStyle::Any);
    dom.push_pair(map, key, map);
    dom.set_root(map);

    let buffer = dom_to_events(&dom, SerializationOptions::new(AnchorStyle::Tidy)).unwrap();
    let mut stream = EventStream::new(buffer);
    let reloaded = load_dom(&mut stream).unwrap();
    assert_eq!(dom, reloaded);
    let root = reloaded.root().unwrap();
    let NodeData::Mapping { pairs, .. } = &reloaded.node(root).data else {
        panic!("expected mapping root");
    };
    assert_eq!(pairs[0].1, root, "the cycle is rebuilt");
}

#[test]
fn empty_scalar_boundary_forms() {
    let events = |style| document(vec![Event::scalar(None, None, "", style)]);
    let default = present_to_string(events(ScalarStyle::Any), PresenterOptions::default()).unwrap();
    assert_eq!(default, "%YAML 1.2\n--- \n\"\"\n");
    let canonical = present_to_string(
        events(ScalarStyle::Any),
        PresenterOptions::with_style(PresentationStyle::Canonical),
    )
    .unwrap();
    assert_eq!(canonical, "%YAML 1.2\n--- \n\"\"\n");
    let json = present_to_string(
        events(ScalarStyle::Any),
        PresenterOptions::with_style(PresentationStyle::Json),
    )
    .unwrap();
    assert_eq!(json, "\"\"\n");
}

#[test]
fn duplicate_mapping_key_boundary() {
    let events = document(vec![
        Event::mapping_start(None, None, CollectionStyle::Any),
        plain("k"),
        plain("1"),
        plain("k"),
        plain("2"),
        Event::mapping_end(),
    ]);
    let buffer: EventBuffer = events.into_iter().collect();
    let mut stream = EventStream::new(buffer);
    assert!(matches!(
        load_dom(&mut stream),
        Err(ConstructionError::DuplicateKey { .. })
    ));
}
