//! End-to-end checks driving full event streams through the presenter and
//! the graph serializer.

use pretty_assertions::assert_eq;
use yaml_stream::{
    dump_dom, inspect_scalar, present_to_string, AnchorStyle, CollectionStyle, Dom, Event,
    PresentationStyle, Presenter, PresenterError, PresenterOptions, ScalarStyle,
    SerializationError, SerializationOptions,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

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

#[test]
fn flow_compact_default_sequence() {
    init_logging();
    let out = present_to_string(
        document(vec![
            Event::sequence_start(None, None, CollectionStyle::Any),
            plain("a"),
            plain("b"),
            plain("c"),
            Event::sequence_end(),
        ]),
        PresenterOptions::default(),
    )
    .unwrap();
    assert_eq!(out, "%YAML 1.2\n--- \n[a, b, c]\n");
}

#[test]
fn block_map_of_scalars() {
    let out = present_to_string(
        document(vec![
            Event::mapping_start(None, None, CollectionStyle::Any),
            plain("name"),
            plain("alice"),
            plain("age"),
            plain("30"),
            Event::mapping_end(),
        ]),
        PresenterOptions::default(),
    )
    .unwrap();
    assert_eq!(out, "%YAML 1.2\n--- \nname: alice\nage: 30\n");
}

#[test]
fn anchor_tidying_names_only_the_shared_mapping() {
    init_logging();
    let mut dom = Dom::new();
    let seq = dom.add_sequence(None, CollectionStyle::Any);
    let shared = dom.add_mapping(None, CollectionStyle::Any);
    let key = dom.add_scalar(None, "x", ScalarStyle::Any);
    let value = dom.add_scalar(None, "1", ScalarStyle::Any);
    dom.push_pair(shared, key, value);
    dom.push_item(seq, shared);
    dom.push_item(seq, shared);
    dom.set_root(seq);

    let out = dump_dom(
        &dom,
        Vec::new(),
        PresenterOptions::default(),
        SerializationOptions::new(AnchorStyle::Tidy),
    )
    .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out, "%YAML 1.2\n--- \n- &a x: 1\n- *a\n");
}

#[test]
fn cycle_fails_without_anchors() {
    let mut dom = Dom::new();
    let map = dom.add_mapping(None, CollectionStyle::Any);
    let key = dom.add_scalar(None, "self", ScalarStyle::Any);
    dom.push_pair(map, key, map);
    dom.set_root(map);

    let err = dump_dom(
        &dom,
        Vec::new(),
        PresenterOptions::default(),
        SerializationOptions::new(AnchorStyle::None),
    )
    .unwrap_err();
    assert!(matches!(err, SerializationError::CyclicGraph));
    assert_eq!(
        err.to_string(),
        "cannot serialize a cyclic graph without anchors"
    );
}

#[test]
fn long_single_line_selects_folded() {
    let content = "word ".repeat(40);
    let content = content.trim_end();
    assert_eq!(content.chars().count(), 199);

    let inspection = inspect_scalar(content, 0);
    assert_eq!(inspection.style, ScalarStyle::Folded);

    let out = present_to_string(
        document(vec![plain(content)]),
        PresenterOptions::default(),
    )
    .unwrap();
    assert!(out.starts_with("%YAML 1.2\n--- \n>-\n  word word "));
    // Folded content re-wraps at the line budget.
    for line in out.lines().skip(2) {
        assert!(line.chars().count() <= 81, "overlong line: {line:?}");
    }
}

#[test]
fn json_alias_fails_before_any_output_for_the_event() {
    let mut sink = Vec::new();
    let mut presenter = Presenter::new(
        &mut sink,
        PresenterOptions::with_style(PresentationStyle::Json),
    );
    presenter.emit(Event::stream_start()).unwrap();
    presenter
        .emit(Event::document_start(false, None, &[]))
        .unwrap();
    presenter
        .emit(Event::sequence_start(None, None, CollectionStyle::Any))
        .unwrap();
    presenter
        .emit(Event::scalar(Some("a"), None, "x", ScalarStyle::Any))
        .unwrap();
    let err = presenter.emit(Event::alias("a")).unwrap_err();
    assert!(matches!(err, PresenterError::Json(_)));
    drop(presenter);
    assert_eq!(String::from_utf8(sink).unwrap(), "[\n  \"x\"");
}
