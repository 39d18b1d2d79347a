//! Well-known tag URIs and the per-document tag-handle table.

/// Prefix shared by all tags of the YAML core repository.
pub const YAML_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// The tag `!!str` for string values.
pub const STR_TAG: &str = "tag:yaml.org,2002:str";
/// The tag `!!seq` is used to denote sequences.
pub const SEQ_TAG: &str = "tag:yaml.org,2002:seq";
/// The tag `!!map` is used to denote mappings.
pub const MAP_TAG: &str = "tag:yaml.org,2002:map";
/// The tag `!!null` with the only possible value: `null`.
pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
/// The tag `!!bool` with the values: `true` and `false`.
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
/// The tag `!!int` for integer values.
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
/// The tag `!!float` for float values.
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
/// The tag `!!binary` for base64-encoded binary values.
pub const BINARY_TAG: &str = "tag:yaml.org,2002:binary";
/// The tag `!!timestamp` for date and time values.
pub const TIMESTAMP_TAG: &str = "tag:yaml.org,2002:timestamp";
/// The tag `!!merge` for merge keys (`<<`).
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";
/// The tag `!!value` for the default key (`=`).
pub const VALUE_TAG: &str = "tag:yaml.org,2002:value";
/// The tag `!!yaml` for YAML-specific values.
pub const YAML_TAG: &str = "tag:yaml.org,2002:yaml";
/// The tag `!!omap` for ordered mappings.
pub const OMAP_TAG: &str = "tag:yaml.org,2002:omap";
/// The tag `!!pairs` for key/value pair lists allowing duplicates.
pub const PAIRS_TAG: &str = "tag:yaml.org,2002:pairs";
/// The tag `!!set` for unordered value sets.
pub const SET_TAG: &str = "tag:yaml.org,2002:set";

/// The exclamation-mark non-specific tag. A node carrying this tag resolves
/// to the default tag for its kind; the question-mark non-specific tag is
/// the absence of a tag (`None`).
pub const NON_SPECIFIC_TAG: &str = "!";

/// The default scalar tag is `!!str`.
pub const DEFAULT_SCALAR_TAG: &str = STR_TAG;
/// The default sequence tag is `!!seq`.
pub const DEFAULT_SEQUENCE_TAG: &str = SEQ_TAG;
/// The default mapping tag is `!!map`.
pub const DEFAULT_MAPPING_TAG: &str = MAP_TAG;

/// A tag handle binding: a short prefix alias for a tag URI.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct TagHandle {
    /// The handle, e.g. `!!`.
    pub handle: String,
    /// The prefix the handle stands for, e.g. `tag:yaml.org,2002:`.
    pub prefix: String,
}

impl TagHandle {
    pub fn new(handle: &str, prefix: &str) -> TagHandle {
        TagHandle {
            handle: String::from(handle),
            prefix: String::from(prefix),
        }
    }
}

/// Checks that a handle has the `!`, `!!` or `!name!` shape.
pub(crate) fn validate_handle(handle: &str) -> Result<(), &'static str> {
    if handle.is_empty() {
        return Err("tag handle must not be empty");
    }
    if !handle.starts_with('!') {
        return Err("tag handle must start with '!'");
    }
    if !handle.ends_with('!') {
        return Err("tag handle must end with '!'");
    }
    if handle.len() > 2 {
        let content = &handle[1..handle.len() - 1];
        for ch in content.chars() {
            if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
                return Err("tag handle must contain alphanumerical characters only");
            }
        }
    }
    Ok(())
}

/// The per-document handle table.
///
/// `!` and `!!` are always bound; a document may override their prefixes and
/// add further handles. The table is reset at every DOCUMENT-START and
/// re-registered from the document's declared handles.
#[derive(Clone, Debug)]
pub struct TagHandles {
    handles: Vec<TagHandle>,
}

impl Default for TagHandles {
    fn default() -> TagHandles {
        TagHandles {
            handles: vec![
                TagHandle::new("!", "!"),
                TagHandle::new("!!", YAML_TAG_PREFIX),
            ],
        }
    }
}

impl TagHandles {
    pub fn new() -> TagHandles {
        TagHandles::default()
    }

    /// Drop every binding except the two defaults.
    pub fn reset(&mut self) {
        *self = TagHandles::default();
    }

    /// Bind `handle` to `prefix`, replacing an existing binding for the
    /// same handle.
    pub fn register(&mut self, handle: TagHandle) {
        if let Some(existing) = self.handles.iter_mut().find(|h| h.handle == handle.handle) {
            existing.prefix = handle.prefix;
        } else {
            self.handles.push(handle);
        }
    }

    /// Find the handle whose prefix is the longest match of `uri`.
    ///
    /// Returns the handle together with the matched prefix length. A prefix
    /// must be strictly shorter than the URI; a tag can never shorten to a
    /// bare handle with an empty suffix.
    pub fn search_handle(&self, uri: &str) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for handle in &self.handles {
            let len = handle.prefix.len();
            if len < uri.len() && uri.starts_with(handle.prefix.as_str()) {
                if best.map_or(true, |(_, b)| len > b) {
                    best = Some((&handle.handle, len));
                }
            }
        }
        best
    }

    /// The bindings that differ from the built-in defaults, in registration
    /// order. These are the ones worth a `%TAG` directive.
    pub fn custom(&self) -> impl Iterator<Item = &TagHandle> {
        self.handles.iter().filter(|h| {
            !(h.handle == "!" && h.prefix == "!"
                || h.handle == "!!" && h.prefix == YAML_TAG_PREFIX)
        })
    }
}
