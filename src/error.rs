/// A position in the presented or consumed character stream.
///
/// Lines and columns are 1-based; marks exist purely for diagnostics and
/// never influence presentation.
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct Mark {
    /// The position line.
    pub line: u64,
    /// The position column.
    pub column: u64,
}

impl Mark {
    pub fn new(line: u64, column: u64) -> Mark {
        Mark { line, column }
    }
}

impl Default for Mark {
    fn default() -> Mark {
        Mark { line: 1, column: 1 }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Failure while pulling events from a stream backend.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The producer ran dry before a STREAM-END event was seen.
    #[error("event stream exhausted before STREAM-END")]
    Exhausted,
    /// The backend surfaced its own failure; the cause is preserved.
    #[error(transparent)]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure while parsing the one-line conformance notation for events.
#[derive(Debug, thiserror::Error)]
pub enum NotationError {
    #[error("unrecognized event notation: {line:?}")]
    Unrecognized { line: String },
    #[error("invalid escape character in event notation: {escape:?}")]
    BadEscape { escape: char },
    #[error("unterminated escape sequence in event notation")]
    UnterminatedEscape,
}

/// Semantic failure while building a value from events.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("{mark}: {problem}")]
    Problem {
        problem: &'static str,
        mark: Mark,
        /// Content of the offending input line, when the producer can
        /// reconstruct it.
        line: Option<String>,
    },
    #[error("{mark}: duplicate mapping key")]
    DuplicateKey { mark: Mark },
    #[error("{mark}: alias references undefined anchor {anchor:?}")]
    UnknownAlias { anchor: String, mark: Mark },
    #[error("{mark}: trailing content after the first document")]
    TrailingDocument { mark: Mark },
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl ConstructionError {
    pub(crate) fn problem(problem: &'static str, mark: Mark) -> ConstructionError {
        ConstructionError::Problem {
            problem,
            mark,
            line: None,
        }
    }
}

/// Failure while turning a value graph into events.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("cannot serialize a cyclic graph without anchors")]
    CyclicGraph,
    #[error("cannot represent value: {0}")]
    Unrepresentable(&'static str),
    #[error(transparent)]
    Presenter(#[from] PresenterError),
}

/// Failure while presenting events as characters.
#[derive(Debug, thiserror::Error)]
pub enum PresenterError {
    /// The event sequence has no JSON rendering (multiple documents,
    /// aliases, non-scalar mapping keys, non-finite floats).
    #[error("cannot render as JSON: {0}")]
    Json(&'static str),
    /// The byte sink failed. Output already handed to the sink is not
    /// rewound.
    #[error(transparent)]
    Output(#[from] std::io::Error),
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// The incoming event sequence violated well-formedness. This is a bug
    /// in the producer, not a recoverable condition.
    #[error("malformed event stream: {0}")]
    Layout(&'static str),
}
