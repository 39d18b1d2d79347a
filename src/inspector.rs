//! Scalar content inspection: chooses the output style for a scalar whose
//! event left the choice open, and slices the content for the writers.

use std::ops::Range;

use crate::ScalarStyle;

/// The column budget of a display line.
const LINE_WIDTH: usize = 80;

/// The outcome of inspecting one scalar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScalarInspection {
    /// The chosen style: `Plain`, `DoubleQuoted`, `Literal` or `Folded`.
    /// Single-quoted output only happens on explicit request.
    pub style: ScalarStyle,
    /// Byte ranges of the words, separated by runs of spaces and tabs.
    pub words: Vec<Range<usize>>,
    /// Byte ranges of the physical lines, separated by line feeds.
    pub lines: Vec<Range<usize>>,
}

/// Inspect `value` for presentation at the given indentation column.
///
/// The decision is made in a single pass:
///
/// 1. Plain style is ruled out by an unsafe first character, any structural
///    character anywhere, any control character, or a line feed.
/// 2. Folded style is ruled out when a line begins with a space (the fold
///    would be ambiguous); literal style when a physical line overflows the
///    budget.
/// 3. A word longer than the budget cannot be wrapped; such content stays
///    on one line as plain or double-quoted.
/// 4. Content fitting the budget stays on one line.
/// 5. Everything else prefers literal, then folded, then plain, then
///    double-quoted.
pub fn inspect_scalar(value: &str, indentation: usize) -> ScalarInspection {
    let budget = LINE_WIDTH.saturating_sub(indentation);

    if value.is_empty() {
        return ScalarInspection {
            style: ScalarStyle::DoubleQuoted,
            words: Vec::new(),
            lines: Vec::new(),
        };
    }

    let mut can_use_plain = true;
    let mut can_use_literal = true;
    let mut can_use_folded = true;

    let mut words: Vec<Range<usize>> = Vec::new();
    let mut lines: Vec<Range<usize>> = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut line_start = 0usize;
    let mut line_chars = 0usize;
    let mut max_word_chars = 0usize;
    let mut word_chars = 0usize;
    let mut total_chars = 0usize;
    let mut at_line_start = true;

    let mut finish_word = |start: Option<usize>, end: usize, chars: usize| {
        if let Some(start) = start {
            words.push(start..end);
        }
        chars
    };

    for (index, ch) in value.char_indices() {
        if at_line_start && ch == ' ' {
            can_use_folded = false;
        }
        at_line_start = false;

        if index == 0 {
            if matches!(ch, '@' | '`' | '|' | '>' | '&' | '*' | '!' | ' ' | '\t') {
                can_use_plain = false;
            }
        }
        if matches!(
            ch,
            '{' | '}' | '[' | ']' | ',' | '#' | '-' | ':' | '?' | '%' | '"' | '\''
        ) || (ch as u32) < 32
        {
            can_use_plain = false;
        }

        match ch {
            '\n' => {
                max_word_chars =
                    max_word_chars.max(finish_word(word_start.take(), index, word_chars));
                word_chars = 0;
                if line_chars > budget {
                    can_use_literal = false;
                }
                lines.push(line_start..index);
                line_start = index + 1;
                line_chars = 0;
                at_line_start = true;
            }
            ' ' | '\t' => {
                max_word_chars =
                    max_word_chars.max(finish_word(word_start.take(), index, word_chars));
                word_chars = 0;
                line_chars += 1;
            }
            _ => {
                if word_start.is_none() {
                    word_start = Some(index);
                }
                word_chars += 1;
                line_chars += 1;
            }
        }
        total_chars += 1;
    }
    max_word_chars = max_word_chars.max(finish_word(word_start.take(), value.len(), word_chars));
    if line_chars > budget {
        can_use_literal = false;
    }
    lines.push(line_start..value.len());

    let style = if max_word_chars > budget {
        // An unbreakable run; wrapping cannot help.
        if can_use_plain {
            ScalarStyle::Plain
        } else {
            ScalarStyle::DoubleQuoted
        }
    } else if total_chars <= budget {
        if can_use_plain {
            ScalarStyle::Plain
        } else {
            ScalarStyle::DoubleQuoted
        }
    } else if can_use_literal {
        ScalarStyle::Literal
    } else if can_use_folded {
        ScalarStyle::Folded
    } else if can_use_plain {
        ScalarStyle::Plain
    } else {
        ScalarStyle::DoubleQuoted
    };

    ScalarInspection {
        style,
        words,
        lines,
    }
}
