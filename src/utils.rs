//! Puzzle input parsing.
//!
//! Two formats are accepted:
//! - **Text**: one tube per line, bottom to top. See `puzzle_from_str_array`.
//! - **JSON**: `{"capacity": 4, "tubes": [["red", "blue"], []]}`, where `capacity`
//!   is optional. See `parse_puzzle_json`.
use crate::engine::{Color, Puzzle, PuzzleError, DEFAULT_CAPACITY};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Color names accepted in addition to single letters, and the letter each maps to.
pub const NAMED_COLORS: [(&str, char); 8] = [
    ("red", 'R'),
    ("blue", 'B'),
    ("green", 'G'),
    ("yellow", 'Y'),
    ("purple", 'P'),
    ("orange", 'O'),
    ("cyan", 'C'),
    ("pink", 'K'),
];

/// Errors produced while reading a puzzle description.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized color '{label}' on line {line}")]
    UnknownColor { label: String, line: usize },

    #[error("unrecognized color '{label}' in tube {tube}")]
    UnknownJsonColor { label: String, tube: usize },

    #[error("invalid capacity directive on line {line}: '{text}'")]
    BadDirective { line: usize, text: String },

    #[error("invalid JSON puzzle: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
}

/// Resolves a color label: a single letter, or one of `NAMED_COLORS` (case-insensitive).
///
/// # Examples
/// ```
/// use tube_sort_solver::utils::color_from_label;
/// assert_eq!(color_from_label("Red"), color_from_label("R"));
/// assert_eq!(color_from_label("pink").map(|c| c.to_char()), Some('K'));
/// assert!(color_from_label("mauve").is_none());
/// ```
pub fn color_from_label(label: &str) -> Option<Color> {
    let label = label.trim();
    let mut chars = label.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Color::from_letter(ch);
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .and_then(|&(_, letter)| Color::from_letter(letter))
}

fn is_color_name(label: &str) -> bool {
    NAMED_COLORS
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case(label))
}

/// Picks a capacity when none is given: the longest tube, or `DEFAULT_CAPACITY`
/// when every tube is empty.
pub fn infer_capacity(tubes: &[Vec<Color>]) -> usize {
    match tubes.iter().map(Vec::len).max() {
        Some(longest) if longest > 0 => longest,
        _ => DEFAULT_CAPACITY,
    }
}

/// Parses `capacity: N` (or `capacity = N`). Returns `None` if the line is not a directive.
fn parse_directive(line: &str, line_no: usize) -> Option<Result<usize, ParseError>> {
    let lower = line.to_ascii_lowercase();
    let rest = lower.strip_prefix("capacity")?.trim_start();
    let value = rest.strip_prefix(':').or_else(|| rest.strip_prefix('='))?;
    Some(value.trim().parse::<usize>().map_err(|_| ParseError::BadDirective {
        line: line_no,
        text: line.to_string(),
    }))
}

fn parse_tube_line(line: &str, line_no: usize) -> Result<Vec<Color>, ParseError> {
    if line == "." || line == "-" {
        return Ok(Vec::new());
    }

    let separated = line.contains(|ch: char| ch == ',' || ch.is_whitespace());
    let labels: Vec<String> = if separated || is_color_name(line) {
        line.split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        line.chars().map(String::from).collect()
    };

    labels
        .into_iter()
        .map(|label| {
            color_from_label(&label).ok_or(ParseError::UnknownColor {
                label,
                line: line_no,
            })
        })
        .collect()
}

/// Parses a puzzle from text lines, one tube per line.
///
/// Each tube is listed bottom to top. A line of single letters may be written
/// without separators (`RGBY`); otherwise labels are separated by commas or
/// whitespace (`red, blue`). A line that is exactly one color name (`cyan`) is a
/// single unit of that color, not a run of letters. A line holding only `.` or `-`
/// is an empty tube. Blank lines and lines starting with `#` are skipped. A
/// `capacity: N` line sets the capacity.
///
/// # Arguments
/// * `lines`: The lines of the puzzle description.
/// * `capacity`: Overrides any directive. When both are absent the capacity is
///   inferred with `infer_capacity`.
///
/// # Returns
/// * `Ok(Puzzle)` if every line parses and the resulting puzzle is valid.
/// * `Err(ParseError)` naming the offending line or the puzzle validation failure.
///
/// # Examples
/// ```
/// use tube_sort_solver::utils::puzzle_from_str_array;
///
/// let puzzle = puzzle_from_str_array(&["capacity: 2", "RB", "red, blue", "."], None).unwrap();
/// assert_eq!(puzzle.capacity(), 2);
/// assert_eq!(puzzle.tube_count(), 3);
/// assert!(puzzle.tube(2).unwrap().is_empty());
///
/// assert!(puzzle_from_str_array(&["RX?"], None).is_err());
/// ```
pub fn puzzle_from_str_array(lines: &[&str], capacity: Option<usize>) -> Result<Puzzle, ParseError> {
    let mut directive = None;
    let mut tubes = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(value) = parse_directive(line, line_no) {
            directive = Some(value?);
            continue;
        }
        tubes.push(parse_tube_line(line, line_no)?);
    }

    let capacity = capacity
        .or(directive)
        .unwrap_or_else(|| infer_capacity(&tubes));
    Ok(Puzzle::new(tubes, capacity)?)
}

/// Parses a whole text document. See `puzzle_from_str_array` for the format.
pub fn parse_puzzle_text(text: &str, capacity: Option<usize>) -> Result<Puzzle, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    puzzle_from_str_array(&lines, capacity)
}

#[derive(Deserialize)]
struct PuzzleFile {
    capacity: Option<usize>,
    tubes: Vec<Vec<String>>,
}

/// Parses a JSON puzzle document. An explicit `capacity` overrides the document's.
pub fn parse_puzzle_json(text: &str, capacity: Option<usize>) -> Result<Puzzle, ParseError> {
    let file: PuzzleFile = serde_json::from_str(text)?;

    let tubes = file
        .tubes
        .into_iter()
        .enumerate()
        .map(|(tube, labels)| {
            labels
                .into_iter()
                .map(|label| {
                    color_from_label(&label).ok_or(ParseError::UnknownJsonColor { label, tube })
                })
                .collect::<Result<Vec<Color>, ParseError>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let capacity = capacity
        .or(file.capacity)
        .unwrap_or_else(|| infer_capacity(&tubes));
    Ok(Puzzle::new(tubes, capacity)?)
}

/// Reads a puzzle file. Files ending in `.json` are parsed as JSON, anything else as text.
pub fn load_puzzle(path: &Path, capacity: Option<usize>) -> Result<Puzzle, ParseError> {
    let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_puzzle_json(&content, capacity)
    } else {
        parse_puzzle_text(&content, capacity)
    }
}
