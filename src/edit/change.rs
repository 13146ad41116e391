//! Line-addressed changes
//!
//! Line numbers are 1-based and ranges inclusive. `Insert` before line
//! `N+1` of an N-line file appends. Changes apply in descending start-line
//! order so earlier edits never shift the line numbers of later ones; all
//! line numbers refer to the file as it was read.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line-addressed change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// Replace lines `line_start..=line_end` with `content`
    Replace {
        line_start: usize,
        line_end: usize,
        content: String,
    },
    /// Insert `content` before `before_line`
    Insert { before_line: usize, content: String },
    /// Delete lines `line_start..=line_end`
    Delete { line_start: usize, line_end: usize },
}

impl Change {
    /// The line the change starts at (sort key)
    pub fn start_line(&self) -> usize {
        match self {
            Change::Replace { line_start, .. } | Change::Delete { line_start, .. } => *line_start,
            Change::Insert { before_line, .. } => *before_line,
        }
    }

    /// How many lines the change touches or introduces
    pub fn line_span(&self) -> usize {
        match self {
            Change::Replace {
                line_start,
                line_end,
                content,
            } => (line_end.saturating_sub(*line_start) + 1).max(count_lines(content)),
            Change::Insert { content, .. } => count_lines(content),
            Change::Delete {
                line_start,
                line_end,
            } => line_end.saturating_sub(*line_start) + 1,
        }
    }
}

fn count_lines(content: &str) -> usize {
    if content.is_empty() {
        0
    } else {
        content.lines().count()
    }
}

/// A change addressed lines outside the file
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("line range {requested_start}..={requested_end} outside 1..={bounds}")]
pub struct OutOfRange {
    pub requested_start: usize,
    pub requested_end: usize,
    /// Number of lines in the file as read
    pub bounds: usize,
}

/// Apply changes to content, descending start-line order
///
/// Fails with [`OutOfRange`] on the first invalid range; the input is
/// never partially applied (the caller's buffer is untouched on error).
pub fn apply_changes(original: &str, changes: &[Change]) -> Result<String, OutOfRange> {
    let had_trailing_newline = original.ends_with('\n');
    let mut lines: Vec<String> = original.lines().map(String::from).collect();

    let mut ordered: Vec<&Change> = changes.iter().collect();
    ordered.sort_by(|a, b| b.start_line().cmp(&a.start_line()));

    for change in ordered {
        apply_one(&mut lines, change)?;
    }

    let mut result = lines.join("\n");
    if had_trailing_newline && !result.is_empty() {
        result.push('\n');
    }
    if original.is_empty() {
        // An empty file has no trailing newline to preserve
        if !result.is_empty() && !result.ends_with('\n') {
            result.push('\n');
        }
    }
    Ok(result)
}

fn apply_one(lines: &mut Vec<String>, change: &Change) -> Result<(), OutOfRange> {
    let len = lines.len();
    match change {
        Change::Replace {
            line_start,
            line_end,
            content,
        } => {
            check_range(*line_start, *line_end, len)?;
            let replacement: Vec<String> = content.lines().map(String::from).collect();
            lines.splice(line_start - 1..*line_end, replacement);
        }
        Change::Insert {
            before_line,
            content,
        } => {
            if *before_line == 0 || *before_line > len + 1 {
                return Err(OutOfRange {
                    requested_start: *before_line,
                    requested_end: *before_line,
                    bounds: len,
                });
            }
            let insertion: Vec<String> = content.lines().map(String::from).collect();
            lines.splice(before_line - 1..before_line - 1, insertion);
        }
        Change::Delete {
            line_start,
            line_end,
        } => {
            check_range(*line_start, *line_end, len)?;
            lines.drain(line_start - 1..*line_end);
        }
    }
    Ok(())
}

fn check_range(start: usize, end: usize, len: usize) -> Result<(), OutOfRange> {
    if start == 0 || end < start || end > len {
        return Err(OutOfRange {
            requested_start: start,
            requested_end: end,
            bounds: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "one\ntwo\nthree\nfour\n";

    #[test]
    fn replace_single_line() {
        let changes = vec![Change::Replace {
            line_start: 2,
            line_end: 2,
            content: "TWO".to_string(),
        }];
        assert_eq!(apply_changes(FILE, &changes).unwrap(), "one\nTWO\nthree\nfour\n");
    }

    #[test]
    fn replace_range_with_fewer_lines() {
        let changes = vec![Change::Replace {
            line_start: 2,
            line_end: 3,
            content: "merged".to_string(),
        }];
        assert_eq!(apply_changes(FILE, &changes).unwrap(), "one\nmerged\nfour\n");
    }

    #[test]
    fn replace_range_with_more_lines() {
        let changes = vec![Change::Replace {
            line_start: 1,
            line_end: 1,
            content: "a\nb\nc".to_string(),
        }];
        assert_eq!(
            apply_changes(FILE, &changes).unwrap(),
            "a\nb\nc\ntwo\nthree\nfour\n"
        );
    }

    #[test]
    fn insert_before_first_line() {
        let changes = vec![Change::Insert {
            before_line: 1,
            content: "zero".to_string(),
        }];
        assert_eq!(
            apply_changes(FILE, &changes).unwrap(),
            "zero\none\ntwo\nthree\nfour\n"
        );
    }

    #[test]
    fn insert_at_len_plus_one_appends() {
        let changes = vec![Change::Insert {
            before_line: 5,
            content: "five".to_string(),
        }];
        assert_eq!(
            apply_changes(FILE, &changes).unwrap(),
            "one\ntwo\nthree\nfour\nfive\n"
        );
    }

    #[test]
    fn delete_range() {
        let changes = vec![Change::Delete {
            line_start: 2,
            line_end: 3,
        }];
        assert_eq!(apply_changes(FILE, &changes).unwrap(), "one\nfour\n");
    }

    #[test]
    fn multiple_changes_apply_against_original_line_numbers() {
        // Both address the file as read: inserting at line 1 must not
        // shift the delete of line 3.
        let changes = vec![
            Change::Insert {
                before_line: 1,
                content: "zero".to_string(),
            },
            Change::Delete {
                line_start: 3,
                line_end: 3,
            },
        ];
        assert_eq!(
            apply_changes(FILE, &changes).unwrap(),
            "zero\none\ntwo\nfour\n"
        );
    }

    #[test]
    fn replace_out_of_range_fails() {
        let changes = vec![Change::Replace {
            line_start: 4,
            line_end: 9,
            content: "x".to_string(),
        }];
        let err = apply_changes(FILE, &changes).unwrap_err();
        assert_eq!(err.bounds, 4);
        assert_eq!(err.requested_end, 9);
    }

    #[test]
    fn zero_line_is_out_of_range() {
        let changes = vec![Change::Delete {
            line_start: 0,
            line_end: 1,
        }];
        assert!(apply_changes(FILE, &changes).is_err());
    }

    #[test]
    fn inverted_range_is_out_of_range() {
        let changes = vec![Change::Delete {
            line_start: 3,
            line_end: 2,
        }];
        assert!(apply_changes(FILE, &changes).is_err());
    }

    #[test]
    fn insert_into_empty_file() {
        let changes = vec![Change::Insert {
            before_line: 1,
            content: "hello".to_string(),
        }];
        assert_eq!(apply_changes("", &changes).unwrap(), "hello\n");
    }

    #[test]
    fn insert_beyond_append_position_fails_on_empty_file() {
        let changes = vec![Change::Insert {
            before_line: 2,
            content: "x".to_string(),
        }];
        assert!(apply_changes("", &changes).is_err());
    }

    #[test]
    fn preserves_missing_trailing_newline() {
        let changes = vec![Change::Replace {
            line_start: 1,
            line_end: 1,
            content: "ONE".to_string(),
        }];
        assert_eq!(apply_changes("one\ntwo", &changes).unwrap(), "ONE\ntwo");
    }

    #[test]
    fn line_span_estimates() {
        assert_eq!(
            Change::Delete {
                line_start: 2,
                line_end: 5
            }
            .line_span(),
            4
        );
        assert_eq!(
            Change::Insert {
                before_line: 1,
                content: "a\nb".to_string()
            }
            .line_span(),
            2
        );
        assert_eq!(
            Change::Replace {
                line_start: 1,
                line_end: 1,
                content: "a\nb\nc".to_string()
            }
            .line_span(),
            3
        );
    }
}
