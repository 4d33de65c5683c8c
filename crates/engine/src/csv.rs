//! Minimal CSV reader for control and auxiliary files.
//!
//! Nothing fancy: comma-separated fields, a backslash escapes the next
//! character (so `\,` is a literal comma and `\\` a literal backslash).
//! Fields are trimmed, blank lines are skipped. Field counts are validated
//! by the callers, not here.

use std::fs;
use std::path::Path;

use personalize_core::Result;

/// Split one line into fields, honoring backslash escapes.
pub fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => field.push(escaped),
                // trailing backslash is kept literally
                None => field.push('\\'),
            },
            ',' => {
                fields.push(field.trim().to_string());
                field = String::new();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

/// Read a CSV file into rows of fields. Blank lines are skipped.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_row)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn splits_plain_fields() {
        assert_eq!(split_row("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(split_row(" a , b "), vec!["a", "b"]);
    }

    #[test]
    fn escaped_comma_stays_in_field() {
        assert_eq!(split_row(r"say hello\, world,greeting"), vec!["say hello, world", "greeting"]);
    }

    #[test]
    fn escaped_backslash() {
        assert_eq!(split_row(r"a\\b,c"), vec![r"a\b", "c"]);
    }

    #[test]
    fn trailing_backslash_kept() {
        assert_eq!(split_row(r"a\"), vec![r"a\"]);
    }

    #[test]
    fn empty_fields_preserved() {
        assert_eq!(split_row("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn read_rows_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "a,1\n\n  \nb,2\n").unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows, vec![vec!["a", "1"], vec!["b", "2"]]);
    }

    #[test]
    fn read_rows_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_rows(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, personalize_core::PersonalizeError::Io(_)));
    }
}
