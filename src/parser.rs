//! Fixed-width parsing of `sacct` / `squeue` text output.
//!
//! Both tools are asked for every column at the same width, so a data line is
//! a run of `width + 1` character chunks: the padded value followed by one
//! separator slot. The output layout is:
//!
//! ```text
//! JobID      JobName    State        <- header
//! ---------- ---------- ----------   <- rule (sacct only)
//! 123        myjob      RUNNING      <- records
//!                                    <- trailing blank line
//! ```

use crate::models::{FormatConfig, Header, Record, Table};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use thiserror::Error;

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})T(\d{2}:\d{2}:\d{2})$").expect("timestamp pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("output has no header line")]
    MissingHeader,
}

/// Split one data line into a record keyed by `header`.
///
/// Chunks past the end of a short line come back as empty strings.
#[must_use]
pub fn parse_line(line: &str, header: &Header, width: usize) -> Record {
    let chars: Vec<char> = line.chars().collect();
    let stride = width + 1;

    let fields = header
        .columns()
        .iter()
        .enumerate()
        .map(|(ii, key)| {
            let start = (ii * stride).min(chars.len());
            let end = (ii * stride + width).min(chars.len());
            let value: String = chars[start..end].iter().collect();
            (key.clone(), value.trim().to_string())
        })
        .collect();

    Record::new(fields)
}

/// Rewrite `YYYY-MM-DDTHH:MM:SS` as `YYYY-MM-DD<separator>HH:MM:SS`.
///
/// Anything else, including an already rewritten value, is returned as is.
#[must_use]
pub fn reformat_time<'a>(value: &'a str, separator: &str) -> Cow<'a, str> {
    match ISO_TIMESTAMP.captures(value) {
        Some(caps) => Cow::Owned(format!("{}{}{}", &caps[1], separator, &caps[2])),
        None => Cow::Borrowed(value),
    }
}

/// A dashed rule line as printed by `sacct` under its header.
fn is_rule_line(line: &str) -> bool {
    line.contains('-') && line.chars().all(|c| c == '-' || c == ' ')
}

/// Parse a complete tool output into a [`Table`].
pub fn parse_output(text: &str, format: &FormatConfig) -> Result<Table, ParseError> {
    let mut lines = text.lines();

    let header = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .map(Header::from_line)
        .ok_or(ParseError::MissingHeader)?;

    let mut lines = lines.peekable();
    if lines.peek().is_some_and(|line| is_rule_line(line)) {
        lines.next();
    }

    let records: Vec<Record> = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let record = parse_line(line, &header, format.field_width);
            if format.reformat_times {
                normalize_times(record, format)
            } else {
                record
            }
        })
        .collect();

    tracing::debug!(
        "parsed {} columns and {} records",
        header.len(),
        records.len()
    );

    Ok(Table { header, records })
}

fn normalize_times(record: Record, format: &FormatConfig) -> Record {
    Record::new(
        record
            .iter()
            .map(|(key, value)| {
                let is_time = format
                    .time_keys
                    .iter()
                    .any(|k| k.eq_ignore_ascii_case(key));
                let value = if is_time {
                    reformat_time(value, &format.time_separator).into_owned()
                } else {
                    value.to_string()
                };
                (key.to_string(), value)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(width: usize) -> FormatConfig {
        FormatConfig {
            field_width: width,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_line_scenario() {
        let header = Header::from_line("JobID JobName State");
        let record = parse_line("123       myjob     RUNNING   ", &header, 9);
        assert_eq!(
            record.iter().collect::<Vec<_>>(),
            [("JobID", "123"), ("JobName", "myjob"), ("State", "RUNNING")]
        );
    }

    #[test]
    fn test_parse_line_short_line_yields_empty_fields() {
        let header = Header::from_line("JobID JobName State");
        let record = parse_line("123       myjob", &header, 9);
        assert_eq!(record.get("JobName"), Some("myjob"));
        assert_eq!(record.get("State"), Some(""));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_parse_line_drops_only_separator_slot() {
        // A value that fills its whole width keeps its last character
        let header = Header::from_line("A B");
        let record = parse_line("abcd wxyz", &header, 4);
        assert_eq!(record.get("A"), Some("abcd"));
        assert_eq!(record.get("B"), Some("wxyz"));
    }

    #[test]
    fn test_parse_line_multibyte() {
        let header = Header::from_line("A B");
        let record = parse_line("héé  ok", &header, 4);
        assert_eq!(record.get("A"), Some("héé"));
        assert_eq!(record.get("B"), Some("ok"));
    }

    #[test]
    fn test_parse_output_skips_rule_and_blank_lines() {
        let text = "JobID     State     \n\
                    --------- --------- \n\
                    1         RUNNING   \n\
                    2         PENDING   \n\
                    \n\
                    \n";
        let table = parse_output(text, &format(9)).unwrap();
        assert_eq!(table.header.columns(), ["JobID", "State"]);
        assert_eq!(table.records.len(), 2);
        for record in &table.records {
            assert_eq!(record.keys().collect::<Vec<_>>(), table.header.columns());
        }
        assert_eq!(table.records[1].get("State"), Some("PENDING"));
    }

    #[test]
    fn test_parse_output_without_rule_keeps_first_row() {
        let text = "JOBID     STATE     \n1         RUNNING   \n";
        let table = parse_output(text, &format(9)).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].get("JOBID"), Some("1"));
    }

    #[test]
    fn test_parse_output_header_only() {
        let text = "JobID     State     \n--------- --------- \n\n";
        let table = parse_output(text, &format(9)).unwrap();
        assert_eq!(table.header.len(), 2);
        assert!(table.records.is_empty());
    }

    #[test]
    fn test_parse_output_empty_is_missing_header() {
        assert_eq!(
            parse_output("\n\n", &format(9)),
            Err(ParseError::MissingHeader)
        );
    }

    #[test]
    fn test_parse_output_reformats_time_columns_only() {
        let text = "JobName             Start               \n\
                    ------------------- ------------------- \n\
                    2024-01-02T03:04:05 2024-01-02T03:04:05 \n";
        let table = parse_output(text, &format(19)).unwrap();
        let record = &table.records[0];
        assert_eq!(record.get("JobName"), Some("2024-01-02T03:04:05"));
        assert_eq!(record.get("Start"), Some("2024-01-02 03:04:05"));
    }

    #[test]
    fn test_parse_output_reformat_disabled() {
        let text = "Start               \n2024-01-02T03:04:05 \n";
        let config = FormatConfig {
            field_width: 19,
            reformat_times: false,
            ..Default::default()
        };
        let table = parse_output(text, &config).unwrap();
        assert_eq!(table.records[0].get("Start"), Some("2024-01-02T03:04:05"));
    }

    #[test]
    fn test_reformat_time() {
        assert_eq!(
            reformat_time("2024-01-02T03:04:05", " "),
            "2024-01-02 03:04:05"
        );
        assert_eq!(
            reformat_time("2024-01-02T03:04:05", "_"),
            "2024-01-02_03:04:05"
        );
        assert_eq!(reformat_time("Unknown", " "), "Unknown");
        assert_eq!(reformat_time("2024-01-02T03:04", " "), "2024-01-02T03:04");
    }

    #[test]
    fn test_reformat_time_idempotent() {
        let once = reformat_time("2024-01-02T03:04:05", " ").into_owned();
        let twice = reformat_time(&once, " ").into_owned();
        assert_eq!(once, twice);
    }
}
