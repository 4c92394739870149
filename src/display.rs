//! Rendering of records and summaries for the terminal

use crate::models::{Header, JobState, Record};
use crate::summary::StateSummary;
use owo_colors::OwoColorize;
use tabled::{
    settings::{object::Columns as TableColumns, Alignment, Modify, Style},
    Table, Tabled,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("none of the display columns {wanted:?} are in the output columns {available:?}")]
    EmptyProjection {
        wanted: Vec<String>,
        available: Vec<String>,
    },
}

/// What to show and how to lay it out.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Show every column, ignoring `columns`
    pub verbose: bool,
    /// Columns to keep when not verbose (empty = all)
    pub columns: Vec<String>,
    pub head: Option<usize>,
    pub tail: Option<usize>,
    /// Placed between fields, e.g. `", "`
    pub separator: String,
}

/// Header columns to display, in header order.
pub fn project_columns<'a>(
    header: &'a Header,
    options: &RenderOptions,
) -> Result<Vec<&'a str>, RenderError> {
    let all = header.columns().iter().map(String::as_str);
    if options.verbose || options.columns.is_empty() {
        return Ok(all.collect());
    }

    let kept: Vec<&str> = all
        .filter(|column| {
            options
                .columns
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(column))
        })
        .collect();

    if kept.is_empty() {
        return Err(RenderError::EmptyProjection {
            wanted: options.columns.clone(),
            available: header.columns().to_vec(),
        });
    }
    Ok(kept)
}

/// Rows at `position < head` or `position >= total - tail`, in order.
///
/// With neither limit set every row is kept.
#[must_use]
pub fn select_rows<T>(rows: &[T], head: Option<usize>, tail: Option<usize>) -> Vec<&T> {
    if head.is_none() && tail.is_none() {
        return rows.iter().collect();
    }
    let total = rows.len();
    let head = head.unwrap_or(0);
    let tail_start = tail.map_or(total, |tail| total.saturating_sub(tail));

    rows.iter()
        .enumerate()
        .filter(|(ii, _)| *ii < head || *ii >= tail_start)
        .map(|(_, row)| row)
        .collect()
}

/// Character width of each column: the longest of the label and every value.
#[must_use]
pub fn column_widths(columns: &[&str], records: &[&Record]) -> Vec<usize> {
    columns
        .iter()
        .map(|column| {
            records
                .iter()
                .map(|r| r.get(column).unwrap_or_default().chars().count())
                .fold(column.chars().count(), usize::max)
        })
        .collect()
}

fn format_line<'a>(
    values: impl Iterator<Item = &'a str>,
    widths: &[usize],
    separator: &str,
) -> String {
    values
        .zip(widths.iter().copied())
        .map(|(value, width)| format!("{value:>width$}"))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Render the header and rows as right-justified lines.
///
/// An empty record list renders no lines at all.
pub fn render_records(
    header: &Header,
    records: &[Record],
    options: &RenderOptions,
) -> Result<Vec<String>, RenderError> {
    let columns = project_columns(header, options)?;
    let rows = select_rows(records, options.head, options.tail);
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let widths = column_widths(&columns, &rows);
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_line(columns.iter().copied(), &widths, &options.separator));
    for row in rows {
        let values = columns.iter().map(|c| row.get(c).unwrap_or_default());
        lines.push(format_line(values, &widths, &options.separator));
    }
    Ok(lines)
}

/// [`render_records`] joined into one printable string.
pub fn format_records(
    header: &Header,
    records: &[Record],
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let lines = render_records(header, records, options)?;
    Ok(lines.iter().map(|line| format!("{line}\n")).collect())
}

/// Colour a state name by its category
fn format_state(state: &str) -> String {
    match JobState::from_state_string(state) {
        JobState::Running => state.green().to_string(),
        JobState::Pending => state.yellow().to_string(),
        JobState::Suspended => state.bright_yellow().to_string(),
        JobState::Completed => state.bright_green().to_string(),
        JobState::Cancelled => state.bright_black().to_string(),
        JobState::Failed => state.bright_red().to_string(),
        JobState::Timeout => state.red().to_string(),
        JobState::Unknown => state.white().to_string(),
    }
}

/// Table row for the summary report
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "State")]
    state: String,

    #[tabled(rename = "Jobs")]
    count: usize,
}

/// Table row for the verbose summary report
#[derive(Tabled)]
struct SummaryStatsRow {
    #[tabled(rename = "State")]
    state: String,

    #[tabled(rename = "Jobs")]
    count: usize,

    #[tabled(rename = "Min [hr]")]
    min: String,

    #[tabled(rename = "Max [hr]")]
    max: String,

    #[tabled(rename = "Median [hr]")]
    median: String,
}

/// Format the per-state summary, with elapsed statistics when verbose
#[must_use]
pub fn format_summary(summary: &[StateSummary], verbose: bool) -> String {
    let total: usize = summary.iter().map(StateSummary::count).sum();

    let mut table = if verbose {
        let rows: Vec<SummaryStatsRow> = summary
            .iter()
            .map(|s| {
                let (min, max, median) = s.stats();
                SummaryStatsRow {
                    state: format_state(&s.state),
                    count: s.count(),
                    min: format!("{min:8.4}"),
                    max: format!("{max:8.4}"),
                    median: format!("{median:8.4}"),
                }
            })
            .collect();
        Table::new(rows)
    } else {
        let rows: Vec<SummaryRow> = summary
            .iter()
            .map(|s| SummaryRow {
                state: format_state(&s.state),
                count: s.count(),
            })
            .collect();
        Table::new(rows)
    };

    table
        .with(Style::rounded())
        .with(Modify::new(TableColumns::new(1..)).with(Alignment::right()));

    format!("{}\n{} {}\n", table, "Total:".bold(), total)
}
