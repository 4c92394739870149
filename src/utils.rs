//! Utility functions shared across modules.

/// Find a column name that matches the target case-insensitively.
///
/// `sacct` echoes canonical column casing (`JobName`) no matter how the
/// column was requested, while users and config files often write `jobname`.
///
/// # Example
/// ```
/// use slurpy::utils::find_column;
/// let columns = vec!["JobID".to_string(), "JobName".to_string()];
/// let found = find_column(columns.iter(), "jobname");
/// assert_eq!(found, Some(&"JobName".to_string()));
/// ```
pub fn find_column<'a>(
    columns: impl Iterator<Item = &'a String>,
    name: &str,
) -> Option<&'a String> {
    let mut fallback = None;
    for column in columns {
        if column == name {
            return Some(column);
        }
        if fallback.is_none() && column.eq_ignore_ascii_case(name) {
            fallback = Some(column);
        }
    }
    fallback
}
