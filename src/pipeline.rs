//! Filtering and sorting of parsed records.
//!
//! Every stage takes the full record list and returns a new one. Stages that
//! reference a column the current header lacks are skipped with a warning,
//! since a user-configured format may legitimately omit it.

use crate::models::{
    normalize_state, parse_record_time, Columns, Filter, Header, JobIdFilter, Record, SortKey,
};
use chrono::NaiveDateTime;
use thiserror::Error;

/// Job-id suffixes of the bookkeeping steps `sacct` reports for every job.
const SYNTHETIC_SUFFIXES: &[&str] = &["extern", "batch"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("job id '{0}' is not numeric and cannot be compared against a range")]
    NonNumericJobId(String),
    #[error("cannot sort by '{column}': not one of the columns {available:?}")]
    MissingSortColumn {
        column: String,
        available: Vec<String>,
    },
}

/// Drop the `extern` / `batch` steps.
///
/// A record without the job-id column is kept.
#[must_use]
pub fn remove_synthetic(records: Vec<Record>, job_id_column: &str) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| {
            let id = record.get(job_id_column).unwrap_or_default();
            !SYNTHETIC_SUFFIXES.iter().any(|suffix| id.ends_with(suffix))
        })
        .collect()
}

/// Run the synthetic-entry removal followed by every filter, in order.
pub fn apply_filters(
    records: Vec<Record>,
    header: &Header,
    columns: &Columns,
    filters: &[Filter],
) -> Result<Vec<Record>, PipelineError> {
    let total = records.len();
    tracing::debug!("filtering from {} records", total);

    let mut clean = match header.resolve(columns.job_id) {
        Some(job_id) => remove_synthetic(records, job_id),
        None => {
            tracing::warn!(
                "'{}' not in header {:?}, cannot remove job steps",
                columns.job_id,
                header.columns()
            );
            records
        }
    };
    tracing::debug!("{}/{} interesting records", clean.len(), total);

    for filter in filters {
        let column = match filter {
            Filter::State(_) => columns.state,
            Filter::Partition(_) => columns.partition,
            Filter::Name(_) => columns.name,
            Filter::JobId(_) => columns.job_id,
            Filter::StartAfter(_) => columns.start,
        };
        let Some(column) = header.resolve(column) else {
            tracing::warn!("'{}' not in header {:?}", column, header.columns());
            continue;
        };

        let before = clean.len();
        clean = apply_filter(clean, column, filter)?;
        tracing::info!(
            "{}/{} selecting for `{}`",
            clean.len(),
            before,
            filter.label()
        );
    }

    Ok(clean)
}

/// Apply one filter against the (already resolved) `column`.
pub fn apply_filter(
    records: Vec<Record>,
    column: &str,
    filter: &Filter,
) -> Result<Vec<Record>, PipelineError> {
    let value = |record: &Record| record.get(column).unwrap_or_default().to_string();

    Ok(match filter {
        Filter::State(state) => records
            .into_iter()
            .filter(|r| normalize_state(&value(r)) == state.as_str())
            .collect(),
        Filter::Partition(partition) => records
            .into_iter()
            .filter(|r| value(r) == *partition)
            .collect(),
        Filter::Name(name) => records
            .into_iter()
            .filter(|r| value(r).contains(name.as_str()))
            .collect(),
        Filter::JobId(ids) => filter_by_job_id(records, column, ids)?,
        Filter::StartAfter(threshold) => filter_by_start(records, column, *threshold),
    })
}

fn filter_by_job_id(
    records: Vec<Record>,
    column: &str,
    ids: &JobIdFilter,
) -> Result<Vec<Record>, PipelineError> {
    match ids {
        JobIdFilter::Set(ids) => Ok(records
            .into_iter()
            .filter(|r| ids.iter().any(|id| Some(id.as_str()) == r.get(column)))
            .collect()),
        JobIdFilter::Range { lo, hi } => {
            let mut kept = Vec::new();
            for record in records {
                let raw = record.get(column).unwrap_or_default();
                let id: u64 = raw
                    .parse()
                    .map_err(|_| PipelineError::NonNumericJobId(raw.to_string()))?;
                if (*lo..=*hi).contains(&id) {
                    kept.push(record);
                }
            }
            Ok(kept)
        }
    }
}

fn filter_by_start(records: Vec<Record>, column: &str, threshold: NaiveDateTime) -> Vec<Record> {
    records
        .into_iter()
        .filter(|r| {
            let raw = r.get(column).unwrap_or_default();
            match parse_record_time(raw) {
                Some(start) => start > threshold,
                None => {
                    tracing::debug!("start '{}' is not a timestamp, dropping record", raw);
                    false
                }
            }
        })
        .collect()
}

/// Stable sort by the string value of `key.column`.
///
/// Records with equal keys keep their relative order in both directions.
pub fn sort_records(
    records: &mut [Record],
    header: &Header,
    key: &SortKey,
) -> Result<(), PipelineError> {
    let column = header
        .resolve(&key.column)
        .ok_or_else(|| PipelineError::MissingSortColumn {
            column: key.column.clone(),
            available: header.columns().to_vec(),
        })?;

    records.sort_by(|a, b| {
        let (a, b) = (a.get(column), b.get(column));
        if key.descending { b.cmp(&a) } else { a.cmp(&b) }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &[&str] = &["JobID", "JobName", "State", "Partition", "Start"];

    fn header() -> Header {
        Header::new(HEADER.iter().map(|s| s.to_string()).collect())
    }

    fn record(values: [&str; 5]) -> Record {
        Record::new(
            HEADER
                .iter()
                .zip(values)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn sample() -> Vec<Record> {
        vec![
            record(["100", "train_a", "RUNNING", "gpu", "2024-01-01 10:00:00"]),
            record(["100.batch", "batch", "RUNNING", "gpu", "2024-01-01 10:00:00"]),
            record(["100.extern", "extern", "RUNNING", "gpu", "2024-01-01 10:00:00"]),
            record(["250", "eval", "CANCELLED by 501", "cpu", "2024-01-02 10:00:00"]),
            record(["300", "train_b", "RUNNING", "cpu", "Unknown"]),
        ]
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.get("JobID").unwrap()).collect()
    }

    fn run(filters: &[Filter]) -> Result<Vec<Record>, PipelineError> {
        apply_filters(sample(), &header(), &Columns::sacct(), filters)
    }

    #[test]
    fn test_remove_synthetic_only_drops_steps() {
        let clean = remove_synthetic(sample(), "JobID");
        assert_eq!(ids(&clean), ["100", "250", "300"]);
    }

    #[test]
    fn test_remove_synthetic_keeps_step_like_names() {
        // Only the id column matters, not the job name
        let records = vec![record(["7", "batch", "RUNNING", "gpu", ""])];
        assert_eq!(remove_synthetic(records, "JobID").len(), 1);
    }

    #[test]
    fn test_no_filters_only_removes_steps() {
        assert_eq!(ids(&run(&[]).unwrap()), ["100", "250", "300"]);
    }

    #[test]
    fn test_state_filter_normalizes_cancelled() {
        let clean = run(&[Filter::State("CANCELLED".into())]).unwrap();
        assert_eq!(ids(&clean), ["250"]);
    }

    #[test]
    fn test_state_and_partition_commute() {
        let state = Filter::State("RUNNING".into());
        let partition = Filter::Partition("cpu".into());
        let a = run(&[state.clone(), partition.clone()]).unwrap();
        let b = run(&[partition, state]).unwrap();
        assert_eq!(a, b);
        assert_eq!(ids(&a), ["300"]);
    }

    #[test]
    fn test_name_filter_is_case_sensitive_substring() {
        assert_eq!(ids(&run(&[Filter::Name("train".into())]).unwrap()), ["100", "300"]);
        assert!(run(&[Filter::Name("TRAIN".into())]).unwrap().is_empty());
    }

    #[test]
    fn test_job_id_range_and_set() {
        let range = Filter::JobId(JobIdFilter::Range { lo: 150, hi: 300 });
        assert_eq!(ids(&run(&[range]).unwrap()), ["250", "300"]);

        let set = Filter::JobId("100,300".parse().unwrap());
        assert_eq!(ids(&run(&[set]).unwrap()), ["100", "300"]);
    }

    #[test]
    fn test_job_id_range_rejects_non_numeric_ids() {
        let records = vec![record(["123_4", "array", "RUNNING", "gpu", ""])];
        let filter = Filter::JobId(JobIdFilter::Range { lo: 1, hi: 500 });
        let err = apply_filters(records, &header(), &Columns::sacct(), &[filter]).unwrap_err();
        assert_eq!(err, PipelineError::NonNumericJobId("123_4".into()));
    }

    #[test]
    fn test_start_filter_is_strict_and_drops_unknown() {
        let threshold = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let clean = run(&[Filter::StartAfter(threshold)]).unwrap();
        assert_eq!(ids(&clean), ["250"]);
    }

    #[test]
    fn test_missing_column_filter_is_noop() {
        let header = Header::new(vec!["JobID".into(), "State".into()]);
        let records = vec![Record::new(vec![
            ("JobID".into(), "1".into()),
            ("State".into(), "RUNNING".into()),
        ])];
        let clean = apply_filters(
            records.clone(),
            &header,
            &Columns::sacct(),
            &[Filter::Partition("gpu".into())],
        )
        .unwrap();
        assert_eq!(clean, records);
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let mut records = run(&[]).unwrap();
        let key: SortKey = "JobName".parse().unwrap();
        sort_records(&mut records, &header(), &key).unwrap();
        let ascending = ids(&records).into_iter().map(String::from).collect::<Vec<_>>();
        assert_eq!(ascending, ["250", "100", "300"]);

        let key: SortKey = "-JobName".parse().unwrap();
        sort_records(&mut records, &header(), &key).unwrap();
        let mut descending = ids(&records).into_iter().map(String::from).collect::<Vec<_>>();
        descending.reverse();
        assert_eq!(descending, ascending);
    }

    #[test]
    fn test_sort_is_stable_on_equal_keys() {
        let mut records = vec![
            record(["3", "c", "RUNNING", "gpu", ""]),
            record(["1", "a", "RUNNING", "gpu", ""]),
            record(["2", "b", "RUNNING", "gpu", ""]),
        ];
        let key: SortKey = "Partition".parse().unwrap();
        sort_records(&mut records, &header(), &key).unwrap();
        assert_eq!(ids(&records), ["3", "1", "2"]);

        let key: SortKey = "-partition".parse().unwrap();
        sort_records(&mut records, &header(), &key).unwrap();
        assert_eq!(ids(&records), ["3", "1", "2"]);
    }

    #[test]
    fn test_sort_groups_equal_keys_in_original_order() {
        let mut records = run(&[]).unwrap();
        let key: SortKey = "Partition".parse().unwrap();
        sort_records(&mut records, &header(), &key).unwrap();
        // cpu before gpu; the two cpu rows keep their order
        assert_eq!(ids(&records), ["250", "300", "100"]);
    }

    #[test]
    fn test_sort_missing_column_is_error() {
        let mut records = sample();
        let key: SortKey = "Elapsed".parse().unwrap();
        let err = sort_records(&mut records, &header(), &key).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSortColumn { .. }));
    }
}
