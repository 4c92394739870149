use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slurpy::display::{format_records, RenderOptions};
use slurpy::models::{Columns, FilterSpec, FormatConfig, SortKey};
use slurpy::parser::parse_output;
use slurpy::pipeline::{apply_filters, sort_records};

const WIDTH: usize = 20;
const KEYS: &[&str] = &["JobID", "JobName", "State", "Partition", "Start", "Elapsed"];

/// Synthetic `sacct` output with a job step after every job
fn sacct_output(rows: usize) -> String {
    let line = |values: &[String]| {
        values
            .iter()
            .map(|v| format!("{:<width$} ", v, width = WIDTH))
            .collect::<String>()
    };

    let mut out = line(&KEYS.iter().map(|k| k.to_string()).collect::<Vec<_>>());
    out.push('\n');
    out.push_str(&line(&vec!["-".repeat(WIDTH); KEYS.len()]));
    out.push('\n');

    for ii in 0..rows {
        let id = if ii % 2 == 0 {
            format!("{}", 1000 + ii)
        } else {
            format!("{}.batch", 999 + ii)
        };
        let state = ["RUNNING", "PENDING", "COMPLETED", "CANCELLED by 42"][ii % 4];
        let partition = ["gpu", "cpu"][(ii / 2) % 2];
        out.push_str(&line(&[
            id,
            format!("job_{}", ii % 37),
            state.to_string(),
            partition.to_string(),
            format!("2024-01-{:02}T{:02}:00:00", ii % 28 + 1, ii % 24),
            format!("{:02}:{:02}:00", ii % 24, ii % 60),
        ]));
        out.push('\n');
    }
    out
}

fn benchmark_parse(c: &mut Criterion) {
    let text = sacct_output(5000);
    let format = FormatConfig {
        field_width: WIDTH,
        ..Default::default()
    };

    c.bench_function("parse 5000 rows", |b| {
        b.iter(|| parse_output(black_box(&text), &format).unwrap())
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let text = sacct_output(5000);
    let format = FormatConfig {
        field_width: WIDTH,
        ..Default::default()
    };
    let table = parse_output(&text, &format).unwrap();
    let filters = FilterSpec {
        state: Some("RUNNING".into()),
        start: Some("2024-01-05".into()),
        ..Default::default()
    }
    .build();
    let key: SortKey = "-JobName".parse().unwrap();
    let options = RenderOptions {
        separator: ", ".into(),
        ..Default::default()
    };

    c.bench_function("filter, sort and render 5000 rows", |b| {
        b.iter(|| {
            let mut records =
                apply_filters(table.records.clone(), &table.header, &Columns::sacct(), &filters)
                    .unwrap();
            sort_records(&mut records, &table.header, &key).unwrap();
            format_records(&table.header, &records, &options).unwrap()
        })
    });
}

criterion_group!(benches, benchmark_parse, benchmark_pipeline);
criterion_main!(benches);
