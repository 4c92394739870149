//! slurpy - filter, sort and tabulate Slurm accounting and queue output

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use slurpy::cancel::{self, CancelOutcome};
use slurpy::display::{self, RenderOptions};
use slurpy::models::{
    start_threshold, Columns, Config, Filter, FilterSpec, JobIdFilter, SortKey, Table,
};
use slurpy::pipeline;
use slurpy::slurm::SlurmInterface;
use slurpy::summary;
use slurpy::watch::watch_loop;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slurpy")]
#[command(about = "Filter, sort and tabulate Slurm accounting and queue output", long_about = None)]
#[command(version)]
#[command(after_help = "--head, --tail and --watch take an optional value, so place them \
    after the subcommand: `slurpy list --head`, not `slurpy --head list`.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: SharedArgs,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// List jobs from the accounting database (default)
    #[command(alias = "ls")]
    List,

    /// Count jobs per state
    Summary,

    /// List jobs currently in the queue
    #[command(alias = "q")]
    Queue,

    /// Cancel every job matching the filters
    Cancel {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct SharedArgs {
    /// Show all columns (summary: elapsed statistics)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show the first N rows (default display.default_rows)
    #[arg(long, value_name = "N", num_args = 0..=1, global = true)]
    head: Option<Option<usize>>,

    /// Show the last N rows (default display.default_rows)
    #[arg(long, value_name = "N", num_args = 0..=1, global = true)]
    tail: Option<Option<usize>>,

    /// Keep jobs in this state (e.g. RUNNING, CANCELLED)
    #[arg(short, long, global = true)]
    state: Option<String>,

    /// Keep jobs in this partition
    #[arg(short, long, global = true)]
    partition: Option<String>,

    /// Keep jobs whose name contains this text
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Keep these job ids: a list ("1,2 3") or a range ("100:200")
    #[arg(short = 'j', long, value_name = "IDS", num_args = 1.., global = true)]
    jobid: Vec<String>,

    /// Keep jobs started after this time (YYYY-MM-DD[ HH:MM:SS])
    #[arg(long, value_name = "TIME", global = true)]
    start: Option<String>,

    /// Sort by column, prefix with '-' for descending
    #[arg(long, value_name = "[-]COLUMN", allow_hyphen_values = true, global = true)]
    sort: Option<SortKey>,

    /// Watch mode: refresh every N seconds
    #[arg(short, long, value_name = "SECONDS", num_args = 0..=1, global = true)]
    watch: Option<Option<u64>>,

    /// Print watch frames one after another instead of redrawing
    #[arg(long, global = true)]
    no_clear: bool,

    /// Also restrict the Slurm query itself to --partition
    #[arg(long, global = true)]
    target_partition: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

/// Which Slurm tool a command reads from
#[derive(Debug, Clone, Copy)]
enum Source {
    Accounting,
    Queue,
}

impl Source {
    fn columns(self) -> Columns {
        match self {
            Source::Accounting => Columns::sacct(),
            Source::Queue => Columns::squeue(),
        }
    }
}

struct App {
    config: Config,
    slurm: SlurmInterface,
    args: SharedArgs,
    filters: Vec<Filter>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.args.debug);

    let (config, warnings) = Config::load()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    for warning in warnings {
        tracing::warn!("{}", warning);
    }

    let app = App::new(config, cli.args)?;

    let handler: fn(&App) -> Result<String> = match cli.command.unwrap_or(Commands::List) {
        Commands::List => App::handle_list,
        Commands::Queue => App::handle_queue,
        Commands::Summary => App::handle_summary,
        Commands::Cancel { yes } => {
            if app.args.watch.is_some() {
                bail!("--watch cannot be used with cancel");
            }
            return app.handle_cancel(yes);
        }
    };

    match app.args.watch {
        Some(interval) => {
            let secs = interval.unwrap_or(app.config.behavior.watch_interval).max(1);
            let clear = app.config.behavior.clear_screen && !app.args.no_clear;
            watch_loop(Duration::from_secs(secs), clear, || handler(&app))
        }
        None => {
            let output = handler(&app)?;
            if !output.is_empty() {
                print!("{}", output);
            }
            Ok(())
        }
    }
}

/// Log to stderr; `SLURPY_LOG` takes precedence over `--debug`.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("SLURPY_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

impl App {
    fn new(config: Config, args: SharedArgs) -> Result<Self> {
        let jobid = if args.jobid.is_empty() {
            None
        } else {
            Some(JobIdFilter::parse(&args.jobid).context("Invalid --jobid")?)
        };

        let filters = FilterSpec {
            state: args.state.clone(),
            partition: args.partition.clone(),
            name: args.name.clone(),
            jobid,
            start: args.start.clone(),
        }
        .build();

        let slurm = SlurmInterface::with_config(&config.system);

        Ok(Self {
            config,
            slurm,
            args,
            filters,
        })
    }

    /// Query Slurm, then filter and sort the records.
    fn fetch(&self, source: Source) -> Result<(Table, Columns)> {
        let partition = if self.args.target_partition {
            self.args.partition.as_deref()
        } else {
            None
        };

        let format = &self.config.format;
        let Table { header, records } = match source {
            Source::Accounting => {
                self.slurm
                    .sacct(format, start_threshold(&self.filters), partition)
            }
            Source::Queue => self.slurm.squeue(format, partition),
        }?;

        let columns = source.columns();
        let mut records = pipeline::apply_filters(records, &header, &columns, &self.filters)?;
        if let Some(key) = &self.args.sort {
            pipeline::sort_records(&mut records, &header, key)?;
        }

        Ok((Table { header, records }, columns))
    }

    fn render_options(&self, source: Source) -> RenderOptions {
        let display = &self.config.display;
        let rows = |limit: Option<Option<usize>>| limit.map(|n| n.unwrap_or(display.default_rows));
        RenderOptions {
            verbose: self.args.verbose,
            columns: match source {
                Source::Accounting => display.columns.clone(),
                Source::Queue => display.queue_columns.clone(),
            },
            head: rows(self.args.head),
            tail: rows(self.args.tail),
            separator: display.column_separator(),
        }
    }

    fn render(&self, source: Source) -> Result<String> {
        let (table, _) = self.fetch(source)?;
        let output = display::format_records(
            &table.header,
            &table.records,
            &self.render_options(source),
        )?;
        Ok(output)
    }

    fn handle_list(&self) -> Result<String> {
        self.render(Source::Accounting)
    }

    fn handle_queue(&self) -> Result<String> {
        self.render(Source::Queue)
    }

    fn handle_summary(&self) -> Result<String> {
        let (table, columns) = self.fetch(Source::Accounting)?;
        let state = table
            .header
            .resolve(columns.state)
            .with_context(|| format!("sacct output has no '{}' column", columns.state))?;
        let elapsed = table
            .header
            .resolve(columns.elapsed)
            .with_context(|| format!("sacct output has no '{}' column", columns.elapsed))?;

        let summary = summary::summarize(
            &table.records,
            &self.config.behavior.summary_states,
            state,
            elapsed,
        )?;
        Ok(display::format_summary(&summary, self.args.verbose))
    }

    fn handle_cancel(&self, yes: bool) -> Result<()> {
        let (table, columns) = self.fetch(Source::Accounting)?;
        let candidates = cancel::candidates(&table.records, &table.header, &columns);
        let ask = self.config.behavior.confirm_cancel && !yes;

        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .context("Failed to set progress template")?;
        let mut progress: Option<ProgressBar> = None;

        let report = cancel::cancel_jobs(
            &candidates,
            |candidates| -> Result<bool> {
                if !ask {
                    return Ok(true);
                }
                print!(
                    "{}",
                    display::format_records(
                        &table.header,
                        &table.records,
                        &self.render_options(Source::Accounting),
                    )?
                );
                println!("\n{} {}", "Jobs selected:".bold(), candidates.len());
                Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("Cancel {} jobs?", candidates.len()))
                    .default(false)
                    .interact()
                    .context("Failed to read confirmation")
            },
            |candidate| {
                let bar = progress.get_or_insert_with(|| {
                    ProgressBar::new(candidates.len() as u64).with_style(style.clone())
                });
                bar.println(format!(
                    "Cancelling job '{}' - '{}'",
                    candidate.job_id, candidate.name
                ));
                let outcome = CancelOutcome::from_result(self.slurm.scancel(&candidate.job_id));
                if let CancelOutcome::Failed(reason) = &outcome {
                    bar.println(format!("  {}", reason.red()));
                }
                bar.inc(1);
                outcome
            },
        )?;

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        let Some(report) = report else {
            println!("Nothing cancelled.");
            return Ok(());
        };

        println!(
            "{} {} cancelled, {} failed",
            "Done:".bold(),
            report.cancelled.len().green(),
            report.failed.len().red()
        );
        if report.has_failures() {
            bail!(
                "{} of {} cancellations failed",
                report.failed.len(),
                report.attempted()
            );
        }
        Ok(())
    }
}
