mod report;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_english::{Dialect, parse_date_string};
use clap::{Args, Parser, Subcommand};
use openhours::{Context, DEFAULT_MAX_SEARCH_YEARS, HolidaySet, OpeningHours, parse_naive_iso};
use tracing::debug;

/// Parse and query OpenStreetMap-style opening hours expressions.
#[derive(Parser, Debug)]
#[command(name = "openhours", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Public holiday date (YYYY-MM-DD). Repeat or separate with commas.
    #[arg(long = "public-holiday", global = true, value_delimiter = ',')]
    public_holidays: Vec<NaiveDate>,

    /// School holiday date (YYYY-MM-DD). Repeat or separate with commas.
    #[arg(long = "school-holiday", global = true, value_delimiter = ',')]
    school_holidays: Vec<NaiveDate>,

    /// How many years `next` and interval lookups may search.
    #[arg(long, global = true, env = "OPENHOURS_MAX_SEARCH_YEARS", default_value_t = DEFAULT_MAX_SEARCH_YEARS)]
    max_search_years: u32,

    /// Force ANSI color output.
    #[arg(long, global = true, overrides_with = "no_color")]
    color: bool,

    /// Disable ANSI color output.
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that an expression parses.
    Validate { expr: String },
    /// State at an instant, with the interval around it.
    State {
        expr: String,
        #[command(flatten)]
        at: At,
    },
    /// Next instant at which the state changes.
    Next {
        expr: String,
        #[command(flatten)]
        at: At,
        /// Also print search metrics.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Open and unknown intervals in [FROM, TO).
    Intervals {
        expr: String,
        #[arg(long, value_parser = parse_when)]
        from: NaiveDateTime,
        #[arg(long, value_parser = parse_when)]
        to: NaiveDateTime,
    },
    /// Monday to Sunday overview of the week containing the instant.
    Week {
        expr: String,
        #[command(flatten)]
        at: At,
    },
}

#[derive(Args, Debug)]
struct At {
    /// `YYYY-MM-DDTHH:MM:SS` or an English phrase such as "next friday 8pm".
    /// Default: now.
    #[arg(long, value_parser = parse_when)]
    at: Option<NaiveDateTime>,
}

impl At {
    fn instant(&self) -> NaiveDateTime {
        self.at.unwrap_or_else(|| Local::now().naive_local())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let color = if cli.no_color { false } else { cli.color || io::stdout().is_terminal() };
    let context = Context::default()
        .with_public_holidays(cli.public_holidays.iter().copied().collect::<HolidaySet>())
        .with_school_holidays(cli.school_holidays.iter().copied().collect::<HolidaySet>())
        .with_max_search_years(cli.max_search_years);
    debug!(?context, "cli context");

    let expr = match &cli.command {
        Command::Validate { expr }
        | Command::State { expr, .. }
        | Command::Next { expr, .. }
        | Command::Intervals { expr, .. }
        | Command::Week { expr, .. } => expr,
    };
    let hours = match OpeningHours::parse(expr) {
        Ok(hours) => hours.with_context(context),
        Err(err) => {
            report::print_error(expr, &err, color);
            return ExitCode::from(2);
        }
    };

    match &cli.command {
        Command::Validate { .. } => report::print_valid(hours.raw(), hours.rules().len(), color),
        Command::State { at, .. } => {
            let instant = at.instant();
            report::print_state(hours.raw(), instant, &hours.state_at(instant), color);
        }
        Command::Next { at, verbose, .. } => {
            let instant = at.instant();
            let run = hours.next_change_with_metrics(instant);
            report::print_next(hours.raw(), instant, &run, *verbose, color);
            if run.result.is_err() {
                return ExitCode::FAILURE;
            }
        }
        Command::Intervals { from, to, .. } => {
            report::print_intervals(hours.raw(), &hours.open_intervals(*from, *to), color);
        }
        Command::Week { at, .. } => {
            report::print_week(hours.raw(), &hours.week_schedule(at.instant().date()), color);
        }
    }
    ExitCode::SUCCESS
}

/// Strict timestamp first, then an English phrase relative to now.
fn parse_when(value: &str) -> Result<NaiveDateTime, String> {
    if let Ok(instant) = parse_naive_iso(value) {
        return Ok(instant);
    }
    let now = Local::now().naive_local();
    parse_date_string(value, Utc.from_utc_datetime(&now), Dialect::Uk)
        .map(|parsed| parsed.naive_utc())
        .map_err(|_| format!("invalid time '{value}' (expected YYYY-MM-DDTHH:MM:SS or a phrase like \"next friday\")"))
}
