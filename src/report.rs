use chrono::{NaiveDateTime, NaiveTime};
use openhours::{DaySummary, EvaluatedState, Interval, NextChangeRun, OpenInterval, State};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

use ansi::Palette;

const TIMESTAMP: &str = "%Y-%m-%d %H:%M";

fn header(raw: &str, palette: &Palette) {
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Expression: \"{}\"", raw), ansi::CYAN)));
}

fn section(title: &str, palette: &Palette) {
    println!("\n{}", palette.paint(format!("━━━ {} ━━━", title), ansi::GRAY));
}

fn state_label(state: State, palette: &Palette) -> String {
    let color = match state {
        State::Open => ansi::GREEN,
        State::Closed => ansi::RED,
        State::Unknown => ansi::YELLOW,
    };
    palette.bold(palette.paint(state.as_str(), color))
}

fn fmt_bound(bound: Option<NaiveDateTime>, palette: &Palette) -> String {
    match bound {
        Some(instant) => palette.paint(instant.format(TIMESTAMP).to_string(), ansi::YELLOW),
        None => palette.dim("unbounded"),
    }
}

fn fmt_comment(comment: Option<&str>, palette: &Palette) -> String {
    comment.map(|text| format!("  {}", palette.paint(format!("\"{}\"", text), ansi::BLUE))).unwrap_or_default()
}

pub fn print_valid(raw: &str, rules: usize, color: bool) {
    let palette = Palette::new(color);
    header(raw, &palette);
    println!("  {} {}", palette.paint("✓ valid", ansi::GREEN), palette.dim(format!("({} rules)", rules)));
    println!();
}

/// Print a parse error with a caret under the offending position.
pub fn print_error(raw: &str, err: &openhours::Error, color: bool) {
    let palette = Palette::new(color);
    eprintln!("{} {}", palette.bold(palette.paint("error:", ansi::RED)), err);
    let Some(position) = err.position() else {
        return;
    };
    let column = raw.get(..position).map_or(position, |prefix| prefix.chars().count());
    eprintln!("  {}", raw);
    eprintln!("  {}{}", " ".repeat(column), palette.paint("^", ansi::RED));
}

pub fn print_state(raw: &str, at: NaiveDateTime, state: &EvaluatedState, color: bool) {
    let palette = Palette::new(color);
    header(raw, &palette);

    section("State", &palette);
    println!(
        "  {} {}{}",
        palette.dim(format!("at {}:", at.format(TIMESTAMP))),
        state_label(state.state, &palette),
        fmt_comment(state.comment.as_deref(), &palette)
    );
    if let Some(interval) = &state.interval {
        print_interval(interval, &palette);
    }
    println!();
}

fn print_interval(interval: &Interval, palette: &Palette) {
    println!(
        "  {} {} {} {}{}",
        palette.dim("interval:"),
        fmt_bound(interval.start, palette),
        palette.dim("→"),
        fmt_bound(interval.end, palette),
        if interval.open_end { palette.paint("  (open end)", ansi::YELLOW) } else { String::new() }
    );
}

pub fn print_next(raw: &str, at: NaiveDateTime, run: &NextChangeRun, verbose: bool, color: bool) {
    let palette = Palette::new(color);
    header(raw, &palette);

    section("Next change", &palette);
    let line = match &run.result {
        Ok(Some(next)) => palette.bold(palette.paint(next.format(TIMESTAMP).to_string(), ansi::GREEN)),
        Ok(None) => palette.dim("never (the state is constant from here on)"),
        Err(err) => palette.paint(err.to_string(), ansi::RED),
    };
    println!("  {} {}", palette.dim(format!("after {}:", at.format(TIMESTAMP))), line);

    if verbose {
        section("Search", &palette);
        println!(
            "  Days evaluated: {}  │  Elapsed: {}",
            palette.paint(run.metrics.days_evaluated.to_string(), ansi::BLUE),
            palette.paint(format!("{:?}", run.metrics.elapsed), ansi::GREEN),
        );
    }
    println!();
}

pub fn print_intervals(raw: &str, intervals: &[OpenInterval], color: bool) {
    let palette = Palette::new(color);
    header(raw, &palette);

    section("Intervals", &palette);
    if intervals.is_empty() {
        println!("{}", palette.dim("  No open intervals in range"));
    }
    for (idx, interval) in intervals.iter().enumerate() {
        println!(
            "  {} {} {} {} {}{}{}",
            palette.paint(format!("[{}]", idx), ansi::GRAY),
            palette.paint(interval.start.format(TIMESTAMP).to_string(), ansi::YELLOW),
            palette.dim("→"),
            palette.paint(interval.end.format(TIMESTAMP).to_string(), ansi::YELLOW),
            state_label(interval.state, &palette),
            if interval.open_end { palette.paint("  (open end)", ansi::YELLOW) } else { String::new() },
            fmt_comment(interval.comment.as_deref(), &palette)
        );
    }
    println!();
}

fn fmt_span((start, end): (NaiveTime, NaiveTime)) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

pub fn print_week(raw: &str, week: &[DaySummary], color: bool) {
    let palette = Palette::new(color);
    header(raw, &palette);

    section("Week", &palette);
    for day in week {
        let spans = if day.spans.is_empty() {
            palette.dim("-")
        } else {
            day.spans.iter().copied().map(fmt_span).collect::<Vec<_>>().join(", ")
        };
        println!(
            "  {} {} {:<8} {}",
            palette.paint(day.weekday.to_string(), ansi::CYAN),
            palette.dim(day.date.to_string()),
            state_label(day.status, &palette),
            spans
        );
    }
    println!();
}
