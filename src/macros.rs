/// Compile a regex once and hand out a `&'static Regex`.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// `date!("2024-05-13")`
#[cfg(test)]
macro_rules! date {
    ($s:literal) => {
        chrono::NaiveDate::parse_from_str($s, "%Y-%m-%d").unwrap()
    };
}

/// `datetime!("2024-05-13 09:30")`
#[cfg(test)]
macro_rules! datetime {
    ($s:literal) => {
        chrono::NaiveDateTime::parse_from_str($s, "%Y-%m-%d %H:%M").unwrap()
    };
}
