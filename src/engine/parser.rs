//! Recursive-descent parser from tokens to rules.
//!
//! ```text
//! domain  = rule { (";" | "," | "||") rule } [";"]
//! rule    = [years] [monthdays] [weeks] [":"] [weekdays] [times | "24/7"] [modifier] [comment]
//! ```
//!
//! Commas are overloaded: inside a selector list they separate items, between
//! rules they mean "additional rule". A comma continues the current list only
//! when the token after it can start another item of that list; otherwise it
//! ends the rule.
//!
//! Range checks (hour 25, day 32, week 54, ...) happen here, so every error
//! points at the offending token.

use chrono::Weekday;

use super::lexer::{Keyword, Symbol, Token, TokenKind};
use crate::calendar::{MAX_EXTENDED_MINUTES, MINUTES_PER_DAY, max_days_in_month};
use crate::error::SyntaxError;
use crate::rule::{
    Combination, DateSpec, HolidayJoin, HolidayKind, MonthdayRange, NthSet, Rule, SolarEvent, State, TimeRef,
    TimeSpan, WeekRange, WeekdaySelector, WeekdaySet, YearRange,
};

const MIN_YEAR: u32 = 1900;
const MAX_YEAR: u32 = 9999;

/// Parse a token stream into rules, stopping at the first error.
pub fn parse(tokens: &[Token]) -> Result<Vec<Rule>, SyntaxError> {
    let mut parser = Parser { tokens, pos: 0 };
    if tokens.is_empty() {
        return Err(parser.error("a rule"));
    }

    let mut rules = Vec::new();
    let mut combination = Combination::Override;
    loop {
        rules.push(parser.rule(combination)?);

        combination = match parser.peek_symbol() {
            None if parser.at_end() => break,
            Some(Symbol::Semicolon) => Combination::Override,
            Some(Symbol::Comma) => Combination::Additional,
            Some(Symbol::DoublePipe) => Combination::Fallback,
            _ => return Err(parser.error("';', ',' or '||'")),
        };
        parser.pos += 1;

        if combination == Combination::Override && parser.at_end() {
            break;
        }
    }

    Ok(rules)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    // --- cursor --------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_at(&self, offset: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn peek(&self) -> Option<&'a TokenKind> {
        self.peek_at(0)
    }

    fn peek_symbol(&self) -> Option<Symbol> {
        match self.peek() {
            Some(TokenKind::Symbol(sym)) => Some(*sym),
            _ => None,
        }
    }

    fn symbol_at(&self, offset: usize, symbol: Symbol) -> bool {
        matches!(self.peek_at(offset), Some(TokenKind::Symbol(s)) if *s == symbol)
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        let hit = self.symbol_at(0, symbol);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect_symbol(&mut self, symbol: Symbol, expected: &str) -> Result<(), SyntaxError> {
        if self.eat_symbol(symbol) { Ok(()) } else { Err(self.error(expected)) }
    }

    /// Error at the current token (or at the end of input).
    fn error(&self, expected: &str) -> SyntaxError {
        self.error_at(self.pos, expected)
    }

    fn error_at(&self, index: usize, expected: &str) -> SyntaxError {
        let (position, found) = match self.tokens.get(index) {
            Some(token) => (token.position, token.to_string()),
            None => (self.tokens.last().map_or(0, |t| t.position + t.text.len()), "end of input".to_string()),
        };
        SyntaxError { position, expected: expected.to_string(), found }
    }

    // --- lookahead predicates --------------------------------------------------

    fn is_year_at(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Some(TokenKind::Number { digits: 4, .. }))
            && !matches!(self.peek_at(offset + 1), Some(TokenKind::Month(_)))
    }

    fn is_monthday_at(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some(TokenKind::Month(_)) => true,
            Some(TokenKind::Number { digits: 4, .. }) => matches!(self.peek_at(offset + 1), Some(TokenKind::Month(_))),
            _ => false,
        }
    }

    fn is_weekday_item_at(&self, offset: usize) -> bool {
        matches!(
            self.peek_at(offset),
            Some(TokenKind::Weekday(_))
                | Some(TokenKind::Keyword(Keyword::PublicHoliday))
                | Some(TokenKind::Keyword(Keyword::SchoolHoliday))
        )
    }

    fn is_time_at(&self, offset: usize) -> bool {
        matches!(
            self.peek_at(offset),
            Some(TokenKind::Time { .. })
                | Some(TokenKind::Symbol(Symbol::LParen))
                | Some(TokenKind::Keyword(Keyword::Sunrise | Keyword::Sunset | Keyword::Dawn | Keyword::Dusk))
        )
    }

    fn is_twenty_four_seven(&self) -> bool {
        matches!(self.peek(), Some(TokenKind::Number { value: 24, .. }))
            && self.symbol_at(1, Symbol::Slash)
            && matches!(self.peek_at(2), Some(TokenKind::Number { value: 7, .. }))
    }

    /// A list separator: a comma followed by something `item_at` accepts.
    fn list_continues(&mut self, item_at: impl Fn(&Self, usize) -> bool) -> bool {
        if self.symbol_at(0, Symbol::Comma) && item_at(self, 1) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // --- rule ----------------------------------------------------------------

    fn rule(&mut self, combination: Combination) -> Result<Rule, SyntaxError> {
        let start = self.pos;

        let mut years = Vec::new();
        if self.is_year_at(0) {
            loop {
                years.push(self.year_range()?);
                if !self.list_continues(|p, o| p.is_year_at(o)) {
                    break;
                }
            }
        }

        let mut monthdays = Vec::new();
        if self.is_monthday_at(0) {
            loop {
                monthdays.push(self.monthday_range()?);
                if !self.list_continues(|p, o| p.is_monthday_at(o)) {
                    break;
                }
            }
        }

        let mut weeks = Vec::new();
        if matches!(self.peek(), Some(TokenKind::Keyword(Keyword::Week))) {
            self.pos += 1;
            loop {
                weeks.push(self.week_range()?);
                if !self.list_continues(|p, o| matches!(p.peek_at(o), Some(TokenKind::Number { .. }))) {
                    break;
                }
            }
        }

        if self.pos > start {
            self.eat_symbol(Symbol::Colon);
        }

        let weekdays = if self.is_weekday_item_at(0) { self.weekday_selector()? } else { WeekdaySelector::default() };

        let mut times = Vec::new();
        if self.is_twenty_four_seven() {
            self.pos += 3;
        } else if self.is_time_at(0) {
            loop {
                times.push(self.time_span()?);
                if !self.list_continues(|p, o| p.is_time_at(o)) {
                    break;
                }
            }
        }

        let modifier = match self.peek() {
            Some(TokenKind::Keyword(Keyword::Open)) => Some(State::Open),
            Some(TokenKind::Keyword(Keyword::Closed | Keyword::Off)) => Some(State::Closed),
            Some(TokenKind::Keyword(Keyword::Unknown)) => Some(State::Unknown),
            _ => None,
        };
        if modifier.is_some() {
            self.pos += 1;
        }

        let comment = match self.peek() {
            Some(TokenKind::Comment(text)) => {
                self.pos += 1;
                Some(text.clone())
            }
            _ => None,
        };

        let comment_only = comment.is_some() && self.pos == start + 1;
        if self.pos == start {
            return Err(self.error("a rule"));
        }

        let state = match modifier {
            Some(state) => state,
            None if comment_only => State::Unknown,
            None => State::Open,
        };

        Ok(Rule { years, monthdays, weeks, weekdays, times, state, comment, combination })
    }

    // --- years ---------------------------------------------------------------

    fn year(&mut self) -> Result<i32, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Number { value, digits: 4 }) if (MIN_YEAR..=MAX_YEAR).contains(value) => {
                self.pos += 1;
                Ok(*value as i32)
            }
            _ => Err(self.error("a year between 1900 and 9999")),
        }
    }

    fn step(&mut self) -> Result<u32, SyntaxError> {
        if !self.eat_symbol(Symbol::Slash) {
            return Ok(1);
        }
        match self.peek() {
            Some(TokenKind::Number { value, .. }) if *value >= 1 => {
                self.pos += 1;
                Ok(*value)
            }
            _ => Err(self.error("a step of at least 1")),
        }
    }

    fn year_range(&mut self) -> Result<YearRange, SyntaxError> {
        let start = self.year()?;
        if self.eat_symbol(Symbol::Plus) {
            return Ok(YearRange { start, end: None, step: 1 });
        }
        if !self.eat_symbol(Symbol::Dash) {
            return Ok(YearRange { start, end: Some(start), step: 1 });
        }
        let end_index = self.pos;
        let end = self.year()?;
        if end < start {
            return Err(self.error_at(end_index, "a year range that does not run backwards"));
        }
        let step = self.step()?;
        Ok(YearRange { start, end: Some(end), step })
    }

    // --- months and dates ------------------------------------------------------

    fn optional_year(&mut self) -> Result<Option<i32>, SyntaxError> {
        if matches!(self.peek(), Some(TokenKind::Number { digits: 4, .. })) { self.year().map(Some) } else { Ok(None) }
    }

    fn month(&mut self) -> Result<u32, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Month(month)) => {
                self.pos += 1;
                Ok(*month)
            }
            _ => Err(self.error("a month name")),
        }
    }

    fn is_day_at(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Some(TokenKind::Number { digits: 1 | 2, .. }))
    }

    fn day(&mut self, month: u32) -> Result<u32, SyntaxError> {
        let max = max_days_in_month(month);
        match self.peek() {
            Some(TokenKind::Number { value, digits: 1 | 2 }) if (1..=max).contains(value) => {
                self.pos += 1;
                Ok(*value)
            }
            _ => Err(self.error(&format!("a day between 1 and {max}"))),
        }
    }

    fn monthday_range(&mut self) -> Result<MonthdayRange, SyntaxError> {
        let year = self.optional_year()?;
        let start_month = self.month()?;

        if self.is_day_at(0) {
            let start = DateSpec { year, month: start_month, day: self.day(start_month)? };
            if self.eat_symbol(Symbol::Plus) {
                return Ok(MonthdayRange::Dates { start, end: None });
            }
            if !self.symbol_at(0, Symbol::Dash) {
                return Ok(MonthdayRange::Dates { start, end: Some(DateSpec { year: None, ..start }) });
            }
            self.pos += 1;
            let end = if self.is_day_at(0) {
                DateSpec { year: None, month: start_month, day: self.day(start_month)? }
            } else {
                let end_index = self.pos;
                let year = self.optional_year()?;
                if year.is_some() && start.year.is_none() {
                    return Err(self.error_at(end_index, "a month name"));
                }
                let month = self.month()?;
                let end = DateSpec { year, month, day: self.day(month)? };
                if let (Some(start_year), Some(end_year)) = (start.year, end.year) {
                    if (end_year, end.month, end.day) < (start_year, start.month, start.day) {
                        return Err(self.error_at(end_index, "a date range that does not run backwards"));
                    }
                }
                end
            };
            return Ok(MonthdayRange::Dates { start, end: Some(end) });
        }

        if !(self.symbol_at(0, Symbol::Dash) && self.is_monthday_at(1)) {
            return Ok(MonthdayRange::Months { year, start: start_month, end: start_month });
        }
        self.pos += 1;
        let end_index = self.pos;
        let end_year = self.optional_year()?;
        let end = self.month()?;
        if let (Some(start_year), Some(end_year)) = (year, end_year) {
            let expected = if end < start_month { start_year + 1 } else { start_year };
            if end_year != expected {
                return Err(self.error_at(end_index, "a month range spanning at most one year"));
            }
        } else if end_year.is_some() {
            return Err(self.error_at(end_index, "a month name"));
        }
        Ok(MonthdayRange::Months { year, start: start_month, end })
    }

    // --- weeks ---------------------------------------------------------------

    fn week_number(&mut self) -> Result<u32, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Number { value, .. }) if (1..=53).contains(value) => {
                self.pos += 1;
                Ok(*value)
            }
            _ => Err(self.error("a week number between 1 and 53")),
        }
    }

    fn week_range(&mut self) -> Result<WeekRange, SyntaxError> {
        let start = self.week_number()?;
        if !self.eat_symbol(Symbol::Dash) {
            return Ok(WeekRange { start, end: start, step: 1 });
        }
        let end = self.week_number()?;
        let step = self.step()?;
        Ok(WeekRange { start, end, step })
    }

    // --- weekdays and holidays ---------------------------------------------------

    fn weekday_selector(&mut self) -> Result<WeekdaySelector, SyntaxError> {
        let mut selector = WeekdaySelector::default();
        let mut leading_holidays = true;

        loop {
            match self.peek() {
                Some(TokenKind::Keyword(Keyword::PublicHoliday)) => {
                    self.pos += 1;
                    selector.holidays.push(HolidayKind::Public);
                }
                Some(TokenKind::Keyword(Keyword::SchoolHoliday)) => {
                    self.pos += 1;
                    selector.holidays.push(HolidayKind::School);
                }
                Some(TokenKind::Weekday(_)) => {
                    leading_holidays = false;
                    self.weekday_item(&mut selector)?;
                }
                _ => return Err(self.error("a weekday or holiday")),
            }
            if !self.list_continues(|p, o| p.is_weekday_item_at(o)) {
                break;
            }
        }

        // `PH Mo`: holidays directly followed by weekdays only match both.
        if leading_holidays && matches!(self.peek(), Some(TokenKind::Weekday(_))) {
            selector.join = HolidayJoin::Intersection;
            loop {
                self.weekday_item(&mut selector)?;
                if !self.list_continues(|p, o| matches!(p.peek_at(o), Some(TokenKind::Weekday(_)))) {
                    break;
                }
            }
        }

        Ok(selector)
    }

    fn weekday(&mut self) -> Result<Weekday, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Weekday(weekday)) => {
                self.pos += 1;
                Ok(*weekday)
            }
            _ => Err(self.error("a weekday")),
        }
    }

    fn weekday_item(&mut self, selector: &mut WeekdaySelector) -> Result<(), SyntaxError> {
        let first = self.weekday()?;
        if self.eat_symbol(Symbol::LBracket) {
            let mut nth = NthSet::empty();
            loop {
                nth |= self.nth_entry()?;
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
            self.expect_symbol(Symbol::RBracket, "']'")?;
            selector.nth.push((first, nth));
            return Ok(());
        }

        if self.eat_symbol(Symbol::Dash) {
            let last = self.weekday()?;
            selector.days |= WeekdaySet::range(first, last);
        } else {
            selector.days |= WeekdaySet::single(first);
        }
        Ok(())
    }

    fn nth_number(&mut self) -> Result<u32, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Number { value, .. }) if (1..=5).contains(value) => {
                self.pos += 1;
                Ok(*value)
            }
            _ => Err(self.error("an occurrence between 1 and 5")),
        }
    }

    fn nth_entry(&mut self) -> Result<NthSet, SyntaxError> {
        let negative = self.eat_symbol(Symbol::Dash);
        let first = self.nth_number()?;
        if negative {
            return Ok(NthSet::nth(-(first as i8)).unwrap_or_default());
        }
        let last = if self.eat_symbol(Symbol::Dash) { self.nth_number()? } else { first };
        if last < first {
            return Err(self.error_at(self.pos - 1, "an occurrence range that does not run backwards"));
        }
        Ok((first..=last).filter_map(|n| NthSet::nth(n as i8)).fold(NthSet::empty(), |acc, n| acc | n))
    }

    // --- times ---------------------------------------------------------------

    fn clock(&mut self, max_hour: u32) -> Result<u32, SyntaxError> {
        let expected = format!("a time between 00:00 and {max_hour}:00");
        match self.peek() {
            Some(TokenKind::Time { hour, minute }) => {
                let minutes = hour.checked_mul(60).and_then(|m| m.checked_add(*minute));
                match minutes {
                    Some(minutes) if *minute < 60 && minutes <= max_hour * 60 => {
                        self.pos += 1;
                        Ok(minutes)
                    }
                    _ => Err(self.error(&expected)),
                }
            }
            _ => Err(self.error(&expected)),
        }
    }

    fn solar_event(&mut self) -> Option<SolarEvent> {
        let event = match self.peek() {
            Some(TokenKind::Keyword(Keyword::Dawn)) => SolarEvent::Dawn,
            Some(TokenKind::Keyword(Keyword::Sunrise)) => SolarEvent::Sunrise,
            Some(TokenKind::Keyword(Keyword::Sunset)) => SolarEvent::Sunset,
            Some(TokenKind::Keyword(Keyword::Dusk)) => SolarEvent::Dusk,
            _ => return None,
        };
        self.pos += 1;
        Some(event)
    }

    fn time_ref(&mut self, max_hour: u32) -> Result<TimeRef, SyntaxError> {
        if let Some(event) = self.solar_event() {
            return Ok(TimeRef::Solar { event, offset: 0 });
        }
        if !self.eat_symbol(Symbol::LParen) {
            return self.clock(max_hour).map(TimeRef::Fixed);
        }

        let Some(event) = self.solar_event() else {
            return Err(self.error("sunrise, sunset, dawn or dusk"));
        };
        let sign = if self.eat_symbol(Symbol::Plus) {
            1
        } else if self.eat_symbol(Symbol::Dash) {
            -1
        } else {
            return Err(self.error("'+' or '-'"));
        };
        let offset = self.clock(24)? as i32 * sign;
        self.expect_symbol(Symbol::RParen, "')'")?;
        Ok(TimeRef::Solar { event, offset })
    }

    fn time_span(&mut self) -> Result<TimeSpan, SyntaxError> {
        let start = self.time_ref(MINUTES_PER_DAY / 60)?;
        if self.eat_symbol(Symbol::Plus) {
            return Ok(TimeSpan { start, end: None, open_end: true });
        }
        self.expect_symbol(Symbol::Dash, "'-' or '+' after a time")?;
        let end = self.time_ref(MAX_EXTENDED_MINUTES / 60)?;
        let open_end = self.eat_symbol(Symbol::Plus);
        Ok(TimeSpan { start, end: Some(end), open_end })
    }
}
