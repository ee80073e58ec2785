//! Field extraction from an inbound message.
//!
//! Each field is resolved by an [`ExtractorChain`]: the interpreted result first, then
//! business-rule extractors, then regex fallbacks. The first extractor that returns a
//! value wins. Interpreted values are re-validated before they are accepted.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use rust_decimal::Decimal;

use crate::delivery::{match_development, normalize};
use crate::domain::catalog::CatalogSnapshot;
use crate::domain::intent::InterpretedIntent;
use crate::domain::lead::{is_placeholder_name, Lead, PendingClarification};

pub struct ExtractionInput<'a> {
    pub text: &'a str,
    pub intent: &'a InterpretedIntent,
    pub lead: &'a Lead,
    pub catalog: &'a CatalogSnapshot,
    /// Local business date the message arrived on.
    pub today: NaiveDate,
}

pub struct Extractor<T> {
    pub name: &'static str,
    pub run: fn(&ExtractionInput<'_>) -> Option<T>,
}

pub struct ExtractorChain<T> {
    extractors: Vec<Extractor<T>>,
}

impl<T> ExtractorChain<T> {
    pub fn new(extractors: Vec<Extractor<T>>) -> Self {
        Self { extractors }
    }

    pub fn extract(&self, input: &ExtractionInput<'_>) -> Option<T> {
        self.extract_with_source(input).map(|(value, _)| value)
    }

    /// Like [`extract`](Self::extract) but also names the extractor that produced the value.
    pub fn extract_with_source(&self, input: &ExtractionInput<'_>) -> Option<(T, &'static str)> {
        self.extractors
            .iter()
            .find_map(|extractor| (extractor.run)(input).map(|value| (value, extractor.name)))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|extractor| extractor.name).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub development: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub budget: Option<Decimal>,
    pub bedrooms: Option<u8>,
}

pub struct FieldExtractors {
    pub name: ExtractorChain<String>,
    pub development: ExtractorChain<String>,
    pub date: ExtractorChain<NaiveDate>,
    pub time: ExtractorChain<NaiveTime>,
    pub budget: ExtractorChain<Decimal>,
    pub bedrooms: ExtractorChain<u8>,
}

impl Default for FieldExtractors {
    fn default() -> Self {
        Self {
            name: ExtractorChain::new(vec![
                Extractor { name: "interpreted", run: interpreted_name },
                Extractor { name: "pending_name_reply", run: pending_name_reply },
                Extractor { name: "pattern", run: pattern_name },
            ]),
            development: ExtractorChain::new(vec![
                Extractor { name: "interpreted_catalog", run: interpreted_development },
                Extractor { name: "catalog_mention", run: catalog_mention },
                Extractor { name: "interpreted_raw", run: interpreted_development_raw },
            ]),
            date: ExtractorChain::new(vec![
                Extractor { name: "interpreted", run: interpreted_date },
                Extractor { name: "relative_day", run: relative_date },
                Extractor { name: "pattern", run: pattern_date },
            ]),
            time: ExtractorChain::new(vec![
                Extractor { name: "interpreted", run: interpreted_time },
                Extractor { name: "pattern", run: pattern_time },
            ]),
            budget: ExtractorChain::new(vec![
                Extractor { name: "interpreted", run: interpreted_budget },
                Extractor { name: "pattern", run: pattern_budget },
            ]),
            bedrooms: ExtractorChain::new(vec![
                Extractor { name: "interpreted", run: interpreted_bedrooms },
                Extractor { name: "pattern", run: pattern_bedrooms },
            ]),
        }
    }
}

impl FieldExtractors {
    pub fn extract_all(&self, input: &ExtractionInput<'_>) -> ExtractedFields {
        ExtractedFields {
            name: self.name.extract(input),
            development: self.development.extract(input),
            date: self.date.extract(input),
            time: self.time.extract(input),
            budget: self.budget.extract(input),
            bedrooms: self.bedrooms.extract(input),
        }
    }
}

/// Accepts 1-4 alphabetic words that are not a placeholder. Returns the title-cased name.
pub fn plausible_name(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim().trim_end_matches(['.', '!', ',']);
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.is_empty() || words.len() > 4 || is_placeholder_name(trimmed) {
        return None;
    }
    let alphabetic = words
        .iter()
        .all(|word| word.chars().all(|ch| ch.is_alphabetic() || ch == '\'' || ch == '-'));
    if !alphabetic {
        return None;
    }
    Some(words.iter().map(|word| title_case(word)).collect::<Vec<_>>().join(" "))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn interpreted_name(input: &ExtractionInput<'_>) -> Option<String> {
    input.intent.field("name").and_then(plausible_name)
}

/// When we just asked for a name, a short bare reply is the name.
fn pending_name_reply(input: &ExtractionInput<'_>) -> Option<String> {
    if input.lead.pending_clarification != PendingClarification::Name {
        return None;
    }
    if input.text.split_whitespace().count() > 3 {
        return None;
    }
    let lowered = normalize(input.text);
    let greetings = ["hola", "hi", "hello", "buenas", "si", "yes", "no", "ok", "gracias"];
    if greetings.contains(&lowered.as_str()) {
        return None;
    }
    plausible_name(input.text)
}

fn pattern_name(input: &ExtractionInput<'_>) -> Option<String> {
    const NOT_A_NAME: &[&str] = &["de", "del", "el", "la", "un", "una", "interesado", "interesada"];

    let captures = patterns().name.as_ref()?.captures(input.text)?;
    let candidate = captures.get(1)?.as_str();
    let first = normalize(candidate.split_whitespace().next()?);
    if NOT_A_NAME.contains(&first.as_str()) {
        return None;
    }
    plausible_name(candidate)
}

fn interpreted_development(input: &ExtractionInput<'_>) -> Option<String> {
    let raw = input.intent.field("development")?;
    match_development(input.catalog, raw).map(|entry| entry.development_name.clone())
}

fn catalog_mention(input: &ExtractionInput<'_>) -> Option<String> {
    let text = normalize(input.text);
    input
        .catalog
        .entries
        .iter()
        .find(|entry| {
            let name = normalize(&entry.development_name);
            !name.is_empty() && text.contains(&name)
        })
        .map(|entry| entry.development_name.clone())
}

fn interpreted_development_raw(input: &ExtractionInput<'_>) -> Option<String> {
    input.intent.field("development").map(|value| value.trim().to_string())
}

fn interpreted_date(input: &ExtractionInput<'_>) -> Option<NaiveDate> {
    let raw = input.intent.field("date")?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| *date >= input.today)
}

/// Relative day words and weekday names, resolved against the local business date.
fn relative_date(input: &ExtractionInput<'_>) -> Option<NaiveDate> {
    let text = normalize(input.text);
    let padded = format!(" {text} ");

    if padded.contains(" pasado manana ") || padded.contains(" day after tomorrow ") {
        return Some(input.today + Duration::days(2));
    }
    // "mañana" is also "morning"; "de la mañana"/"en la mañana" is not a day.
    let manana_as_day = padded.contains(" manana ")
        && !padded.contains(" la manana ")
        && !padded.contains(" las manana ");
    if manana_as_day || padded.contains(" tomorrow ") {
        return Some(input.today + Duration::days(1));
    }
    if padded.contains(" hoy ") || padded.contains(" today ") {
        return Some(input.today);
    }

    const WEEKDAYS: &[(&str, Weekday)] = &[
        ("lunes", Weekday::Mon),
        ("monday", Weekday::Mon),
        ("martes", Weekday::Tue),
        ("tuesday", Weekday::Tue),
        ("miercoles", Weekday::Wed),
        ("wednesday", Weekday::Wed),
        ("jueves", Weekday::Thu),
        ("thursday", Weekday::Thu),
        ("viernes", Weekday::Fri),
        ("friday", Weekday::Fri),
        ("sabado", Weekday::Sat),
        ("saturday", Weekday::Sat),
        ("domingo", Weekday::Sun),
        ("sunday", Weekday::Sun),
    ];
    WEEKDAYS
        .iter()
        .find(|(word, _)| padded.contains(&format!(" {word} ")))
        .map(|(_, weekday)| next_weekday(input.today, *weekday))
}

/// Next occurrence of `weekday` strictly after `today`.
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = i64::from(today.weekday().num_days_from_monday());
    let target = i64::from(weekday.num_days_from_monday());
    let mut delta = (target - current).rem_euclid(7);
    if delta == 0 {
        delta = 7;
    }
    today + Duration::days(delta)
}

fn pattern_date(input: &ExtractionInput<'_>) -> Option<NaiveDate> {
    let captures = patterns().date.as_ref()?.captures(input.text)?;
    let day: u32 = captures.get(1)?.as_str().parse().ok()?;
    let month: u32 = captures.get(2)?.as_str().parse().ok()?;
    let year = match captures.get(3) {
        Some(year) => {
            let value: i32 = year.as_str().parse().ok()?;
            if value < 100 {
                2000 + value
            } else {
                value
            }
        }
        None => input.today.year(),
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    if captures.get(3).is_none() && date < input.today {
        return NaiveDate::from_ymd_opt(year + 1, month, day);
    }
    Some(date)
}

fn interpreted_time(input: &ExtractionInput<'_>) -> Option<NaiveTime> {
    let raw = input.intent.field("time")?.trim().to_ascii_lowercase();
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .ok()
        .or_else(|| parse_clock_phrase(&raw))
}

fn pattern_time(input: &ExtractionInput<'_>) -> Option<NaiveTime> {
    let text = normalize(input.text);
    let captures = patterns().time.as_ref()?.captures(&text)?;
    let group = |primary: &str, secondary: &str| {
        captures.name(primary).or_else(|| captures.name(secondary)).map(|m| m.as_str())
    };
    clock_from_parts(
        group("hour", "hour2")?,
        group("minute", "minute2"),
        group("meridiem", "meridiem2"),
        &text,
    )
}

/// Parses phrases such as `4pm`, `5`, `10:30 am`.
fn parse_clock_phrase(raw: &str) -> Option<NaiveTime> {
    let captures = patterns().bare_time.as_ref()?.captures(raw)?;
    clock_from_parts(
        captures.name("hour")?.as_str(),
        captures.name("minute").map(|m| m.as_str()),
        captures.name("meridiem").map(|m| m.as_str()),
        raw,
    )
}

fn clock_from_parts(
    hour: &str,
    minute: Option<&str>,
    meridiem: Option<&str>,
    context: &str,
) -> Option<NaiveTime> {
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = match minute {
        Some(value) => value.parse().ok()?,
        None => 0,
    };
    let is_pm = meridiem.map(|m| m.starts_with('p'));
    let said_morning = context.contains("de la manana") || context.contains("in the morning");

    match is_pm {
        Some(true) if hour < 12 => hour += 12,
        Some(false) if hour == 12 => hour = 0,
        // Bare 1-7 means afternoon; nobody books a visit at 5 in the morning.
        None if (1..=7).contains(&hour) && !said_morning => hour += 12,
        _ => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn interpreted_budget(input: &ExtractionInput<'_>) -> Option<Decimal> {
    let raw = input.intent.field("budget")?;
    let cleaned: String = raw.chars().filter(|ch| ch.is_ascii_digit() || *ch == '.').collect();
    cleaned.parse::<Decimal>().ok().filter(|value| *value > Decimal::ZERO)
}

fn pattern_budget(input: &ExtractionInput<'_>) -> Option<Decimal> {
    let text = normalize(input.text);
    let captures = patterns().budget.as_ref()?.captures(&text)?;
    let amount: Decimal = captures.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let multiplier = match captures.get(2)?.as_str() {
        "mil" | "k" => Decimal::new(1_000, 0),
        _ => Decimal::new(1_000_000, 0),
    };
    Some(amount * multiplier).filter(|value| *value > Decimal::ZERO)
}

fn interpreted_bedrooms(input: &ExtractionInput<'_>) -> Option<u8> {
    input
        .intent
        .field("bedrooms")?
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|count| (1..=10).contains(count))
}

fn pattern_bedrooms(input: &ExtractionInput<'_>) -> Option<u8> {
    let text = normalize(input.text);
    let captures = patterns().bedrooms.as_ref()?.captures(&text)?;
    captures.get(1)?.as_str().parse::<u8>().ok().filter(|count| (1..=10).contains(count))
}

struct Patterns {
    name: Option<Regex>,
    date: Option<Regex>,
    time: Option<Regex>,
    bare_time: Option<Regex>,
    budget: Option<Regex>,
    bedrooms: Option<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        name: Regex::new(
            r"\b(?i:me llamo|mi nombre es|soy|my name is|this is)\s+(\p{L}[\p{L}'\-]*(?:\s+\p{Lu}[\p{L}'\-]*)?)",
        )
        .ok(),
        date: Regex::new(r"\b(\d{1,2})[/\-](\d{1,2})(?:[/\-](\d{2,4}))?\b").ok(),
        time: Regex::new(
            r"(?:\b(?:a las|a la|las|at|to|para las|around|tipo)\s+)(?P<hour>\d{1,2})(?::(?P<minute>\d{2}))?\s*(?P<meridiem>[ap]\.?\s?m\.?)?|\b(?P<hour2>\d{1,2})(?::(?P<minute2>\d{2}))?\s*(?P<meridiem2>[ap]\.?\s?m\.?)",
        )
        .ok(),
        bare_time: Regex::new(
            r"^\s*(?P<hour>\d{1,2})(?::(?P<minute>\d{2}))?\s*(?P<meridiem>[ap]\.?\s?m\.?)?\s*$",
        )
        .ok(),
        budget: Regex::new(
            r"\b(\d+(?:[.,]\d+)?)\s*(millones|millon|millions?|mdp|mil|k)\b",
        )
        .ok(),
        bedrooms: Regex::new(r"\b(\d{1,2})\s*(?:recamaras|habitaciones|cuartos|bedrooms?|rooms?)\b")
            .ok(),
    })
}
