//! Date header parsing (RFC 5322 §3.3 and §4.3, plus common broken variants).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use super::Decoded;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const DAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Parse an email date string, keeping its original UTC offset.
///
/// Supports RFC 5322 (day-of-week optional, obsolete zone names, two-digit
/// years, trailing comments), ISO 8601, IMAP `DD-MON-YYYY`, and asctime.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(dt) = parse_rfc5322(trimmed) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    let zone_formats = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z", "%a %b %e %H:%M:%S %Y %z"];
    for fmt in &zone_formats {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }

    // Zone-less formats are taken as UTC.
    let naive_formats = [
        "%a %b %e %H:%M:%S %Y",
        "%b %e %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    for fmt in &naive_formats {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ndt.and_utc().fixed_offset());
        }
    }

    None
}

/// [`parse_date`] with the lenient-decoding contract: an unparseable value
/// yields `None` flagged as defaulted.
pub fn decode_date(date_str: &str) -> Decoded<Option<DateTime<FixedOffset>>> {
    match parse_date(date_str) {
        Some(dt) => Decoded::parsed(Some(dt)),
        None => Decoded::fallback(None),
    }
}

/// Token-based RFC 5322 `date-time` parser.
///
/// `[day-of-week ","] day month year hour ":" minute [":" second] [zone]`
fn parse_rfc5322(input: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = strip_comments(input).replace(',', " ");
    let mut tokens: Vec<String> = Vec::new();
    for token in cleaned.split_whitespace() {
        // IMAP style "16-JUL-2025" → "16", "JUL", "2025"
        if token.contains('-') && token.chars().any(|c| c.is_ascii_alphabetic()) {
            tokens.extend(token.split('-').filter(|t| !t.is_empty()).map(str::to_string));
        } else {
            tokens.push(token.to_string());
        }
    }

    let mut iter = tokens.iter().map(String::as_str).peekable();
    if let Some(first) = iter.peek() {
        if is_day_name(first) {
            iter.next();
        }
    }

    let day: u32 = iter.next()?.parse().ok()?;
    let month = month_number(iter.next()?)?;
    let year = normalize_year(iter.next()?)?;
    let (hour, minute, second) = parse_time(iter.next()?)?;
    let offset = match iter.next() {
        Some(zone) => parse_zone(zone)?,
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    // Leap seconds are clamped.
    let time = NaiveTime::from_hms_opt(hour, minute, second.min(59))?;
    let offset = FixedOffset::east_opt(offset)?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0usize;
    for ch in input.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

fn is_day_name(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower.len() >= 3 && DAYS.iter().any(|d| lower.starts_with(d))
}

fn month_number(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
}

/// RFC 5322 §4.3: two-digit years 00-49 are 20xx, 50-99 are 19xx;
/// three-digit years are offset from 1900.
fn normalize_year(token: &str) -> Option<i32> {
    let year: i32 = token.parse().ok()?;
    Some(match token.len() {
        1 | 2 if year < 50 => 2000 + year,
        1 | 2 => 1900 + year,
        3 => 1900 + year,
        _ => year,
    })
}

fn parse_time(token: &str) -> Option<(u32, u32, u32)> {
    let mut parts = token.split(':');
    let hour = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = match parts.next() {
        Some(s) => s.split('.').next()?.parse().ok()?,
        None => 0,
    };
    Some((hour, minute, second))
}

/// Zone → offset in seconds east of UTC.
fn parse_zone(zone: &str) -> Option<i32> {
    if let Some(sign) = zone.chars().next().filter(|c| *c == '+' || *c == '-') {
        let digits: String = zone[1..].chars().filter(char::is_ascii_digit).collect();
        let (hours, minutes) = match digits.len() {
            1 | 2 => (digits.parse::<i32>().ok()?, 0),
            3 | 4 => {
                let split = digits.len() - 2;
                (
                    digits[..split].parse::<i32>().ok()?,
                    digits[split..].parse::<i32>().ok()?,
                )
            }
            _ => return None,
        };
        let seconds = hours * 3600 + minutes * 60;
        return Some(if sign == '-' { -seconds } else { seconds });
    }

    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        "CET" | "BST" => 1,
        "CEST" => 2,
        "JST" => 9,
        // Military letters are read as -0000 (RFC 5322 §4.3); other names are
        // unknown and carry no offset.
        z if z.chars().all(|c| c.is_ascii_alphabetic()) => 0,
        _ => return None,
    };
    Some(hours * 3600)
}
