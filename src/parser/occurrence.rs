use std::sync::LazyLock;

use chrono::Weekday;
use regex::Regex;

use crate::calendar::parse_weekday;

static OCCURRENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?\s*([a-z]+)$").unwrap()
});

/// "2nd Monday" split into its ordinal and weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub ordinal: u32,
    pub weekday: Weekday,
}

pub fn decompose(phrase: &str) -> Option<Occurrence> {
    let caps = OCCURRENCE_RE.captures(phrase.trim())?;
    let ordinal = caps[1].parse().ok()?;
    let weekday = parse_weekday(&caps[2])?;
    Some(Occurrence { ordinal, weekday })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_suffixes() {
        assert_eq!(
            decompose("2nd Monday"),
            Some(Occurrence { ordinal: 2, weekday: Weekday::Mon })
        );
        assert_eq!(decompose("1st friday").map(|o| o.weekday), Some(Weekday::Fri));
        assert_eq!(decompose("3RD WED").map(|o| o.ordinal), Some(3));
        assert_eq!(decompose("4 Sunday").map(|o| o.ordinal), Some(4));
    }

    #[test]
    fn not_a_weekday() {
        assert_eq!(decompose("2nd Block"), None);
        assert_eq!(decompose("Monday"), None);
        assert_eq!(decompose("2nd Monday extra"), None);
    }
}
