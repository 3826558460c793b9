use std::sync::LazyLock;

use regex::Regex;

use super::RawLineMatch;

// occurrence, session, site, village, distance [+unit], population, staff
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:^|\s)
        (?P<occurrence>\d{1,2}(?:st|nd|rd|th|ST|ND|RD|TH)?\s+[A-Za-z]+)
        \s+(?P<session>FN|AN)
        \s+(?P<site>.+?)
        \s+(?P<village>.+?)
        \s+(?P<distance>\d+(?:\.\d+)?)(?:\s*(?i:kms?|k\.m\.?)\.?)?
        \s+(?P<population>\d{1,3}(?:,\d{3})+|\d+)
        \s+(?P<staff>.+?)\s*$",
    )
    .unwrap()
});

/// Match a single line holding every field of a schedule row.
pub fn parse(line: &str) -> Option<RawLineMatch> {
    let caps = ROW_RE.captures(line)?;
    let field = |name: &str| caps[name].trim().to_string();
    Some(RawLineMatch {
        occurrence: normalize_spaces(&caps["occurrence"]),
        session: field("session"),
        site: field("site"),
        village: field("village"),
        distance: field("distance"),
        population: field("population"),
        staff: field("staff"),
    })
}

fn normalize_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
