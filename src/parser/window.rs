use super::occurrence;
use super::RawLineMatch;

pub const WINDOW_LEN: usize = 7;

/// A line that can open a window: an ordinal-weekday phrase such as "2nd Monday".
pub fn is_row_start(line: &str) -> bool {
    occurrence::decompose(line).is_some()
}

/// Number of lines in the unit at the head of `lines`.
///
/// A window opened by a row start runs for seven lines, cut short if another
/// row start appears first. Lines before a row start (titles, column headers)
/// form one unit running up to the next row start, so a stray line never
/// shifts the windows after it.
pub fn unit_len(lines: &[&str]) -> usize {
    let limit = match lines.first() {
        Some(first) if is_row_start(first) => WINDOW_LEN.min(lines.len()),
        _ => lines.len(),
    };
    lines
        .iter()
        .take(limit)
        .skip(1)
        .position(|l| is_row_start(l))
        .map_or(limit, |p| p + 1)
}

/// Positional assignment of seven consecutive lines, one field per line.
pub fn parse(lines: &[&str]) -> Option<RawLineMatch> {
    let fields: [&str; WINDOW_LEN] = lines.try_into().ok()?;
    let fields = fields.map(|f| f.trim());
    if fields.iter().any(|f| f.is_empty()) || !is_row_start(fields[0]) {
        return None;
    }
    let [occurrence, session, site, village, distance, population, staff] = fields;
    Some(RawLineMatch {
        occurrence: occurrence.split_whitespace().collect::<Vec<_>>().join(" "),
        session: session.to_string(),
        site: site.to_string(),
        village: village.to_string(),
        distance: distance.to_string(),
        population: population.to_string(),
        staff: staff.to_string(),
    })
}
