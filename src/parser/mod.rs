pub mod line;
pub mod occurrence;
pub mod window;

use serde::Deserialize;

/// Un-validated field captures from one candidate line or line group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLineMatch {
    pub occurrence: String,
    pub session: String,
    pub site: String,
    pub village: String,
    pub distance: String,
    pub population: String,
    pub staff: String,
}

/// How a schedule document lays its table rows out as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// All seven fields on one line.
    #[default]
    Combined,
    /// Seven consecutive lines, one field each.
    Window,
}

/// A unit of page text considered for extraction.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// 1-based index of the first non-blank line of the unit within its page.
    pub line: usize,
    pub lines: &'a [&'a str],
}

impl Layout {
    pub fn parse(self, unit: &[&str]) -> Option<RawLineMatch> {
        match self {
            Layout::Combined => unit.first().and_then(|l| line::parse(l)),
            Layout::Window => window::parse(unit),
        }
    }
}

/// Trimmed, non-blank lines of a page in order.
pub fn page_lines(page: &str) -> Vec<&str> {
    page.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Split page lines into candidate units for `layout`, in order.
pub fn candidates<'a>(lines: &'a [&'a str], layout: Layout) -> impl Iterator<Item = Candidate<'a>> {
    let mut start = 0;
    std::iter::from_fn(move || {
        let rest = lines.get(start..).filter(|r| !r.is_empty())?;
        let len = match layout {
            Layout::Combined => 1,
            Layout::Window => window::unit_len(rest),
        };
        let unit = Candidate {
            line: start + 1,
            lines: &rest[..len],
        };
        start += len;
        Some(unit)
    })
}
