use tracing::{debug, warn};

use crate::assemble::{assemble, ScheduleRecord};
use crate::calendar::WeekdayOccurrenceTable;
use crate::parser::{self, Layout};

/// Records accepted from one document plus the number of units dropped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<ScheduleRecord>,
    pub skipped: usize,
}

/// Page text → schedule records for one (year, month), capped at `max_records`.
pub struct ExtractionPipeline<'t> {
    table: &'t WeekdayOccurrenceTable,
    layout: Layout,
    max_records: usize,
}

impl<'t> ExtractionPipeline<'t> {
    pub fn new(table: &'t WeekdayOccurrenceTable, layout: Layout, max_records: usize) -> Self {
        Self {
            table,
            layout,
            max_records,
        }
    }

    pub fn extract<S: AsRef<str>>(&self, pages: &[S], source_document: &str) -> Extraction {
        let mut out = Extraction::default();

        'pages: for (page_idx, page) in pages.iter().enumerate() {
            let lines = parser::page_lines(page.as_ref());
            for unit in parser::candidates(&lines, self.layout) {
                if out.records.len() >= self.max_records {
                    break 'pages;
                }
                let page_no = page_idx + 1;

                let Some(raw) = self.layout.parse(unit.lines) else {
                    debug!(page = page_no, line = unit.line, "no match");
                    out.skipped += 1;
                    continue;
                };

                match assemble(&raw, self.table, source_document) {
                    Ok(record) => out.records.push(record),
                    Err(e) => {
                        warn!(
                            source = source_document,
                            page = page_no,
                            line = unit.line,
                            reason = %e,
                            "skipping row"
                        );
                        out.skipped += 1;
                    }
                }
            }
        }

        debug!(
            source = source_document,
            records = out.records.len(),
            skipped = out.skipped,
            "extraction finished"
        );
        out
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{AFTERNOON, FORENOON};
    use crate::calendar::{self, CalendarError};
    use rayon::prelude::*;

    fn extract<S: AsRef<str>>(
        pages: &[S],
        source_document: &str,
        year: i32,
        month: u32,
        max_records: usize,
        layout: Layout,
    ) -> Result<Extraction, CalendarError> {
        let table = calendar::resolve(year, month)?;
        Ok(ExtractionPipeline::new(&table, layout, max_records).extract(pages, source_document))
    }

    fn fixture(name: &str) -> Vec<String> {
        let text = std::fs::read_to_string(format!("tests/fixtures/{}.txt", name)).unwrap();
        text.split('\x0c').map(str::to_string).collect()
    }

    fn numbered_rows(n: usize) -> String {
        (1..=n)
            .map(|i| format!("{}st Monday FN Site{} Village{} 1.5 {} Staff{}", 1 + i % 4, i, i, i, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn caps_at_max_records_in_order() {
        let pages = vec![numbered_rows(50)];
        let out = extract(&pages, "doc", 2025, 1, 10, Layout::Combined).unwrap();
        assert_eq!(out.records.len(), 10);
        let sites: Vec<&str> = out.records.iter().map(|r| r.camp_site.as_str()).collect();
        let expected: Vec<String> = (1..=10).map(|i| format!("Site{}", i)).collect();
        assert_eq!(sites, expected);
        assert_eq!(out.skipped, 0);
    }

    #[test]
    fn cap_spans_pages() {
        let pages = vec!["Header line".to_string(), numbered_rows(3), numbered_rows(3)];
        let out = extract(&pages, "doc", 2025, 1, 5, Layout::Combined).unwrap();
        assert_eq!(out.records.len(), 5);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records[3].camp_site, "Site1");
    }

    #[test]
    fn zero_cap_yields_nothing() {
        let out = extract(&[numbered_rows(3)], "doc", 2025, 1, 0, Layout::Combined).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.skipped, 0);
    }

    #[test]
    fn bad_calendar_input_fails_run() {
        let err = extract(&[numbered_rows(1)], "doc", 2025, 13, 10, Layout::Combined).unwrap_err();
        assert_eq!(err, CalendarError::InvalidCalendarInput { year: 2025, month: 13 });
    }

    #[test]
    fn erode_combined_fixture() {
        let pages = fixture("erode_combined");
        let out = extract(&pages, "erode.pdf", 2025, 1, 100, Layout::Combined).unwrap();
        assert_eq!(out.records.len(), 6);
        assert_eq!(out.records[0].camp_day, "1st Monday (06-01-2025)");
        assert_eq!(out.records[0].session_time, FORENOON);
        assert_eq!(out.records[1].session_time, AFTERNOON);
        assert!(out.records.iter().any(|r| r.camp_day.ends_with("(Unknown)")));
        assert!(out.records.iter().all(|r| r.source_document == "erode.pdf"));
        // two titles, column header, page number, signature
        assert_eq!(out.skipped, 5);
    }

    #[test]
    fn palani_window_fixture_skips_bad_distance() {
        let pages = fixture("palani_window");
        let out = extract(&pages, "palani.pdf", 2025, 1, 100, Layout::Window).unwrap();
        // column header group and the N/A distance row
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.skipped, 2);
        assert_eq!(out.records[0].camp_day, "1st Wednesday (01-01-2025)");
        assert_eq!(out.records[0].distance_km, 7.0);
        assert_eq!(out.records[2].population, 1200);
    }

    #[test]
    fn title_line_does_not_shift_windows() {
        let page = "Palani Block Health Camps - January 2025\n\
                    1st Wednesday\nAN\nSub Centre\nThoppampatti\n7 km\n640\nVHN\n\
                    2nd Thursday\nFN\nPHC Palani\nPalani Town\n3.5\n980\nMO, SN";
        let out = extract(&[page], "palani.pdf", 2025, 1, 100, Layout::Window).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records[1].camp_site, "PHC Palani");
        assert_eq!(out.records[1].camp_day, "2nd Thursday (09-01-2025)");
    }

    #[test]
    fn window_missing_a_field_does_not_swallow_next_row() {
        let page = "1st Wednesday\nAN\nSub Centre\nThoppampatti\n7 km\n640\n\
                    2nd Thursday\nFN\nPHC Palani\nPalani Town\n3.5\n980\nMO, SN";
        let out = extract(&[page], "palani.pdf", 2025, 1, 100, Layout::Window).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records[0].staff, "MO, SN");
    }

    #[test]
    fn table_shared_across_threads() {
        let table = calendar::resolve(2025, 1).unwrap();
        let docs: Vec<Vec<String>> = (0..8).map(|i| vec![numbered_rows(i + 1)]).collect();
        let counts: Vec<usize> = docs
            .par_iter()
            .map(|pages| {
                ExtractionPipeline::new(&table, Layout::Combined, 100)
                    .extract(pages, "doc")
                    .records
                    .len()
            })
            .collect();
        assert_eq!(counts, (1..=8).collect::<Vec<_>>());
    }
}
