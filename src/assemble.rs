use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{CampDate, WeekdayOccurrenceTable};
use crate::parser::occurrence;
use crate::parser::RawLineMatch;

pub const FORENOON: &str = "9:00 AM - 12:00 PM";
pub const AFTERNOON: &str = "1:00 PM - 9:00 PM";

/// One finished camp schedule row, in the shape handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(rename = "Camp_Day")]
    pub camp_day: String,
    #[serde(rename = "Session_Time")]
    pub session_time: String,
    #[serde(rename = "Camp_Site")]
    pub camp_site: String,
    #[serde(rename = "Name_of_Villages")]
    pub villages: String,
    #[serde(rename = "Distance_to_be_covered")]
    pub distance_km: f64,
    #[serde(rename = "Population_to_be_covered")]
    pub population: u32,
    #[serde(rename = "Area_staff_involved")]
    pub staff: String,
    #[serde(rename = "Source_PDF")]
    pub source_document: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("cannot coerce {field} from {value:?}")]
    FieldCoercion { field: &'static str, value: String },
}

pub fn assemble(
    m: &RawLineMatch,
    table: &WeekdayOccurrenceTable,
    source_document: &str,
) -> Result<ScheduleRecord, AssemblyError> {
    let distance_km = parse_distance(&m.distance).ok_or_else(|| AssemblyError::FieldCoercion {
        field: "distance",
        value: m.distance.clone(),
    })?;
    let population = parse_population(&m.population).ok_or_else(|| {
        AssemblyError::FieldCoercion {
            field: "population",
            value: m.population.clone(),
        }
    })?;

    let date = occurrence::decompose(&m.occurrence)
        .map(|o| table.nth(o.weekday, o.ordinal))
        .unwrap_or(CampDate::Unknown);

    Ok(ScheduleRecord {
        camp_day: format!("{} ({})", m.occurrence, date),
        session_time: session_time(&m.session).to_string(),
        camp_site: m.site.clone(),
        villages: m.village.clone(),
        distance_km,
        population,
        staff: m.staff.clone(),
        source_document: source_document.to_string(),
    })
}

/// FN is the forenoon slot; every other code is the afternoon one.
pub fn session_time(code: &str) -> &'static str {
    if code.trim().eq_ignore_ascii_case("FN") {
        FORENOON
    } else {
        AFTERNOON
    }
}

/// "5.0", "12 km", "3.5km" -> kilometres. Negative or non-finite is rejected.
fn parse_distance(raw: &str) -> Option<f64> {
    let num = raw
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '.' || c.is_whitespace());
    let km: f64 = num.parse().ok()?;
    (km.is_finite() && km >= 0.0).then_some(km)
}

fn parse_population(raw: &str) -> Option<u32> {
    raw.trim().replace(',', "").parse().ok()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::resolve;

    fn raw(occurrence: &str, session: &str, distance: &str, population: &str) -> RawLineMatch {
        RawLineMatch {
            occurrence: occurrence.into(),
            session: session.into(),
            site: "CampSiteA".into(),
            village: "VillageX".into(),
            distance: distance.into(),
            population: population.into(),
            staff: "StaffTeam1".into(),
        }
    }

    #[test]
    fn resolves_camp_day() {
        let table = resolve(2025, 1).unwrap();
        let r = assemble(&raw("2nd Monday", "FN", "5.0", "200"), &table, "erode.pdf").unwrap();
        assert_eq!(r.camp_day, "2nd Monday (13-01-2025)");
        assert_eq!(r.session_time, FORENOON);
        assert_eq!(r.camp_site, "CampSiteA");
        assert_eq!(r.villages, "VillageX");
        assert_eq!(r.distance_km, 5.0);
        assert_eq!(r.population, 200);
        assert_eq!(r.staff, "StaffTeam1");
        assert_eq!(r.source_document, "erode.pdf");
    }

    #[test]
    fn afternoon_session() {
        let table = resolve(2025, 1).unwrap();
        let r = assemble(&raw("1st Friday", "AN", "2", "10"), &table, "x").unwrap();
        assert_eq!(r.session_time, AFTERNOON);
        assert_eq!(session_time("XY"), AFTERNOON);
        assert_eq!(session_time("fn"), FORENOON);
    }

    #[test]
    fn unresolved_day_keeps_record() {
        let table = resolve(2025, 1).unwrap();
        let r = assemble(&raw("5th Monday", "FN", "1", "1"), &table, "x").unwrap();
        assert_eq!(r.camp_day, "5th Monday (Unknown)");
        let r = assemble(&raw("2nd Block", "FN", "1", "1"), &table, "x").unwrap();
        assert_eq!(r.camp_day, "2nd Block (Unknown)");
    }

    #[test]
    fn non_numeric_distance() {
        let table = resolve(2025, 1).unwrap();
        let err = assemble(&raw("2nd Monday", "FN", "N/A", "200"), &table, "x").unwrap_err();
        assert_eq!(
            err,
            AssemblyError::FieldCoercion { field: "distance", value: "N/A".into() }
        );
    }

    #[test]
    fn non_numeric_population() {
        let table = resolve(2025, 1).unwrap();
        let err = assemble(&raw("2nd Monday", "FN", "5", "approx"), &table, "x").unwrap_err();
        assert!(matches!(err, AssemblyError::FieldCoercion { field: "population", .. }));
        assert!(assemble(&raw("2nd Monday", "FN", "5", "-4"), &table, "x").is_err());
    }

    #[test]
    fn distance_units_and_commas() {
        assert_eq!(parse_distance("12 km"), Some(12.0));
        assert_eq!(parse_distance("3.5km"), Some(3.5));
        assert_eq!(parse_distance("4 K.M."), Some(4.0));
        assert_eq!(parse_distance("-1"), None);
        assert_eq!(parse_distance("NaN"), None);
        assert_eq!(parse_population("1,450"), Some(1450));
    }

    #[test]
    fn serializes_published_field_names() {
        let table = resolve(2025, 1).unwrap();
        let r = assemble(&raw("2nd Monday", "FN", "5.0", "200"), &table, "u").unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["Camp_Day"], "2nd Monday (13-01-2025)");
        assert_eq!(json["Population_to_be_covered"], 200);
        assert_eq!(json["Source_PDF"], "u");
    }
}
