use std::str::FromStr;
use std::sync::OnceLock;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::errors::{malformed, Result, TleError};
use crate::julian::{julian_date_at_midnight, unix_millis_from_julian_date, unix_seconds_from_julian_date};
use crate::propagator::PropagatorCache;

// ---------- Constants ----------
const MIN_LINE_LEN: usize = 68;     // element set number (line 1) and revolution number (line 2) end here
const CHECKSUM_COL: usize = 68;

/// NORAD century pivot: two-digit years from 57 on are 19xx (Sputnik launched in 1957)
pub const CENTURY_PIVOT: u32 = 57;

// ---------- Element set ----------

/// The decoded contents of a two- or three-line element set.
///
/// All fields are fixed once parsed. The only interior state is the lazily initialized
/// SGP4 propagator, which is built on the first propagation request and reused after that
/// (see [`OrbitalElementSet::propagate`]).
#[derive(Debug, Serialize)]
pub struct OrbitalElementSet {
    name: Option<String>,
    catalog_number: u32,
    classification: char,
    designator_year: u32,
    designator_launch_number: u32,
    designator_piece: String,
    international_designator: String,
    epoch_julian_date: f64,
    mean_motion_first_derivative: f64,   // rev/day²
    mean_motion_second_derivative: f64,  // rev/day³
    bstar_drag_term: f64,                // 1/earth radii
    ephemeris_type: u8,
    element_set_number: u32,
    inclination_deg: f64,
    raan_deg: f64,
    eccentricity: f64,
    arg_perigee_deg: f64,
    mean_anomaly_deg: f64,
    mean_motion_rev_per_day: f64,
    revolution_number: u32,

    #[serde(skip)]
    lines: [String; 2],

    #[serde(skip)]
    pub(crate) propagator: OnceLock<PropagatorCache>,
}

impl OrbitalElementSet {
    /// Parse either two element lines (`third == None`) or a title line followed by the two
    /// element lines. A leading `"0 "` on the title line is not part of the name.
    pub fn parse(first: &str, second: &str, third: Option<&str>) -> Result<Self> {
        match third {
            None => Self::from_element_lines(None, first, second),
            Some(line2) => Self::from_element_lines(Some(title_name(first)), second, line2),
        }
    }

    pub fn from_lines(lines: &[&str]) -> Result<Self> {
        match *lines {
            [line1, line2] => Self::parse(line1, line2, None),
            [line0, line1, line2] => Self::parse(line0, line1, Some(line2)),
            _ => Err(malformed!("expected 2 or 3 lines, got {}", lines.len())),
        }
    }

    fn from_element_lines(name: Option<String>, line1: &str, line2: &str) -> Result<Self> {
        let line1 = strip_line_end(line1);
        let line2 = strip_line_end(line2);
        check_card(line1, '1')?;
        check_card(line2, '2')?;

        // line 1
        let catalog_number = integer(column(line1, 2, 7)?, "catalog number");
        let classification = column(line1, 7, 8)?.chars().next().unwrap_or(' ');
        let designator_year = integer(column(line1, 9, 11)?, "designator year");
        let designator_launch_number = integer(column(line1, 11, 14)?, "designator launch number");
        let designator_piece = column(line1, 14, 17)?.trim().to_string();
        let international_designator = column(line1, 9, 17)?.trim().to_string();

        let epoch_year = full_year(integer(column(line1, 18, 20)?, "epoch year"));
        let epoch_day = decimal(column(line1, 20, 32)?, "epoch day of year");
        let epoch_julian_date = julian_date_at_midnight(epoch_year, 1, 1) + (epoch_day - 1.0);

        let mut mean_motion_first_derivative = decimal(&format!("0{}", column(line1, 34, 43)?.trim()), "mean motion first derivative");
        if column(line1, 33, 34)? == "-" {
            mean_motion_first_derivative = -mean_motion_first_derivative;
        }
        let mean_motion_second_derivative = implied_exponent(column(line1, 44, 53)?, "mean motion second derivative");
        let bstar_drag_term = implied_exponent(column(line1, 53, 62)?, "B* drag term");
        let ephemeris_type = integer(column(line1, 62, 63)?, "ephemeris type");
        let element_set_number = integer(column(line1, 64, 68)?, "element set number");

        // line 2
        let inclination_deg = decimal(column(line2, 8, 16)?, "inclination");
        let raan_deg = decimal(column(line2, 17, 25)?, "right ascension of ascending node");
        let eccentricity = implied_fraction(column(line2, 26, 33)?, "eccentricity");
        let arg_perigee_deg = decimal(column(line2, 34, 42)?, "argument of perigee");
        let mean_anomaly_deg = decimal(column(line2, 43, 51)?, "mean anomaly");
        let mean_motion_rev_per_day = decimal(column(line2, 52, 63)?, "mean motion");
        let revolution_number = integer(column(line2, 63, 68)?, "revolution number");

        let elements = OrbitalElementSet {
            name,
            catalog_number,
            classification,
            designator_year,
            designator_launch_number,
            designator_piece,
            international_designator,
            epoch_julian_date,
            mean_motion_first_derivative,
            mean_motion_second_derivative,
            bstar_drag_term,
            ephemeris_type,
            element_set_number,
            inclination_deg,
            raan_deg,
            eccentricity,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_per_day,
            revolution_number,
            lines: [line1.to_string(), line2.to_string()],
            propagator: OnceLock::new(),
        };

        if !elements.checksums_valid() {
            warn!("[parse] checksum mismatch for catalog number {}", catalog_number);
        }
        debug!("[parse] {} ({}) epoch JD {:.8}", elements.display_name(), catalog_number, epoch_julian_date);

        Ok(elements)
    }

    // ---------- Accessors ----------

    pub fn name(&self) -> Option<&str> { self.name.as_deref() }

    /// name if we have one, otherwise the catalog number
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.catalog_number),
        }
    }

    pub fn catalog_number(&self) -> u32 { self.catalog_number }
    pub fn classification(&self) -> char { self.classification }
    pub fn designator_year(&self) -> u32 { self.designator_year }
    pub fn designator_launch_number(&self) -> u32 { self.designator_launch_number }
    pub fn designator_piece(&self) -> &str { &self.designator_piece }
    pub fn international_designator(&self) -> &str { &self.international_designator }

    /// four digit launch year, None if the record has no international designator
    pub fn launch_year(&self) -> Option<i32> {
        if self.international_designator.is_empty() {
            None
        } else {
            Some(full_year(self.designator_year))
        }
    }

    pub fn epoch_julian_date(&self) -> f64 { self.epoch_julian_date }
    pub fn epoch_unix_seconds(&self) -> f64 { unix_seconds_from_julian_date(self.epoch_julian_date) }
    pub fn epoch_unix_millis(&self) -> i64 { unix_millis_from_julian_date(self.epoch_julian_date) }

    pub fn epoch_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.epoch_unix_millis())
    }

    pub fn mean_motion_first_derivative(&self) -> f64 { self.mean_motion_first_derivative }
    pub fn mean_motion_second_derivative(&self) -> f64 { self.mean_motion_second_derivative }
    pub fn bstar_drag_term(&self) -> f64 { self.bstar_drag_term }
    pub fn ephemeris_type(&self) -> u8 { self.ephemeris_type }
    pub fn element_set_number(&self) -> u32 { self.element_set_number }

    pub fn inclination_deg(&self) -> f64 { self.inclination_deg }
    pub fn raan_deg(&self) -> f64 { self.raan_deg }
    pub fn eccentricity(&self) -> f64 { self.eccentricity }
    pub fn arg_perigee_deg(&self) -> f64 { self.arg_perigee_deg }
    pub fn mean_anomaly_deg(&self) -> f64 { self.mean_anomaly_deg }
    pub fn mean_motion_rev_per_day(&self) -> f64 { self.mean_motion_rev_per_day }
    pub fn revolution_number(&self) -> u32 { self.revolution_number }

    /// the element lines as they were parsed (without line terminators)
    pub fn lines(&self) -> [&str; 2] { [&self.lines[0], &self.lines[1]] }

    /// true unless one of the lines carries a checksum digit that does not match its contents
    pub fn checksums_valid(&self) -> bool {
        self.lines.iter().all(|line| stated_checksum(line).map_or(true, |c| c == checksum(line)))
    }
}

/// a text block with 2 or 3 non-blank lines
impl FromStr for OrbitalElementSet {
    type Err = TleError;

    fn from_str(s: &str) -> Result<Self> {
        let lines: Vec<&str> = s.lines().filter(|l| !l.trim().is_empty()).collect();
        OrbitalElementSet::from_lines(&lines)
    }
}

// ---------- Catalogs ----------

/// Parse a text that holds any number of element sets, each optionally preceded by a title
/// line. Blank lines and lines starting with `#` are skipped.
pub fn parse_catalog(text: &str) -> Result<Vec<OrbitalElementSet>> {
    let mut sets = Vec::new();
    let mut title: Option<&str> = None;
    let mut line1: Option<&str> = None;

    for (i, line) in text.lines().enumerate() {
        let line = strip_line_end(line);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        match line1 {
            Some(l1) => {
                if !line.starts_with("2 ") {
                    return Err(malformed!("line {} should be element line 2: '{}'", i + 1, line));
                }
                let name = title.take().map(title_name);
                sets.push(OrbitalElementSet::from_element_lines(name, l1, line)?);
                line1 = None;
            }
            None if line.starts_with("1 ") => line1 = Some(line),
            None => {
                if let Some(unused) = title.replace(line) {
                    warn!("[parse_catalog] title line '{}' has no element lines", unused);
                }
            }
        }
    }

    if line1.is_some() {
        return Err(malformed!("catalog ends without element line 2"));
    }
    debug!("[parse_catalog] parsed {} element sets", sets.len());
    Ok(sets)
}

// ---------- Field decoding ----------

pub fn full_year(two_digit_year: u32) -> i32 {
    if two_digit_year < CENTURY_PIVOT {
        2000 + two_digit_year as i32
    } else {
        1900 + two_digit_year as i32
    }
}

/// Decode `<sign><5 digits><exponent sign><exponent digit>` as `±0.ddddd × 10^exp`.
/// An unreadable mantissa decodes to 0, an unreadable exponent counts as 0.
pub(crate) fn implied_exponent(field: &str, what: &str) -> f64 {
    let negative = field.starts_with('-');
    let mantissa = field.get(1..6).unwrap_or("");
    let exponent = field.get(6..).unwrap_or("").trim();

    if mantissa.trim().is_empty() {
        return 0.0;
    }
    let mantissa = decimal(&format!("0.{mantissa}"), what);
    let exponent: i32 = integer(exponent, what);

    let value = mantissa * 10f64.powi(exponent);
    if negative { -value } else { value }
}

/// eccentricity style field with an implied leading "0."; leading blanks are zero digits
fn implied_fraction(field: &str, what: &str) -> f64 {
    let digits = field.trim_end();
    if digits.trim_start().is_empty() {
        return 0.0;
    }
    let digits: String = digits.chars().map(|c| if c == ' ' { '0' } else { c }).collect();
    decimal(&format!("0.{digits}"), what)
}

/// permissive float parse: blank is 0, anything unparsable or non-finite is 0 with a warning
fn decimal(field: &str, what: &str) -> f64 {
    let text = field.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            warn!("[parse] {} field '{}' is not a number, using 0", what, text);
            0.0
        }
    }
}

/// permissive integer parse, same policy as [`decimal`]
fn integer<T: FromStr + Default>(field: &str, what: &str) -> T {
    let text = field.trim();
    if text.is_empty() {
        return T::default();
    }
    text.parse::<T>().unwrap_or_else(|_| {
        warn!("[parse] {} field '{}' is not an integer, using 0", what, text);
        T::default()
    })
}

// ---------- Line structure ----------

fn strip_line_end(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

fn title_name(line0: &str) -> String {
    let line0 = strip_line_end(line0);
    line0.strip_prefix("0 ").unwrap_or(line0).to_string()
}

fn check_card(line: &str, card: char) -> Result<()> {
    if line.len() < MIN_LINE_LEN {
        return Err(malformed!("line {} has {} characters, needs at least {}: '{}'", card, line.len(), MIN_LINE_LEN, line));
    }
    if !line.starts_with(card) {
        return Err(malformed!("line {} does not start with '{}': '{}'", card, card, line));
    }
    Ok(())
}

fn column(line: &str, start: usize, end: usize) -> Result<&str> {
    line.get(start..end)
        .ok_or_else(|| malformed!("columns [{},{}) not readable in '{}'", start, end, line))
}

/// modulo 10 card checksum: digits count their value, '-' counts 1
pub(crate) fn checksum(line: &str) -> u32 {
    line.chars().take(CHECKSUM_COL).map(|c| match c {
        '-' => 1,
        _ => c.to_digit(10).unwrap_or(0),
    }).sum::<u32>() % 10
}

fn stated_checksum(line: &str) -> Option<u32> {
    line.chars().nth(CHECKSUM_COL)?.to_digit(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const LINE1: &str = "1 25544U 98067A   21267.21567994  .00001839  00000-0  42318-4 0  9994";
    const LINE2: &str = "2 25544  51.6435 213.0833 0003460  47.4035  50.6925 15.48430119303944";

    fn close(a: f64, b: f64, tol: f64) -> bool { (a - b).abs() <= tol }

    #[rstest]
    #[case(0, 2000)]
    #[case(21, 2021)]
    #[case(56, 2056)]
    #[case(57, 1957)]
    #[case(98, 1998)]
    #[case(99, 1999)]
    fn century_pivot(#[case] two_digit: u32, #[case] year: i32) {
        assert_eq!(full_year(two_digit), year);
    }

    #[rstest]
    #[case(" 42318-4", 0.42318e-4)]
    #[case("-42318-4", -0.42318e-4)]
    #[case(" 00000-0", 0.0)]
    #[case(" 12345+1", 1.2345)]
    #[case("+20935-3", 0.20935e-3)]
    #[case(" 11606-4 ", 0.11606e-4)]
    #[case("        ", 0.0)]
    #[case(" 1x345-4", 0.0)]
    fn decimal_exponent_fields(#[case] field: &str, #[case] expected: f64) {
        let v = implied_exponent(field, "test");
        assert!(close(v, expected, 1e-12 * expected.abs()), "{field:?} decoded to {v}, expected {expected}");
    }

    #[test]
    fn unreadable_exponent_counts_as_zero() {
        assert!(close(implied_exponent(" 50000-x", "test"), 0.5, 1e-15));
    }

    #[test]
    fn permissive_numbers() {
        assert_eq!(decimal(" 51.6435", "test"), 51.6435);
        assert_eq!(decimal("        ", "test"), 0.0);
        assert_eq!(decimal("51.6a35", "test"), 0.0);
        assert_eq!(decimal("  NaN ", "test"), 0.0);
        assert_eq!(integer::<u32>("25544", "test"), 25544);
        assert_eq!(integer::<u32>("2554X", "test"), 0);
        assert_eq!(integer::<u8>("   ", "test"), 0);
        assert_eq!(implied_fraction("0003460", "test"), 0.000346);
        assert_eq!(implied_fraction("   3460", "test"), 0.000346);
        assert_eq!(implied_fraction("6877146", "test"), 0.6877146);
        assert_eq!(implied_fraction("       ", "test"), 0.0);
        assert_eq!(implied_fraction("00x3460", "test"), 0.0);
    }

    #[test]
    fn card_checksums() {
        assert_eq!(checksum(LINE1), 4);
        assert_eq!(checksum(LINE2), 4);
        assert_eq!(stated_checksum(LINE1), Some(4));
        assert_eq!(stated_checksum(&LINE1[..68]), None);
        assert_eq!(checksum("1 -"), 2);
    }

    #[test]
    fn title_lines() {
        assert_eq!(title_name("0 ISS(ZARYA)"), "ISS(ZARYA)");
        assert_eq!(title_name("ISS (ZARYA)            "), "ISS (ZARYA)            ");
        assert_eq!(title_name("0 NOAA 21\r"), "NOAA 21");
        assert_eq!(title_name("0 NOAA 21  \r\n"), "NOAA 21  ");
    }

    #[test]
    fn column_bounds() {
        assert_eq!(column(LINE1, 2, 7).unwrap(), "25544");
        assert!(matches!(column("1 255", 2, 7), Err(TleError::MalformedRecord(_))));
        // multi-byte characters never get sliced
        assert!(matches!(column("1 2°544", 2, 4), Err(TleError::MalformedRecord(_))));
    }

    #[test]
    fn space_padded_eccentricity() {
        let line2 = LINE2.replacen("0003460", "   3460", 1);
        let elements = OrbitalElementSet::parse(LINE1, &line2, None).unwrap();
        assert!(close(elements.eccentricity(), 0.000346, 1e-15), "got {}", elements.eccentricity());
    }

    #[test]
    fn negative_first_derivative() {
        let line1 = LINE1.replacen(" .00001839", "-.00001839", 1);
        let elements = OrbitalElementSet::parse(&line1, LINE2, None).unwrap();
        assert_eq!(elements.mean_motion_first_derivative(), -0.00001839);
        assert!(!elements.checksums_valid());
    }
}
