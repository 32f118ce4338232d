//! Fixed age-in-months bands for the age-distribution report.
//!
//! Flat list: two infant bands, one band per year 1..=59, then "60 and above"
//! (62 bands). Five 12-band tables cover the first 60 bands; the last two
//! bands appear only in the flat list and the grand total.

use serde::Serialize;

pub const BAND_COUNT: usize = 62;
pub const TABLE_SIZE: usize = 12;

/// (title, index of first band)
const TABLES: &[(&str, usize)] = &[
    ("Ages 0-10", 0),
    ("Ages 11-22", 12),
    ("Ages 23-34", 24),
    ("Ages 35-46", 36),
    ("Ages 47-58", 48),
];

pub fn band_label(index: usize) -> String {
    match index {
        0 => "0-5 months".to_string(),
        1 => "6-11 months".to_string(),
        2 => "1 year".to_string(),
        i if i < BAND_COUNT - 1 => format!("{} years", i - 1),
        _ => "60 and above".to_string(),
    }
}

/// Band index for an age in completed months; `None` for a future birth date.
pub fn band_index(age_months: i64) -> Option<usize> {
    match age_months {
        m if m < 0 => None,
        0..=5 => Some(0),
        6..=11 => Some(1),
        m if m >= 720 => Some(BAND_COUNT - 1),
        m => Some((m / 12) as usize + 1),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BandRow {
    pub age_band: String,
    pub male: i64,
    pub female: i64,
    pub total: i64,
}

impl BandRow {
    fn labelled(age_band: String) -> Self {
        Self { age_band, ..Default::default() }
    }

    fn add(&mut self, other: &BandRow) {
        self.male += other.male;
        self.female += other.female;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BandTable {
    pub title: &'static str,
    pub rows: Vec<BandRow>,
    pub subtotal: BandRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgeDistribution {
    /// Every band in order, with the grand total appended last.
    pub rows: Vec<BandRow>,
    pub tables: Vec<BandTable>,
    pub grand_total: BandRow,
}

/// Bucket `(age_in_months, gender)` samples.
pub fn distribute<'a>(samples: impl IntoIterator<Item = (i64, &'a str)>) -> AgeDistribution {
    let mut bands: Vec<BandRow> = (0..BAND_COUNT).map(|i| BandRow::labelled(band_label(i))).collect();

    for (months, gender) in samples {
        let Some(index) = band_index(months) else { continue };
        let row = &mut bands[index];
        if gender.eq_ignore_ascii_case("male") {
            row.male += 1;
        } else if gender.eq_ignore_ascii_case("female") {
            row.female += 1;
        }
        row.total += 1;
    }

    let tables = TABLES
        .iter()
        .map(|(title, start)| {
            let rows = bands[*start..*start + TABLE_SIZE].to_vec();
            let mut subtotal = BandRow::labelled(format!("Subtotal {}", title));
            rows.iter().for_each(|r| subtotal.add(r));
            BandTable { title, rows, subtotal }
        })
        .collect();

    let mut grand_total = BandRow::labelled("TOTAL".to_string());
    bands.iter().for_each(|r| grand_total.add(r));

    let mut rows = bands;
    rows.push(grand_total.clone());

    AgeDistribution { rows, tables, grand_total }
}
