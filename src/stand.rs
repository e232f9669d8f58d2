use std::cmp::Ordering;

use crate::types::{ OccupancyResult, Stand };

/// Sort key of a stand name: numeric prefix, alphabetic suffix, remainder
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct StandKey {
    /// Names without leading digits sort after every numbered stand
    unnumbered: bool,

    /// Saturates at `u64::MAX` for very long digit runs
    number: u64,
    suffix: String,
    rest: String,
}

impl StandKey {
    fn parse(name: &str) -> Self {
        let digits_end = name.find(|c: char| !c.is_ascii_digit()).unwrap_or(name.len());
        let (digits, tail) = name.split_at(digits_end);

        let number = if digits.is_empty() {
            u64::MAX
        } else {
            digits.bytes().fold(0u64, |acc, d| {
                acc.saturating_mul(10).saturating_add(u64::from(d - b'0'))
            })
        };

        let suffix_end = tail.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(tail.len());
        let (suffix, rest) = tail.split_at(suffix_end);

        Self {
            unnumbered: digits.is_empty(),
            number,
            suffix: suffix.to_ascii_uppercase(),
            rest: rest.to_uppercase(),
        }
    }
}

/// Total order over stand names: "2" < "2A" < "2B" < "10" < "GATE".
///
/// Names compare by leading number (names without one sort last), then by the letters right
/// after the number, then by the remainder, all case-insensitively. The raw string breaks ties so
/// that "2a" and "2A" still have a stable order.
pub fn compare_stand_names(a: &str, b: &str) -> Ordering {
    StandKey::parse(a)
        .cmp(&StandKey::parse(b))
        .then_with(|| a.cmp(b))
}

/// Sort stands for menu display
pub fn sort_stands(stands: &mut [Stand]) {
    stands.sort_by(|a, b| compare_stand_names(&a.name, &b.name));
}

/// Stands of the inventory that are neither assigned, occupied nor blocked, in display order
pub fn available_stands(icao: &str, inventory: &[String], occupancy: &OccupancyResult) -> Vec<Stand> {
    let mut stands: Vec<Stand> = inventory
        .iter()
        .map(|name| Stand {
            name: name.clone(),
            icao: icao.to_string(),
            occupied: occupancy.is_unavailable(name),
        })
        .filter(|stand| !stand.occupied)
        .collect();

    sort_stands(&mut stands);
    stands
}
