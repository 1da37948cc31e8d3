//! Change detection over snapshot contents.
//!
//! The fingerprint is a SHA-256 digest over every reading field, walked in
//! source row order and column-name order. The capture time is excluded so that an
//! unchanged table scraped at a later minute is recognised as unchanged.
//! Reordered rows produce a different fingerprint; equality is byte/field
//! equality of the table, not semantic equality of the station set.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::Snapshot;

// ---

/// Content-equality digest of a snapshot. Not a security primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines.
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// Compute the fingerprint of a snapshot's readings.
pub fn fingerprint(snapshot: &Snapshot) -> Fingerprint {
    // ---
    let mut hasher = Sha256::new();
    for reading in &snapshot.readings {
        // Length-prefix every field so adjacent values cannot run together.
        update_field(&mut hasher, &reading.station);
        for (column, value) in &reading.values {
            update_field(&mut hasher, column);
            update_field(&mut hasher, value);
        }
        hasher.update([0xff]);
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

/// True when `candidate` should be promoted over the last accepted fingerprint.
pub fn has_changed(last_accepted: Option<&Fingerprint>, candidate: &Fingerprint) -> bool {
    last_accepted != Some(candidate)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Reading;
    use chrono::NaiveDate;

    fn create_test_snapshot(minute: u32, rows: Vec<Reading>) -> Snapshot {
        // ---
        let captured_at = NaiveDate::from_ymd_opt(2024, 7, 24)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap();
        Snapshot::new(rows, captured_at)
    }

    fn station(name: &str, level: &str) -> Reading {
        Reading::new(name)
            .with("current_wl", level)
            .with("alert_level", "15.00")
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        // ---
        let s = create_test_snapshot(0, vec![station("Sto Nino", "14.2"), station("Nangka", "18.9")]);
        assert_eq!(fingerprint(&s), fingerprint(&s));
        assert_eq!(fingerprint(&s), fingerprint(&s.clone()));
        assert_eq!(fingerprint(&s).as_str().len(), 64);
    }

    #[test]
    fn test_capture_time_is_excluded() {
        // ---
        let a = create_test_snapshot(0, vec![station("Sto Nino", "14.2")]);
        let b = create_test_snapshot(5, vec![station("Sto Nino", "14.2")]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_any_field_change_changes_fingerprint() {
        // ---
        let base = create_test_snapshot(0, vec![station("Sto Nino", "14.2")]);
        let value_changed = create_test_snapshot(0, vec![station("Sto Nino", "14.3")]);
        let station_changed = create_test_snapshot(0, vec![station("Sto. Nino", "14.2")]);
        let extra_column = create_test_snapshot(
            0,
            vec![station("Sto Nino", "14.2").with("wl_30min", "14.1")],
        );

        let fp = fingerprint(&base);
        assert_ne!(fp, fingerprint(&value_changed));
        assert_ne!(fp, fingerprint(&station_changed));
        assert_ne!(fp, fingerprint(&extra_column));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // ---
        let a = create_test_snapshot(0, vec![Reading::new("ab").with("c", "d")]);
        let b = create_test_snapshot(0, vec![Reading::new("a").with("bc", "d")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_row_order_is_significant() {
        // ---
        let a = create_test_snapshot(0, vec![station("Sto Nino", "14.2"), station("Nangka", "18.9")]);
        let b = create_test_snapshot(0, vec![station("Nangka", "18.9"), station("Sto Nino", "14.2")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_has_changed() {
        // ---
        let a = fingerprint(&create_test_snapshot(0, vec![station("Sto Nino", "14.2")]));
        let b = fingerprint(&create_test_snapshot(0, vec![station("Sto Nino", "14.4")]));

        assert!(has_changed(None, &a));
        assert!(!has_changed(Some(&a), &a));
        assert!(has_changed(Some(&a), &b));
    }
}
