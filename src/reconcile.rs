//! Order book reconciliation engine
//!
//! Exchanges that publish delta frames may include more than one mutation for
//! the same price level within a single frame (an add immediately superseded
//! by a cancel, for example). Forwarding both would hand the consumer an
//! ambiguous duplicate level. This module collapses each side of a raw
//! incremental payload to at most one entry per price, so the consumer can
//! apply all entries of an update independently and in any order and reach
//! the same book state.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::model::Level2Point;

/// One raw price-level mutation as it appears on the wire, before
/// reconciliation. The timestamp is exchange-supplied and may repeat across
/// revisions of the same price within one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: Option<Decimal>,
}

impl RawPoint {
    pub fn new(price: Decimal, size: Decimal, timestamp: Option<Decimal>) -> Self {
        Self {
            price,
            size,
            timestamp,
        }
    }
}

/// Collapse one side of an incremental payload to at most one entry per
/// price.
///
/// Conflict rule: the revision with the highest embedded timestamp survives;
/// equal (or missing) timestamps resolve to the entry appearing last in the
/// payload. A surviving size of zero is kept unchanged, since it signals
/// deletion of the level.
///
/// Output order is the first-occurrence order of each price. It is stable
/// but carries no book-ranking meaning.
pub fn reconcile_side(entries: &[RawPoint]) -> Vec<Level2Point> {
    let mut survivors: Vec<RawPoint> = Vec::with_capacity(entries.len());
    let mut by_price: HashMap<Decimal, usize> = HashMap::with_capacity(entries.len());

    for entry in entries {
        match by_price.get(&entry.price) {
            Some(&idx) => {
                let current = &survivors[idx];
                let current_ts = current.timestamp.unwrap_or(Decimal::ZERO);
                let entry_ts = entry.timestamp.unwrap_or(Decimal::ZERO);
                // Later-in-payload wins timestamp ties.
                if entry_ts >= current_ts {
                    survivors[idx] = entry.clone();
                }
            }
            None => {
                by_price.insert(entry.price, survivors.len());
                survivors.push(entry.clone());
            }
        }
    }

    survivors
        .into_iter()
        .map(|raw| Level2Point::new(raw.price, raw.size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(price: Decimal, size: Decimal, ts: &str) -> RawPoint {
        RawPoint::new(price, size, Some(ts.parse().unwrap()))
    }

    #[test]
    fn test_pass_through_when_no_duplicates() {
        let entries = vec![
            raw(dec!(9000), dec!(1), "100"),
            raw(dec!(9001), dec!(2), "100"),
            raw(dec!(9002), dec!(3), "101"),
        ];
        let out = reconcile_side(&entries);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], Level2Point::new(dec!(9000), dec!(1)));
        assert_eq!(out[1], Level2Point::new(dec!(9001), dec!(2)));
        assert_eq!(out[2], Level2Point::new(dec!(9002), dec!(3)));
    }

    #[test]
    fn test_at_most_one_entry_per_price() {
        let entries = vec![
            raw(dec!(9000), dec!(1), "100"),
            raw(dec!(9001), dec!(5), "100"),
            raw(dec!(9000), dec!(2), "101"),
            raw(dec!(9000), dec!(3), "102"),
        ];
        let out = reconcile_side(&entries);
        assert_eq!(out.len(), 2);
        let at_9000: Vec<_> = out.iter().filter(|p| p.price == dec!(9000)).collect();
        assert_eq!(at_9000.len(), 1);
        assert_eq!(at_9000[0].size, dec!(3));
    }

    #[test]
    fn test_highest_timestamp_wins_regardless_of_payload_order() {
        let entries = vec![
            raw(dec!(9000), dec!(0), "102"),
            raw(dec!(9000), dec!(1), "100"),
        ];
        let out = reconcile_side(&entries);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].size, dec!(0));
    }

    #[test]
    fn test_equal_timestamps_resolve_to_last_in_payload() {
        let entries = vec![
            raw(dec!(9000), dec!(1), "100"),
            raw(dec!(9000), dec!(7), "100"),
        ];
        let out = reconcile_side(&entries);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].size, dec!(7));
    }

    #[test]
    fn test_zero_size_survivor_is_preserved() {
        // An add immediately superseded by a cancel within one frame: the
        // cancel is the final value and must pass through.
        let entries = vec![
            raw(dec!(9000), dec!(1), "100"),
            raw(dec!(9000), dec!(0), "101"),
        ];
        let out = reconcile_side(&entries);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].price, dec!(9000));
        assert_eq!(out[0].size, dec!(0));
    }

    #[test]
    fn test_missing_timestamps_fall_back_to_payload_order() {
        let entries = vec![
            RawPoint::new(dec!(9000), dec!(1), None),
            RawPoint::new(dec!(9000), dec!(4), None),
        ];
        let out = reconcile_side(&entries);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].size, dec!(4));
    }

    #[test]
    fn test_empty_side_yields_empty_output() {
        assert!(reconcile_side(&[]).is_empty());
    }

    #[test]
    fn test_output_keeps_first_occurrence_order() {
        let entries = vec![
            raw(dec!(9002), dec!(1), "100"),
            raw(dec!(9000), dec!(2), "100"),
            raw(dec!(9002), dec!(3), "101"),
            raw(dec!(9001), dec!(4), "100"),
        ];
        let out = reconcile_side(&entries);
        let prices: Vec<_> = out.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![dec!(9002), dec!(9000), dec!(9001)]);
    }
}
