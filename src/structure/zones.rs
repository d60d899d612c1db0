//! Liquidity zones: price levels built from swing points and tracked for
//! future reactions.

use serde::{Deserialize, Serialize};

pub const MAX_ZONE_STRENGTH: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Support,
    Resistance,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Support => "support",
            ZoneKind::Resistance => "resistance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityZone {
    pub instrument: String,
    pub price: f64,
    pub kind: ZoneKind,
    /// Clamped to [0, 10]
    pub strength: f64,
    pub created_at: i64,
    pub last_test_at: i64,
    pub test_count: u32,
    pub swept: bool,
    pub swept_at: Option<i64>,
}

impl LiquidityZone {
    fn new(instrument: &str, price: f64, kind: ZoneKind, strength: f64, now: i64) -> Self {
        Self {
            instrument: instrument.to_string(),
            price,
            kind,
            strength: strength.clamp(0.0, MAX_ZONE_STRENGTH),
            created_at: now,
            last_test_at: now,
            test_count: 1,
            swept: false,
            swept_at: None,
        }
    }

    /// Mark the zone swept. Returns false if it already was: the flag is
    /// monotonic and a zone sweeps at most once.
    pub fn mark_swept(&mut self, now: i64) -> bool {
        if self.swept {
            return false;
        }
        self.swept = true;
        self.swept_at = Some(now);
        true
    }
}

/// Per-instrument zone collection with merge, cap and staleness rules.
#[derive(Debug, Clone)]
pub struct ZoneBook {
    zones: Vec<LiquidityZone>,
    cap: usize,
    /// Absolute price tolerance for same-kind merging
    tolerance: f64,
}

impl ZoneBook {
    pub fn new(cap: usize, tolerance: f64) -> Self {
        Self {
            zones: Vec::new(),
            cap,
            tolerance,
        }
    }

    pub fn zones(&self) -> &[LiquidityZone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Record a confirmed swing point. A same-kind zone within tolerance is
    /// re-tested (strength/test_count bumped) instead of duplicated;
    /// otherwise a new zone is created and the book trimmed to its cap,
    /// weakest first.
    pub fn record_swing(
        &mut self,
        instrument: &str,
        price: f64,
        kind: ZoneKind,
        strength: f64,
        now: i64,
    ) {
        if let Some(existing) = self
            .zones
            .iter_mut()
            .find(|z| z.kind == kind && (z.price - price).abs() <= self.tolerance)
        {
            existing.test_count += 1;
            existing.last_test_at = now;
            existing.strength = (existing.strength + 1.0).min(MAX_ZONE_STRENGTH);
            return;
        }

        self.zones
            .push(LiquidityZone::new(instrument, price, kind, strength, now));

        while self.zones.len() > self.cap {
            let weakest = self
                .zones
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.strength.partial_cmp(&b.1.strength).unwrap())
                .map(|(i, _)| i)
                .unwrap();
            self.zones.remove(weakest);
        }
    }

    /// Mutable access to un-swept zones of one kind, for sweep checks.
    pub fn unswept_mut(&mut self, kind: ZoneKind) -> impl Iterator<Item = &mut LiquidityZone> {
        self.zones
            .iter_mut()
            .filter(move |z| z.kind == kind && !z.swept)
    }

    /// Strongest un-swept zone within `band` of `price`, if any.
    pub fn strongest_unswept_near(&self, price: f64, band: f64) -> Option<&LiquidityZone> {
        self.zones
            .iter()
            .filter(|z| !z.swept && (z.price - price).abs() <= band)
            .max_by(|a, b| a.strength.partial_cmp(&b.strength).unwrap())
    }

    /// Drop zones untested for longer than `stale_secs`. Returns the number
    /// removed.
    pub fn prune_stale(&mut self, now: i64, stale_secs: i64) -> usize {
        let before = self.zones.len();
        self.zones.retain(|z| now - z.last_test_at <= stale_secs);
        before - self.zones.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ZoneBook {
        ZoneBook::new(3, 0.0015)
    }

    #[test]
    fn test_new_swing_creates_zone() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 6.0, 1000);

        assert_eq!(book.len(), 1);
        let zone = &book.zones()[0];
        assert_eq!(zone.price, 1.1040);
        assert_eq!(zone.kind, ZoneKind::Resistance);
        assert_eq!(zone.strength, 6.0);
        assert_eq!(zone.test_count, 1);
        assert!(!zone.swept);
    }

    #[test]
    fn test_retest_merges_instead_of_duplicating() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 6.0, 1000);
        book.record_swing("EURUSD", 1.1048, ZoneKind::Resistance, 4.0, 2000);

        assert_eq!(book.len(), 1);
        let zone = &book.zones()[0];
        assert_eq!(zone.test_count, 2);
        assert_eq!(zone.last_test_at, 2000);
        assert_eq!(zone.strength, 7.0);
    }

    #[test]
    fn test_opposite_kind_does_not_merge() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 6.0, 1000);
        book.record_swing("EURUSD", 1.1042, ZoneKind::Support, 3.0, 2000);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_strength_capped_on_retest() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 9.5, 1000);
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 1.0, 2000);
        assert_eq!(book.zones()[0].strength, MAX_ZONE_STRENGTH);
    }

    #[test]
    fn test_cap_prunes_weakest_first() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1000, ZoneKind::Support, 2.0, 1000);
        book.record_swing("EURUSD", 1.1100, ZoneKind::Support, 8.0, 1000);
        book.record_swing("EURUSD", 1.1200, ZoneKind::Support, 5.0, 1000);
        book.record_swing("EURUSD", 1.1300, ZoneKind::Support, 6.0, 1000);

        assert_eq!(book.len(), 3);
        assert!(book.zones().iter().all(|z| z.strength > 2.0));
    }

    #[test]
    fn test_swept_flag_monotonic() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 6.0, 1000);

        let zone = &mut book.zones[0];
        assert!(zone.mark_swept(2000));
        assert_eq!(zone.swept_at, Some(2000));

        // A second sweep of the same zone never fires
        assert!(!zone.mark_swept(3000));
        assert_eq!(zone.swept_at, Some(2000));
        assert!(zone.swept);
    }

    #[test]
    fn test_strongest_unswept_near_ignores_swept() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1040, ZoneKind::Resistance, 8.0, 1000);
        book.record_swing("EURUSD", 1.1060, ZoneKind::Resistance, 4.0, 1000);
        book.zones[0].mark_swept(2000);

        let nearest = book.strongest_unswept_near(1.1050, 0.0030).unwrap();
        assert_eq!(nearest.price, 1.1060);
    }

    #[test]
    fn test_prune_stale() {
        let mut book = book();
        book.record_swing("EURUSD", 1.1000, ZoneKind::Support, 5.0, 1000);
        book.record_swing("EURUSD", 1.1100, ZoneKind::Support, 5.0, 90_000);

        let removed = book.prune_stale(50_000, 86_400);
        assert_eq!(removed, 0);

        let removed = book.prune_stale(88_000, 86_400);
        assert_eq!(removed, 1);
        assert_eq!(book.zones()[0].price, 1.1100);
    }
}
