//! Market-structure detection: swing points, liquidity zones, sweeps.

pub mod sweeps;
pub mod swings;
pub mod zones;

pub use sweeps::{MarketSweep, SweepKind, SweepParams};
pub use swings::{SwingKind, SwingPoint};
pub use zones::{LiquidityZone, ZoneBook, ZoneKind};
