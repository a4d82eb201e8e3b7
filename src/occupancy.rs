//! occupancy.rs
//! Vacancy figures per zone. There is no live feed yet: `RandomOccupancy`
//! synthesises plausible numbers and a telemetry-backed source can replace
//! it behind `OccupancySource` without touching the marker pipeline.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::types::ParkingZoneInfo;

pub trait OccupancySource: Send {
    fn zone_info(&mut self, zone: &str) -> ParkingZoneInfo;
}

/// Uniform totals in `[50, 250)`, vacancies in `[0, total)`.
pub struct RandomOccupancy {
    rng: StdRng,
}

impl RandomOccupancy {
    pub const MIN_TOTAL: u32 = 50;
    pub const MAX_TOTAL: u32 = 250;

    pub fn new() -> Self {
        Self { rng: StdRng::from_rng(&mut rand::rng()) }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RandomOccupancy {
    fn default() -> Self { Self::new() }
}

impl OccupancySource for RandomOccupancy {
    fn zone_info(&mut self, zone: &str) -> ParkingZoneInfo {
        let total = self.rng.random_range(Self::MIN_TOTAL..Self::MAX_TOTAL);
        let vacant = self.rng.random_range(0..total);
        ParkingZoneInfo::new(zone, vacant, total, Utc::now())
    }
}

/// Fixed figures per zone; unknown zones come back empty. Useful as a
/// deterministic source and for replaying a snapshot of a real feed.
#[derive(Clone, Debug, Default)]
pub struct FixedOccupancy {
    figures: std::collections::HashMap<String, (u32, u32)>,
}

impl FixedOccupancy {
    pub fn with(mut self, zone: impl Into<String>, vacant: u32, total: u32) -> Self {
        self.figures.insert(zone.into(), (vacant, total));
        self
    }
}

impl OccupancySource for FixedOccupancy {
    fn zone_info(&mut self, zone: &str) -> ParkingZoneInfo {
        let (vacant, total) = self.figures.get(zone).copied().unwrap_or((0, 0));
        ParkingZoneInfo::new(zone, vacant, total, Utc::now())
    }
}
