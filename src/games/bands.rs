//! Elapsed-time banding for destination selection
//!
//! A table of half-open time bands, each mapping to an inclusive range of
//! modal indices. Selection finds the band for the elapsed time, then draws
//! uniformly within it.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Exclusive upper bound in seconds; `None` for the last band
    pub until: Option<f32>,
    pub min: u32,
    pub max: u32,
}

impl Band {
    pub const fn new(until: f32, min: u32, max: u32) -> Self {
        Self {
            until: Some(until),
            min,
            max,
        }
    }

    pub const fn rest(min: u32, max: u32) -> Self {
        Self {
            until: None,
            min,
            max,
        }
    }

    pub fn contains_index(&self, index: u32) -> bool {
        (self.min..=self.max).contains(&index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    bands: Vec<Band>,
}

impl BandTable {
    /// Bands must be in ascending `until` order and end with an open band
    pub fn new(bands: Vec<Band>) -> Self {
        debug_assert!(bands.last().is_some_and(|b| b.until.is_none()));
        debug_assert!(bands.iter().all(|b| b.min <= b.max));
        Self { bands }
    }

    /// Fast completion reaches further: under 5 s picks 5-8, under 10 s 3-6,
    /// otherwise 1-4
    pub fn signal() -> Self {
        Self::new(vec![Band::new(5.0, 5, 8), Band::new(10.0, 3, 6), Band::rest(1, 4)])
    }

    /// Longer survival reaches further
    pub fn evasion() -> Self {
        Self::new(vec![
            Band::new(5.0, 1, 2),
            Band::new(15.0, 3, 5),
            Band::new(30.0, 5, 7),
            Band::rest(7, 8),
        ])
    }

    pub fn band_for(&self, elapsed: f32) -> Band {
        self.bands
            .iter()
            .find(|b| b.until.is_none_or(|until| elapsed < until))
            .or(self.bands.last())
            .copied()
            .unwrap_or(Band::rest(1, 1))
    }

    pub fn select<R: Rng>(&self, elapsed: f32, rng: &mut R) -> u32 {
        let band = self.band_for(elapsed);
        rng.random_range(band.min..=band.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_signal_boundaries() {
        let t = BandTable::signal();
        assert_eq!((t.band_for(4.999).min, t.band_for(4.999).max), (5, 8));
        assert_eq!((t.band_for(5.0).min, t.band_for(5.0).max), (3, 6));
        assert_eq!((t.band_for(9.999).min, t.band_for(9.999).max), (3, 6));
        assert_eq!((t.band_for(10.0).min, t.band_for(10.0).max), (1, 4));
    }

    #[test]
    fn test_evasion_boundaries() {
        let t = BandTable::evasion();
        assert_eq!(t.band_for(0.0), Band::new(5.0, 1, 2));
        assert_eq!(t.band_for(14.99), Band::new(15.0, 3, 5));
        assert_eq!(t.band_for(15.0), Band::new(30.0, 5, 7));
        assert_eq!(t.band_for(300.0), Band::rest(7, 8));
    }

    #[test]
    fn test_select_covers_band() {
        let t = BandTable::signal();
        let mut rng = Pcg32::seed_from_u64(9);
        let mut seen = [false; 9];
        for _ in 0..400 {
            seen[t.select(2.0, &mut rng) as usize] = true;
        }
        assert_eq!(seen, [false, false, false, false, false, true, true, true, true]);
    }

    proptest! {
        #[test]
        fn selection_stays_in_band(elapsed in 0.0f32..120.0, seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            for table in [BandTable::signal(), BandTable::evasion()] {
                let index = table.select(elapsed, &mut rng);
                prop_assert!(table.band_for(elapsed).contains_index(index));
                prop_assert!((1..=8).contains(&index));
            }
        }
    }
}
