//! Tunable constants for the population core.
//!
//! Everything gameplay-balancing lives here rather than as scattered
//! constants: health scaling, split/merge scale factors, the auto-merge
//! ceiling, maintenance cadence, and the spawn rectangle used by the
//! reposition layout. A config can be loaded from a RON data file or built
//! in code from [`CoreConfig::default`].

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// How an enemy's health is recomputed after a split.
///
/// The rule changed over the game's history, so it stays selectable instead
/// of hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SplitHealthRule {
    /// Current rule: carry half the pre-split health, clamped to the new
    /// maximum (`total × base health per unit`).
    #[default]
    HalveClamped,
    /// Legacy rule: reset both current and maximum health to
    /// `rank × base health per unit`.
    RankTimesBase,
}

/// Configuration for the population core.
///
/// All distances are in world units, all intervals in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Health contributed by each elemental unit an enemy carries.
    pub base_health_per_unit: u32,
    /// Flat health of a lesser enemy (always a single unit).
    pub lesser_base_health: u32,
    /// Which health rule splits apply.
    pub split_health_rule: SplitHealthRule,
    /// Visual scale multiplier applied to mother and daughter on split.
    #[serde(with = "fixed_serde")]
    pub split_scale_factor: Fixed,
    /// Visual scale multiplier applied to the surviving enemy on merge;
    /// the inverse of the split factor so a merge undoes a split visually.
    #[serde(with = "fixed_serde")]
    pub merge_scale_factor: Fixed,
    /// Radius of the ring on which split remnants are placed.
    #[serde(with = "fixed_serde")]
    pub ring_radius: Fixed,
    /// Distance mother and daughter are pushed apart after a split.
    #[serde(with = "fixed_serde")]
    pub separation_distance: Fixed,
    /// Live enemy count above which the auto-merge policy starts pairing
    /// the smallest enemies together.
    pub auto_merge_ceiling: usize,
    /// Ticks between maintenance passes (auto-merge + reposition).
    pub maintenance_interval: u32,
    /// Ticks a wave must have run before an empty field counts as cleared.
    pub settle_buffer: u32,
    /// Upper-left corner of the spawn rectangle.
    pub spawn_min: Vec2Fixed,
    /// Lower-right corner of the spawn rectangle.
    pub spawn_max: Vec2Fixed,
    /// Distance within which the movement collaborator should report
    /// arrival at a target.
    #[serde(with = "fixed_serde")]
    pub arrival_tolerance: Fixed,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_health_per_unit: 100,
            lesser_base_health: 100,
            split_health_rule: SplitHealthRule::default(),
            split_scale_factor: Fixed::from_num(0.8),
            merge_scale_factor: Fixed::from_num(1.25),
            ring_radius: Fixed::from_num(100),
            separation_distance: Fixed::from_num(100),
            auto_merge_ceiling: 6,
            maintenance_interval: 30,
            settle_buffer: 20,
            spawn_min: Vec2Fixed::new(Fixed::from_num(1200), Fixed::from_num(100)),
            spawn_max: Vec2Fixed::new(Fixed::from_num(1800), Fixed::from_num(900)),
            arrival_tolerance: Fixed::from_num(4),
        }
    }
}

impl CoreConfig {
    /// Parse a config from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParse`] when the text is not a valid
    /// `CoreConfig`.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Maximum health for an enemy holding `total` elemental units.
    #[must_use]
    pub const fn max_health_for_total(&self, total: u32) -> u32 {
        total * self.base_health_per_unit
    }

    /// Width of the spawn rectangle.
    #[must_use]
    pub fn spawn_width(&self) -> Fixed {
        self.spawn_max.x - self.spawn_min.x
    }

    /// Height of the spawn rectangle.
    #[must_use]
    pub fn spawn_height(&self) -> Fixed {
        self.spawn_max.y - self.spawn_min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scale_factors_are_inverses() {
        let config = CoreConfig::default();
        let product = config.split_scale_factor * config.merge_scale_factor;
        let epsilon = Fixed::from_num(1) / Fixed::from_num(1000);
        assert!((product - Fixed::ONE).abs() < epsilon);
    }

    #[test]
    fn test_max_health_scales_with_total() {
        let config = CoreConfig::default();
        assert_eq!(config.max_health_for_total(1), 100);
        assert_eq!(config.max_health_for_total(15), 1500);
    }

    #[test]
    fn test_from_ron_rejects_garbage() {
        assert!(CoreConfig::from_ron("not ron at all").is_err());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = CoreConfig::default();
        let text = ron::to_string(&config).expect("serialize");
        let restored = CoreConfig::from_ron(&text).expect("parse");
        assert_eq!(restored, config);
    }
}
