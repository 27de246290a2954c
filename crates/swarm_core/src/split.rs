//! The split engine.
//!
//! Splitting is planned as a pure function over the mother's state and then
//! applied by the population manager. Per element, an odd unit peels off as
//! a lesser enemy on the pentagon ring; the even remainder is halved between
//! mother and daughter. Whichever side ends up with zero or one unit
//! collapses (killed, or demoted to a lesser enemy); survivors shrink and
//! are pushed apart so they do not immediately re-collide.
//!
//! Unit conservation: `remnants + mother + daughter` always equals the
//! pre-split total. Units move between entity kinds but are never created
//! or destroyed here.

use crate::config::{CoreConfig, SplitHealthRule};
use crate::element::{Element, ElementCounts};
use crate::entity::{Enemy, Health};
use crate::math::{ring_direction, Fixed, Vec2Fixed};

/// What happens to the mother after the split.
#[derive(Debug, Clone, PartialEq)]
pub enum MotherOutcome {
    /// Mother retained nothing and dies.
    Killed,
    /// Mother retained exactly one unit and is replaced by a lesser enemy
    /// of that element at her position.
    Demoted(Element),
    /// Mother survives with the retained counts.
    Survives {
        /// Counts retained by the mother.
        counts: ElementCounts,
        /// Recomputed health.
        health: Health,
        /// Shrunk visual scale.
        scale: Fixed,
    },
}

/// What the split produces on the daughter side.
#[derive(Debug, Clone, PartialEq)]
pub enum DaughterOutcome {
    /// The halves summed to zero; no daughter.
    None,
    /// A single unit; spawns a lesser enemy at a half-sector ring offset so
    /// it cannot overlap the mother's own remnant ring.
    Lesser {
        /// Element of the lesser enemy.
        element: Element,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// A full enemy spawned at the mother's position.
    Full {
        /// Counts the daughter receives.
        counts: ElementCounts,
        /// Health assigned at spawn.
        health: Health,
        /// Shrunk visual scale.
        scale: Fixed,
    },
}

/// Complete, deterministic description of one split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    /// Odd-count remainders: one lesser enemy per odd element, with spawn
    /// positions on the pentagon ring around the mother.
    pub remnants: Vec<(Element, Vec2Fixed)>,
    /// Mother's fate.
    pub mother: MotherOutcome,
    /// Daughter's fate.
    pub daughter: DaughterOutcome,
    /// Separation movement targets for (mother, daughter), present only when
    /// both survive as full enemies.
    pub separation: Option<(Vec2Fixed, Vec2Fixed)>,
}

/// Plan a split of `mother`.
///
/// Returns `None` for a mother with total 0 or 1: callers must not request
/// such a split, and the engine refuses it defensively rather than
/// producing a degenerate plan.
#[must_use]
pub fn plan_split(mother: &Enemy, config: &CoreConfig) -> Option<SplitPlan> {
    let pre_total = mother.total();
    if pre_total <= 1 {
        tracing::warn!(
            id = mother.id,
            total = pre_total,
            "split requested for degenerate enemy, ignoring"
        );
        return None;
    }

    let mut remnants = Vec::new();
    let mut mother_counts = ElementCounts::new();
    let mut daughter_counts = ElementCounts::new();

    for element in Element::ALL {
        let mut working = mother.counts().get(element);

        if working % 2 == 1 {
            working -= 1;
            let offset = ring_direction(element.index(), false).scaled(config.ring_radius);
            remnants.push((element, mother.position + offset));
        }

        let half = working / 2;
        daughter_counts.set(element, half);
        mother_counts.set(element, working - half);
    }

    let pre_health = mother.health.current;

    let mother_outcome = match mother_counts.total() {
        0 => MotherOutcome::Killed,
        1 => MotherOutcome::Demoted(
            mother_counts
                .dominant()
                .expect("counts with total 1 have a dominant element"),
        ),
        _ => MotherOutcome::Survives {
            counts: mother_counts,
            health: survivor_health(pre_health, &mother_counts, config),
            scale: mother.scale * config.split_scale_factor,
        },
    };

    let daughter_outcome = match daughter_counts.total() {
        0 => DaughterOutcome::None,
        1 => {
            let element = daughter_counts
                .dominant()
                .expect("counts with total 1 have a dominant element");
            let offset = ring_direction(element.index(), true).scaled(config.ring_radius);
            DaughterOutcome::Lesser {
                element,
                position: mother.position + offset,
            }
        }
        _ => DaughterOutcome::Full {
            counts: daughter_counts,
            health: survivor_health(pre_health, &daughter_counts, config),
            scale: mother.scale * config.split_scale_factor,
        },
    };

    let separation = match (&mother_outcome, &daughter_outcome) {
        (MotherOutcome::Survives { .. }, DaughterOutcome::Full { .. }) => {
            // mother pushed up-screen, daughter down, so they cannot
            // immediately re-collide
            let push = Vec2Fixed::new(Fixed::ZERO, config.separation_distance);
            Some((mother.position - push, mother.position + push))
        }
        _ => None,
    };

    Some(SplitPlan {
        remnants,
        mother: mother_outcome,
        daughter: daughter_outcome,
        separation,
    })
}

/// Health for a surviving side of the split, under the configured rule.
fn survivor_health(pre_current: u32, counts: &ElementCounts, config: &CoreConfig) -> Health {
    match config.split_health_rule {
        SplitHealthRule::HalveClamped => {
            let max = config.max_health_for_total(counts.total());
            Health {
                current: (pre_current / 2).min(max),
                max,
            }
        }
        SplitHealthRule::RankTimesBase => {
            Health::new(counts.rank() * config.base_health_per_unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mother_with(counts: ElementCounts, config: &CoreConfig) -> Enemy {
        Enemy::new(1, 0, counts, Vec2Fixed::ZERO, config)
    }

    fn plan_total(plan: &SplitPlan) -> u32 {
        let remnant_units = plan.remnants.len() as u32;
        let mother_units = match &plan.mother {
            MotherOutcome::Killed => 0,
            MotherOutcome::Demoted(_) => 1,
            MotherOutcome::Survives { counts, .. } => counts.total(),
        };
        let daughter_units = match &plan.daughter {
            DaughterOutcome::None => 0,
            DaughterOutcome::Lesser { .. } => 1,
            DaughterOutcome::Full { counts, .. } => counts.total(),
        };
        remnant_units + mother_units + daughter_units
    }

    #[test]
    fn test_split_water_five() {
        let config = CoreConfig::default();
        let mother = mother_with(ElementCounts::single(Element::Water, 5), &config);
        let plan = plan_split(&mother, &config).expect("splittable");

        // one odd remnant of Water, 2 units for each side
        assert_eq!(plan.remnants.len(), 1);
        assert_eq!(plan.remnants[0].0, Element::Water);
        match &plan.mother {
            MotherOutcome::Survives { counts, .. } => assert_eq!(counts.total(), 2),
            other => panic!("unexpected mother outcome {other:?}"),
        }
        match &plan.daughter {
            DaughterOutcome::Full { counts, .. } => assert_eq!(counts.total(), 2),
            other => panic!("unexpected daughter outcome {other:?}"),
        }
        assert_eq!(plan_total(&plan), 5);
        assert!(plan.separation.is_some());
    }

    #[test]
    fn test_split_conserves_units() {
        let config = CoreConfig::default();
        for counts in [
            ElementCounts::from_array([3, 0, 7, 1, 2]),
            ElementCounts::from_array([2, 2, 2, 2, 2]),
            ElementCounts::from_array([0, 9, 0, 0, 1]),
            ElementCounts::from_array([1, 1, 0, 0, 0]),
        ] {
            let mother = mother_with(counts, &config);
            let plan = plan_split(&mother, &config).expect("splittable");
            assert_eq!(plan_total(&plan), counts.total(), "counts {counts:?}");
        }
    }

    #[test]
    fn test_split_demotes_mother_at_one_unit() {
        let config = CoreConfig::default();
        // 3 water: 1 remnant, working 2, daughter 1, mother retains 1
        let mother = mother_with(ElementCounts::single(Element::Water, 3), &config);
        let plan = plan_split(&mother, &config).expect("splittable");

        assert_eq!(plan.mother, MotherOutcome::Demoted(Element::Water));
        assert!(matches!(
            plan.daughter,
            DaughterOutcome::Lesser {
                element: Element::Water,
                ..
            }
        ));
        assert!(plan.separation.is_none());
    }

    #[test]
    fn test_daughter_lesser_offset_differs_from_remnant_ring() {
        let config = CoreConfig::default();
        // 3 fire: remnant on the Fire sector, daughter lesser half-sector off
        let mother = mother_with(ElementCounts::single(Element::Fire, 3), &config);
        let plan = plan_split(&mother, &config).expect("splittable");

        let remnant_pos = plan.remnants[0].1;
        match plan.daughter {
            DaughterOutcome::Lesser { position, .. } => assert_ne!(position, remnant_pos),
            other => panic!("unexpected daughter outcome {other:?}"),
        }
    }

    #[test]
    fn test_split_health_halve_clamped() {
        let config = CoreConfig::default();
        // 8 earth, full health 800; halves of 4 have max 400, half health 400
        let mother = mother_with(ElementCounts::single(Element::Earth, 8), &config);
        let plan = plan_split(&mother, &config).expect("splittable");
        match &plan.mother {
            MotherOutcome::Survives { health, .. } => {
                assert_eq!(health.max, 400);
                assert_eq!(health.current, 400);
            }
            other => panic!("unexpected mother outcome {other:?}"),
        }

        // a wounded mother carries half her current health instead
        let mut wounded = mother_with(ElementCounts::single(Element::Earth, 8), &config);
        let _ = wounded.health.apply_damage(600); // 200 left
        let plan = plan_split(&wounded, &config).expect("splittable");
        match &plan.mother {
            MotherOutcome::Survives { health, .. } => {
                assert_eq!(health.current, 100);
                assert_eq!(health.max, 400);
            }
            other => panic!("unexpected mother outcome {other:?}"),
        }
    }

    #[test]
    fn test_split_health_rank_times_base() {
        let config = CoreConfig {
            split_health_rule: SplitHealthRule::RankTimesBase,
            ..CoreConfig::default()
        };
        let mother = mother_with(ElementCounts::single(Element::Earth, 8), &config);
        let plan = plan_split(&mother, &config).expect("splittable");
        match &plan.mother {
            // halves of 4 have rank 3
            MotherOutcome::Survives { health, .. } => {
                assert_eq!(health.max, 300);
                assert_eq!(health.current, 300);
            }
            other => panic!("unexpected mother outcome {other:?}"),
        }
    }

    #[test]
    fn test_split_rejects_degenerate_mother() {
        let config = CoreConfig::default();
        let mother = mother_with(ElementCounts::single(Element::Water, 1), &config);
        assert!(plan_split(&mother, &config).is_none());
    }

    #[test]
    fn test_split_scale_shrinks() {
        let config = CoreConfig::default();
        let mother = mother_with(ElementCounts::single(Element::Metal, 4), &config);
        let plan = plan_split(&mother, &config).expect("splittable");
        match &plan.mother {
            MotherOutcome::Survives { scale, .. } => {
                assert_eq!(*scale, Fixed::ONE * config.split_scale_factor);
            }
            other => panic!("unexpected mother outcome {other:?}"),
        }
    }
}
