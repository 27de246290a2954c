//! The elemental model.
//!
//! Enemies are made of units of five elements arranged in a cycle:
//! Water → Wood → Fire → Earth → Metal → Water. The cycle drives two
//! relations used across the game:
//!
//! - **counter**: each element counters the element two steps ahead of it
//! - **boost**: each element boosts the element one step ahead of it
//!
//! Everything in this module is pure and stateless. Counts are kept in a
//! fixed five-slot array indexed by element ordinal, so there is no map
//! bookkeeping and no way to hold a count for an element that does not exist.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::math::Fixed;

/// One of the five elements, in ascending importance order.
///
/// The discriminant is the wire ordinal used by the wave encoding; `Metal`
/// is the most important element and wins dominance ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Element {
    /// Least important element, ordinal 1.
    Water = 1,
    /// Ordinal 2.
    Wood = 2,
    /// Ordinal 3.
    Fire = 3,
    /// Ordinal 4.
    Earth = 4,
    /// Most important element, ordinal 5. Wins dominance ties.
    Metal = 5,
}

/// Number of elements in the cycle.
pub const ELEMENT_COUNT: usize = 5;

impl Element {
    /// All elements in ascending ordinal order (the fixed encoding order).
    pub const ALL: [Element; ELEMENT_COUNT] = [
        Element::Water,
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
    ];

    /// One-based wire ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Zero-based slot index into an [`ElementCounts`] array.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    /// Element for a zero-based slot index, wrapping around the cycle.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % ELEMENT_COUNT]
    }

    /// The next element in the cycle; Metal wraps back to Water.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// The previous element in the cycle; Water wraps back to Metal.
    #[must_use]
    pub const fn previous(self) -> Self {
        Self::from_index(self.index() + ELEMENT_COUNT - 1)
    }

    /// The element this one counters: two steps ahead in the cycle.
    #[must_use]
    pub const fn counter_to(self) -> Self {
        self.next().next()
    }

    /// The element this one is countered by: two steps behind in the cycle.
    #[must_use]
    pub const fn counter_by(self) -> Self {
        self.previous().previous()
    }

    /// The element this one boosts: one step ahead.
    #[must_use]
    pub const fn boost_to(self) -> Self {
        self.next()
    }

    /// The element this one is boosted by: one step behind.
    #[must_use]
    pub const fn boost_by(self) -> Self {
        self.previous()
    }

    /// Damage multiplier when this element attacks a defender of `other`.
    ///
    /// Countering the defender deals 150%, being countered by the defender
    /// deals 50%, any other matchup passes through at 100%. Consumed by the
    /// combat collaborator; the core itself never scales damage.
    #[must_use]
    pub fn effectiveness_vs(self, other: Element) -> Fixed {
        let percent = if self.counter_to() == other {
            150
        } else if self.counter_by() == other {
            50
        } else {
            100
        };

        Fixed::from_num(percent) / Fixed::from_num(100)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Element::Water => "Water",
            Element::Wood => "Wood",
            Element::Fire => "Fire",
            Element::Earth => "Earth",
            Element::Metal => "Metal",
        };
        f.write_str(name)
    }
}

/// Per-element unit counts for one enemy.
///
/// A fixed array indexed by element ordinal. Counts are unsigned and all
/// mutation saturates at zero, so the "never negative" invariant holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ElementCounts([u32; ELEMENT_COUNT]);

impl ElementCounts {
    /// An all-zero counts map.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; ELEMENT_COUNT])
    }

    /// Counts map from a raw slot array in ordinal order.
    #[must_use]
    pub const fn from_array(slots: [u32; ELEMENT_COUNT]) -> Self {
        Self(slots)
    }

    /// Counts map with all units in a single element.
    #[must_use]
    pub const fn single(element: Element, amount: u32) -> Self {
        let mut slots = [0; ELEMENT_COUNT];
        slots[element.index()] = amount;
        Self(slots)
    }

    /// Count held for one element.
    #[must_use]
    pub const fn get(&self, element: Element) -> u32 {
        self.0[element.index()]
    }

    /// Replace the count for one element.
    pub fn set(&mut self, element: Element, amount: u32) {
        self.0[element.index()] = amount;
    }

    /// Add units to one element.
    pub fn add(&mut self, element: Element, amount: u32) {
        let slot = &mut self.0[element.index()];
        *slot = slot.saturating_add(amount);
    }

    /// Remove units from one element, clamping at zero.
    pub fn subtract(&mut self, element: Element, amount: u32) {
        let slot = &mut self.0[element.index()];
        *slot = slot.saturating_sub(amount);
    }

    /// Total units across all elements.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// True when no element holds any units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&count| count == 0)
    }

    /// The element with the strictly highest count.
    ///
    /// Ties resolve to the more important (higher-ordinal) element; an
    /// all-zero map has no dominant element.
    #[must_use]
    pub fn dominant(&self) -> Option<Element> {
        let mut best: Option<(Element, u32)> = None;

        for element in Element::ALL {
            let count = self.get(element);
            if count == 0 {
                continue;
            }
            // >= keeps the later (higher-ordinal) element on equal counts
            match best {
                Some((_, best_count)) if count < best_count => {}
                _ => best = Some((element, count)),
            }
        }

        best.map(|(element, _)| element)
    }

    /// Rank of the enemy these counts describe: `floor(log2(total)) + 1`.
    ///
    /// An empty map has rank 0, the degenerate value callers must treat as
    /// "not a live enemy".
    #[must_use]
    pub fn rank(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        total.ilog2() + 1
    }

    /// Iterate over `(element, count)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (Element, u32)> + '_ {
        Element::ALL.iter().map(move |&element| (element, self.get(element)))
    }

    /// Serialize the counts as the fixed-order comma list of the wave
    /// encoding, e.g. `"15,0,0,0,0"`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (index, count) in self.0.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            out.push_str(&count.to_string());
        }
        out
    }

    /// Parse a fixed-order comma list back into a counts map.
    ///
    /// Malformed input — the wrong number of fields or a non-numeric token —
    /// degrades to an all-zero map with a logged warning. The decoder never
    /// fails outright: a bad segment costs one enemy, not the wave.
    #[must_use]
    pub fn decode(encoded: &str) -> Self {
        match Self::parse(encoded) {
            Some(counts) => counts,
            None => {
                tracing::warn!(segment = encoded, "malformed element encoding, using empty counts");
                Self::new()
            }
        }
    }

    fn parse(encoded: &str) -> Option<Self> {
        let mut slots = [0u32; ELEMENT_COUNT];
        let mut fields = 0usize;

        for (index, field) in encoded.split(',').enumerate() {
            if index >= ELEMENT_COUNT {
                return None;
            }
            slots[index] = field.trim().parse().ok()?;
            fields = index + 1;
        }

        (fields == ELEMENT_COUNT).then_some(Self(slots))
    }
}

impl std::ops::Index<Element> for ElementCounts {
    type Output = u32;

    fn index(&self, element: Element) -> &Self::Output {
        &self.0[element.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(Element::Metal.next(), Element::Water);
        assert_eq!(Element::Water.previous(), Element::Metal);
    }

    #[test]
    fn test_counter_and_boost_relations() {
        assert_eq!(Element::Water.counter_to(), Element::Fire);
        assert_eq!(Element::Fire.counter_by(), Element::Water);
        assert_eq!(Element::Water.boost_to(), Element::Wood);
        assert_eq!(Element::Wood.boost_by(), Element::Water);

        // counter/boost are inverses around the full cycle
        for element in Element::ALL {
            assert_eq!(element.counter_to().counter_by(), element);
            assert_eq!(element.boost_to().boost_by(), element);
        }
    }

    #[test]
    fn test_effectiveness_multipliers() {
        // Water counters Fire: Water attacking Fire deals 150%
        assert_eq!(
            Element::Water.effectiveness_vs(Element::Fire),
            Fixed::from_num(150) / Fixed::from_num(100)
        );
        // Fire attacking Water is countered: 50%
        assert_eq!(
            Element::Fire.effectiveness_vs(Element::Water),
            Fixed::from_num(50) / Fixed::from_num(100)
        );
        // Neutral matchup
        assert_eq!(Element::Water.effectiveness_vs(Element::Wood), Fixed::ONE);
    }

    #[test]
    fn test_dominant_prefers_higher_ordinal_on_tie() {
        let mut counts = ElementCounts::new();
        counts.set(Element::Water, 3);
        counts.set(Element::Metal, 3);
        assert_eq!(counts.dominant(), Some(Element::Metal));
    }

    #[test]
    fn test_dominant_strictly_highest() {
        let mut counts = ElementCounts::new();
        counts.set(Element::Wood, 4);
        counts.set(Element::Metal, 3);
        assert_eq!(counts.dominant(), Some(Element::Wood));
    }

    #[test]
    fn test_dominant_of_empty_is_none() {
        assert_eq!(ElementCounts::new().dominant(), None);
    }

    #[test]
    fn test_rank_boundaries() {
        let rank_of = |total| ElementCounts::single(Element::Water, total).rank();
        assert_eq!(rank_of(1), 1);
        assert_eq!(rank_of(2), 2);
        assert_eq!(rank_of(3), 2);
        assert_eq!(rank_of(4), 3);
        assert_eq!(rank_of(8), 4);
        assert_eq!(ElementCounts::new().rank(), 0);
    }

    #[test]
    fn test_subtract_clamps_at_zero() {
        let mut counts = ElementCounts::single(Element::Fire, 2);
        counts.subtract(Element::Fire, 5);
        assert_eq!(counts.get(Element::Fire), 0);
    }

    #[test]
    fn test_encode_fixed_order() {
        let mut counts = ElementCounts::new();
        counts.set(Element::Water, 15);
        assert_eq!(counts.encode(), "15,0,0,0,0");

        counts = ElementCounts::new();
        counts.set(Element::Fire, 3);
        counts.set(Element::Earth, 4);
        assert_eq!(counts.encode(), "0,0,3,4,0");
    }

    #[test]
    fn test_decode_round_trip() {
        let counts = ElementCounts::from_array([7, 0, 2, 19, 1]);
        assert_eq!(ElementCounts::decode(&counts.encode()), counts);
    }

    #[test]
    fn test_decode_malformed_degrades_to_empty() {
        assert_eq!(ElementCounts::decode("1,2,3"), ElementCounts::new());
        assert_eq!(ElementCounts::decode("1,2,3,4,5,6"), ElementCounts::new());
        assert_eq!(ElementCounts::decode("1,x,3,4,5"), ElementCounts::new());
        assert_eq!(ElementCounts::decode(""), ElementCounts::new());
    }
}
