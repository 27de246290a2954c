//! Fixed-point math utilities for deterministic simulation.
//!
//! All population math — positions, rendezvous midpoints, layout grids,
//! pentagon ring placement — uses fixed-point arithmetic so that the same
//! wave plays out identically on every platform. Floating-point operations
//! can produce different results on different CPUs.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D position/offset vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Midpoint of two positions; the rendezvous point for a merge pair.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        let two = Fixed::from_num(2);
        Self {
            x: (self.x + other.x) / two,
            y: (self.y + other.y) / two,
        }
    }

    /// Scale the vector by a fixed-point factor.
    #[must_use]
    pub fn scaled(self, factor: Fixed) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }
}

/// Number of sectors in the remnant placement ring (one per element).
pub const RING_SECTORS: usize = 5;

// Unit circle samples at 36-degree steps, starting from UP and rotating
// clockwise. Index n covers angle n * 36 degrees; even indices are whole
// sectors (72 degrees apart), odd indices the half-sector offsets.
const RING_STEPS: [(f64, f64); 10] = [
    (0.0, -1.0),
    (0.587_785_252_292_473_1, -0.809_016_994_374_947_4),
    (0.951_056_516_295_153_5, -0.309_016_994_374_947_45),
    (0.951_056_516_295_153_5, 0.309_016_994_374_947_45),
    (0.587_785_252_292_473_1, 0.809_016_994_374_947_4),
    (0.0, 1.0),
    (-0.587_785_252_292_473_1, 0.809_016_994_374_947_4),
    (-0.951_056_516_295_153_5, 0.309_016_994_374_947_45),
    (-0.951_056_516_295_153_5, -0.309_016_994_374_947_45),
    (-0.587_785_252_292_473_1, -0.809_016_994_374_947_4),
];

/// Unit direction for a pentagon ring slot.
///
/// `sector` selects one of the [`RING_SECTORS`] whole sectors (72 degrees
/// apart, sector 0 pointing up). With `half_offset` the direction is rotated
/// an extra half sector (36 degrees), the slots used for daughter remnants so
/// they never overlap the mother's own remnant ring.
///
/// The table is sampled from constants rather than computed with
/// trigonometric calls, keeping the result bit-identical everywhere.
#[must_use]
pub fn ring_direction(sector: usize, half_offset: bool) -> Vec2Fixed {
    let index = (sector % RING_SECTORS) * 2 + usize::from(half_offset);
    let (x, y) = RING_STEPS[index];
    Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..32 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_midpoint() {
        let a = Vec2Fixed::new(Fixed::from_num(2), Fixed::from_num(10));
        let b = Vec2Fixed::new(Fixed::from_num(8), Fixed::from_num(-4));
        let mid = a.midpoint(b);
        assert_eq!(mid, Vec2Fixed::new(Fixed::from_num(5), Fixed::from_num(3)));
    }

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_ring_directions_are_unit_length() {
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10000);
        for sector in 0..RING_SECTORS {
            for half in [false, true] {
                let dir = ring_direction(sector, half);
                let len_sq = dir.dot(dir);
                assert!(
                    (len_sq - Fixed::ONE).abs() < epsilon,
                    "sector {sector} half {half} length² {len_sq:?}"
                );
            }
        }
    }

    #[test]
    fn test_ring_sector_zero_points_up() {
        let up = Vec2Fixed::new(Fixed::ZERO, Fixed::from_num(-1));
        assert_eq!(ring_direction(0, false), up);
    }

    #[test]
    fn test_ring_half_offset_differs_from_sector() {
        let whole = ring_direction(2, false);
        let half = ring_direction(2, true);
        assert_ne!(whole, half);
    }

    #[test]
    fn test_vec2_normalize_preserves_direction() {
        let v = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(4));
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::from_num(1);
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );

        // x/y ratio matches the original 3/4
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(
            ratio_diff.abs() < epsilon,
            "direction not preserved: {:?}",
            ratio_diff
        );
    }
}
