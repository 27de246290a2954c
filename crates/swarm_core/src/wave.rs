//! Deterministic wave generation and the wave encoding format.
//!
//! A wave is described by an ASCII string: enemies separated by `/`, each
//! enemy's five element counts in fixed ordinal order separated by `,`
//! (`"15,0,0,0,0/0,0,3,4,0"` is two enemies). The generator maps a wave
//! index to such a string with no random source at all, so any wave can be
//! replayed byte-identically from its index alone.

use crate::element::{Element, ElementCounts};

/// Separator between enemy segments in a wave encoding.
pub const ENEMY_SEPARATOR: char = '/';

/// Generate the population encoding for a wave.
///
/// The "big" element cycles with the wave index and then steps by the
/// counter relation for each successive enemy, so consecutive enemies in a
/// wave counter each other and merging them produces mixed stacks.
/// Difficulty grows linearly (`wave_index + 2`), enemy count
/// logarithmically (`floor(log2(wave_index)) + 1`, minimum 1). Each enemy
/// receives a shrinking allotment: the full difficulty in its big element,
/// half that in the next element around the cycle, and so on until the
/// allotment reaches zero.
#[must_use]
pub fn generate(wave_index: u32) -> String {
    let enemy_count = if wave_index == 0 {
        1
    } else {
        wave_index.ilog2() + 1
    };
    let difficulty = (wave_index + 2).max(1);

    let mut big = Element::from_index(wave_index as usize % Element::ALL.len());
    let mut segments = Vec::with_capacity(enemy_count as usize);

    for _ in 0..enemy_count {
        let mut counts = ElementCounts::new();
        let mut allotment = difficulty;
        let mut element = big;

        while allotment > 0 {
            counts.add(element, allotment);
            allotment /= 2;
            element = element.next();
        }

        segments.push(counts.encode());
        big = big.counter_to();
    }

    segments.join(&ENEMY_SEPARATOR.to_string())
}

/// Decode a wave encoding into one counts map per enemy segment.
///
/// Empty segments are skipped; malformed segments degrade to all-zero maps
/// (with the decoder's warning) rather than failing the wave.
#[must_use]
pub fn decode_wave(encoding: &str) -> Vec<ElementCounts> {
    encoding
        .split(ENEMY_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(ElementCounts::decode)
        .collect()
}

/// Encode a sequence of counts maps back into the wave format.
#[must_use]
pub fn encode_wave<'a>(populations: impl Iterator<Item = &'a ElementCounts>) -> String {
    populations
        .map(ElementCounts::encode)
        .collect::<Vec<_>>()
        .join(&ENEMY_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        assert_eq!(generate(5), generate(5));
        assert_eq!(generate(0), generate(0));
        assert_eq!(generate(31), generate(31));
    }

    #[test]
    fn test_generate_wave_five_layout() {
        // wave 5: 3 enemies, difficulty 7, big element Water, stepping by
        // the counter relation: Water -> Fire -> Metal
        let encoding = generate(5);
        assert_eq!(encoding, "7,3,1,0,0/0,0,7,3,1/3,1,0,0,7");
    }

    #[test]
    fn test_generate_minimum_one_enemy() {
        for wave in 0..2 {
            assert_eq!(decode_wave(&generate(wave)).len(), 1);
        }
    }

    #[test]
    fn test_enemy_count_grows_logarithmically() {
        assert_eq!(decode_wave(&generate(1)).len(), 1);
        assert_eq!(decode_wave(&generate(2)).len(), 2);
        assert_eq!(decode_wave(&generate(4)).len(), 3);
        assert_eq!(decode_wave(&generate(8)).len(), 4);
        assert_eq!(decode_wave(&generate(16)).len(), 5);
    }

    #[test]
    fn test_generated_segments_are_well_formed() {
        for wave in 0..40 {
            let encoding = generate(wave);
            for segment in encoding.split(ENEMY_SEPARATOR) {
                assert_eq!(segment.split(',').count(), 5, "wave {wave}: {segment}");
                let counts = ElementCounts::decode(segment);
                assert!(counts.total() > 0, "wave {wave} spawned an empty enemy");
            }
        }
    }

    #[test]
    fn test_wave_round_trips_through_codec() {
        let encoding = generate(9);
        let decoded = decode_wave(&encoding);
        assert_eq!(encode_wave(decoded.iter()), encoding);
    }

    #[test]
    fn test_decode_skips_empty_segments() {
        let decoded = decode_wave("15,0,0,0,0//0,0,3,4,0");
        assert_eq!(decoded.len(), 2);
    }
}
