//! Shared field-level helpers: the custom-behaved field kinds (14-bit
//! integers, the controller-routing bitmap, plain integer domains) plus
//! the uniform-probability mutation primitive every leaf field in the
//! patch schema is built from.

use rand::Rng;

/// Draws a replacement for a plain integer field with probability `pm`,
/// uniformly over `[min, max]`; otherwise keeps `cur`.
pub fn mutate_u8(rng: &mut impl Rng, pm: f64, cur: u8, min: u8, max: u8) -> u8 {
    if rng.gen::<f64>() >= pm {
        return cur;
    }
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}

/// 14-bit value serialized as two 7-bit bytes, high byte first. Mutation
/// is MIDI-range biased: half the mutation probability mass draws a
/// small "MIDI channel-like" value, the other half a larger "sample
/// offset-like" value.
pub fn mutate_i14(rng: &mut impl Rng, pm: f64, cur: i16) -> i16 {
    let r: f64 = rng.gen();
    if r < pm / 2.0 {
        rng.gen_range(0..5)
    } else if r < pm {
        rng.gen_range(100..5000)
    } else {
        cur
    }
}

/// The 8x2 controller-source-switch matrix: each cell is an independent
/// 7-bit integer, mutated cell-by-cell at probability `pm`.
pub type Bitmaps = [[u8; 2]; 8];

pub fn mutate_bitmaps(rng: &mut impl Rng, pm: f64, cur: Bitmaps) -> Bitmaps {
    let mut out = cur;
    for row in out.iter_mut() {
        for cell in row.iter_mut() {
            if rng.gen::<f64>() <= pm {
                *cell = mutate_u8(rng, 1.0, *cell, 0, 0x7f);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn mutate_u8_stays_within_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        for _ in 0..1000 {
            let v = mutate_u8(&mut rng, 1.0, 0, 3, 9);
            assert!((3..=9).contains(&v));
        }
    }

    #[test]
    fn mutate_u8_keeps_current_when_probability_is_zero() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(mutate_u8(&mut rng, 0.0, 42, 0, 0x7f), 42);
        }
    }

    #[test]
    fn mutate_u8_collapses_to_min_when_min_exceeds_max() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        assert_eq!(mutate_u8(&mut rng, 1.0, 5, 0x7f, 0x7f), 0x7f);
    }

    #[test]
    fn mutate_i14_stays_within_midi_range() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let v = mutate_i14(&mut rng, 1.0, 0);
            assert!((0..5000).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn mutate_bitmaps_stays_within_7_bit_domain() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let mut cur: Bitmaps = Default::default();
        for _ in 0..50 {
            cur = mutate_bitmaps(&mut rng, 1.0, cur);
            for row in cur {
                for cell in row {
                    assert!(cell <= 0x7f);
                }
            }
        }
    }
}
