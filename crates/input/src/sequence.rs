//! Wrapping `u16` sequence arithmetic.
//!
//! `s1` is ahead of `s2` when it is within half the number space in the
//! forward direction, so ordering survives wraparound from 65535 to 0.

const HALF_RANGE: u16 = u16::MAX / 2 + 1;

/// `sequence_greater_than(2, 1)` is true, `sequence_greater_than(1, 1)` is false,
/// `sequence_greater_than(0, 65535)` is true.
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= HALF_RANGE)) || ((s1 < s2) && (s2 - s1 > HALF_RANGE))
}

pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Whether `incoming` should be accepted after `last` (nothing accepted yet
/// accepts anything).
pub fn is_newer(incoming: u16, last: Option<u16>) -> bool {
    match last {
        None => true,
        Some(last) => sequence_greater_than(incoming, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn simple_ordering() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(1, 1));
        assert!(sequence_less_than(1, 2));
    }

    #[test]
    fn ordering_survives_wraparound() {
        assert!(sequence_greater_than(0, u16::MAX));
        assert!(sequence_greater_than(5, 65530));
        assert!(!sequence_greater_than(65530, 5));
    }

    #[test]
    fn first_command_is_always_newer() {
        assert!(is_newer(0, None));
        assert!(is_newer(40000, None));
        assert!(!is_newer(7, Some(7)));
    }

    proptest! {
        #[test]
        fn ahead_within_half_range_is_greater(s in any::<u16>(), d in 1u16..HALF_RANGE) {
            let ahead = s.wrapping_add(d);
            prop_assert!(sequence_greater_than(ahead, s));
            prop_assert!(!sequence_greater_than(s, ahead));
        }

        #[test]
        fn never_greater_than_itself(s in any::<u16>()) {
            prop_assert!(!sequence_greater_than(s, s));
        }
    }
}
