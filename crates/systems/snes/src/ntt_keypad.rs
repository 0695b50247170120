//! NTT Data Keypad.
//!
//! The keypad pulls the primary data line low on bit 13 of the standard
//! sequence. When that indicator is seen the driver keeps clocking for 16
//! more bits; on extension bit `n` the D2 line carries key `n` of
//! [`D2_MAP`]. D3 is sampled as well but no keypad revision assigns it any
//! keys, so its bits are dropped.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Bit of the standard 16-bit sequence that flags the keypad.
pub const INDICATOR_BIT: u8 = 13;

/// Extension length in clocked bits.
pub const EXTENSION_BITS: u8 = 16;

bitflags! {
    /// Keypad keys; bit `n` is extension bit `n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NttKeys: u16 {
        const K0 = 1 << 0;
        const K1 = 1 << 1;
        const K2 = 1 << 2;
        const K3 = 1 << 3;
        const K4 = 1 << 4;
        const K5 = 1 << 5;
        const K6 = 1 << 6;
        const K7 = 1 << 7;
        const K8 = 1 << 8;
        const K9 = 1 << 9;
        const STAR = 1 << 10;
        const HASH = 1 << 11;
        const DOT = 1 << 12;
        const CLEAR = 1 << 13;
        // bit 14 is reserved
        const END = 1 << 15;
    }
}

/// D2 line: extension bit index to key.
pub const D2_MAP: [NttKeys; EXTENSION_BITS as usize] = [
    NttKeys::K0,
    NttKeys::K1,
    NttKeys::K2,
    NttKeys::K3,
    NttKeys::K4,
    NttKeys::K5,
    NttKeys::K6,
    NttKeys::K7,
    NttKeys::K8,
    NttKeys::K9,
    NttKeys::STAR,
    NttKeys::HASH,
    NttKeys::DOT,
    NttKeys::CLEAR,
    NttKeys::empty(),
    NttKeys::END,
];

/// Decode the D2 low-bit mask of the extension.
pub fn decode(d2_low: u16) -> NttKeys {
    D2_MAP
        .iter()
        .enumerate()
        .filter(|(bit, _)| d2_low & (1 << bit) != 0)
        .fold(NttKeys::empty(), |acc, (_, key)| acc | *key)
}

/// Keypad symbol for a single key, as printed on the unit.
pub fn symbol(key: NttKeys) -> Option<char> {
    let idx = D2_MAP.iter().position(|k| !k.is_empty() && *k == key)?;
    Some(match idx {
        0..=9 => char::from(b'0' + idx as u8),
        10 => '*',
        11 => '#',
        12 => '.',
        13 => 'C',
        _ => 'E',
    })
}

/// Symbols of every key held, in keypad order.
pub fn symbols(keys: NttKeys) -> String {
    D2_MAP
        .iter()
        .filter(|k| !k.is_empty() && keys.contains(**k))
        .filter_map(|k| symbol(*k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_position_decodes_to_nothing() {
        assert!(decode(1 << 14).is_empty());
        assert_eq!(decode(1 << 15), NttKeys::END);
    }

    #[test]
    fn test_digits_and_symbols() {
        assert_eq!(decode(0b11), NttKeys::K0 | NttKeys::K1);
        assert_eq!(symbol(NttKeys::K7), Some('7'));
        assert_eq!(symbol(NttKeys::HASH), Some('#'));
        assert_eq!(symbol(NttKeys::CLEAR), Some('C'));
        assert_eq!(symbol(NttKeys::K1 | NttKeys::K2), None);
    }

    #[test]
    fn test_symbols_follow_keypad_order() {
        assert_eq!(symbols(NttKeys::HASH | NttKeys::K7 | NttKeys::K0), "07#");
        assert_eq!(symbols(NttKeys::empty()), "");
        assert_eq!(symbols(NttKeys::END | NttKeys::DOT), ".E");
    }
}
