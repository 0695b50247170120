//! Power Pad floor mat.
//!
//! The mat reuses the pad's latch and clock and answers on the two spare
//! data lines (D3 and D4) while the standard 8 bits are being clocked.
//! D4 carries four buttons on bits 0..3, D3 carries eight on bits 0..7.
//! Buttons are numbered as printed on side B of the mat.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PowerPadButtons: u16 {
        const B1 = 1 << 0;
        const B2 = 1 << 1;
        const B3 = 1 << 2;
        const B4 = 1 << 3;
        const B5 = 1 << 4;
        const B6 = 1 << 5;
        const B7 = 1 << 6;
        const B8 = 1 << 7;
        const B9 = 1 << 8;
        const B10 = 1 << 9;
        const B11 = 1 << 10;
        const B12 = 1 << 11;
    }
}

/// D4 line: bit index to button. Bits 4..7 carry nothing.
pub const D4_MAP: [PowerPadButtons; 8] = [
    PowerPadButtons::B4,
    PowerPadButtons::B3,
    PowerPadButtons::B12,
    PowerPadButtons::B8,
    PowerPadButtons::empty(),
    PowerPadButtons::empty(),
    PowerPadButtons::empty(),
    PowerPadButtons::empty(),
];

/// D3 line: bit index to button.
pub const D3_MAP: [PowerPadButtons; 8] = [
    PowerPadButtons::B2,
    PowerPadButtons::B1,
    PowerPadButtons::B5,
    PowerPadButtons::B9,
    PowerPadButtons::B6,
    PowerPadButtons::B10,
    PowerPadButtons::B11,
    PowerPadButtons::B7,
];

/// Decode the low-bit masks sampled on D3 and D4 (bit `i` set = line low
/// while bit `i` was presented).
pub fn decode(d3_low: u8, d4_low: u8) -> PowerPadButtons {
    let mut buttons = PowerPadButtons::empty();
    for bit in 0..8 {
        if d3_low & (1 << bit) != 0 {
            buttons |= D3_MAP[bit];
        }
        if d4_low & (1 << bit) != 0 {
            buttons |= D4_MAP[bit];
        }
    }
    buttons
}

/// Inverse of [`decode`]: the D3 and D4 low-bit masks a mat with `pressed`
/// held down puts on the wire.
pub fn encode(pressed: PowerPadButtons) -> (u8, u8) {
    let mut d3 = 0u8;
    let mut d4 = 0u8;
    for bit in 0..8 {
        if pressed.intersects(D3_MAP[bit]) {
            d3 |= 1 << bit;
        }
        if !D4_MAP[bit].is_empty() && pressed.intersects(D4_MAP[bit]) {
            d4 |= 1 << bit;
        }
    }
    (d3, d4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_cover_all_twelve_buttons_once() {
        let mut seen = PowerPadButtons::empty();
        for b in D3_MAP.iter().chain(D4_MAP.iter()).filter(|b| !b.is_empty()) {
            assert!(!seen.intersects(*b), "{:?} mapped twice", b);
            seen |= *b;
        }
        assert_eq!(seen, PowerPadButtons::all());
    }

    #[test]
    fn test_decode_literal_positions() {
        assert_eq!(decode(0, 0b0000_0001), PowerPadButtons::B4);
        assert_eq!(decode(0, 0b0000_0100), PowerPadButtons::B12);
        assert_eq!(decode(0b0000_0010, 0), PowerPadButtons::B1);
        assert_eq!(decode(0b1000_0000, 0), PowerPadButtons::B7);
    }

    #[test]
    fn test_upper_d4_bits_are_ignored() {
        assert!(decode(0, 0xF0).is_empty());
    }

    #[test]
    fn test_encode_matches_decode() {
        let pressed = PowerPadButtons::B3 | PowerPadButtons::B6 | PowerPadButtons::B11;
        let (d3, d4) = encode(pressed);
        assert_eq!(d4, 0b0000_0010);
        assert_eq!(d3, 0b0101_0000);
        assert_eq!(decode(d3, d4), pressed);
    }
}
