//! Checksums used by the controller-pak commands.
//!
//! Pak addresses are 32-byte aligned, so their low 5 bits carry a CRC of the
//! upper 11. Data blocks are acknowledged with an 8-bit CRC (polynomial
//! 0x85) which the pak returns after a write or appends after a read.

/// XOR contribution of each set address bit to the 5-bit address CRC.
/// Bits 0..5 are the CRC itself.
const ADDRESS_CRC_TABLE: [u16; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x15, 0x1F, 0x0B, 0x16, 0x19, 0x07, 0x0E, 0x1C, 0x0D, 0x1A,
    0x01,
];

const ADDRESS_MASK: u16 = !0x1F;

/// Align `address` to its block and fill in the address CRC.
pub fn address_with_crc(address: u16) -> u16 {
    let base = address & ADDRESS_MASK;
    let crc = (5..16)
        .filter(|bit| base & (1 << bit) != 0)
        .fold(0u16, |acc, bit| acc ^ ADDRESS_CRC_TABLE[bit]);
    base | crc
}

/// `true` when the low 5 bits of `address` match its CRC.
pub fn address_crc_ok(address: u16) -> bool {
    address_with_crc(address) == address
}

/// 8-bit CRC over one 32-byte block.
pub fn data_crc(data: &[u8; 32]) -> u8 {
    let mut crc = 0u8;
    // one extra round of zero bits flushes the register
    for i in 0..=data.len() {
        for bit in (0..8).rev() {
            let feedback = if crc & 0x80 != 0 { 0x85 } else { 0 };
            crc <<= 1;
            if i < data.len() && data[i] & (1 << bit) != 0 {
                crc |= 1;
            }
            crc ^= feedback;
        }
    }
    crc
}
