//! CRC-16/CCITT frame check sequence.

use crc::{Crc, CRC_16_IBM_3740};

/// Polynomial 0x1021, initial value 0xFFFF, no reflection, no final XOR.
const ASH_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Checksum over a frame's control byte and data field.
pub fn crc16(data: &[u8]) -> u16 {
    ASH_CRC.checksum(data)
}

/// Checks a frame body whose last two bytes are the big-endian CRC.
pub fn verify(body: &[u8]) -> bool {
    if body.len() < 3 {
        return false;
    }
    let (covered, trailer) = body.split_at(body.len() - 2);
    crc16(covered) == u16::from_be_bytes([trailer[0], trailer[1]])
}
