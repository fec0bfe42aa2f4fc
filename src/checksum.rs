//! Frame checksums for the two links.
//!
//! Both functions take a complete frame, checksum byte and end marker
//! included, and compute what the checksum byte should be.

/// Additive checksum of a control frame.
///
/// Sum modulo 256 of every byte from the start marker up to, but not
/// including, the checksum byte (`frame[0 .. len-3]`). Returns 0 for
/// frames shorter than 4 bytes.
pub fn control_checksum(frame: &[u8]) -> u8 {
    if frame.len() < 4 {
        return 0;
    }
    control_sum(&frame[..frame.len() - 3])
}

/// XOR checksum of a device frame.
///
/// Running XOR of `frame[2 .. len-2]`, i.e. from the length field up to the
/// byte before the checksum. Returns 0 for frames shorter than 4 bytes.
pub fn device_checksum(frame: &[u8]) -> u8 {
    if frame.len() < 4 {
        return 0;
    }
    device_xor(&frame[2..frame.len() - 2])
}

pub(crate) fn control_sum(data: &[u8]) -> u8 {
    data.iter().fold(0, |sum, byte| sum.wrapping_add(*byte))
}

pub(crate) fn device_xor(data: &[u8]) -> u8 {
    data.iter().fold(0, |xor, byte| xor ^ *byte)
}
