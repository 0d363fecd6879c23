//! Small helpers with no hardware dependencies.

const CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Bitwise CRC-32 over `data`, fed LSB-first without final reflection.
///
/// Only used to derive multicast hash-table slots when the filter set
/// changes, so there is no point in a table-driven variant.
pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        let mut b = byte as u32;
        for _ in 0..8 {
            if (b & 1) ^ (crc >> 31) != 0 {
                crc = (crc << 1) ^ CRC_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            b >>= 1;
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_distinguishes_addresses() {
        let a = crc32(&[0x01, 0x00, 0x5E, 0x00, 0x00, 0x01]);
        let b = crc32(&[0x01, 0x00, 0x5E, 0x00, 0x00, 0x02]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_crc32_is_stable() {
        let addr = [0x01, 0x00, 0x5E, 0x7F, 0xFF, 0xFA];
        assert_eq!(crc32(&addr), crc32(&addr));
    }
}
