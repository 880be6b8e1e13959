//! CRC-16/XMODEM (CCITT polynomial 0x1021, initial value 0, MSB first).

/// Generator polynomial.
pub const POLY: u16 = 0x1021;

/// Compute the block checksum over `data`.
///
/// Plain bit-at-a-time division, eight shift/XOR steps per byte.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut rem: u16 = 0;
    for &byte in data {
        rem ^= u16::from(byte) << 8;
        for _ in 0..8 {
            rem = if rem & 0x8000 != 0 {
                (rem << 1) ^ POLY
            } else {
                rem << 1
            };
        }
    }
    rem
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Table-driven reference, built independently of `crc16_xmodem`.
    fn reference(data: &[u8]) -> u16 {
        let mut table = [0u16; 256];
        for (i, slot) in table
            .iter_mut()
            .enumerate()
        {
            let mut c = u16::try_from(i).unwrap() << 8;
            for _ in 0..8 {
                c = if c & 0x8000 != 0 { (c << 1) ^ POLY } else { c << 1 };
            }
            *slot = c;
        }
        data.iter()
            .fold(0u16, |crc, &b| {
                (crc << 8) ^ table[usize::from((crc >> 8) as u8 ^ b)]
            })
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_known_128_byte_blocks() {
        assert_eq!(crc16_xmodem(&[0x00; 128]), 0x0000);
        assert_eq!(crc16_xmodem(&[0xFF; 128]), 0xEDA9);

        let ramp: Vec<u8> = (0..128u8).collect();
        assert_eq!(crc16_xmodem(&ramp), 0xE80A);

        let mut padded = vec![0x42; 100];
        padded.resize(128, 0xFF);
        assert_eq!(crc16_xmodem(&padded), 0x634B);
    }

    #[test]
    fn test_matches_table_reference() {
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..64 {
            let block: Vec<u8> = (0..128)
                .map(|_| {
                    seed = seed
                        .wrapping_mul(1_103_515_245)
                        .wrapping_add(12345);
                    (seed >> 16) as u8
                })
                .collect();
            assert_eq!(crc16_xmodem(&block), reference(&block));
        }
    }

    #[test]
    fn test_deterministic() {
        let block = [0xA5; 128];
        assert_eq!(crc16_xmodem(&block), crc16_xmodem(&block));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16_xmodem(&[]), 0);
    }
}
