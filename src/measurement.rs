use std::fmt;

const FLAG_VALUE_FORMAT_U16: u8 = 0x01;

/// Latest heart rate reading as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measurement {
    /// Nothing received yet, or the session was torn down
    #[default]
    NoData,
    Bpm(u16),
    /// The payload was too short for the format its flags announced
    Invalid,
}

impl Measurement {
    pub fn bpm(&self) -> Option<u16> {
        match self {
            Measurement::Bpm(bpm) => Some(*bpm),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Measurement::Bpm(_))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Bpm(bpm) if *bpm != 0 => write!(f, "{bpm}"),
            _ => f.write_str("--"),
        }
    }
}

/// Decode a Heart Rate Measurement value.
///
/// Bit 0 of the flags byte selects between a u8 and a little-endian u16 rate at
/// offset 1. Anything after the rate (energy expended, RR intervals) is ignored.
pub fn decode_heart_rate(value: &[u8]) -> Measurement {
    let Some((&flags, rest)) = value.split_first() else {
        return Measurement::Invalid;
    };

    if flags & FLAG_VALUE_FORMAT_U16 != 0 {
        match rest {
            [lo, hi, ..] => Measurement::Bpm(u16::from_le_bytes([*lo, *hi])),
            _ => Measurement::Invalid,
        }
    } else {
        match rest.first() {
            Some(bpm) => Measurement::Bpm(u16::from(*bpm)),
            None => Measurement::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_u8_format() {
        for bpm in [0u8, 1, 72, 180, 255] {
            assert_eq!(decode_heart_rate(&[0x00, bpm]), Measurement::Bpm(bpm as u16));
        }
    }

    #[test]
    fn decodes_u16_format() {
        for bpm in [0u16, 255, 256, 300, 0xABCD, u16::MAX] {
            let [lo, hi] = bpm.to_le_bytes();
            assert_eq!(decode_heart_rate(&[0x01, lo, hi]), Measurement::Bpm(bpm));
        }
    }

    #[test]
    fn only_bit_zero_selects_format() {
        // sensor contact bits set, still 8-bit
        assert_eq!(decode_heart_rate(&[0x06, 64, 0xFF]), Measurement::Bpm(64));
        // RR interval flag plus 16-bit rate
        assert_eq!(decode_heart_rate(&[0x11, 0x48, 0x00, 0x10, 0x03]), Measurement::Bpm(72));
    }

    #[test]
    fn truncated_payloads_are_invalid() {
        assert_eq!(decode_heart_rate(&[]), Measurement::Invalid);
        assert_eq!(decode_heart_rate(&[0x00]), Measurement::Invalid);
        assert_eq!(decode_heart_rate(&[0x01]), Measurement::Invalid);
        assert_eq!(decode_heart_rate(&[0x01, 0x48]), Measurement::Invalid);
    }

    #[test]
    fn arbitrary_buffers_never_panic() {
        let mut seed: u32 = 0x1234_5678;
        for len in 0..64 {
            let buf: Vec<u8> = (0..len)
                .map(|_| {
                    seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (seed >> 24) as u8
                })
                .collect();
            let _ = decode_heart_rate(&buf);
        }
    }

    #[test]
    fn display_hides_missing_values() {
        assert_eq!(Measurement::Bpm(72).to_string(), "72");
        assert_eq!(Measurement::Bpm(0).to_string(), "--");
        assert_eq!(Measurement::NoData.to_string(), "--");
        assert_eq!(Measurement::Invalid.to_string(), "--");
        assert_eq!(Measurement::Invalid.bpm(), None);
        assert!(!Measurement::NoData.is_valid());
    }
}
