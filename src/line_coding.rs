//! CDC line coding
//!
//! The line coding is the 7-byte record exchanged by the class-specific
//! SET_LINE_CODING and GET_LINE_CODING requests:
//!
//! | Offset | Field         | Size |
//! |--------|---------------|------|
//! | 0      | `dwDTERate`   | 4    |
//! | 4      | `bCharFormat` | 1    |
//! | 5      | `bParityType` | 1    |
//! | 6      | `bDataBits`   | 1    |

/// Size of the encoded line coding
pub const LINE_CODING_SIZE: usize = 7;

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum StopBits {
    One = 0,
    OnePointFive = 1,
    Two = 2,
}

/// Parity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
    Mark = 3,
    Space = 4,
}

/// Data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum DataBits {
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Sixteen = 16,
}

/// Asynchronous line settings of the remote UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct LineCoding {
    /// Data terminal rate, in bits per second
    pub baud_rate: u32,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub data_bits: DataBits,
}

impl LineCoding {
    /// 115200 baud, 8 data bits, no parity, 1 stop bit
    pub const fn new() -> Self {
        LineCoding {
            baud_rate: 115_200,
            stop_bits: StopBits::One,
            parity: Parity::None,
            data_bits: DataBits::Eight,
        }
    }

    /// Encode the line coding for a SET_LINE_CODING data stage
    pub fn to_bytes(&self) -> [u8; LINE_CODING_SIZE] {
        let rate = self.baud_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits as u8,
            self.parity as u8,
            self.data_bits as u8,
        ]
    }

    /// Decode a GET_LINE_CODING data stage
    ///
    /// Returns `None` if the buffer is short, or if a field holds a value
    /// the CDC specification doesn't define.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; LINE_CODING_SIZE] = bytes.get(..LINE_CODING_SIZE)?.try_into().ok()?;
        let stop_bits = match bytes[4] {
            0 => StopBits::One,
            1 => StopBits::OnePointFive,
            2 => StopBits::Two,
            _ => return None,
        };
        let parity = match bytes[5] {
            0 => Parity::None,
            1 => Parity::Odd,
            2 => Parity::Even,
            3 => Parity::Mark,
            4 => Parity::Space,
            _ => return None,
        };
        let data_bits = match bytes[6] {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            16 => DataBits::Sixteen,
            _ => return None,
        };
        Some(LineCoding {
            baud_rate: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            stop_bits,
            parity,
            data_bits,
        })
    }

    /// Returns the number of bits on the wire for one character
    ///
    /// Counts the start bit, data bits, parity bit, and stop bits. One and a
    /// half stop bits round up to two.
    pub fn bits_per_character(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            _ => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::OnePointFive | StopBits::Two => 2,
        };
        1 + self.data_bits as u32 + parity + stop
    }

    /// Returns the time, in microseconds, to move one character at this baud rate
    ///
    /// Rounds up. A zero baud rate is treated as 1 bit per second.
    pub fn byte_time_us(&self) -> u32 {
        let bits = self.bits_per_character() as u64 * 1_000_000;
        let rate = self.baud_rate.max(1) as u64;
        ((bits + rate - 1) / rate).min(u32::MAX as u64) as u32
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::{DataBits, LineCoding, Parity, StopBits};

    #[test]
    fn encode() {
        let coding = LineCoding {
            baud_rate: 9600,
            stop_bits: StopBits::Two,
            parity: Parity::Even,
            data_bits: DataBits::Seven,
        };
        assert_eq!(coding.to_bytes(), [0x80, 0x25, 0, 0, 2, 2, 7]);
    }

    #[test]
    fn decode() {
        let coding = LineCoding::from_bytes(&[0x00, 0xC2, 0x01, 0x00, 0, 0, 8]).unwrap();
        assert_eq!(coding, LineCoding::new());
    }

    #[test]
    fn decode_rejects_unknown_fields() {
        assert!(LineCoding::from_bytes(&[0, 0, 0, 0, 3, 0, 8]).is_none());
        assert!(LineCoding::from_bytes(&[0, 0, 0, 0, 0, 5, 8]).is_none());
        assert!(LineCoding::from_bytes(&[0, 0, 0, 0, 0, 0, 9]).is_none());
        assert!(LineCoding::from_bytes(&[0, 0, 0, 0, 0, 0]).is_none());
    }

    #[test]
    fn byte_time() {
        // 10 bits at 115200 baud is 86.8us
        assert_eq!(LineCoding::new().byte_time_us(), 87);

        let slow = LineCoding {
            baud_rate: 9600,
            stop_bits: StopBits::Two,
            parity: Parity::Odd,
            data_bits: DataBits::Eight,
        };
        assert_eq!(slow.bits_per_character(), 12);
        assert_eq!(slow.byte_time_us(), 1250);
    }
}
