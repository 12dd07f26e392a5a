use std::fmt;
use std::str::FromStr;

/// Number of line-presence channels in the sensor array.
pub const SENSOR_COUNT: usize = 5;

/// One sample of the sensor array, leftmost channel first. `true` = line seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SensorFrame([bool; SENSOR_COUNT]);

impl SensorFrame {
    /// Frame with no channel seeing the line.
    pub const BLANK: SensorFrame = SensorFrame([false; SENSOR_COUNT]);

    #[inline]
    pub const fn new(channels: [bool; SENSOR_COUNT]) -> Self {
        Self(channels)
    }

    /// Build from 0/1 values; any non-zero value counts as "line".
    #[inline]
    pub fn from_bits(bits: [u8; SENSOR_COUNT]) -> Self {
        Self(bits.map(|b| b != 0))
    }

    #[inline]
    pub fn channels(&self) -> [bool; SENSOR_COUNT] {
        self.0
    }

    #[inline]
    pub fn is_active(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|&&c| c).count()
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.active_count() == 0
    }
}

impl From<[bool; SENSOR_COUNT]> for SensorFrame {
    fn from(channels: [bool; SENSOR_COUNT]) -> Self {
        Self(channels)
    }
}

impl fmt::Display for SensorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(if *c { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Error returned when a textual frame cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFrameError(String);

impl fmt::Display for ParseFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sensor frame: {}", self.0)
    }
}

impl std::error::Error for ParseFrameError {}

impl FromStr for SensorFrame {
    type Err = ParseFrameError;

    /// Accepts `10000`, `1 0 0 0 0` and `1,0,0,0,0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<char> = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if digits.len() != SENSOR_COUNT {
            return Err(ParseFrameError(format!(
                "expected {SENSOR_COUNT} channels, got {} in {s:?}",
                digits.len()
            )));
        }
        let mut out = [false; SENSOR_COUNT];
        for (slot, ch) in out.iter_mut().zip(digits) {
            *slot = match ch {
                '0' => false,
                '1' => true,
                other => {
                    return Err(ParseFrameError(format!("unexpected character {other:?}")));
                }
            };
        }
        Ok(Self(out))
    }
}
