//! Text frame scripts for the simulated sensor array.
//!
//! One frame per line in any spelling `SensorFrame` accepts, optionally
//! followed by `*N` to repeat it. Blank lines and `#` comments are skipped.
//!
//! ```text
//! # straight, then drift right
//! 00100 *20
//! 00110 *5
//! ```

use std::path::Path;

use tracer_traits::SensorFrame;

use crate::error::{HwError, Result};

/// Upper bound on `*N` so a typo cannot allocate without limit.
pub const MAX_REPEAT: usize = 100_000;

pub fn parse_script(text: &str) -> Result<Vec<SensorFrame>> {
    let mut frames = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (frame_txt, repeat) = match line.split_once('*') {
            Some((f, n)) => {
                let n: usize = n.trim().parse().map_err(|_| {
                    HwError::Script(format!("line {line_no}: invalid repeat count {:?}", n.trim()))
                })?;
                if n == 0 || n > MAX_REPEAT {
                    return Err(HwError::Script(format!(
                        "line {line_no}: repeat count must be in 1..={MAX_REPEAT}"
                    )));
                }
                (f.trim(), n)
            }
            None => (line, 1),
        };
        let frame: SensorFrame = frame_txt
            .parse()
            .map_err(|e| HwError::Script(format!("line {line_no}: {e}")))?;
        frames.extend(std::iter::repeat_n(frame, repeat));
    }
    if frames.is_empty() {
        return Err(HwError::Script("script contains no frames".into()));
    }
    Ok(frames)
}

pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<SensorFrame>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_script(&text)
}

/// A short course exercising straight running, drift correction, a hard
/// right corner and a gap.
pub const BUILTIN_COURSE: &str = "\
# straight
00100 *40
# drift right and recover
00110 *10
00010 *5
00110 *5
00100 *20
# drift left
01100 *8
01000 *4
00100 *20
# hard right corner, then the line vanishes briefly
00011 *3
00001 *3
00000 *4
00100 *30
";

pub fn builtin_course() -> Vec<SensorFrame> {
    // The constant is covered by tests; fall back to a centered line if it ever breaks.
    parse_script(BUILTIN_COURSE).unwrap_or_else(|_| vec![SensorFrame::from_bits([0, 0, 1, 0, 0])])
}
