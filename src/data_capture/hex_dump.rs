//! Canonical hex dump rendering for the annotated text log.
//!
//! Each line covers 16 bytes: an 8-digit hex offset, the bytes in two
//! groups of eight, then the printable ASCII rendering between `|` bars.
//!
//! ```text
//! 00000000  50 49 4e 47                                       |PING|
//! ```

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;
/// Width of the hex area: 16 × "xx " plus the two group separators.
const HEX_COLUMN_WIDTH: usize = BYTES_PER_LINE * 3 + 2;

/// Renders `data` as a multi-line hex dump, offsets starting at zero.
/// Returns an empty string for empty input.
pub fn hex_dump(data: &[u8]) -> String {
    let lines = data.len().div_ceil(BYTES_PER_LINE);
    let mut out = String::with_capacity(lines * (10 + HEX_COLUMN_WIDTH + BYTES_PER_LINE + 3));
    let mut hex = String::with_capacity(HEX_COLUMN_WIDTH);

    for (line, row) in data.chunks(BYTES_PER_LINE).enumerate() {
        hex.clear();
        for (i, byte) in row.iter().enumerate() {
            let _ = write!(hex, "{:02x} ", byte);
            if i == 7 || i == 15 {
                hex.push(' ');
            }
        }
        let _ = write!(
            out,
            "{:08x}  {:<width$}|",
            line * BYTES_PER_LINE,
            hex,
            width = HEX_COLUMN_WIDTH
        );
        out.extend(row.iter().map(|&b| printable(b)));
        out.push_str("|\n");
    }
    out
}

fn printable(byte: u8) -> char {
    if (0x20..=0x7e).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}
