//! Test-file CSV parsing
//!
//! Line 1 is a header and is ignored. Every following line is
//! comma-separated with the reading in column 1. Only empty lines are
//! dropped, so a blank-looking first line still counts as the header.
//! A reading is the leading decimal number of its cell (`2.5kg` reads as
//! 2.5). Rows without one are skipped, so the output may be shorter than
//! the file.

/// Header written by [`render`]
pub const DEFAULT_HEADER: &str = "Cell,Value";

/// Parse a test file into its readings
pub fn parse(text: &str) -> Vec<f64> {
    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() <= 1 {
        return Vec::new();
    }
    lines[1..]
        .iter()
        .filter_map(|line| line.split(',').nth(1))
        .filter_map(leading_number)
        .filter(|v| v.is_finite())
        .collect()
}

/// Leading decimal number of a cell, ignoring whatever trails it
fn leading_number(cell: &str) -> Option<f64> {
    let text = cell.trim_start();
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(&bytes[exp..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    text[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Write readings in the test-file layout, 1-based cell numbers in column 0
pub fn render(values: &[f64]) -> String {
    let mut out = String::with_capacity(16 + values.len() * 12);
    out.push_str(DEFAULT_HEADER);
    out.push('\n');
    for (idx, value) in values.iter().enumerate() {
        out.push_str(&format!("{},{}\n", idx + 1, value));
    }
    out
}
