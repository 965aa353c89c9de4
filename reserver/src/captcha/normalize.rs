/// Turns raw OCR text into the 4-digit code the portal expects.
///
/// Non-digits are dropped. The recognizer tends to lose a leading zero, so a
/// 3-digit read is zero-padded; any other length is a failed read.
pub fn normalize_code(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        4 => Some(digits),
        3 => Some(format!("0{digits}")),
        _ => None,
    }
}
