/// Parse one raw line as a decimal integer record.
///
/// Surrounding whitespace (including the line terminator) is ignored. Anything
/// else that is not a valid `i64` yields `None` and the caller skips the line.
pub fn parse_record(line: &[u8]) -> Option<i64> {
    std::str::from_utf8(line).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_trimmed_integers() {
        assert_eq!(parse_record(b"42\n"), Some(42));
        assert_eq!(parse_record(b"  -7\r\n"), Some(-7));
        assert_eq!(parse_record(b"+3"), Some(3));
    }

    #[test]
    fn test_rejects_non_integers() {
        assert_eq!(parse_record(b""), None);
        assert_eq!(parse_record(b"   \n"), None);
        assert_eq!(parse_record(b"4.5\n"), None);
        assert_eq!(parse_record(b"abc\n"), None);
        assert_eq!(parse_record(b"99999999999999999999\n"), None);
        assert_eq!(parse_record(&[0xff, 0xfe, b'\n']), None);
    }
}
