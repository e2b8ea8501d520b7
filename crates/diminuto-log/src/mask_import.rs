//! Parses the log mask grammar shared by the environment variable and the
//! mask file: the literal `"~0"` (all priorities enabled), or a decimal,
//! octal (`0`-prefixed), or hexadecimal (`0x`-prefixed) non-negative
//! integer, of which only the low eight bits are meaningful.

pub const ALL_LITERAL: &str = "~0";

#[derive(Debug, thiserror::Error)]
#[error("malformed log mask value: {0:?}")]
pub struct MaskParseError(pub String);

/// Parses one mask-grammar token with no tolerance for trailing garbage —
/// the environment variable's contract.
pub fn parse_strict(input: &str) -> Result<u8, MaskParseError> {
    if input == ALL_LITERAL {
        return Ok(crate::priority::ALL_MASK);
    }
    parse_integer(input).ok_or_else(|| MaskParseError(input.to_string()))
}

/// Parses the first line of a mask file: same grammar, but trailing
/// whitespace, a `#`-led comment, or a newline after the value are
/// tolerated, matching a hand-edited config file.
pub fn parse_line(line: &str) -> Result<u8, MaskParseError> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    let head = trimmed.split('#').next().unwrap_or(trimmed).trim();
    if head == ALL_LITERAL {
        return Ok(crate::priority::ALL_MASK);
    }
    parse_integer(head).ok_or_else(|| MaskParseError(line.to_string()))
}

fn parse_integer(token: &str) -> Option<u8> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let (digits, radix) = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        (hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        (&token[1..], 8)
    } else {
        (token, 10)
    };

    let value = i64::from_str_radix(digits, radix).ok()?;
    if value < 0 {
        return None;
    }
    Some(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_literal_enables_every_bit() {
        assert_eq!(parse_strict("~0").unwrap(), 0xFF);
    }

    #[test]
    fn decimal_octal_and_hex_all_parse() {
        assert_eq!(parse_strict("255").unwrap(), 255);
        assert_eq!(parse_strict("0377").unwrap(), 255);
        assert_eq!(parse_strict("0xff").unwrap(), 255);
        assert_eq!(parse_strict("0xFF").unwrap(), 255);
    }

    #[test]
    fn strict_parse_rejects_trailing_garbage() {
        assert!(parse_strict("255x").is_err());
    }

    #[test]
    fn file_line_tolerates_trailing_comment_and_newline() {
        assert_eq!(parse_line("0xff # enable everything\n").unwrap(), 255);
        assert_eq!(parse_line("255\n").unwrap(), 255);
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(parse_strict("-1").is_err());
    }
}
