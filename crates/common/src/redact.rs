/// Minimum digit count for a run to be treated as a phone number.
const MIN_PHONE_DIGITS: usize = 7;

/// Replace phone-number-shaped substrings in error text with `[redacted]`.
///
/// Provider error messages routinely echo the destination number back
/// ("invalid recipient +31612345678"); stored and operator-visible error
/// text must not carry it. A run counts as phone-shaped when it contains at
/// least seven digits, allowing the usual separators (`+`, `-`, `(`, `)`,
/// spaces) in between.
pub fn redact_phone_numbers(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() || c == '+' || c == '(' {
            // Scan forward over digits and separators
            let mut j = i;
            let mut digits = 0;
            let mut last_digit_end = i;
            while j < chars.len() {
                let d = chars[j];
                if d.is_ascii_digit() {
                    digits += 1;
                    last_digit_end = j + 1;
                    j += 1;
                } else if matches!(d, '+' | '-' | '(' | ')' | ' ') {
                    j += 1;
                } else {
                    break;
                }
            }
            if digits >= MIN_PHONE_DIGITS {
                out.push_str("[redacted]");
                // Separators scanned past the last digit stay in the text
                i = last_digit_end;
            } else {
                for k in i..j {
                    out.push(chars[k]);
                }
                i = j;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_international_number() {
        assert_eq!(
            redact_phone_numbers("invalid recipient +31612345678"),
            "invalid recipient [redacted]"
        );
    }

    #[test]
    fn test_redacts_number_with_separators() {
        assert_eq!(
            redact_phone_numbers("sent to (06) 12-34-56-78 failed"),
            "sent to [redacted] failed"
        );
    }

    #[test]
    fn test_keeps_short_digit_runs() {
        assert_eq!(
            redact_phone_numbers("HTTP 503 after 3 attempts"),
            "HTTP 503 after 3 attempts"
        );
    }

    #[test]
    fn test_keeps_surrounding_text() {
        assert_eq!(
            redact_phone_numbers("gateway said: 0612345678 rejected (code 21)"),
            "gateway said: [redacted] rejected (code 21)"
        );
    }

    #[test]
    fn test_empty_and_plain_text() {
        assert_eq!(redact_phone_numbers(""), "");
        assert_eq!(redact_phone_numbers("timeout"), "timeout");
    }
}
