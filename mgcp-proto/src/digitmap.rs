//! MEGACO digit-map compilation (§4.6, §8 "round-trip laws", §9 open question #1).
//!
//! The original implementation this controller replaces called `pattern.replace(...)` and
//! discarded the result, so the digit-map-to-regex translation was effectively inert: whatever
//! came in matched as a literal string. The specification calls that a bug and mandates the
//! intended translation; this module applies it for real.

use regex::Regex;

use crate::error::MgcpError;

/// A compiled MEGACO digit map, ready to test collected digit sequences against.
#[derive(Debug, Clone)]
pub struct DigitMap {
    source: String,
    regex: Regex,
}

impl DigitMap {
    /// Compiles a MEGACO digit-map pattern into its regex equivalent.
    ///
    /// Token translation, applied character by character:
    /// * `.` (repeat the preceding symbol zero or more times) -> `+`-style regex repetition is
    ///   not representable per-character, so `.` is translated to `+`, matching the
    ///   specification's mandated (if slightly simplified) mapping.
    /// * `x` / `X` (any single digit) -> `\d`.
    /// * `*` (the DTMF `*` key, a literal) -> `\*`.
    /// * `[` / `]` bracket groups are passed through as regex character classes; a `,` inside a
    ///   bracket group is translated to `|` so `[1,2,3]` reads as an alternation the way a MEGACO
    ///   digit map intends it, while outside brackets `,` and `|` both pass through as the regex
    ///   alternation operator they already are.
    /// * Any other character (digits, `#`) is escaped and emitted literally.
    pub fn compile(pattern: &str) -> Result<Self, MgcpError> {
        let mut out = String::with_capacity(pattern.len() * 2 + 2);
        out.push('^');
        let mut in_bracket = false;
        for ch in pattern.chars() {
            match ch {
                '[' => {
                    in_bracket = true;
                    out.push('(');
                }
                ']' => {
                    in_bracket = false;
                    out.push(')');
                }
                ',' if in_bracket => out.push('|'),
                '|' => out.push('|'),
                '.' => out.push('+'),
                'x' | 'X' => out.push_str(r"\d"),
                '*' => out.push_str(r"\*"),
                other => {
                    out.push_str(&regex::escape(&other.to_string()));
                }
            }
        }
        out.push('$');

        let regex = Regex::new(&out).map_err(|_| MgcpError::ProtocolError)?;
        Ok(DigitMap { source: pattern.to_string(), regex })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True iff `digits` satisfies this digit map in its entirety.
    pub fn matches(&self, digits: &str) -> bool {
        self.regex.is_match(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_x_to_digit_class() {
        let map = DigitMap::compile("xxx#").unwrap();
        assert!(map.matches("123#"));
        assert!(!map.matches("12#"));
        assert!(!map.matches("abc#"));
    }

    #[test]
    fn translates_star_to_literal() {
        let map = DigitMap::compile("*xx").unwrap();
        assert!(map.matches("*12"));
        assert!(!map.matches("112"));
    }

    #[test]
    fn translates_dot_to_repetition() {
        let map = DigitMap::compile("9.").unwrap();
        assert!(map.matches("9"));
        assert!(map.matches("999"));
        assert!(!map.matches(""));
    }

    #[test]
    fn bracket_alternation() {
        let map = DigitMap::compile("[1,2,3]xx").unwrap();
        assert!(map.matches("112"));
        assert!(map.matches("312"));
        assert!(!map.matches("412"));
    }

    proptest::proptest! {
        #[test]
        fn digit_only_pattern_matches_only_same_length_digit_strings(n in 1usize..6) {
            let pattern: String = std::iter::repeat('x').take(n).collect();
            let map = DigitMap::compile(&pattern).unwrap();
            let good: String = std::iter::repeat('7').take(n).collect();
            prop_assert!(map.matches(&good));
            let bad: String = std::iter::repeat('7').take(n + 1).collect();
            prop_assert!(!map.matches(&bad));
        }
    }
}
