//! Shell-style pattern matching for VFS listings. Supports `?`, `*`,
//! backslash escapes, and `[...]` classes with ranges and `!`/`^` inversion.

/// Returns true if `text` matches `pattern` in its entirety.
pub fn matches(pattern: &str, text: &str) -> bool {
    match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // Most recent `*` position, used to retry with a longer consumed prefix.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let stepped = if p < pattern.len() {
            match pattern[p] {
                b'?' => {
                    p += 1;
                    t += 1;
                    true
                }
                b'*' => {
                    star = Some((p + 1, t));
                    p += 1;
                    continue;
                }
                b'\\' => {
                    if pattern.get(p + 1) == Some(&text[t]) {
                        p += 2;
                        t += 1;
                        true
                    } else {
                        false
                    }
                }
                b'[' => match parse_class(&pattern[p..], text[t]) {
                    Some((consumed, true)) => {
                        p += consumed;
                        t += 1;
                        true
                    }
                    // An unterminated `[` loses outright.
                    Some((_, false)) | None => false,
                },
                literal => {
                    if literal == text[t] {
                        p += 1;
                        t += 1;
                        true
                    } else {
                        false
                    }
                }
            }
        } else {
            false
        };

        if !stepped {
            match star {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            }
        }
    }

    while pattern.get(p) == Some(&b'*') {
        p += 1;
    }

    p == pattern.len()
}

/// Matches `ch` against the `[...]` class at the start of `pattern`. Returns
/// the number of pattern bytes consumed and whether the class matched, or
/// `None` if the class is unterminated.
fn parse_class(pattern: &[u8], ch: u8) -> Option<(usize, bool)> {
    debug_assert_eq!(pattern.first(), Some(&b'['));
    let mut i = 1;

    let inverted = matches!(pattern.get(i), Some(b'!') | Some(b'^'));
    if inverted {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let c = *pattern.get(i)?;
        // A `]` in the first position is a literal member of the class.
        if c == b']' && !first {
            i += 1;
            break;
        }
        first = false;

        let start = if c == b'\\' {
            i += 1;
            *pattern.get(i)?
        } else {
            c
        };
        i += 1;

        let end = if pattern.get(i) == Some(&b'-') && pattern.get(i + 1).is_some_and(|&n| n != b']')
        {
            i += 1;
            let mut range_end = *pattern.get(i)?;
            if range_end == b'\\' {
                i += 1;
                range_end = *pattern.get(i)?;
            }
            i += 1;
            range_end
        } else {
            start
        };

        if ch >= start && ch <= end {
            matched = true;
        }
    }

    Some((i, matched != inverted))
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn literal_patterns() {
        assert!(matches("GLOBAL.BSA", "GLOBAL.BSA"));
        assert!(!matches("GLOBAL.BSA", "GLOBAL.BS"));
        assert!(!matches("GLOBAL.BS", "GLOBAL.BSA"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(matches("P?.IMG", "P1.IMG"));
        assert!(!matches("P?.IMG", "P.IMG"));
        assert!(!matches("P?.IMG", "P12.IMG"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(matches("*.IMG", "SLIDER.IMG"));
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
        assert!(!matches("*.IMG", "SLIDER.TXT"));
        assert!(matches("A*C", "ABBBC"));
        assert!(!matches("A*C", "ABBB"));
    }

    #[test]
    fn star_backtracks_past_false_matches() {
        // The first ".I" is not followed by "MG"; the matcher must retry.
        assert!(matches("*.IMG", "FOO.IMA.IMG"));
    }

    #[test]
    fn character_classes() {
        assert!(matches("P[123].IMG", "P2.IMG"));
        assert!(!matches("P[123].IMG", "P4.IMG"));
        assert!(matches("P[0-9].IMG", "P7.IMG"));
        assert!(matches("P[!0-9].IMG", "PX.IMG"));
        assert!(!matches("P[!0-9].IMG", "P7.IMG"));
        // Unterminated class never matches.
        assert!(!matches("P[0-9", "P7"));
    }

    #[test]
    fn escapes_strip_special_meaning() {
        assert!(matches("A\\*B", "A*B"));
        assert!(!matches("A\\*B", "AxB"));
    }
}
