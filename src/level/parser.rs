//! Level name parsing.
//!
//! Matching is case-insensitive and exact against the six canonical names.
//! Anything else, including empty or padded input, is unrecognized.

use crate::level::severity::Severity;

/// Map a level name to a [`Severity`], or `None` if it is not recognized.
pub fn parse_level(text: &str) -> Option<Severity> {
    Severity::ALL
        .into_iter()
        .find(|level| text.eq_ignore_ascii_case(level.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_any_case() {
        for level in Severity::ALL {
            let name = level.name();
            assert_eq!(parse_level(name), Some(level));
            assert_eq!(parse_level(&name.to_uppercase()), Some(level));
            assert_eq!(parse_level(&name.to_lowercase()), Some(level));
        }
        assert_eq!(parse_level("wArNiNg"), Some(Severity::Warning));
    }

    #[test]
    fn test_unrecognized() {
        for text in ["", "   ", "bogus", "Info", "Verbose", " Warning", "Error\n", "Fatal!"] {
            assert_eq!(parse_level(text), None, "{:?} should not parse", text);
        }
    }

    #[test]
    fn test_from_str_error_carries_input() {
        let err = "loud".parse::<Severity>().unwrap_err();
        assert_eq!(err.0, "loud");
    }
}
