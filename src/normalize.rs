use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Tone marks typed over the first vowel of an "oa", "uy", or "ui" cluster,
/// paired with the spelling used by the rank tables.  No output contains the
/// start of any pattern, so a single pass is enough.
static TONE_FIXES: [(&str, &str); 15] = [
    ("óa", "oá"),
    ("òa", "oà"),
    ("ỏa", "oả"),
    ("õa", "oã"),
    ("ọa", "oạ"),
    ("úy", "uý"),
    ("ùy", "uỳ"),
    ("ủy", "uỷ"),
    ("ũy", "uỹ"),
    ("ụy", "uỵ"),
    ("úi", "uí"),
    ("ùi", "uì"),
    ("ủi", "uỉ"),
    ("ũi", "uĩ"),
    ("ụi", "uị"),
];

/// Canonicalize raw user input for rank-table lookup.
///
/// The text is trimmed, lowercased, and composed to NFC, and then any
/// misplaced tone marks listed in `TONE_FIXES` are moved to the vowel the
/// tables expect.  Missing diacritics are not restored: "meo" stays "meo".
pub(crate) fn normalize(text: &str) -> String {
    let mut s = text.trim().to_lowercase().nfc().collect::<String>();
    for (wrong, right) in TONE_FIXES {
        if s.contains(wrong) {
            s = s.replace(wrong, right);
        }
    }
    s
}

/// A normalized, nonempty guess
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Guess(String);

impl AsRef<str> for Guess {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl std::fmt::Display for Guess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Guess {
    type Err = ParseGuessError;

    fn from_str(s: &str) -> Result<Guess, ParseGuessError> {
        let s = normalize(s);
        if s.is_empty() {
            Err(ParseGuessError)
        } else {
            Ok(Guess(s))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("guesses cannot be empty or all-whitespace")]
pub(crate) struct ParseGuessError;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trim_and_lowercase() {
        assert_eq!(normalize("  Mèo \n"), "mèo");
        assert_eq!(normalize("HÒA BÌNH"), "hoà bình");
    }

    #[test]
    fn test_tone_fixes() {
        assert_eq!(normalize("hóa"), "hoá");
        assert_eq!(normalize("thủy"), "thuỷ");
        assert_eq!(normalize("túi"), "tuí");
        assert_eq!(normalize("khỏa thân"), "khoả thân");
        assert_eq!(normalize("thủy họa"), "thuỷ hoạ");
    }

    #[test]
    fn test_already_canonical_passes_through() {
        for word in ["hoá", "thuỷ", "chó", "gà", "xin chào", "meo"] {
            assert_eq!(normalize(word), word);
        }
    }

    #[test]
    fn test_decomposed_input() {
        // "o" followed by a combining acute accent
        let decomposed = "ho\u{301}a";
        assert_eq!(normalize(decomposed), "hoá");
    }

    #[test]
    fn test_missing_diacritics_are_not_restored() {
        assert_eq!(normalize("meo"), "meo");
        assert_ne!(normalize("meo"), normalize("mèo"));
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "   ",
            "HÓA",
            "Thủy Tinh",
            "tủi thân",
            "ho\u{301}a",
            "óóa",
            "ụyụy",
            "quả táo",
            "ÀÁẠẢÃ ÙÚỤỦŨ",
            "İstanbul",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "normalize not idempotent on {s:?}");
        }
    }

    #[test]
    fn test_parse_guess() {
        let guess = " Hóa ".parse::<Guess>().unwrap();
        assert_eq!(guess.as_ref(), "hoá");
        assert_eq!("".parse::<Guess>(), Err(ParseGuessError));
        assert_eq!(" \t ".parse::<Guess>(), Err(ParseGuessError));
    }
}
