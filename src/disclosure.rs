use crate::normalize::Guess;
use crate::table::{Entry, RankTable, SECRET_RANK};
use thiserror::Error;

/// Maximum number of words returned by [`closest_words()`]
pub(crate) const CLOSEST_LIMIT: usize = 200;

/// Returns the secret word.
///
/// No proof is required: this backs the "give up" flow, where the player
/// forfeits the game in exchange for the answer.
pub(crate) fn reveal_secret(table: &RankTable) -> Result<String, DisclosureError> {
    table
        .secret()
        .map(ToOwned::to_owned)
        .ok_or(DisclosureError::NoSecret)
}

/// Returns the [`CLOSEST_LIMIT`] best-ranked entries, secret word included,
/// in ascending order of rank.
///
/// `proof` must be the secret word, so that the table cannot be scraped
/// without solving the puzzle first.
pub(crate) fn closest_words(table: &RankTable, proof: &Guess) -> Result<Vec<Entry>, DisclosureError> {
    if table.evaluate(proof) != Some(SECRET_RANK) {
        return Err(DisclosureError::Unauthorized);
    }
    Ok(table.entries().iter().take(CLOSEST_LIMIT).cloned().collect())
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub(crate) enum DisclosureError {
    #[error("secret word not found")]
    NoSecret,
    #[error("the secret word has not been guessed yet")]
    Unauthorized,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table_from;
    use pretty_assertions::assert_eq;

    fn guess(s: &str) -> Guess {
        s.parse().unwrap()
    }

    #[test]
    fn test_reveal_secret() {
        let table = table_from([("chó", 2), ("mèo", 1), ("gà", 500)]);
        assert_eq!(reveal_secret(&table), Ok(String::from("mèo")));
        let table = table_from([("chó", 2)]);
        assert_eq!(reveal_secret(&table), Err(DisclosureError::NoSecret));
    }

    #[test]
    fn test_closest_requires_secret() {
        let table = table_from([("mèo", 1), ("chó", 2), ("gà", 500)]);
        for proof in ["chó", "gà", "meo", "không có"] {
            assert_eq!(
                closest_words(&table, &guess(proof)),
                Err(DisclosureError::Unauthorized),
                "{proof:?}"
            );
        }
    }

    #[test]
    fn test_closest_small_table() {
        let table = table_from([("gà", 500), ("mèo", 1), ("chó", 2)]);
        let words = closest_words(&table, &guess(" MÈO ")).unwrap();
        let pairs = words
            .iter()
            .map(|e| (e.word.as_str(), e.rank))
            .collect::<Vec<_>>();
        assert_eq!(pairs, [("mèo", 1), ("chó", 2), ("gà", 500)]);
    }

    #[test]
    fn test_closest_truncates() {
        let table =
            RankTable::new((1..=1000).map(|r| (format!("w{r}"), r)).collect()).unwrap();
        let words = closest_words(&table, &guess("w1")).unwrap();
        assert_eq!(words.len(), CLOSEST_LIMIT);
        assert_eq!(words[0].rank, 1);
        assert!(words.windows(2).all(|w| w[0].rank < w[1].rank));
        assert_eq!(words.last().map(|e| e.rank), Some(200));
    }

    #[test]
    fn test_closest_normalizes_proof() {
        let table = table_from([("hoá", 1), ("chất", 2)]);
        assert!(closest_words(&table, &guess("Hóa")).is_ok());
    }
}
