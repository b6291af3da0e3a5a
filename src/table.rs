use crate::normalize::Guess;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use thiserror::Error;

/// The rank of a game's secret word
pub(crate) const SECRET_RANK: u32 = 1;

/// A word in a rank table together with its rank
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub(crate) struct Entry {
    pub(crate) word: String,
    pub(crate) rank: u32,
}

/// A read-only mapping from normalized words to their closeness ranks.
///
/// Lookups by word go through `ranks`; anything that needs the words in rank
/// order (closest words, rank bands) uses `entries`, which holds the same
/// pairs sorted by ascending rank.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RankTable {
    ranks: HashMap<String, u32>,
    entries: Vec<Entry>,
    secret: Option<String>,
}

impl RankTable {
    /// Build a table from a word→rank mapping.
    ///
    /// Fails if any word has rank 0 or more than one word has rank 1.  A
    /// mapping with no rank-1 word is accepted; such a table simply has no
    /// secret word to reveal.
    pub(crate) fn new(ranks: HashMap<String, u32>) -> Result<RankTable, TableError> {
        let mut secret = None;
        for (word, &rank) in &ranks {
            if rank == 0 {
                return Err(TableError::ZeroRank(word.clone()));
            }
            if rank == SECRET_RANK {
                if secret.is_some() {
                    return Err(TableError::DuplicateSecret);
                }
                secret = Some(word.clone());
            }
        }
        let mut entries = ranks
            .iter()
            .map(|(word, &rank)| Entry {
                word: word.clone(),
                rank,
            })
            .collect::<Vec<_>>();
        entries.sort_unstable_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.word.cmp(&b.word)));
        Ok(RankTable {
            ranks,
            entries,
            secret,
        })
    }

    /// Returns the rank of `word`, which must already be normalized
    pub(crate) fn rank(&self, word: &str) -> Option<u32> {
        self.ranks.get(word).copied()
    }

    /// Returns the rank of a guess, or `None` if the word is not ranked
    pub(crate) fn evaluate(&self, guess: &Guess) -> Option<u32> {
        self.rank(guess.as_ref())
    }

    /// Returns the word with rank 1, if there is one
    pub(crate) fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Returns true iff `word` is the secret word
    pub(crate) fn is_secret(&self, word: &str) -> bool {
        self.secret.as_deref() == Some(word)
    }

    /// Returns all entries sorted by ascending rank
    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the entries whose ranks lie in `ranks`, sorted by ascending
    /// rank
    pub(crate) fn entries_in(&self, ranks: RangeInclusive<u32>) -> &[Entry] {
        let start = self.entries.partition_point(|e| e.rank < *ranks.start());
        let end = self.entries.partition_point(|e| e.rank <= *ranks.end());
        self.entries.get(start..end).unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum TableError {
    #[error("word {0:?} has rank 0; ranks start at 1")]
    ZeroRank(String),
    #[error("more than one word has rank 1")]
    DuplicateSecret,
}

/// Everything loaded from a game's artifact file
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "RawGameData")]
pub(crate) struct GameData {
    pub(crate) table: RankTable,
    /// Predefined hint ranks, in the order they were authored; may be empty
    pub(crate) hints: Vec<u32>,
}

/// On-disk layout of a game artifact
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct RawGameData {
    rank_map: HashMap<String, u32>,
    #[serde(default)]
    hints: Option<Vec<u32>>,
}

impl TryFrom<RawGameData> for GameData {
    type Error = TableError;

    fn try_from(raw: RawGameData) -> Result<GameData, TableError> {
        Ok(GameData {
            table: RankTable::new(raw.rank_map)?,
            hints: raw.hints.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
pub(crate) fn table_from<const N: usize>(pairs: [(&str, u32); N]) -> RankTable {
    RankTable::new(
        pairs
            .into_iter()
            .map(|(w, r)| (w.to_owned(), r))
            .collect(),
    )
    .unwrap()
}
