use crate::table::{Entry, RankTable};
use rand::{seq::IndexedRandom, Rng};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Band of ranks from which a hint is drawn when the player has not yet
/// found any ranked word
const OPENING_BAND: RankBand = RankBand::new(1000, 2000);

/// Once the player's best rank exceeds the first element of a pair, hints are
/// drawn from the second element.  Checked in order; the first match wins.
static BANDS: [(u32, RankBand); 13] = [
    (1000, RankBand::new(700, 1000)),
    (700, RankBand::new(500, 700)),
    (500, RankBand::new(350, 500)),
    (350, RankBand::new(250, 350)),
    (250, RankBand::new(180, 250)),
    (180, RankBand::new(130, 180)),
    (130, RankBand::new(90, 130)),
    (90, RankBand::new(60, 90)),
    (60, RankBand::new(40, 60)),
    (40, RankBand::new(25, 40)),
    (25, RankBand::new(15, 25)),
    (15, RankBand::new(8, 15)),
    (7, RankBand::new(3, 7)),
];

/// Best ranks at or below this value get no more hints
const CLOSEST_HINTABLE: u32 = 2;

/// An inclusive range of ranks
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct RankBand {
    low: u32,
    high: u32,
}

impl RankBand {
    const fn new(low: u32, high: u32) -> RankBand {
        RankBand { low, high }
    }

    /// Select the band to draw the next hint from, given the best rank the
    /// player has reached so far.
    ///
    /// Returns `None` if the player is too close to the secret word to be
    /// given another hint.  Between [`CLOSEST_HINTABLE`] (exclusive) and 7
    /// (inclusive), the band is the single rank one better than
    /// `lowest_rank`.
    pub(crate) fn for_lowest_rank(lowest_rank: Option<u32>) -> Option<RankBand> {
        let Some(lowest) = lowest_rank else {
            return Some(OPENING_BAND);
        };
        if lowest <= CLOSEST_HINTABLE {
            return None;
        }
        let band = BANDS
            .iter()
            .find(|&&(threshold, _)| lowest > threshold)
            .map_or(RankBand::new(lowest - 1, lowest - 1), |&(_, band)| band);
        Some(band)
    }

    pub(crate) fn ranks(self) -> RangeInclusive<u32> {
        self.low..=self.high
    }

    /// Ranks to fall back to when no word lies in the band: from the band's
    /// midpoint up to one and a half times its upper bound
    pub(crate) fn widened(self) -> RangeInclusive<u32> {
        let start = (self.low + self.high).div_ceil(2);
        let end = self.high.saturating_mul(3) / 2;
        start..=end
    }
}

/// Where a hint came from
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum HintSource {
    /// The hint is one of the game's predefined hint ranks, and so the same
    /// request will always get the same hint
    Predefined,
    /// The hint was drawn at random from a band of ranks
    Random,
}

/// A word revealed to the player as a hint
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Hint {
    pub(crate) word: String,
    pub(crate) rank: u32,
    pub(crate) source: HintSource,
}

/// Choose the next hint for a player whose best rank so far is `lowest_rank`
/// (`None` if they have not found any ranked word yet).
///
/// If the game has predefined hint ranks, the largest one below
/// `lowest_rank` is used, provided some word other than the secret word has
/// that rank.  Otherwise, a word other than the secret word is picked at
/// random from the band given by [`RankBand::for_lowest_rank()`], or, if that
/// band is empty, from [`RankBand::widened()`].
pub(crate) fn next_hint<R: Rng + ?Sized>(
    table: &RankTable,
    predefined: &[u32],
    lowest_rank: Option<u32>,
    rng: &mut R,
) -> Result<Hint, HintError> {
    let band = RankBand::for_lowest_rank(lowest_rank).ok_or(HintError::TooClose)?;
    if let Some(hint) = predefined_hint(table, predefined, lowest_rank) {
        return Ok(hint);
    }
    let candidates = hintable(table, band.ranks());
    let candidates = if candidates.is_empty() {
        hintable(table, band.widened())
    } else {
        candidates
    };
    let Entry { word, rank } = candidates
        .choose(rng)
        .copied()
        .ok_or(HintError::NoCandidate)?;
    Ok(Hint {
        word: word.clone(),
        rank: *rank,
        source: HintSource::Random,
    })
}

fn predefined_hint(table: &RankTable, predefined: &[u32], lowest_rank: Option<u32>) -> Option<Hint> {
    let rank = predefined
        .iter()
        .copied()
        .filter(|&r| lowest_rank.is_none_or(|lowest| r < lowest))
        .max()?;
    let entry = table
        .entries_in(rank..=rank)
        .iter()
        .find(|e| !table.is_secret(&e.word))?;
    Some(Hint {
        word: entry.word.clone(),
        rank,
        source: HintSource::Predefined,
    })
}

fn hintable(table: &RankTable, ranks: RangeInclusive<u32>) -> Vec<&Entry> {
    table
        .entries_in(ranks)
        .iter()
        .filter(|e| !table.is_secret(&e.word))
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub(crate) enum HintError {
    #[error("You're very close already! Find the answer yourself!")]
    TooClose,
    #[error("no suitable hint word for this level")]
    NoCandidate,
}
