use crate::catalog::GameListing;
use crate::disclosure::{closest_words, reveal_secret};
use crate::hint::{next_hint, Hint};
use crate::query::{Action, GameQuery, QueryError, RawQuery};
use crate::store::RankingStore;
use crate::table::Entry;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Answers game queries against the games in a [`RankingStore`].
///
/// One engine is built at startup and shared by all requests.  Apart from the
/// store's caches and the random number generator used for hints, it holds
/// no state: in particular, it remembers nothing about players between
/// requests.
#[derive(Debug)]
pub(crate) struct Engine {
    store: RankingStore,
    rng: Mutex<StdRng>,
}

/// A successful answer to a [`GameQuery`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Answer {
    /// The rank of the guess, or `None` if the word is not in the table
    Rank(Option<u32>),
    Secret(String),
    Hint(Hint),
    Closest(Vec<Entry>),
}

impl Engine {
    pub(crate) fn new(store: RankingStore) -> Engine {
        Engine::with_rng(store, StdRng::from_os_rng())
    }

    pub(crate) fn with_rng(store: RankingStore, rng: StdRng) -> Engine {
        Engine {
            store,
            rng: Mutex::new(rng),
        }
    }

    /// Validate a request.  The game is looked up before the other
    /// parameters are checked, so any request for an unknown game is
    /// answered with [`QueryError::GameNotFound`].
    pub(crate) async fn validate(&self, raw: RawQuery) -> Result<GameQuery, QueryError> {
        let id = raw.game_id()?;
        self.store.resolve_game(id).await?;
        GameQuery::try_from(raw)
    }

    pub(crate) async fn answer(&self, query: &GameQuery) -> Result<Answer, QueryError> {
        let id = query.id;
        let game = self.store.resolve_game(id).await?;
        let data = self.store.game_data(&game.slug).await?;
        let table = &data.table;
        match &query.action {
            Action::Secret => {
                let word = reveal_secret(table)?;
                tracing::info!(id, "Revealed secret word");
                Ok(Answer::Secret(word))
            }
            Action::Hint { lowest_rank } => {
                let hint = {
                    let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                    next_hint(table, &data.hints, *lowest_rank, &mut *rng)?
                };
                tracing::info!(
                    id,
                    word = %hint.word,
                    rank = hint.rank,
                    source = ?hint.source,
                    lowest_rank = ?lowest_rank,
                    "Gave hint",
                );
                Ok(Answer::Hint(hint))
            }
            Action::Closest { proof } => match closest_words(table, proof) {
                Ok(words) => {
                    tracing::info!(id, count = words.len(), "Returned closest words");
                    Ok(Answer::Closest(words))
                }
                Err(e) => {
                    tracing::info!(id, proof = %proof, "Refused closest words: {e}");
                    Err(e.into())
                }
            },
            Action::Evaluate { guess } => {
                let rank = table.evaluate(guess);
                tracing::debug!(id, word = %guess, rank = ?rank, "Evaluated guess");
                Ok(Answer::Rank(rank))
            }
        }
    }

    /// Returns the client-facing list of games, read afresh so that newly
    /// indexed games appear without a restart
    pub(crate) async fn listing(&self) -> Result<GameListing, QueryError> {
        Ok(self.store.read_catalog().await?.listing())
    }
}
