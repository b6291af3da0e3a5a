use crate::disclosure::DisclosureError;
use crate::hint::HintError;
use crate::normalize::Guess;
use crate::store::StoreError;
use serde::Deserialize;
use thiserror::Error;

/// Query-string parameters of a game request, before validation
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawQuery {
    pub(crate) id: Option<String>,
    pub(crate) guess: Option<String>,
    pub(crate) secret: Option<String>,
    pub(crate) hint: Option<String>,
    pub(crate) closest: Option<String>,
    pub(crate) lowest_rank: Option<String>,
}

impl RawQuery {
    /// Validate just the `id` parameter
    pub(crate) fn game_id(&self) -> Result<u32, QueryError> {
        match nonblank(self.id.as_deref()) {
            Some(s) => parse_positive("id", s),
            None => Err(QueryError::MissingParameter("id")),
        }
    }
}

/// A validated game request
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct GameQuery {
    pub(crate) id: u32,
    pub(crate) action: Action,
}

/// What a game request asks for
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Action {
    /// Give up and reveal the secret word
    Secret,
    /// Reveal a hint word, paced by the best rank the player reports having
    /// reached
    Hint { lowest_rank: Option<u32> },
    /// List the closest words; `proof` must be the secret word
    Closest { proof: Guess },
    /// Look up the rank of a guess
    Evaluate { guess: Guess },
}

impl Action {
    /// Short name of the action, for logs
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Action::Secret => "secret",
            Action::Hint { .. } => "hint",
            Action::Closest { .. } => "closest",
            Action::Evaluate { .. } => "guess",
        }
    }
}

impl TryFrom<RawQuery> for GameQuery {
    type Error = QueryError;

    /// Validate a request.  When more than one of `secret`, `hint`, and
    /// `closest` is set, the first in that order wins; with none of them set,
    /// the request evaluates `guess`.
    fn try_from(raw: RawQuery) -> Result<GameQuery, QueryError> {
        let id = raw.game_id()?;
        let guess = nonblank(raw.guess.as_deref()).and_then(|s| s.parse::<Guess>().ok());
        let action = if is_set(raw.secret.as_deref()) {
            Action::Secret
        } else if is_set(raw.hint.as_deref()) {
            let lowest_rank = nonblank(raw.lowest_rank.as_deref())
                .map(|s| parse_positive("lowestRank", s))
                .transpose()?;
            Action::Hint { lowest_rank }
        } else if is_set(raw.closest.as_deref()) {
            Action::Closest {
                proof: guess.ok_or(QueryError::MissingParameter("guess"))?,
            }
        } else {
            Action::Evaluate {
                guess: guess.ok_or(QueryError::MissingParameter("guess"))?,
            }
        };
        Ok(GameQuery { id, action })
    }
}

fn nonblank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn is_set(flag: Option<&str>) -> bool {
    flag == Some("true")
}

fn parse_positive(name: &'static str, value: &str) -> Result<u32, QueryError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(QueryError::InvalidParameter {
            name,
            value: value.to_owned(),
        }),
    }
}

/// Why a request could not be answered
#[derive(Debug, Error)]
pub(crate) enum QueryError {
    #[error("missing required parameter {0:?}")]
    MissingParameter(&'static str),
    #[error("invalid value for parameter {name:?}: {value:?}")]
    InvalidParameter { name: &'static str, value: String },
    #[error("game not found")]
    GameNotFound(#[source] StoreError),
    #[error(transparent)]
    Hint(#[from] HintError),
    #[error(transparent)]
    Disclosure(#[from] DisclosureError),
    #[error("failed to read game data")]
    Internal(#[source] StoreError),
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> QueryError {
        if e.is_not_found() {
            QueryError::GameNotFound(e)
        } else {
            QueryError::Internal(e)
        }
    }
}
