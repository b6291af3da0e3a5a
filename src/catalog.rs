use anyhow::Context;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{
    de::{Deserializer, Unexpected, Visitor},
    Deserialize, Serialize,
};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

/// File name of the catalog within the data directory
pub(crate) static CATALOG_FILE: &str = "rankLoader.json";

/// Offset of the calendar on which new games are released
const GAME_UTC_OFFSET_SECS: i32 = 7 * 60 * 60;

/// Lower bound on how long a catalog listing may be cached
const MIN_LISTING_MAX_AGE: i64 = 60;

/// The internal name of a game, used to locate its artifact file.
///
/// Slugs may contain the secret word and so are never sent to clients.
#[derive(Clone, Eq, Debug, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub(crate) struct Slug(String);

impl Slug {
    pub(crate) fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Slug {
    type Err = ParseSlugError;

    fn from_str(s: &str) -> Result<Slug, ParseSlugError> {
        if s.is_empty()
            || s == "."
            || s == ".."
            || s.contains(['/', '\\', '\0'])
            || s.trim() != s
        {
            Err(ParseSlugError)
        } else {
            Ok(Slug(s.to_owned()))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("slugs must be nonempty file stems without path separators")]
pub(crate) struct ParseSlugError;

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SlugVisitor;

        impl Visitor<'_> for SlugVisitor {
            type Value = Slug;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a nonempty file stem without path separators")
            }

            fn visit_str<E>(self, input: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                input
                    .parse::<Slug>()
                    .map_err(|_| E::invalid_value(Unexpected::Str(input), &self))
            }
        }

        deserializer.deserialize_str(SlugVisitor)
    }
}

/// A game as listed in the catalog
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct CatalogEntry {
    pub(crate) slug: Slug,
    #[serde(rename = "createdAt")]
    pub(crate) created_at: NaiveDate,
}

/// Mapping from game IDs to the games' slugs and creation dates
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct Catalog(BTreeMap<u32, CatalogEntry>);

impl Catalog {
    pub(crate) fn get(&self, id: u32) -> Option<&CatalogEntry> {
        self.0.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the client-facing view of the catalog, which omits slugs
    pub(crate) fn listing(&self) -> GameListing {
        GameListing {
            games: self
                .0
                .iter()
                .map(|(&id, entry)| {
                    (
                        id,
                        GameSummary {
                            created_at: entry.created_at,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Read the catalog at `path`, or return an empty catalog if the file
    /// does not exist
    pub(crate) fn load_or_default(path: &Path) -> anyhow::Result<Catalog> {
        match read_if_exists(path)? {
            Some(src) => serde_json::from_str(&src)
                .with_context(|| format!("failed to parse catalog {}", path.display())),
            None => Ok(Catalog::default()),
        }
    }

    /// Add every artifact in `data_dir` that the catalog does not list yet.
    ///
    /// New games are numbered after the current highest ID in order of their
    /// files' creation times (modification times where creation times are
    /// unavailable).  Each game's creation date is the file time's date on
    /// the game calendar plus `days_ahead` days.  Returns the IDs added.
    pub(crate) fn add_new_artifacts(
        &mut self,
        data_dir: &Path,
        days_ahead: u64,
    ) -> anyhow::Result<Vec<u32>> {
        let known = self
            .0
            .values()
            .map(|e| e.slug.clone())
            .collect::<HashSet<_>>();
        let mut found = Vec::new();
        let dir = std::fs::read_dir(data_dir)
            .with_context(|| format!("failed to read directory {}", data_dir.display()))?;
        for entry in dir {
            let entry = entry.context("failed to read directory entry")?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json")
                || entry.file_name() == CATALOG_FILE
            {
                continue;
            }
            let Some(slug) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<Slug>().ok())
            else {
                tracing::warn!(path = %path.display(), "Skipping artifact with unusable name");
                continue;
            };
            if known.contains(&slug) {
                continue;
            }
            let meta = entry
                .metadata()
                .with_context(|| format!("failed to stat {}", path.display()))?;
            let time = meta
                .created()
                .or_else(|_| meta.modified())
                .with_context(|| format!("failed to get timestamp of {}", path.display()))?;
            found.push((time, slug));
        }
        found.sort();
        let mut next_id = self.0.keys().next_back().copied().unwrap_or(0);
        let mut added = Vec::with_capacity(found.len());
        for (time, slug) in found {
            next_id = next_id
                .checked_add(1)
                .context("ran out of game IDs")?;
            let created_at = game_date(time)
                .checked_add_days(Days::new(days_ahead))
                .context("--days-ahead is too large")?;
            tracing::info!(id = next_id, %slug, %created_at, "Adding game to catalog");
            self.0.insert(next_id, CatalogEntry { slug, created_at });
            added.push(next_id);
        }
        Ok(added)
    }
}

fn read_if_exists(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(src) => Ok(Some(src)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Body of the catalog endpoint
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct GameListing {
    pub(crate) games: BTreeMap<u32, GameSummary>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GameSummary {
    pub(crate) created_at: NaiveDate,
}

fn game_timezone() -> FixedOffset {
    FixedOffset::east_opt(GAME_UTC_OFFSET_SECS).expect("UTC+7 should be a valid offset")
}

fn game_date(time: SystemTime) -> NaiveDate {
    DateTime::<Utc>::from(time)
        .with_timezone(&game_timezone())
        .date_naive()
}

/// Returns the number of whole seconds from `now` until the next midnight on
/// the game calendar, but never less than one minute
pub(crate) fn seconds_until_midnight(now: DateTime<Utc>) -> i64 {
    let local = now.with_timezone(&game_timezone());
    let mut remaining = 86_400 - i64::from(local.num_seconds_from_midnight());
    if local.nanosecond() > 0 {
        remaining -= 1;
    }
    remaining.max(MIN_LISTING_MAX_AGE)
}
