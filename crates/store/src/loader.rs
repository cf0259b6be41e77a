//! CSV ingestion for historical ratings and personal rating sheets.

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};
use userknn_core::{ItemId, Rating, RatingRange, RecResult, UserId, UserProfile};

use crate::catalog::{ItemCatalog, ItemMetadata};
use crate::matrix::{RatingStore, RatingStoreBuilder};

const NO_GENRES: &str = "(no genres listed)";

/// One row of a MovieLens-style ratings table. Extra columns such as
/// `timestamp` are ignored.
#[derive(Debug, Deserialize)]
struct RatingRow {
    #[serde(alias = "userId", alias = "user_id")]
    user: UserId,
    #[serde(alias = "movieId", alias = "itemId", alias = "item_id")]
    item: ItemId,
    rating: f64,
}

/// One row of a personal rating sheet. The rating cell may be blank.
#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(alias = "movieId", alias = "itemId", alias = "item_id")]
    item: ItemId,
    #[serde(alias = "rating", default)]
    ratings: Option<String>,
}

/// One row of a MovieLens `movies.csv`; genres are `|`-separated.
#[derive(Debug, Deserialize)]
struct ItemRow {
    #[serde(alias = "movieId", alias = "itemId", alias = "item_id")]
    item: ItemId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    genres: String,
}

impl From<ItemRow> for ItemMetadata {
    fn from(row: ItemRow) -> Self {
        let genres = row
            .genres
            .split('|')
            .map(str::trim)
            .filter(|genre| !genre.is_empty() && *genre != NO_GENRES)
            .map(str::to_string)
            .collect();
        ItemMetadata {
            item_id: row.item,
            title: row.title,
            genres,
        }
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

/// Read a historical ratings table into a [`RatingStore`].
pub fn read_ratings<R: Read>(reader: R) -> RecResult<RatingStore> {
    let mut builder = RatingStoreBuilder::new();
    for row in csv_reader(reader).deserialize::<RatingRow>() {
        let row = row?;
        builder.add(Rating::new(row.user, row.item, row.rating))?;
    }
    Ok(builder.build())
}

pub fn load_ratings_csv(path: impl AsRef<Path>) -> RecResult<RatingStore> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading ratings");
    read_ratings(File::open(path)?)
}

/// Read a personal rating sheet. Blank, unparsable and out-of-range cells
/// are skipped; a repeated item keeps its last value.
pub fn read_profile<R: Read>(reader: R, range: &RatingRange) -> RecResult<UserProfile> {
    let mut profile = UserProfile::new();
    let mut skipped = 0usize;

    for row in csv_reader(reader).deserialize::<ProfileRow>() {
        let row = row?;
        let cell = match row.ratings.as_deref().map(str::trim) {
            Some(cell) if !cell.is_empty() => cell,
            _ => continue,
        };

        match cell.parse::<f64>() {
            Ok(value) if range.contains(value) => {
                profile.insert(row.item, value);
            }
            Ok(value) => {
                debug!(item = row.item, value, "Skipping out-of-range rating");
                skipped += 1;
            }
            Err(_) => {
                debug!(item = row.item, cell, "Skipping unparsable rating");
                skipped += 1;
            }
        }
    }

    debug!(rated = profile.len(), skipped, "Profile imported");
    Ok(profile)
}

pub fn import_profile_csv(path: impl AsRef<Path>, range: &RatingRange) -> RecResult<UserProfile> {
    let path = path.as_ref();
    info!(path = %path.display(), "Importing rating sheet");
    read_profile(File::open(path)?, range)
}

/// Read an item metadata table (item id, title, genres).
pub fn read_items<R: Read>(reader: R) -> RecResult<ItemCatalog> {
    let items = csv_reader(reader)
        .deserialize::<ItemRow>()
        .map(|row| row.map(ItemMetadata::from))
        .collect::<Result<Vec<_>, _>>()?;
    ItemCatalog::from_items(items)
}

pub fn load_items_csv(path: impl AsRef<Path>) -> RecResult<ItemCatalog> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading item metadata");
    read_items(File::open(path)?)
}
