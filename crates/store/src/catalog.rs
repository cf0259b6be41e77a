//! Item metadata (titles and genres). Used to filter non-personalized lists;
//! similarity and prediction never look at it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use userknn_core::{ItemId, RecError, RecResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub item_id: ItemId,
    pub title: String,
    pub genres: Vec<String>,
}

impl ItemMetadata {
    /// Case-insensitive match against one of the item's genre tags.
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<ItemId, ItemMetadata>,
}

impl ItemCatalog {
    /// Fails with `InvalidArgument` when an item id appears twice.
    pub fn from_items<I>(items: I) -> RecResult<Self>
    where
        I: IntoIterator<Item = ItemMetadata>,
    {
        let mut catalog = HashMap::new();
        for item in items {
            let item_id = item.item_id;
            if catalog.insert(item_id, item).is_some() {
                return Err(RecError::invalid(format!(
                    "duplicate catalog entry for item {}",
                    item_id
                )));
            }
        }
        info!(items = catalog.len(), "Item catalog built");
        Ok(Self { items: catalog })
    }

    pub fn get(&self, item_id: ItemId) -> Option<&ItemMetadata> {
        self.items.get(&item_id)
    }

    pub fn title(&self, item_id: ItemId) -> Option<&str> {
        self.get(item_id).map(|item| item.title.as_str())
    }

    /// False for items the catalog does not know.
    pub fn has_genre(&self, item_id: ItemId, genre: &str) -> bool {
        self.get(item_id).is_some_and(|item| item.has_genre(genre))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
