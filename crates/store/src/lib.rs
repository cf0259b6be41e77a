//! Historical rating storage: the read-only user×item matrix shared by
//! every recommendation request, item metadata for non-personalized
//! filtering, and the CSV loaders that produce both.

pub mod catalog;
pub mod loader;
pub mod matrix;

pub use catalog::{ItemCatalog, ItemMetadata};
pub use loader::{
    import_profile_csv, load_items_csv, load_ratings_csv, read_items, read_profile, read_ratings,
};
pub use matrix::{ItemStats, RatingStore, RatingStoreBuilder};
