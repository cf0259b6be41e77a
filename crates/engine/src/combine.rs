//! Group profiles: several users' ratings merged into one synthetic query.

use std::collections::BTreeMap;
use userknn_core::{ItemId, UserProfile};

/// Merge profiles item by item. An item rated by one profile keeps its
/// value; an item rated by several gets the arithmetic mean of their values.
pub fn combine<'p, I>(profiles: I) -> UserProfile
where
    I: IntoIterator<Item = &'p UserProfile>,
{
    let mut totals: BTreeMap<ItemId, (f64, usize)> = BTreeMap::new();
    for profile in profiles {
        for (item_id, value) in profile.iter() {
            let entry = totals.entry(item_id).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(item_id, (sum, count))| (item_id, sum / count as f64))
        .collect()
}
