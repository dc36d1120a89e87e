use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::wire::{flag, lenient_number, object_or_none, seq_or_empty, InventoryPage};

/// Well-known app ids.
pub mod app {
    pub const TF2: u32 = 440;
    pub const DOTA2: u32 = 570;
    pub const PORTAL2: u32 = 620;
    pub const CSGO: u32 = 730;
    pub const SPIRAL_KNIGHTS: u32 = 99900;
    pub const H1Z1: u32 = 295110;
    pub const STEAM: u32 = 753;
}

/// Well-known context ids.
pub mod context {
    pub const TF2: u64 = 2;
    pub const DOTA2: u64 = 2;
    pub const PORTAL2: u64 = 2;
    pub const CSGO: u64 = 2;
    pub const H1Z1: u64 = 1;
    pub const STEAM_GIFTS: u64 = 1;
    pub const STEAM_COUPONS: u64 = 3;
    pub const STEAM_COMMUNITY: u64 = 6;
    pub const STEAM_ITEM_REWARDS: u64 = 7;
}

/// One inventory namespace: a game plus a context within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppContextPair {
    pub app_id: u32,
    pub context_id: u64,
}

impl AppContextPair {
    pub const fn new(app_id: u32, context_id: u64) -> Self {
        Self { app_id, context_id }
    }
}

impl fmt::Display for AppContextPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.context_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default, deserialize_with = "lenient_number")]
    pub id: u64,
    #[serde(rename = "classid", default, deserialize_with = "lenient_number")]
    pub class_id: u64,
    #[serde(rename = "instanceid", default, deserialize_with = "lenient_number")]
    pub instance_id: u64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: i64,
    #[serde(default, deserialize_with = "flag")]
    pub is_currency: bool,
    #[serde(rename = "pos", default, deserialize_with = "lenient_number")]
    pub position: i64,
    /// Only present in inventory history payloads.
    #[serde(rename = "owner", default, deserialize_with = "lenient_number")]
    pub owner_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionLine {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAction {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    #[serde(default)]
    pub internal_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAppData {
    #[serde(default, deserialize_with = "lenient_number")]
    pub def_index: u32,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quality: i32,
}

/// Class metadata shared by every item with the same `(class_id, instance_id)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescription {
    #[serde(rename = "owner", default, deserialize_with = "lenient_number")]
    pub owner_id: u64,
    #[serde(rename = "appid", default, deserialize_with = "lenient_number")]
    pub app_id: u32,
    #[serde(rename = "classid", default, deserialize_with = "lenient_number")]
    pub class_id: u64,
    #[serde(rename = "instanceid", default, deserialize_with = "lenient_number")]
    pub instance_id: u64,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub icon_url_large: Option<String>,
    #[serde(default)]
    pub icon_drag_url: Option<String>,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(default)]
    pub market_hash_name: Option<String>,
    #[serde(default)]
    market_name: Option<String>,
    #[serde(default)]
    pub name_color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(rename = "tradable", default, deserialize_with = "flag")]
    pub is_tradable: bool,
    #[serde(rename = "marketable", default, deserialize_with = "flag")]
    pub is_marketable: bool,
    #[serde(rename = "commodity", default, deserialize_with = "flag")]
    pub is_commodity: bool,
    #[serde(default, deserialize_with = "lenient_number")]
    pub market_fee_app: u32,
    #[serde(default, deserialize_with = "seq_or_empty")]
    pub descriptions: Vec<DescriptionLine>,
    #[serde(default, deserialize_with = "seq_or_empty")]
    pub actions: Vec<ItemAction>,
    #[serde(default, deserialize_with = "seq_or_empty")]
    pub owner_actions: Vec<ItemAction>,
    #[serde(default, deserialize_with = "seq_or_empty")]
    pub tags: Vec<ItemTag>,
    #[serde(default, deserialize_with = "object_or_none")]
    pub app_data: Option<ItemAppData>,
}

impl ItemDescription {
    /// Market name, or the display name when the market name is missing.
    pub fn market_name(&self) -> &str {
        match self.market_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.display_name,
        }
    }

    pub fn key(&self) -> String {
        description_key(self.class_id, self.instance_id)
    }
}

/// Key of the description map: `"{class_id}_{instance_id}"`.
pub fn description_key(class_id: u64, instance_id: u64) -> String {
    format!("{class_id}_{instance_id}")
}

/// Items, currencies and descriptions of one `(app, context)` for one user.
///
/// Item maps are keyed by item id; the same id may appear in both maps with
/// different meanings. The flattened [`items`](Inventory::items) and
/// [`descriptions`](Inventory::descriptions) views are built on first use.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub app_id: u32,
    pub context_id: u64,
    pub owner_id: u64,
    pub success: bool,
    pub more: bool,
    pub more_start: u32,
    items_by_id: IndexMap<u64, InventoryItem>,
    currency_by_id: IndexMap<u64, InventoryItem>,
    descriptions_by_key: IndexMap<String, ItemDescription>,
    #[serde(skip)]
    items_view: OnceLock<Vec<InventoryItem>>,
    #[serde(skip)]
    descriptions_view: OnceLock<Vec<ItemDescription>>,
}

fn keyed_items(raw: IndexMap<String, InventoryItem>, currency: bool) -> IndexMap<u64, InventoryItem> {
    raw.into_iter()
        .map(|(key, mut item)| {
            let id = key.trim().parse::<u64>().unwrap_or(item.id);
            if item.id == 0 {
                item.id = id;
            }
            if currency {
                item.is_currency = true;
            }
            (id, item)
        })
        .collect()
}

impl Inventory {
    pub(crate) fn from_page(page: InventoryPage) -> Self {
        let more_start = page.next_start();
        Self {
            success: page.success,
            more: page.more,
            more_start,
            items_by_id: keyed_items(page.rg_inventory, false),
            currency_by_id: keyed_items(page.rg_currency, true),
            descriptions_by_key: page.rg_descriptions,
            ..Self::default()
        }
    }

    /// Decode one JSON page body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<InventoryPage>(body).map(Self::from_page)
    }

    pub fn pair(&self) -> AppContextPair {
        AppContextPair::new(self.app_id, self.context_id)
    }

    pub(crate) fn stamp(&mut self, pair: AppContextPair, owner_id: u64) {
        self.app_id = pair.app_id;
        self.context_id = pair.context_id;
        self.owner_id = owner_id;
    }

    /// Append the next page. Flattened views are concatenated in fetch order;
    /// the keyed maps take the later page's entry when ids collide.
    pub(crate) fn absorb(&mut self, next: Inventory) {
        let mut items = self.items_view.take().unwrap_or_else(|| self.flatten_items());
        items.extend_from_slice(next.items());
        let mut descriptions = self
            .descriptions_view
            .take()
            .unwrap_or_else(|| self.descriptions_by_key.values().cloned().collect());
        descriptions.extend_from_slice(next.descriptions());

        let Inventory {
            success,
            more,
            more_start,
            items_by_id,
            currency_by_id,
            descriptions_by_key,
            ..
        } = next;
        self.success &= success;
        self.more = more;
        self.more_start = more_start;
        self.items_by_id.extend(items_by_id);
        self.currency_by_id.extend(currency_by_id);
        self.descriptions_by_key.extend(descriptions_by_key);
        self.items_view = OnceLock::from(items);
        self.descriptions_view = OnceLock::from(descriptions);
    }

    fn flatten_items(&self) -> Vec<InventoryItem> {
        self.items_by_id
            .values()
            .chain(self.currency_by_id.values())
            .cloned()
            .collect()
    }

    /// Regular items followed by currency items.
    pub fn items(&self) -> &[InventoryItem] {
        self.items_view.get_or_init(|| self.flatten_items())
    }

    pub fn descriptions(&self) -> &[ItemDescription] {
        self.descriptions_view
            .get_or_init(|| self.descriptions_by_key.values().cloned().collect())
    }

    pub fn regular_items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.items_by_id.values()
    }

    pub fn currency_items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.currency_by_id.values()
    }

    /// Length of the flattened [`items`](Inventory::items) view. Ids repeated
    /// across merged pages count once per page, unlike the keyed iterators.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Look an item up by id; currencies shadow regular items with the same id.
    pub fn get_item(&self, id: u64) -> Option<InventoryItem> {
        if let Some(currency) = self.currency_by_id.get(&id) {
            let mut item = currency.clone();
            item.is_currency = true;
            return Some(item);
        }
        self.items_by_id.get(&id).cloned()
    }

    pub fn get_item_description(&self, id: u64, is_currency: bool) -> Option<&ItemDescription> {
        let key = if is_currency {
            description_key(self.currency_by_id.get(&id)?.class_id, 0)
        } else {
            let item = self.items_by_id.get(&id)?;
            description_key(item.class_id, item.instance_id)
        };
        self.descriptions_by_key.get(&key)
    }

    pub fn get_item_description_by_class_id(
        &self,
        class_id: u64,
        is_currency: bool,
    ) -> Option<&ItemDescription> {
        if is_currency {
            return self.descriptions_by_key.get(&description_key(class_id, 0));
        }
        let item = self.items_by_id.values().find(|i| i.class_id == class_id)?;
        self.descriptions_by_key
            .get(&description_key(class_id, item.instance_id))
    }

    pub fn description(&self, class_id: u64, instance_id: u64) -> Option<&ItemDescription> {
        self.descriptions_by_key
            .get(&description_key(class_id, instance_id))
    }
}

/// Every fetched inventory of a run: app id → context id → inventory.
///
/// A missing pair means "not fetched (yet) or failed", never "empty".
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateInventory {
    apps: BTreeMap<u32, BTreeMap<u64, Arc<Inventory>>>,
}

impl AggregateInventory {
    pub fn has_app_id(&self, app_id: u32) -> bool {
        self.apps.contains_key(&app_id)
    }

    pub fn has_context_id(&self, app_id: u32, context_id: u64) -> bool {
        self.apps
            .get(&app_id)
            .is_some_and(|contexts| contexts.contains_key(&context_id))
    }

    pub fn get(&self, app_id: u32, context_id: u64) -> Option<&Arc<Inventory>> {
        self.apps.get(&app_id)?.get(&context_id)
    }

    pub fn contexts(&self, app_id: u32) -> Option<&BTreeMap<u64, Arc<Inventory>>> {
        self.apps.get(&app_id)
    }

    /// Insert unless the pair is already present. Returns whether it was inserted.
    pub(crate) fn insert_if_absent(&mut self, pair: AppContextPair, inventory: Arc<Inventory>) -> bool {
        let contexts = self.apps.entry(pair.app_id).or_default();
        if contexts.contains_key(&pair.context_id) {
            return false;
        }
        contexts.insert(pair.context_id, inventory);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (AppContextPair, &Arc<Inventory>)> {
        self.apps.iter().flat_map(|(app_id, contexts)| {
            contexts
                .iter()
                .map(move |(context_id, inv)| (AppContextPair::new(*app_id, *context_id), inv))
        })
    }

    pub fn pairs(&self) -> Vec<AppContextPair> {
        self.iter().map(|(pair, _)| pair).collect()
    }

    pub fn len(&self) -> usize {
        self.apps.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::testing::{empty_inventory_page, inventory_page};
    use serde_json::json;

    fn mixed_page() -> String {
        json!({
            "success": true,
            "rgInventory": {
                "100": {"id": "100", "classid": "11", "instanceid": "5", "amount": "1", "pos": 1},
                "101": {"id": "101", "classid": "12", "instanceid": "0", "amount": "1", "pos": 2}
            },
            "rgCurrency": {
                "100": {"id": "100", "classid": "99", "instanceid": "0", "amount": "250", "pos": 0}
            },
            "rgDescriptions": {
                "11_5": {"classid": "11", "instanceid": "5", "name": "Hat", "market_name": "Strange Hat",
                          "tradable": 1, "marketable": 1, "commodity": 0,
                          "tags": [{"internal_name": "q", "name": "Strange", "category": "Quality", "category_name": "Quality"}],
                          "app_data": {"def_index": "5020", "quality": "11"}},
                "12_0": {"classid": "12", "instanceid": "0", "name": "Key", "market_name": "",
                          "tradable": 0, "marketable": 0, "commodity": 1, "descriptions": ""},
                "99_0": {"classid": "99", "instanceid": "0", "name": "Gems"}
            },
            "more": false,
            "more_start": false
        })
        .to_string()
    }

    #[test]
    fn empty_arrays_yield_an_empty_inventory() {
        let inv = Inventory::from_json(&empty_inventory_page()).unwrap();
        assert!(inv.success);
        assert!(inv.is_empty());
        assert!(inv.items().is_empty());
        assert!(inv.descriptions().is_empty());
    }

    #[test]
    fn currency_shadows_regular_item_with_same_id() {
        let inv = Inventory::from_json(&mixed_page()).unwrap();
        let item = inv.get_item(100).unwrap();
        assert!(item.is_currency);
        assert_eq!(item.class_id, 99);
        assert_eq!(item.amount, 250);
        assert!(!inv.get_item(101).unwrap().is_currency);
        assert!(inv.get_item(5).is_none());
        assert_eq!(inv.items().len(), 3);
        assert_eq!(inv.regular_items().count(), 2);
        assert_eq!(inv.currency_items().count(), 1);
    }

    #[test]
    fn currency_entries_are_flagged_in_every_view() {
        let inv = Inventory::from_json(&mixed_page()).unwrap();
        assert!(inv.currency_items().all(|i| i.is_currency));
        assert!(inv.regular_items().all(|i| !i.is_currency));
        let flagged: Vec<(u64, u64)> = inv
            .items()
            .iter()
            .filter(|i| i.is_currency)
            .map(|i| (i.id, i.class_id))
            .collect();
        assert_eq!(flagged, [(100, 99)]);
    }

    #[test]
    fn description_lookups_use_class_and_instance() {
        let inv = Inventory::from_json(&mixed_page()).unwrap();

        let hat = inv.get_item_description(100, false).unwrap();
        assert_eq!(hat.display_name, "Hat");
        assert_eq!(hat.market_name(), "Strange Hat");
        assert!(hat.is_tradable && hat.is_marketable && !hat.is_commodity);
        assert_eq!(hat.tags[0].name, "Strange");
        assert_eq!(
            hat.app_data,
            Some(ItemAppData {
                def_index: 5020,
                quality: 11
            })
        );

        let gems = inv.get_item_description(100, true).unwrap();
        assert_eq!(gems.display_name, "Gems");

        let key = inv.get_item_description_by_class_id(12, false).unwrap();
        assert_eq!(key.market_name(), "Key");
        assert!(key.is_commodity && !key.is_tradable);
        assert!(key.descriptions.is_empty());
        assert_eq!(
            inv.get_item_description_by_class_id(99, true).unwrap().key(),
            "99_0"
        );
        assert!(inv.get_item_description_by_class_id(77, false).is_none());

        assert_eq!(inv.description(11, 5).unwrap().display_name, "Hat");
        assert!(inv.description(11, 0).is_none());
    }

    #[test]
    fn items_compare_structurally() {
        let a = InventoryItem {
            id: 1,
            class_id: 2,
            amount: 1,
            ..InventoryItem::default()
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.position = 4;
        assert_ne!(a, b);
    }

    #[test]
    fn absorb_concatenates_views_and_last_write_wins_in_maps() {
        let mut first = Inventory::from_json(&inventory_page(&[(1, 10), (2, 20)], Some(2))).unwrap();
        let second = Inventory::from_json(&inventory_page(&[(2, 21), (3, 30)], None)).unwrap();
        first.absorb(second);

        let ids: Vec<u64> = first.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, [1, 2, 2, 3]);
        assert_eq!(first.len(), 4);
        assert_eq!(first.regular_items().count(), 3);
        assert!(!first.is_empty());
        assert_eq!(first.get_item(2).unwrap().class_id, 21);
        assert_eq!(first.descriptions().len(), 4);
        assert!(!first.more);
        assert_eq!(first.more_start, 0);
    }

    #[test]
    fn aggregate_first_writer_wins() {
        let mut agg = AggregateInventory::default();
        let pair = AppContextPair::new(app::TF2, context::TF2);
        let a = Inventory {
            owner_id: 1,
            ..Inventory::default()
        };
        let b = Inventory {
            owner_id: 2,
            ..Inventory::default()
        };

        assert!(agg.insert_if_absent(pair, Arc::new(a)));
        assert!(!agg.insert_if_absent(pair, Arc::new(b)));
        assert_eq!(agg.get(440, 2).unwrap().owner_id, 1);
        assert!(agg.has_app_id(440));
        assert!(agg.has_context_id(440, 2));
        assert!(!agg.has_context_id(440, 3));
        assert!(!agg.has_app_id(730));
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.pairs(), [pair]);
    }
}
