mod value;

pub use value::AttrValue;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const ATHENA: &str = "athena";
pub const COMMON_CORE: &str = "common_core";
pub const DEFAULT_PROFILE_ID: &str = COMMON_CORE;
pub const RESPONSE_VERSION: i64 = 1;

pub type AttrMap = BTreeMap<String, AttrValue>;

/// Versioned per-account profile document as stored on disk.
///
/// `items` and `stats.attributes` stay `None` until the first write touches
/// them. Fields this model does not know about (`profileId`, `version`, ...)
/// are kept in `extra` so a load/save cycle never drops template data.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(rename = "rvn", default)]
    pub revision: i64,
    #[serde(default)]
    pub command_revision: i64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<BTreeMap<String, Item>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stats: Stats,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Item {
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: AttrMap,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Stats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttrMap>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One reportable mutation, in the order the command produced it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "changeType", rename_all = "camelCase")]
pub enum ChangeRecord {
    StatModified {
        name: String,
        value: AttrValue,
    },
    ItemAttrChanged {
        #[serde(rename = "itemId")]
        item_id: String,
        attribute: String,
        value: AttrValue,
    },
    /// A whole item created by the command (loadout copies). Clients that
    /// replay deltas must accept `itemAdded` next to the two attribute kinds.
    ItemAdded {
        #[serde(rename = "itemId")]
        item_id: String,
        item: Item,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile_revision: i64,
    pub profile_id: String,
    pub profile_changes_base_revision: i64,
    pub profile_changes: Vec<ChangeRecord>,
    pub profile_command_revision: i64,
    pub server_time: String,
    pub response_version: i64,
}

/// Returned when a stored counter is already at `i64::MAX`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("revision counters cannot advance past rvn {revision}, commandRevision {command_revision}")]
pub struct RevisionOverflow {
    pub revision: i64,
    pub command_revision: i64,
}

/// Body of a profile command. Every field falls back to its zero value.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandRequest {
    pub source_index: i64,
    pub target_index: i64,
    pub opt_new_name_for_target: String,
    pub name: String,
    pub locker_item: String,
    pub item_ids: Vec<String>,
    pub offer_id: String,
    pub gift_box_item_ids: Vec<String>,
    pub affiliate_name: String,
    pub slot_name: String,
    pub index_within_slot: i64,
    pub item_to_slot: String,
    pub new_platform: String,
    pub b_receive_gifts: bool,
    pub b_favorite: bool,
    pub target_item_id: String,
    pub item_fav_status: Vec<bool>,
    pub archived: bool,
}

impl CommandRequest {
    /// Parses a raw request body. An empty or whitespace-only body is the
    /// all-default request.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }
}

impl ProfileDocument {
    /// Stamps a copy of a template with its owner and creation time.
    pub fn materialize_for(&mut self, account_id: &str, timestamp: &str) {
        self.created = timestamp.to_string();
        self.updated = timestamp.to_string();
        self.account_id = account_id.to_string();
        self.id = account_id.to_string();
    }

    /// Advances both counters together, or neither when one would overflow.
    pub fn bump_revision(&mut self) -> Result<(), RevisionOverflow> {
        match (
            self.revision.checked_add(1),
            self.command_revision.checked_add(1),
        ) {
            (Some(revision), Some(command_revision)) => {
                self.revision = revision;
                self.command_revision = command_revision;
                Ok(())
            }
            _ => Err(RevisionOverflow {
                revision: self.revision,
                command_revision: self.command_revision,
            }),
        }
    }

    pub fn stat(&self, key: &str) -> Option<&AttrValue> {
        self.stats.attributes.as_ref()?.get(key)
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.as_ref()?.get(item_id)
    }

    pub fn item_attribute(&self, item_id: &str, key: &str) -> Option<&AttrValue> {
        self.item(item_id)?.attributes.get(key)
    }

    /// Writes a stat without comparing against the old value.
    pub fn set_stat(
        &mut self,
        key: &str,
        value: impl Into<AttrValue>,
        changes: &mut Vec<ChangeRecord>,
    ) {
        let value = value.into();
        self.stats
            .attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.clone());

        changes.push(ChangeRecord::StatModified {
            name: key.to_string(),
            value,
        });
    }

    /// Writes an item attribute, creating the item when it does not exist.
    pub fn set_item_attribute(
        &mut self,
        item_id: &str,
        key: &str,
        value: impl Into<AttrValue>,
        changes: &mut Vec<ChangeRecord>,
    ) {
        let value = value.into();
        self.items
            .get_or_insert_with(BTreeMap::new)
            .entry(item_id.to_string())
            .or_default()
            .attributes
            .insert(key.to_string(), value.clone());

        changes.push(ChangeRecord::ItemAttrChanged {
            item_id: item_id.to_string(),
            attribute: key.to_string(),
            value,
        });
    }

    /// Inserts (or replaces) a whole item.
    pub fn insert_item(&mut self, item_id: &str, item: Item, changes: &mut Vec<ChangeRecord>) {
        self.items
            .get_or_insert_with(BTreeMap::new)
            .insert(item_id.to_string(), item.clone());

        changes.push(ChangeRecord::ItemAdded {
            item_id: item_id.to_string(),
            item,
        });
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
