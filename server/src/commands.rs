//! Profile command dispatch
//!
//! A command is looked up by its wire name, checked against the profile it
//! was sent to, and then applied to the loaded document. Handlers only touch
//! the document through the model's mutation helpers, so every write they
//! make is reported as a change record (with the one deliberate exception of
//! `SetMtxPlatform`, see [`set_mtx_platform`]).
//!
//! Handlers validate everything they need before the first write. A failing
//! command therefore leaves the document untouched.

use crate::error::{McpError, Result};
use log::debug;
use mcp_shared::{
    AttrValue, ChangeRecord, CommandRequest, ProfileDocument, ATHENA, COMMON_CORE,
};
use std::fmt;
use std::str::FromStr;

pub const SANDBOX_LOADOUT: &str = "sandbox_loadout";

const LOADOUTS_STAT: &str = "loadouts";
const ACTIVE_LOADOUT_INDEX_STAT: &str = "active_loadout_index";
const LAST_APPLIED_LOADOUT_STAT: &str = "last_applied_loadout";
const CURRENT_MTX_PLATFORM_STAT: &str = "current_mtx_platform";
const ALLOWED_TO_RECEIVE_GIFTS_STAT: &str = "allowed_to_receive_gifts";

const LOCKER_NAME_ATTR: &str = "locker_name";
const LOCKER_SLOTS_DATA_ATTR: &str = "locker_slots_data";
const FAVORITE_ATTR: &str = "favorite";
const ARCHIVED_ATTR: &str = "archived";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    CopyCosmeticLoadout,
    DeleteCosmeticLoadout,
    SetMtxPlatform,
    SetReceiveGiftsEnabled,
    SetItemFavoriteStatus,
    SetItemFavoriteStatusBatch,
    SetItemArchivedStatusBatch,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::CopyCosmeticLoadout,
        Command::DeleteCosmeticLoadout,
        Command::SetMtxPlatform,
        Command::SetReceiveGiftsEnabled,
        Command::SetItemFavoriteStatus,
        Command::SetItemFavoriteStatusBatch,
        Command::SetItemArchivedStatusBatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::CopyCosmeticLoadout => "CopyCosmeticLoadout",
            Command::DeleteCosmeticLoadout => "DeleteCosmeticLoadout",
            Command::SetMtxPlatform => "SetMtxPlatform",
            Command::SetReceiveGiftsEnabled => "SetReceiveGiftsEnabled",
            Command::SetItemFavoriteStatus => "SetItemFavoriteStatus",
            Command::SetItemFavoriteStatusBatch => "SetItemFavoriteStatusBatch",
            Command::SetItemArchivedStatusBatch => "SetItemArchivedStatusBatch",
        }
    }

    /// The only profile this command may run against.
    pub fn required_profile(self) -> &'static str {
        match self {
            Command::SetMtxPlatform | Command::SetReceiveGiftsEnabled => COMMON_CORE,
            Command::CopyCosmeticLoadout
            | Command::DeleteCosmeticLoadout
            | Command::SetItemFavoriteStatus
            | Command::SetItemFavoriteStatusBatch
            | Command::SetItemArchivedStatusBatch => ATHENA,
        }
    }

    pub fn check_profile(self, profile_id: &str) -> Result<()> {
        if profile_id == self.required_profile() {
            Ok(())
        } else {
            Err(McpError::InvalidProfile(profile_id.to_string()))
        }
    }
}

impl FromStr for Command {
    type Err = McpError;

    fn from_str(name: &str) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|command| command.name() == name)
            .ok_or_else(|| McpError::UnsupportedCommand(name.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an item attribute write treats missing items and unchanged values.
///
/// The single-item favorite command and the batch commands differ here and
/// clients can observe it (an unchanged single write reports nothing, an
/// unchanged batch write still reports a change), so each command names its
/// policy explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemWritePolicy {
    /// Skip the write when the item does not exist yet.
    pub require_existing: bool,
    /// Skip the write when the attribute already holds the value.
    pub skip_unchanged: bool,
}

impl ItemWritePolicy {
    pub const ALWAYS: ItemWritePolicy = ItemWritePolicy {
        require_existing: false,
        skip_unchanged: false,
    };

    pub const EXISTING_IF_CHANGED: ItemWritePolicy = ItemWritePolicy {
        require_existing: true,
        skip_unchanged: true,
    };
}

/// Applies an item attribute write under `policy`. Returns whether it wrote.
pub fn write_item_attribute(
    doc: &mut ProfileDocument,
    item_id: &str,
    key: &str,
    value: AttrValue,
    policy: ItemWritePolicy,
    changes: &mut Vec<ChangeRecord>,
) -> bool {
    match doc.item(item_id) {
        None if policy.require_existing => {
            debug!("Skipping {} on missing item {}", key, item_id);
            return false;
        }
        Some(item) if policy.skip_unchanged && item.attributes.get(key) == Some(&value) => {
            debug!("Skipping unchanged {} on item {}", key, item_id);
            return false;
        }
        _ => {}
    }

    doc.set_item_attribute(item_id, key, value, changes);
    true
}

/// Runs `command` against `doc` and returns the changes it produced, in order.
///
/// Revision bookkeeping and persistence are the caller's job.
pub fn execute(
    command: Command,
    profile_id: &str,
    doc: &mut ProfileDocument,
    request: &CommandRequest,
) -> Result<Vec<ChangeRecord>> {
    command.check_profile(profile_id)?;

    let mut changes = Vec::new();
    match command {
        Command::CopyCosmeticLoadout => copy_cosmetic_loadout(doc, request, &mut changes)?,
        Command::DeleteCosmeticLoadout => delete_cosmetic_loadout(doc, request, &mut changes)?,
        Command::SetMtxPlatform => set_mtx_platform(request, &mut changes),
        Command::SetReceiveGiftsEnabled => {
            doc.set_stat(ALLOWED_TO_RECEIVE_GIFTS_STAT, request.b_receive_gifts, &mut changes);
        }
        Command::SetItemFavoriteStatus => {
            write_item_attribute(
                doc,
                &request.target_item_id,
                FAVORITE_ATTR,
                AttrValue::Bool(request.b_favorite),
                ItemWritePolicy::EXISTING_IF_CHANGED,
                &mut changes,
            );
        }
        Command::SetItemFavoriteStatusBatch => {
            // Ids without a matching status are ignored
            for (item_id, favorite) in request.item_ids.iter().zip(&request.item_fav_status) {
                write_item_attribute(
                    doc,
                    item_id,
                    FAVORITE_ATTR,
                    AttrValue::Bool(*favorite),
                    ItemWritePolicy::ALWAYS,
                    &mut changes,
                );
            }
        }
        Command::SetItemArchivedStatusBatch => {
            for item_id in &request.item_ids {
                write_item_attribute(
                    doc,
                    item_id,
                    ARCHIVED_ATTR,
                    AttrValue::Bool(request.archived),
                    ItemWritePolicy::ALWAYS,
                    &mut changes,
                );
            }
        }
    }

    Ok(changes)
}

pub fn loadout_item_id(index: i64) -> String {
    format!("neoset{}_loadout", index)
}

fn loadout_slot(index: i64, field: &str) -> Result<usize> {
    usize::try_from(index).map_err(|_| {
        McpError::InvalidRequest(format!("{} must not be negative, got {}", field, index))
    })
}

// An absent stat is an empty list; anything but a list of strings is corrupt.
fn read_loadouts(doc: &ProfileDocument) -> Result<Vec<String>> {
    match doc.stat(LOADOUTS_STAT) {
        None => Ok(Vec::new()),
        Some(value) => value.as_string_list().ok_or_else(|| {
            McpError::InvalidStoredData(format!(
                "stat {} must be a list of strings, found {}",
                LOADOUTS_STAT,
                value.kind()
            ))
        }),
    }
}

/// `sourceIndex == 0` saves the sandbox loadout into slot `targetIndex`;
/// any other source applies that saved loadout back onto the sandbox.
fn copy_cosmetic_loadout(
    doc: &mut ProfileDocument,
    request: &CommandRequest,
    changes: &mut Vec<ChangeRecord>,
) -> Result<()> {
    if request.source_index == 0 {
        let target = loadout_slot(request.target_index, "targetIndex")?;
        let mut loadouts = read_loadouts(doc)?;
        if target > loadouts.len() {
            return Err(McpError::InvalidRequest(format!(
                "targetIndex {} is past the end of {} loadouts",
                target,
                loadouts.len()
            )));
        }
        let sandbox = doc
            .item(SANDBOX_LOADOUT)
            .cloned()
            .ok_or_else(|| McpError::ItemNotFound(SANDBOX_LOADOUT.to_string()))?;

        let new_id = loadout_item_id(request.target_index);
        doc.insert_item(&new_id, sandbox, changes);
        doc.set_item_attribute(
            &new_id,
            LOCKER_NAME_ATTR,
            request.opt_new_name_for_target.as_str(),
            changes,
        );

        if target == loadouts.len() {
            loadouts.push(new_id);
        } else {
            loadouts[target] = new_id;
        }
        doc.set_stat(LOADOUTS_STAT, AttrValue::string_list(loadouts), changes);
    } else {
        let source_id = loadout_item_id(request.source_index);
        let slots_data = doc
            .item(&source_id)
            .ok_or_else(|| McpError::ItemNotFound(source_id.clone()))?
            .attributes
            .get(LOCKER_SLOTS_DATA_ATTR)
            .cloned()
            .unwrap_or_default();

        doc.set_stat(ACTIVE_LOADOUT_INDEX_STAT, request.source_index, changes);
        doc.set_stat(LAST_APPLIED_LOADOUT_STAT, source_id.as_str(), changes);
        doc.set_item_attribute(SANDBOX_LOADOUT, LOCKER_SLOTS_DATA_ATTR, slots_data, changes);
    }

    Ok(())
}

/// Blanks the loadout list entry; the loadout item itself stays.
fn delete_cosmetic_loadout(
    doc: &mut ProfileDocument,
    request: &CommandRequest,
    changes: &mut Vec<ChangeRecord>,
) -> Result<()> {
    let target = loadout_slot(request.target_index, "targetIndex")?;
    let mut loadouts = read_loadouts(doc)?;
    let count = loadouts.len();
    let slot = loadouts.get_mut(target).ok_or_else(|| {
        McpError::InvalidRequest(format!("no loadout at index {} (have {})", target, count))
    })?;
    slot.clear();

    doc.set_stat(LOADOUTS_STAT, AttrValue::string_list(loadouts), changes);
    Ok(())
}

/// Reports the platform change without storing it.
///
/// The stat never reaches `stats.attributes`, so the next load does not see
/// it. Clients have only ever been sent the change record.
fn set_mtx_platform(request: &CommandRequest, changes: &mut Vec<ChangeRecord>) {
    changes.push(ChangeRecord::StatModified {
        name: CURRENT_MTX_PLATFORM_STAT.to_string(),
        value: AttrValue::from(request.new_platform.as_str()),
    });
}
