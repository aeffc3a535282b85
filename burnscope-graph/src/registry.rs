//! Miner classification registry

use std::collections::HashMap;

use burnscope_common::prelude::*;
use burnscope_common::types::display;

/// Everything the registry knows about a sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerInfo {
    pub address: Address,
    pub name: String,
    pub group: String,
    pub color: String,
    pub tracked: bool,
    pub known: bool,
}

/// Read-only lookup of sender display data and grouping.
///
/// Lookups never fail; unknown senders get the display defaults.
pub trait MinerRegistry {
    /// Group the sender's commits are aggregated under
    fn classify(&self, sender: &str) -> String;

    /// Whether the sender belongs to the tracked group
    fn is_tracked(&self, sender: &str) -> bool;

    fn display_name(&self, sender: &str) -> String;

    fn color(&self, sender: &str) -> String;

    /// Whether the sender is listed in the registry at all
    fn is_known(&self, sender: &str) -> bool;

    fn info(&self, sender: &str) -> MinerInfo {
        MinerInfo {
            address: sender.to_string(),
            name: self.display_name(sender),
            group: self.classify(sender),
            color: self.color(sender),
            tracked: self.is_tracked(sender),
            known: self.is_known(sender),
        }
    }
}

/// Registry with no entries: every sender gets the defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRegistry;

impl MinerRegistry for EmptyRegistry {
    fn classify(&self, _sender: &str) -> String {
        display::DEFAULT_GROUP.to_string()
    }

    fn is_tracked(&self, _sender: &str) -> bool {
        false
    }

    fn display_name(&self, sender: &str) -> String {
        display::short_name(sender)
    }

    fn color(&self, _sender: &str) -> String {
        display::DEFAULT_COLOR.to_string()
    }

    fn is_known(&self, _sender: &str) -> bool {
        false
    }
}

/// Fixed sender table
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    miners: HashMap<Address, MinerInfo>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: &str, name: &str, group: &str, tracked: bool) -> &mut Self {
        self.miners.insert(
            address.to_string(),
            MinerInfo {
                address: address.to_string(),
                name: name.to_string(),
                group: group.to_string(),
                color: display::DEFAULT_COLOR.to_string(),
                tracked,
                known: true,
            },
        );
        self
    }
}

impl MinerRegistry for StaticRegistry {
    fn classify(&self, sender: &str) -> String {
        self.miners
            .get(sender)
            .map(|m| m.group.clone())
            .unwrap_or_else(|| EmptyRegistry.classify(sender))
    }

    fn is_tracked(&self, sender: &str) -> bool {
        self.miners.get(sender).is_some_and(|m| m.tracked)
    }

    fn display_name(&self, sender: &str) -> String {
        self.miners
            .get(sender)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| EmptyRegistry.display_name(sender))
    }

    fn color(&self, sender: &str) -> String {
        self.miners
            .get(sender)
            .map(|m| m.color.clone())
            .unwrap_or_else(|| EmptyRegistry.color(sender))
    }

    fn is_known(&self, sender: &str) -> bool {
        self.miners.contains_key(sender)
    }
}
