//! Player inventory sockets

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Item taken out of a socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHandle {
    pub socket: String,
    pub item: String,
}

/// What quest logic needs from the player's inventory.
///
/// Implementations use interior mutability; the session loop and the game
/// side may both hold a reference.
pub trait Inventory: Send + Sync {
    /// Whether any socket holds an item with this name
    fn has_item(&self, name: &str) -> bool;

    /// Take the first item with this name out of its socket
    fn remove_item(&self, name: &str) -> Option<ItemHandle>;
}

#[derive(Debug, Clone)]
struct Socket {
    name: String,
    item: Option<String>,
}

/// Fixed set of named sockets, each holding at most one item.
///
/// Lookups match when the held item's name contains the query,
/// ignoring case.
#[derive(Debug, Default)]
pub struct SocketInventory {
    sockets: Mutex<Vec<Socket>>,
}

impl SocketInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sockets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inventory = Self::new();
        for name in names {
            inventory.add_socket(name);
        }
        inventory
    }

    /// Add an empty socket. Returns false if the name is taken.
    pub fn add_socket(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut sockets = self.lock();
        if sockets.iter().any(|s| s.name == name) {
            tracing::warn!(socket = %name, "Socket already exists");
            return false;
        }
        sockets.push(Socket { name, item: None });
        true
    }

    /// Place an item into an empty socket.
    ///
    /// Returns false when the socket does not exist or is occupied.
    pub fn attach(&self, socket: &str, item: impl Into<String>) -> bool {
        let item = item.into();
        let mut sockets = self.lock();
        match sockets.iter_mut().find(|s| s.name == socket) {
            Some(slot) if slot.item.is_none() => {
                tracing::debug!(socket, item = %item, "Item attached");
                slot.item = Some(item);
                true
            }
            Some(slot) => {
                tracing::debug!(
                    socket,
                    occupied_by = ?slot.item,
                    "Socket occupied, item not attached"
                );
                false
            }
            None => {
                tracing::warn!(socket, "Unknown inventory socket");
                false
            }
        }
    }

    /// Take whatever item a socket holds.
    pub fn detach(&self, socket: &str) -> Option<String> {
        self.lock()
            .iter_mut()
            .find(|s| s.name == socket)
            .and_then(|slot| slot.item.take())
    }

    /// Socket names with their contents, in creation order.
    pub fn sockets(&self) -> Vec<(String, Option<String>)> {
        self.lock()
            .iter()
            .map(|s| (s.name.clone(), s.item.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Socket>> {
        // a panic while holding the lock leaves the socket list intact
        self.sockets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn matches(held: Option<&str>, query: &str) -> bool {
    held.is_some_and(|item| item.to_lowercase().contains(query))
}

impl Inventory for SocketInventory {
    fn has_item(&self, name: &str) -> bool {
        if name.trim().is_empty() {
            tracing::warn!("Item lookup with empty name");
            return false;
        }
        let query = name.to_lowercase();
        self.lock()
            .iter()
            .any(|s| matches(s.item.as_deref(), &query))
    }

    fn remove_item(&self, name: &str) -> Option<ItemHandle> {
        if name.trim().is_empty() {
            tracing::warn!("Item removal with empty name");
            return None;
        }
        let query = name.to_lowercase();
        let mut sockets = self.lock();
        let slot = sockets
            .iter_mut()
            .find(|s| matches(s.item.as_deref(), &query))?;
        let item = slot.item.take()?;
        tracing::debug!(socket = %slot.name, item = %item, "Item removed");
        Some(ItemHandle {
            socket: slot.name.clone(),
            item,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_and_detach() {
        let inventory = SocketInventory::with_sockets(["left_hand", "belt"]);
        assert!(inventory.attach("belt", "Hammer"));
        assert!(inventory.has_item("Hammer"));

        // one item per socket
        assert!(!inventory.attach("belt", "Bread"));
        assert!(!inventory.attach("pocket", "Bread"));

        assert_eq!(inventory.detach("belt").as_deref(), Some("Hammer"));
        assert!(!inventory.has_item("Hammer"));
        assert_eq!(inventory.detach("belt"), None);
    }

    #[test]
    fn test_remove_item_takes_first_match() {
        let inventory = SocketInventory::with_sockets(["a", "b"]);
        inventory.attach("a", "Bread");
        inventory.attach("b", "Bread");

        let handle = inventory.remove_item("Bread").unwrap();
        assert_eq!(handle.socket, "a");
        assert!(inventory.has_item("Bread"));

        inventory.remove_item("Bread");
        assert!(inventory.remove_item("Bread").is_none());
    }

    #[test]
    fn test_lookup_ignores_case_and_matches_substrings() {
        let inventory = SocketInventory::with_sockets(["a"]);
        inventory.attach("a", "Rusty Hammer(Clone)");
        assert!(inventory.has_item("hammer"));
        assert!(inventory.has_item("RUSTY"));
        assert!(!inventory.has_item("Bread"));
    }

    #[test]
    fn test_empty_name_never_matches() {
        let inventory = SocketInventory::with_sockets(["a"]);
        inventory.attach("a", "Hammer");
        assert!(!inventory.has_item(""));
        assert!(inventory.remove_item("  ").is_none());
        assert!(inventory.has_item("Hammer"));
    }

    #[test]
    fn test_duplicate_socket_rejected() {
        let inventory = SocketInventory::new();
        assert!(inventory.add_socket("a"));
        assert!(!inventory.add_socket("a"));
        assert_eq!(inventory.sockets(), vec![("a".to_string(), None)]);
    }
}
