//! C5 — Channel Name Classifier. Pure, no state.
//!
//! Grounded on sockudo's `channel::manager::ChannelManager::get_channel_type`
//! (here without the `moka` cache: classification is a cheap prefix check,
//! not a per-app config lookup, so the cache bought nothing in this shape).

pub mod registry;

use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^(public|private|presence)-[A-Za-z0-9_-]+$").unwrap());

const MAX_CHANNEL_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Public,
    Private,
    Presence,
}

impl ChannelType {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("presence-") {
            ChannelType::Presence
        } else if name.starts_with("private-") {
            ChannelType::Private
        } else {
            ChannelType::Public
        }
    }

    pub fn requires_authentication(self) -> bool {
        matches!(self, ChannelType::Private | ChannelType::Presence)
    }
}

/// `classify(name)` from spec.md §4.1.
pub fn classify(name: &str) -> ChannelType {
    ChannelType::from_name(name)
}

/// `is_valid(name)` from spec.md §4.1: `^(public|private|presence)-[A-Za-z0-9_-]+$`,
/// length <= 200.
pub fn is_valid(name: &str) -> bool {
    name.len() <= MAX_CHANNEL_NAME_LEN && NAME_PATTERN.is_match(name)
}

/// `requires_auth(name)` from spec.md §4.1.
pub fn requires_auth(name: &str) -> bool {
    classify(name).requires_authentication()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_prefix() {
        assert_eq!(classify("public-chat"), ChannelType::Public);
        assert_eq!(classify("private-chat"), ChannelType::Private);
        assert_eq!(classify("presence-room"), ChannelType::Presence);
        assert_eq!(classify("chat"), ChannelType::Public);
    }

    #[test]
    fn validates_name_shape() {
        assert!(is_valid("public-chat"));
        assert!(is_valid("private-chat_1"));
        assert!(is_valid("presence-room-1"));
        assert!(!is_valid("chat"));
        assert!(!is_valid("public-"));
        assert!(!is_valid("public-has a space"));
        assert!(!is_valid(""));
    }

    #[test]
    fn rejects_overlong_names() {
        let long = format!("public-{}", "a".repeat(200));
        assert!(!is_valid(&long));
    }

    #[test]
    fn requires_auth_only_for_private_and_presence() {
        assert!(!requires_auth("public-chat"));
        assert!(requires_auth("private-chat"));
        assert!(requires_auth("presence-room"));
    }
}
