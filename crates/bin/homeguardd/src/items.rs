//! Item definitions loading — one TOML file describing every registered
//! item.
//!
//! ```toml
//! [[items]]
//! id = "living_plug"
//! kind = "element"
//! onoff_enable = true
//! ```

use homeguard_domain::item::ItemConfig;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
struct ItemsFile {
    #[serde(default)]
    items: Vec<ItemConfig>,
}

/// Load the item definitions. A missing file yields an empty dwelling with
/// a warning; a malformed file is an error.
///
/// # Errors
///
/// Returns an [`ItemsError`] when the file exists but cannot be read or
/// parsed.
pub fn load(path: &str) -> Result<Vec<ItemConfig>, ItemsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str::<ItemsFile>(&content)?.items),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path, "items file not found, starting with an empty dwelling");
            Ok(Vec::new())
        }
        Err(err) => Err(ItemsError::Io(err)),
    }
}

/// Item definition loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ItemsError {
    /// TOML parse failure.
    #[error("failed to parse items file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read items file")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use homeguard_domain::command::Command;
    use homeguard_domain::id::ItemId;
    use homeguard_domain::item::{ItemKind, ItemSettings};
    use homeguard_domain::rule::TargetOverride;

    use super::*;

    #[test]
    fn should_parse_a_full_dwelling() {
        let parsed: ItemsFile = toml::from_str(
            r#"
            [[items]]
            id = "controller"
            kind = "controller"
            detection_threshold = 2
            time_day = "07:00:00"

            [[items]]
            id = "living_plug"
            kind = "element"
            onoff_enable = true
            timeout_value = 600
            [items.features]
            state = "onoff"

            [[items]]
            id = "zigbee"
            kind = "node"
            elements = [{ id = "living_plug", sid = "0x1234" }]

            [[items]]
            id = "lights"
            kind = "group"
            members = ["living_plug"]

            [[items]]
            id = "every_second"
            kind = "timer"
            period_secs = 1

            [[items]]
            id = "rule_plug"
            kind = "rule"
            sender = "living_plug"
            target = "controller"
            command = "dummy_command"
            [[items.conditions]]
            subject = "this"
            feature = "onoff"
            operator = "="
            value = "ON"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.items.len(), 6);
        let kinds: Vec<ItemKind> = parsed.items.iter().map(|i| i.settings.kind()).collect();
        assert_eq!(
            kinds,
            [
                ItemKind::Controller,
                ItemKind::Element,
                ItemKind::Node,
                ItemKind::Group,
                ItemKind::Timer,
                ItemKind::Rule,
            ]
        );

        let ItemSettings::Rule(rule) = &parsed.items[5].settings else {
            panic!("wrong kind");
        };
        assert_eq!(rule.sender, Some(ItemId::new("living_plug")));
        assert_eq!(
            rule.target,
            Some(TargetOverride::Item(ItemId::controller()))
        );
        assert_eq!(rule.command, Some(Command::Dummy));
        assert_eq!(rule.conditions.len(), 1);
    }

    #[test]
    fn should_return_empty_dwelling_for_missing_file() {
        assert!(load("does-not-exist.toml").unwrap().is_empty());
    }

    #[test]
    fn should_reject_malformed_items() {
        let parsed: Result<ItemsFile, _> = toml::from_str("[[items]]\nid = 3");
        assert!(parsed.is_err());
    }
}
