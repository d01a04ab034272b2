//! Registry — the arena of live items.
//!
//! Built once at startup from configuration, then shared read-only (the
//! items themselves carry interior mutability). Lookups never fail: a miss
//! yields the empty [`ItemRef`] sentinel and the pipeline degrades to a
//! no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use homeguard_domain::error::ValidationError;
use homeguard_domain::id::ItemId;
use homeguard_domain::item::{ControllerSettings, ItemConfig, ItemKind, ItemSettings};
use homeguard_domain::message::Message;
use tracing::warn;

use crate::item::{Item, ItemRef};

/// All registered items, keyed by identifier.
#[derive(Debug)]
pub struct Registry {
    items: BTreeMap<ItemId, Arc<Item>>,
    controller: Arc<Item>,
}

impl Registry {
    /// Build the registry from configuration and wire cross references
    /// (group membership, node attachment).
    ///
    /// A missing controller entry gets default settings. Wiring references
    /// to unknown items are recorded in the referencing item's error buffer
    /// instead of failing the build.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty identifier, a duplicate
    /// identifier, or a non-controller item claiming the reserved
    /// controller identifier.
    pub fn from_configs(configs: Vec<ItemConfig>) -> Result<Self, ValidationError> {
        let mut items: BTreeMap<ItemId, Arc<Item>> = BTreeMap::new();

        for config in configs {
            if config.id.as_str().is_empty() {
                return Err(ValidationError::EmptyId);
            }
            if config.id.is_controller() && config.settings.kind() != ItemKind::Controller {
                return Err(ValidationError::ReservedId(config.id));
            }
            if items.contains_key(&config.id) {
                return Err(ValidationError::DuplicateId(config.id));
            }
            let item = Arc::new(Item::new(config.id.clone(), config.settings));
            items.insert(config.id, item);
        }

        let controller = match items.get(&ItemId::controller()) {
            Some(existing) if existing.kind() == ItemKind::Controller => Arc::clone(existing),
            Some(_) => unreachable!("reserved id is rejected above"),
            None => {
                let item = Arc::new(Item::new(
                    ItemId::controller(),
                    ItemSettings::Controller(ControllerSettings::default()),
                ));
                items.insert(ItemId::controller(), Arc::clone(&item));
                item
            }
        };
        controller.update_status(Message::new().with("state", "start"));

        let registry = Self { items, controller };
        registry.wire_groups();
        registry.wire_nodes();
        Ok(registry)
    }

    /// Push each group's id into its members' group lists, so sender-group
    /// rule matching only ever consults the member side.
    fn wire_groups(&self) {
        for group in self.of_kind(ItemKind::Group) {
            let members = group.with_settings(|s| match s {
                ItemSettings::Group(g) => g.members.clone(),
                _ => Vec::new(),
            });
            for member_id in members {
                let Some(member) = self.items.get(&member_id) else {
                    warn!(group = %group.id(), member = %member_id, "group member not registered");
                    group.push_error(format!("member_failed_{member_id}"));
                    continue;
                };
                member.with_settings_mut(|s| {
                    let groups = match s {
                        ItemSettings::Controller(c) => &mut c.groups,
                        ItemSettings::Element(e) => &mut e.groups,
                        ItemSettings::Node(n) => &mut n.groups,
                        ItemSettings::Group(g) => &mut g.groups,
                        ItemSettings::Timer(t) => &mut t.groups,
                        ItemSettings::Rule(_) => return,
                    };
                    if !groups.contains(group.id()) {
                        groups.push(group.id().clone());
                    }
                });
            }
        }
    }

    /// Attach node members: each listed element learns its node and the
    /// external name (`sid`) the node uses for it.
    fn wire_nodes(&self) {
        for node in self.of_kind(ItemKind::Node) {
            let members = node.with_settings(|s| match s {
                ItemSettings::Node(n) => n.elements.clone(),
                _ => Vec::new(),
            });
            for member in members {
                let Some(element) = self.items.get(&member.id) else {
                    warn!(node = %node.id(), element = %member.id, "node element not registered");
                    node.push_error(format!("element_failed_{}", member.id));
                    continue;
                };
                element.with_settings_mut(|s| {
                    if let ItemSettings::Element(e) = s {
                        e.node = Some(node.id().clone());
                        e.sid = Some(member.sid.clone());
                    }
                });
            }
        }
    }

    /// Look an item up; a miss yields the empty sentinel.
    #[must_use]
    pub fn resolve(&self, id: &ItemId) -> ItemRef {
        match self.items.get(id) {
            Some(item) => ItemRef::new(Arc::clone(item)),
            None => ItemRef::empty(),
        }
    }

    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Arc<Item>> {
        self.items.get(id)
    }

    /// The controller item, always present.
    #[must_use]
    pub fn controller(&self) -> ItemRef {
        ItemRef::new(Arc::clone(&self.controller))
    }

    #[must_use]
    pub fn controller_item(&self) -> &Arc<Item> {
        &self.controller
    }

    /// All items of one kind, in identifier order.
    #[must_use]
    pub fn of_kind(&self, kind: ItemKind) -> Vec<Arc<Item>> {
        self.items
            .values()
            .filter(|item| item.kind() == kind)
            .map(Arc::clone)
            .collect()
    }

    /// Identifiers of one kind, in order.
    #[must_use]
    pub fn ids_of_kind(&self, kind: ItemKind) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|item| item.kind() == kind)
            .map(|item| item.id().clone())
            .collect()
    }

    /// Resolved members of a group; unknown members are skipped.
    #[must_use]
    pub fn members_of(&self, group_id: &ItemId) -> Vec<Arc<Item>> {
        let Some(group) = self.items.get(group_id) else {
            return Vec::new();
        };
        let members = group.with_settings(|s| match s {
            ItemSettings::Group(g) => g.members.clone(),
            _ => Vec::new(),
        });
        members
            .into_iter()
            .filter_map(|id| self.items.get(&id).map(Arc::clone))
            .collect()
    }

    /// Settings snapshot of one kind, for persistence.
    #[must_use]
    pub fn snapshot(&self, kind: ItemKind) -> Vec<ItemConfig> {
        self.items
            .values()
            .filter(|item| item.kind() == kind)
            .map(|item| ItemConfig {
                id: item.id().clone(),
                settings: item.settings(),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use homeguard_domain::item::{
        ElementSettings, GroupSettings, NodeMember, NodeSettings,
    };
    use homeguard_domain::value::Value;

    use super::*;

    fn element(id: &str) -> ItemConfig {
        ItemConfig {
            id: ItemId::new(id),
            settings: ItemSettings::Element(ElementSettings::default()),
        }
    }

    fn group(id: &str, members: &[&str]) -> ItemConfig {
        ItemConfig {
            id: ItemId::new(id),
            settings: ItemSettings::Group(GroupSettings {
                members: members.iter().map(|id| ItemId::new(*id)).collect(),
                ..GroupSettings::default()
            }),
        }
    }

    #[test]
    fn should_create_default_controller_when_absent() {
        let registry = Registry::from_configs(vec![element("plug")]).unwrap();
        let controller = registry.controller();
        assert!(controller.is_controller());
        assert_eq!(
            registry.controller_item().status_value("state"),
            Some(Value::from("start"))
        );
    }

    #[test]
    fn should_reject_duplicate_identifiers() {
        let err = Registry::from_configs(vec![element("plug"), element("plug")]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateId(ItemId::new("plug")));
    }

    #[test]
    fn should_reject_reserved_identifier_on_non_controller() {
        let err = Registry::from_configs(vec![element("controller")]).unwrap_err();
        assert_eq!(err, ValidationError::ReservedId(ItemId::controller()));
    }

    #[test]
    fn should_reject_empty_identifier() {
        let err = Registry::from_configs(vec![element("")]).unwrap_err();
        assert_eq!(err, ValidationError::EmptyId);
    }

    #[test]
    fn should_resolve_miss_to_empty_sentinel() {
        let registry = Registry::from_configs(Vec::new()).unwrap();
        assert!(!registry.resolve(&ItemId::new("ghost")).is_resolved());
    }

    #[test]
    fn should_wire_group_membership_into_members() {
        let registry = Registry::from_configs(vec![
            element("plug"),
            element("lamp"),
            group("lights", &["plug", "lamp"]),
        ])
        .unwrap();
        let plug = registry.get(&ItemId::new("plug")).unwrap();
        assert!(plug.groups().contains(&ItemId::new("lights")));
        assert_eq!(registry.members_of(&ItemId::new("lights")).len(), 2);
    }

    #[test]
    fn should_record_unknown_group_member_in_error_buffer() {
        let registry =
            Registry::from_configs(vec![group("lights", &["missing"])]).unwrap();
        let group = registry.get(&ItemId::new("lights")).unwrap();
        assert_eq!(
            group.status_value("error_buffer"),
            Some(Value::List(vec![Value::from("member_failed_missing")]))
        );
    }

    #[test]
    fn should_attach_node_members_to_their_node() {
        let registry = Registry::from_configs(vec![
            element("plug"),
            ItemConfig {
                id: ItemId::new("zigbee"),
                settings: ItemSettings::Node(NodeSettings {
                    elements: vec![NodeMember {
                        id: ItemId::new("plug"),
                        sid: "0x00124b00".to_string(),
                    }],
                    ..NodeSettings::default()
                }),
            },
        ])
        .unwrap();
        let plug = registry.get(&ItemId::new("plug")).unwrap();
        plug.with_settings(|s| {
            let ItemSettings::Element(e) = s else {
                panic!("kind changed");
            };
            assert_eq!(e.node, Some(ItemId::new("zigbee")));
            assert_eq!(e.sid.as_deref(), Some("0x00124b00"));
        });
    }

    #[test]
    fn should_snapshot_settings_by_kind() {
        let registry =
            Registry::from_configs(vec![element("plug"), element("lamp")]).unwrap();
        let snapshot = registry.snapshot(ItemKind::Element);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, ItemId::new("lamp"));
        assert!(registry.snapshot(ItemKind::Controller).len() == 1);
    }
}
