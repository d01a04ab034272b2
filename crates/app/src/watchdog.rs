//! Watchdog — the periodic checks driven by timer items.
//!
//! Two routines, matching the two timer roles: [`Watchdog::check_elements`]
//! sweeps device state (auto-off, door/window/temperature aggregates) and
//! [`Watchdog::check_system`] keeps the controller clock, the day/night
//! flag, and the mode/detection timeouts. Both only ever *submit* candidate
//! requests, and the submission goes through the rule engine like adapter
//! traffic: without a rule authorizing the controller as sender, timer
//! traffic is dropped.

use std::sync::Arc;

use homeguard_domain::command::Command;
use homeguard_domain::id::ItemId;
use homeguard_domain::item::{ControllerSettings, ItemKind, ItemSettings};
use homeguard_domain::message::Message;
use homeguard_domain::mode::Mode;
use homeguard_domain::time::{self, Timestamp};
use homeguard_domain::value::Value;
use tracing::debug;

use crate::controller::Controller;
use crate::item::Item;
use crate::request::Request;

pub struct Watchdog {
    ctrl: Arc<Controller>,
}

impl Watchdog {
    #[must_use]
    pub fn new(ctrl: Arc<Controller>) -> Self {
        Self { ctrl }
    }

    /// Sweep device state: auto-off overdue elements and refresh the
    /// dwelling aggregates.
    pub fn check_elements(&self) {
        let settings = self.ctrl.settings();
        self.sweep_auto_off(&settings);
        self.sweep_contact(
            settings.group_door.as_ref(),
            settings.feature_door.as_deref(),
            Command::UpdateDoor,
            "door_open",
        );
        self.sweep_contact(
            settings.group_window.as_ref(),
            settings.feature_window.as_deref(),
            Command::UpdateWindow,
            "window_open",
        );
        self.sweep_temperature(&settings);
    }

    /// Keep the controller clock, the day/night flag, and the timeouts.
    pub fn check_system(&self) {
        self.submit(Command::UpdateTime, Message::new());
        self.check_timelight();
        self.check_detection_timeout();
        self.check_mode_timeout();
    }

    /// Turn off elements that stayed on past their timeout. Firing disarms
    /// the element's timeout so the off command is sent once; the disarmed
    /// timeout is re-armed once the element reports off.
    fn sweep_auto_off(&self, settings: &ControllerSettings) {
        for element in self.watched(settings.group_onoff.as_ref()) {
            let Some((armed, timeout_value)) = element.with_settings(|s| match s {
                ItemSettings::Element(e) if e.enable && e.onoff_enable => {
                    Some((e.timeout_enable, e.timeout_value))
                }
                _ => None,
            }) else {
                continue;
            };
            if element.status_value("onoff") == Some(Value::from("OFF")) {
                if !armed {
                    debug!(element = %element.id(), "auto-off re-armed");
                    element.apply_settings(&Message::new().with("timeout_enable", true));
                }
                continue;
            }
            if !armed || element.status_value("onoff") != Some(Value::from("ON")) {
                continue;
            }
            let Some(timeout) = timeout_value else {
                continue;
            };
            let Some(on_since) = element
                .status_value("last_time_on")
                .as_ref()
                .and_then(Value::as_time)
            else {
                continue;
            };
            let interacted = element
                .status_value("last_time_interaction")
                .as_ref()
                .and_then(Value::as_time);
            if elapsed(on_since) > timeout && interacted.is_none_or(|ts| elapsed(ts) > timeout) {
                debug!(element = %element.id(), timeout, "auto-off");
                element.apply_settings(&Message::new().with("timeout_enable", false));
                let off = Message::new().with("onoff", "OFF");
                self.ctrl.route(
                    Request::new(self.ctrl.registry().controller())
                        .with_target(self.ctrl.resolve(element.id()))
                        .with_command(Command::SetStatus)
                        .with_message(off.clone())
                        .with_payload(off),
                );
            }
        }
    }

    /// Aggregate a contact-sensor group into one open/closed flag; a change
    /// against the controller status is submitted as an update.
    fn sweep_contact(
        &self,
        group: Option<&ItemId>,
        feature: Option<&str>,
        command: Command,
        status_key: &str,
    ) {
        let (Some(group), Some(feature)) = (group, feature) else {
            return;
        };
        let open = self
            .ctrl
            .registry()
            .members_of(group)
            .iter()
            .any(|member| {
                member
                    .status_value(feature)
                    .as_ref()
                    .is_some_and(value_is_open)
            });
        let current = self
            .ctrl
            .registry()
            .controller_item()
            .status_value(status_key)
            .as_ref()
            .and_then(Value::as_bool);
        if current != Some(open) {
            self.submit(command, Message::new().with("open", open));
        }
    }

    /// Average the temperature group; a change beyond rounding noise is
    /// submitted.
    fn sweep_temperature(&self, settings: &ControllerSettings) {
        let (Some(group), Some(feature)) = (
            settings.group_temperature.as_ref(),
            settings.feature_temperature.as_deref(),
        ) else {
            return;
        };
        let readings: Vec<f64> = self
            .ctrl
            .registry()
            .members_of(group)
            .iter()
            .filter_map(|member| member.status_value(feature).as_ref().and_then(Value::as_f64))
            .collect();
        if readings.is_empty() {
            return;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = readings.iter().sum::<f64>() / readings.len() as f64;
        let current = self
            .ctrl
            .registry()
            .controller_item()
            .status_value("temperature")
            .as_ref()
            .and_then(Value::as_f64);
        if current.is_none_or(|value| (value - mean).abs() > 0.05) {
            self.submit(Command::UpdateTemperature, Message::new().with("temperature", mean));
        }
    }

    /// Flip the day/night flag when the clock crosses the configured bounds.
    fn check_timelight(&self) {
        let settings = self.ctrl.settings();
        let clock = time::now().format("%H:%M:%S").to_string();
        let timelight = if clock.as_str() >= settings.time_day.as_str()
            && clock.as_str() < settings.time_night.as_str()
        {
            "day"
        } else {
            "night"
        };
        let current = self
            .ctrl
            .registry()
            .controller_item()
            .status_value("timelight");
        if current != Some(Value::from(timelight)) {
            self.submit(
                Command::UpdateTimelight,
                Message::new().with("timelight", timelight),
            );
        }
    }

    /// While armed, an elapsed grace window since the last detection event
    /// restarts the count.
    fn check_detection_timeout(&self) {
        if self.ctrl.mode() != Mode::Lock {
            return;
        }
        let Some(grace) = self.ctrl.settings().timeout_detection else {
            return;
        };
        if self.ctrl.detection_count() == 0 {
            return;
        }
        let Some(last) = self.ctrl.last_detection_at() else {
            return;
        };
        if elapsed(last) > grace {
            self.submit(Command::TimeoutDetection, Message::new());
        }
    }

    /// Raise the timeout signal once the current mode outlived its
    /// configured duration. Modes absent from the table never time out.
    fn check_mode_timeout(&self) {
        let mode = self.ctrl.mode();
        let Some(limit) = self
            .ctrl
            .settings()
            .timeout_state
            .get(mode.as_str())
            .copied()
        else {
            return;
        };
        if elapsed(self.ctrl.mode_entered_at()) > limit {
            self.submit(Command::TimeoutFsm, Message::new());
        }
    }

    /// Elements watched by the auto-off sweep: the configured group, or
    /// every element when none is configured.
    fn watched(&self, group: Option<&ItemId>) -> Vec<Arc<Item>> {
        match group {
            Some(group) => self.ctrl.registry().members_of(group),
            None => self.ctrl.registry().of_kind(ItemKind::Element),
        }
    }

    fn submit(&self, command: Command, payload: Message) {
        self.ctrl.route(
            Request::new(self.ctrl.registry().controller())
                .with_target(self.ctrl.registry().controller())
                .with_command(command)
                .with_message(payload.clone())
                .with_payload(payload),
        );
    }
}

/// Whole seconds since the given timestamp.
fn elapsed(since: Timestamp) -> u64 {
    u64::try_from((time::now() - since).num_seconds()).unwrap_or(0)
}

fn value_is_open(value: &Value) -> bool {
    match value {
        Value::Bool(open) => *open,
        Value::Text(text) => text == "ON" || text == "open",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use homeguard_domain::item::{
        ElementSettings, GroupSettings, ItemConfig, RuleSettings,
    };

    use super::*;
    use crate::ports::SettingsStore;
    use crate::registry::Registry;

    struct NullStore;

    impl SettingsStore for NullStore {
        fn save(
            &self,
            _kind: ItemKind,
            _items: &[ItemConfig],
        ) -> Result<(), homeguard_domain::error::HomeguardError> {
            Ok(())
        }
    }

    fn fixture(configs: Vec<ItemConfig>) -> (Arc<Controller>, Watchdog) {
        let registry = Arc::new(Registry::from_configs(configs).unwrap());
        let ctrl = Arc::new(Controller::new(registry, Arc::new(NullStore)));
        let watchdog = Watchdog::new(Arc::clone(&ctrl));
        (ctrl, watchdog)
    }

    fn drain_commands(ctrl: &Controller) -> Vec<Command> {
        std::iter::from_fn(|| ctrl.queue().dequeue())
            .filter_map(|r| r.command)
            .collect()
    }

    fn controller_config(settings: ControllerSettings) -> ItemConfig {
        ItemConfig {
            id: ItemId::controller(),
            settings: ItemSettings::Controller(settings),
        }
    }

    /// The pass-through rule authorizing timer traffic, as a deployment
    /// configures it.
    fn system_rule() -> ItemConfig {
        ItemConfig {
            id: ItemId::new("rule_system"),
            settings: ItemSettings::Rule(RuleSettings {
                sender: Some(ItemId::controller()),
                ..RuleSettings::default()
            }),
        }
    }

    #[test]
    fn should_submit_auto_off_for_overdue_element() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            ItemConfig {
                id: ItemId::new("heater"),
                settings: ItemSettings::Element(ElementSettings {
                    onoff_enable: true,
                    timeout_value: Some(0),
                    ..ElementSettings::default()
                }),
            },
        ]);
        let heater = ctrl.registry().get(&ItemId::new("heater")).unwrap();
        let past = time::now() - chrono::Duration::seconds(5);
        heater.update_status(
            Message::new()
                .with("onoff", "ON")
                .with("last_time_on", past)
                .with("last_time_interaction", past),
        );

        watchdog.check_elements();

        let request = ctrl.queue().dequeue().unwrap();
        assert!(request.target.is(&ItemId::new("heater")));
        assert_eq!(request.command, Some(Command::SetStatus));
        assert_eq!(request.payload.get("onoff"), Some(&Value::from("OFF")));
        // The timeout is disarmed until the next on edge.
        watchdog.check_elements();
        assert!(ctrl.queue().is_empty());
    }

    #[test]
    fn should_not_auto_off_recently_used_element() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            ItemConfig {
                id: ItemId::new("heater"),
                settings: ItemSettings::Element(ElementSettings {
                    onoff_enable: true,
                    timeout_value: Some(3600),
                    ..ElementSettings::default()
                }),
            },
        ]);
        let heater = ctrl.registry().get(&ItemId::new("heater")).unwrap();
        heater.update_status(
            Message::new()
                .with("onoff", "ON")
                .with("last_time_on", time::now()),
        );

        watchdog.check_elements();
        assert!(ctrl.queue().is_empty());
    }

    #[test]
    fn should_aggregate_door_group_into_one_flag() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            controller_config(ControllerSettings {
                group_door: Some(ItemId::new("doors")),
                feature_door: Some("contact".to_string()),
                ..ControllerSettings::default()
            }),
            ItemConfig {
                id: ItemId::new("front"),
                settings: ItemSettings::Element(ElementSettings::default()),
            },
            ItemConfig {
                id: ItemId::new("back"),
                settings: ItemSettings::Element(ElementSettings::default()),
            },
            ItemConfig {
                id: ItemId::new("doors"),
                settings: ItemSettings::Group(GroupSettings {
                    members: vec![ItemId::new("front"), ItemId::new("back")],
                    ..GroupSettings::default()
                }),
            },
        ]);
        ctrl.registry()
            .get(&ItemId::new("front"))
            .unwrap()
            .update_status(Message::new().with("contact", "open"));

        watchdog.check_elements();
        let request = ctrl.queue().dequeue().unwrap();
        assert_eq!(request.command, Some(Command::UpdateDoor));
        assert_eq!(request.payload.get("open"), Some(&Value::Bool(true)));

        // Execute the update; an unchanged aggregate submits nothing.
        ctrl.execute(&request);
        watchdog.check_elements();
        assert!(ctrl.queue().is_empty());
    }

    #[test]
    fn should_average_temperature_readings() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            controller_config(ControllerSettings {
                group_temperature: Some(ItemId::new("climate")),
                feature_temperature: Some("temperature".to_string()),
                ..ControllerSettings::default()
            }),
            ItemConfig {
                id: ItemId::new("t1"),
                settings: ItemSettings::Element(ElementSettings::default()),
            },
            ItemConfig {
                id: ItemId::new("t2"),
                settings: ItemSettings::Element(ElementSettings::default()),
            },
            ItemConfig {
                id: ItemId::new("climate"),
                settings: ItemSettings::Group(GroupSettings {
                    members: vec![ItemId::new("t1"), ItemId::new("t2")],
                    ..GroupSettings::default()
                }),
            },
        ]);
        ctrl.registry()
            .get(&ItemId::new("t1"))
            .unwrap()
            .update_status(Message::new().with("temperature", 20.0));
        ctrl.registry()
            .get(&ItemId::new("t2"))
            .unwrap()
            .update_status(Message::new().with("temperature", 22.0));

        watchdog.check_elements();
        let request = ctrl.queue().dequeue().unwrap();
        assert_eq!(request.command, Some(Command::UpdateTemperature));
        assert_eq!(
            request.payload.get("temperature"),
            Some(&Value::Float(21.0))
        );
    }

    #[test]
    fn should_raise_mode_timeout_after_configured_duration() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            controller_config(ControllerSettings {
                timeout_state: [("run".to_string(), 0_u64)].into_iter().collect(),
                ..ControllerSettings::default()
            }),
        ]);
        ctrl.force_mode(Mode::Run);
        std::thread::sleep(std::time::Duration::from_millis(1100));

        watchdog.check_system();
        assert!(drain_commands(&ctrl).contains(&Command::TimeoutFsm));
    }

    #[test]
    fn should_not_raise_mode_timeout_for_unconfigured_mode() {
        let (ctrl, watchdog) = fixture(vec![system_rule()]);
        ctrl.force_mode(Mode::Run);
        watchdog.check_system();
        assert!(!drain_commands(&ctrl).contains(&Command::TimeoutFsm));
    }

    #[test]
    fn should_raise_detection_timeout_only_while_locked() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            controller_config(ControllerSettings {
                timeout_detection: Some(0),
                ..ControllerSettings::default()
            }),
            ItemConfig {
                id: ItemId::new("pir"),
                settings: ItemSettings::Element(ElementSettings {
                    detection_enable: true,
                    ..ElementSettings::default()
                }),
            },
        ]);
        ctrl.force_mode(Mode::Run);
        ctrl.execute(
            &Request::new(ctrl.resolve(&ItemId::new("pir")))
                .with_target(ctrl.registry().controller())
                .with_command(Command::DetectionEvent),
        );
        std::thread::sleep(std::time::Duration::from_millis(1100));

        watchdog.check_system();
        assert!(!drain_commands(&ctrl).contains(&Command::TimeoutDetection));

        ctrl.force_mode(Mode::Lock);
        watchdog.check_system();
        assert!(drain_commands(&ctrl).contains(&Command::TimeoutDetection));
    }

    #[test]
    fn should_refresh_clock_and_timelight() {
        let (ctrl, watchdog) = fixture(vec![system_rule()]);
        watchdog.check_system();
        let commands = drain_commands(&ctrl);
        assert!(commands.contains(&Command::UpdateTime));
        assert!(commands.contains(&Command::UpdateTimelight));
    }

    #[test]
    fn should_drop_timer_traffic_without_an_authorizing_rule() {
        let (ctrl, watchdog) = fixture(Vec::new());
        watchdog.check_system();
        watchdog.check_elements();
        assert!(ctrl.queue().is_empty());
    }

    #[test]
    fn should_rearm_auto_off_once_the_element_reports_off() {
        let (ctrl, watchdog) = fixture(vec![
            system_rule(),
            ItemConfig {
                id: ItemId::new("heater"),
                settings: ItemSettings::Element(ElementSettings {
                    onoff_enable: true,
                    timeout_enable: false,
                    timeout_value: Some(60),
                    ..ElementSettings::default()
                }),
            },
        ]);
        let heater = ctrl.registry().get(&ItemId::new("heater")).unwrap();
        heater.update_status(Message::new().with("onoff", "OFF"));

        watchdog.check_elements();

        assert!(ctrl.queue().is_empty());
        heater.with_settings(|s| {
            let ItemSettings::Element(e) = s else {
                panic!("kind changed");
            };
            assert!(e.timeout_enable);
        });
    }
}
