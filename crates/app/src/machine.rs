//! Driver loop — drains the queue, gates execution on the current mode,
//! and advances the mode machine.
//!
//! One tick takes the head of the queue, dispatches it if the current mode
//! admits it, then commits at most one mode transition. Requests queued
//! behind a transition request therefore execute under the committed mode,
//! not the one they were queued in. [`Machine::run`] repeats ticks until
//! the terminal mode is reached and the queue is empty.

use std::sync::Arc;
use std::time::Duration;

use homeguard_domain::command::Command;
use homeguard_domain::item::ItemKind;
use homeguard_domain::mode::Mode;
use tracing::debug;

use crate::controller::Controller;
use crate::group;
use crate::request::Request;

/// Pause between ticks when the queue is empty.
const IDLE_TICK: Duration = Duration::from_millis(10);

pub struct Machine {
    ctrl: Arc<Controller>,
}

impl Machine {
    #[must_use]
    pub fn new(ctrl: Arc<Controller>) -> Self {
        Self { ctrl }
    }

    /// Execute the head of the queue (if the current mode admits it) and
    /// advance the mode machine. Returns the number of executed requests.
    pub fn tick(&self) -> usize {
        let mut executed = 0_usize;
        if let Some(request) = self.ctrl.queue().dequeue() {
            let mode = self.ctrl.mode();
            if admitted(mode, &request) {
                self.dispatch(&request);
                executed = 1;
            } else {
                debug!(
                    request = %request.id,
                    %mode,
                    command = request.command.as_ref().map_or("-", Command::as_str),
                    "request not admitted in current mode"
                );
            }
        }
        self.ctrl.step_mode();
        executed
    }

    /// Tick until the terminal mode is reached and the queue has drained.
    pub fn run(&self) {
        loop {
            self.tick();
            if self.ctrl.mode().is_terminal() && self.ctrl.queue().is_empty() {
                break;
            }
            if self.ctrl.queue().is_empty() {
                std::thread::sleep(IDLE_TICK);
            }
        }
    }

    fn dispatch(&self, request: &Request) {
        let Some(target) = request.target.item() else {
            return;
        };
        match target.kind() {
            ItemKind::Controller => self.ctrl.execute(request),
            ItemKind::Element => self.ctrl.elements().execute(target, request),
            ItemKind::Group => {
                for copy in group::fan_out(self.ctrl.registry(), target, request) {
                    self.ctrl.queue().enqueue(copy);
                }
            }
            ItemKind::Node | ItemKind::Rule | ItemKind::Timer => {
                target.touch();
                debug!(target = %target.id(), "target kind takes no commands");
            }
        }
    }
}

/// Mode admission filter.
///
/// Nothing executes before startup wiring finishes; the armed mode only
/// admits controller traffic and alert delivery; the transient modes admit
/// controller traffic only.
fn admitted(mode: Mode, request: &Request) -> bool {
    let controller_traffic = request.target.is_controller() || request.sender.is_controller();
    match mode {
        Mode::Start => false,
        Mode::Run | Mode::Sleep | Mode::Stop => true,
        Mode::Lock => controller_traffic || request.command == Some(Command::SendAlert),
        Mode::Check | Mode::Prelock | Mode::Warning | Mode::Detection | Mode::Idle => {
            controller_traffic
        }
    }
}
