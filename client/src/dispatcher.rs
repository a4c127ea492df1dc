//! Maps received frames onto game actions.

use crate::game::GameActions;
use log::{error, info};
use shared::{Command, START_SCENE};

/// Turns raw frames into exactly one call on a [`GameActions`] collaborator.
///
/// Unrecognized tokens are logged and otherwise ignored; dispatch never fails.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    start_scene: String,
    enable_logging: bool,
}

impl CommandDispatcher {
    pub fn new(enable_logging: bool) -> Self {
        Self {
            start_scene: START_SCENE.to_string(),
            enable_logging,
        }
    }

    pub fn with_start_scene(mut self, scene: impl Into<String>) -> Self {
        self.start_scene = scene.into();
        self
    }

    pub fn dispatch_bytes<A: GameActions + ?Sized>(&self, raw: &[u8], actions: &mut A) -> Command {
        let command = Command::from_bytes(raw);
        self.apply(&command, actions);
        command
    }

    pub fn dispatch_text<A: GameActions + ?Sized>(&self, raw: &str, actions: &mut A) -> Command {
        let command = Command::parse(raw);
        self.apply(&command, actions);
        command
    }

    /// Applies an already-parsed command.
    pub fn apply<A: GameActions + ?Sized>(&self, command: &Command, actions: &mut A) {
        match command {
            Command::Left => {
                actions.change_lane(-1);
                self.log("ChangeLane left executed");
            }
            Command::Right => {
                actions.change_lane(1);
                self.log("ChangeLane right executed");
            }
            Command::Jump | Command::Up => {
                actions.jump();
                self.log("Jump executed");
            }
            Command::Slide | Command::Down => {
                actions.slide();
                self.log("Slide executed");
            }
            Command::Start => {
                actions.load_scene(&self.start_scene);
                self.log("Start game");
            }
            Command::Unrecognized(token) => {
                error!("Unknown command: {:?}", token);
            }
        }
    }

    fn log(&self, message: &str) {
        if self.enable_logging {
            info!("{}", message);
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::RunnerState;

    /// Records every collaborator call in order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingActions {
        pub calls: Vec<String>,
    }

    impl GameActions for RecordingActions {
        fn change_lane(&mut self, direction: i32) {
            self.calls.push(format!("change_lane({})", direction));
        }

        fn jump(&mut self) {
            self.calls.push("jump".to_string());
        }

        fn slide(&mut self) {
            self.calls.push("slide".to_string());
        }

        fn load_scene(&mut self, name: &str) {
            self.calls.push(format!("load_scene({})", name));
        }
    }

    #[test]
    fn test_command_table() {
        let dispatcher = CommandDispatcher::new(false);
        let cases = [
            ("left", "change_lane(-1)"),
            ("right", "change_lane(1)"),
            ("jump", "jump"),
            ("up", "jump"),
            ("slide", "slide"),
            ("down", "slide"),
            ("start", "load_scene(Main)"),
        ];

        for (token, expected) in cases {
            let mut actions = RecordingActions::default();
            dispatcher.dispatch_text(token, &mut actions);
            assert_eq!(actions.calls, vec![expected.to_string()], "token {}", token);
        }
    }

    #[test]
    fn test_unrecognized_makes_no_call() {
        let dispatcher = CommandDispatcher::default();
        let mut actions = RecordingActions::default();

        for raw in ["dance", "", "jump jump", "Connected to WebSocket server"] {
            let command = dispatcher.dispatch_text(raw, &mut actions);
            assert!(!command.is_recognized());
        }

        assert!(actions.calls.is_empty());
    }

    #[test]
    fn test_raw_bytes_are_normalized() {
        let dispatcher = CommandDispatcher::new(false);
        let mut actions = RecordingActions::default();

        let command = dispatcher.dispatch_bytes(b"  RIGHT\r\n", &mut actions);

        assert_eq!(command, Command::Right);
        assert_eq!(actions.calls, vec!["change_lane(1)".to_string()]);
    }

    #[test]
    fn test_custom_start_scene() {
        let dispatcher = CommandDispatcher::new(false).with_start_scene("Tutorial");
        let mut actions = RecordingActions::default();

        dispatcher.dispatch_text("START", &mut actions);

        assert_eq!(actions.calls, vec!["load_scene(Tutorial)".to_string()]);
    }

    #[test]
    fn test_dispatch_into_runner() {
        let dispatcher = CommandDispatcher::new(false);
        let mut runner = RunnerState::new();

        dispatcher.dispatch_text("left", &mut runner);
        dispatcher.dispatch_text("left", &mut runner);
        assert_eq!(runner.lane(), -1);

        dispatcher.dispatch_text("down", &mut runner);
        dispatcher.dispatch_text("up", &mut runner);
        assert!(runner.is_sliding());
        assert!(!runner.is_jumping());
    }
}
