use std::str::FromStr;

use anyhow::anyhow;

/// A line typed into the interactive tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCommand {
    /// Empty line, acts like the single start/stop button.
    Toggle,
    Start,
    Stop,
    Yes,
    No,
    History,
    Refresh,
    Help,
    Quit,
}

pub const HELP: &str = "Commands: <enter> start/stop, start, stop, yes, no, history, refresh, help, quit";

impl FromStr for TrackerCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s.trim().to_lowercase().as_str() {
            "" => Self::Toggle,
            "start" | "s" => Self::Start,
            "stop" | "t" => Self::Stop,
            "yes" | "y" => Self::Yes,
            "no" | "n" => Self::No,
            "history" | "h" => Self::History,
            "refresh" | "r" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => return Err(anyhow!("Unknown command '{other}'. {HELP}")),
        };
        Ok(command)
    }
}
