use std::io::Write;

use ansi_term::Colour;
use anyhow::Result;

use crate::{
    store::{index::SessionIndex, SessionStore},
    tracker::{state::Phase, SessionTracker},
    utils::time::{date_to_key, split_seconds},
};

/// Transient status line. Shown once under the next rendered screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn from_error(e: &anyhow::Error) -> Self {
        Notice::Error(format!("{e:#}"))
    }

    fn render(&self) -> String {
        match self {
            Notice::Info(v) => Colour::Green.paint(v.as_str()).to_string(),
            Notice::Error(v) => Colour::Red.paint(v.as_str()).to_string(),
        }
    }
}

/// `3661` becomes `1 hours 1 minutes 1 seconds`.
pub fn format_duration(total: u64) -> String {
    let (hours, minutes, seconds) = split_seconds(total);
    format!("{hours} hours {minutes} minutes {seconds} seconds")
}

pub fn elapsed_line(elapsed: u64) -> String {
    format!("Today's Work Time: {}", format_duration(elapsed))
}

pub fn render_history(sessions: &SessionIndex) -> String {
    let mut result = String::from("Work History\n");
    if sessions.is_empty() {
        result.push_str("(no sessions yet)\n");
    }
    for session in sessions.iter() {
        result.push_str(&format!(
            "{}: {}\n",
            date_to_key(session.date),
            format_duration(session.duration)
        ));
    }
    for date in sessions.unreadable() {
        result.push_str(&format!("{}: unreadable record\n", date_to_key(*date)));
    }
    result
}

pub fn render_tracker<S: SessionStore>(tracker: &SessionTracker<S>) -> String {
    let mut result = String::from("Work Time Tracker\n");
    let button = match tracker.phase() {
        Phase::Running => "[enter] Stop",
        Phase::Idle => "[enter] Start",
        Phase::AwaitingConfirmation => "[yes/no]",
    };
    result.push_str(button);
    result.push('\n');
    result.push_str(&elapsed_line(tracker.elapsed()));
    result.push('\n');
    if tracker.phase() == Phase::AwaitingConfirmation {
        result.push_str(&format!(
            "Current session time: {}\nDo you want to add this time to today's total? (yes/no)\n",
            format_duration(tracker.elapsed())
        ));
    }
    result.push('\n');
    result.push_str(&render_history(tracker.sessions()));
    result
}

/// Writes the whole screen followed by the notice, if any.
pub fn write_screen<S: SessionStore>(
    out: &mut impl Write,
    tracker: &SessionTracker<S>,
    notice: Option<&Notice>,
) -> Result<()> {
    writeln!(out)?;
    write!(out, "{}", render_tracker(tracker))?;
    if let Some(notice) = notice {
        writeln!(out, "{}", notice.render())?;
    }
    out.flush()?;
    Ok(())
}

/// Rewrites only the timer line in place.
pub fn write_tick(out: &mut impl Write, elapsed: u64) -> Result<()> {
    write!(out, "\r{}", elapsed_line(elapsed))?;
    out.flush()?;
    Ok(())
}
