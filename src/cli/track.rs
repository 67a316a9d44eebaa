use std::io::Write;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    store::SessionStore,
    tracker::{state::Phase, SessionTracker},
};

use super::{
    command::{TrackerCommand, HELP},
    output::{format_duration, write_screen, write_tick, Notice},
};

/// Runs the interactive tracker until the input ends, `quit` is typed or `shutdown` is
/// cancelled. User input, the display tick and shutdown are served from one loop, so the tracker
/// is only ever touched by one of them at a time.
pub async fn run_tracker<S: SessionStore>(
    mut tracker: SessionTracker<S>,
    input: impl AsyncBufRead + Unpin,
    mut out: impl Write,
    shutdown: CancellationToken,
) -> Result<()> {
    // Commands are only accepted once the history is known.
    let mut notice = tracker.refresh().await.err().map(|e| {
        error!("Initial load failed {e:?}");
        Notice::from_error(&e)
    });
    write_screen(&mut out, &tracker, notice.as_ref())?;

    let mut lines = LinesStream::new(input.lines());
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                break;
            }
            elapsed = tracker.next_tick() => {
                write_tick(&mut out, elapsed)?;
            }
            line = lines.next() => {
                let Some(line) = line else {
                    break;
                };
                let command = match line?.parse::<TrackerCommand>() {
                    Ok(TrackerCommand::Quit) => break,
                    Ok(command) => command,
                    Err(e) => {
                        notice = Some(Notice::from_error(&e));
                        write_screen(&mut out, &tracker, notice.as_ref())?;
                        continue;
                    }
                };
                // A stalled store must not keep ctrl-c waiting.
                let outcome = tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Shutdown requested while {command:?} was in flight");
                        break;
                    }
                    outcome = apply(&mut tracker, command) => outcome,
                };
                notice = outcome.unwrap_or_else(|e| {
                    error!("{command:?} failed {e:?}");
                    Some(Notice::from_error(&e))
                });
                write_screen(&mut out, &tracker, notice.as_ref())?;
            }
        }
    }

    let discarded = tracker.shutdown();
    if discarded > 0 {
        writeln!(
            out,
            "Discarded {} of unconfirmed time",
            format_duration(discarded)
        )?;
    }
    out.flush()?;
    Ok(())
}

async fn apply<S: SessionStore>(
    tracker: &mut SessionTracker<S>,
    command: TrackerCommand,
) -> Result<Option<Notice>> {
    let notice = match command {
        TrackerCommand::Toggle => match tracker.phase() {
            Phase::Idle => {
                tracker.start().await?;
                None
            }
            Phase::Running => {
                tracker.stop()?;
                None
            }
            Phase::AwaitingConfirmation => Some(Notice::Info(
                "Answer yes or no to finish the stopped session".into(),
            )),
        },
        TrackerCommand::Start => {
            tracker.start().await?;
            None
        }
        TrackerCommand::Stop => {
            tracker.stop()?;
            None
        }
        TrackerCommand::Yes => {
            let added = tracker.confirm().await?;
            Some(Notice::Info(format!(
                "Added {} to today's total",
                format_duration(added)
            )))
        }
        TrackerCommand::No => {
            tracker.discard()?;
            None
        }
        TrackerCommand::Refresh => {
            tracker.refresh().await?;
            Some(Notice::Info("History reloaded".into()))
        }
        TrackerCommand::History => None,
        TrackerCommand::Help => Some(Notice::Info(HELP.into())),
        TrackerCommand::Quit => None,
    };
    Ok(notice)
}
