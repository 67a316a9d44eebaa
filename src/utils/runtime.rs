use anyhow::Result;

/// Everything in worktimer runs on one thread: user input, the display tick and network calls
/// interleave on a single event queue.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
