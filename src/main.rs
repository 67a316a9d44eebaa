use anyhow::Result;
use tracing::error;
use worktimer::{cli::run_cli, utils::runtime::single_thread_runtime};

fn main() -> Result<()> {
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(run_cli());
    // Stdin is read on a blocking thread which would otherwise keep the process alive after
    // ctrl-c.
    runtime.shutdown_background();
    result.inspect_err(|e| {
        error!("Error running cli {e:?}");
    })
}
