use crate::commands::support::{load_config, open_database, runtime, Failure};
use crate::commands::CommandResult;

const COMMAND: &str = "migrate";

pub fn run() -> CommandResult {
    match apply() {
        Ok(()) => CommandResult::success(COMMAND, "applied pending migrations"),
        Err(failure) => failure.into_result(COMMAND),
    }
}

fn apply() -> Result<(), Failure> {
    let config = load_config()?;
    runtime()?.block_on(async {
        let pool = open_database(&config).await?;
        pool.close().await;
        Ok::<(), Failure>(())
    })
}
