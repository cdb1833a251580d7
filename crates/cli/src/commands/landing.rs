use funnel_core::PeriodFilter;

use crate::commands::support::{landing_service, load_config, open_database, runtime, Failure};
use crate::commands::CommandResult;

const COMMAND: &str = "landing";

/// Prints the landing view for a period; `sync` bypasses the snapshot age.
pub fn run(year: i32, quarter: Option<u8>, sync: bool) -> CommandResult {
    let period = match PeriodFilter::new(year, quarter) {
        Ok(period) => period,
        Err(error) => return CommandResult::failure(COMMAND, "invalid_input", error.to_string(), 7),
    };

    let outcome = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            let service = landing_service(&config, &pool)?;
            let view = if sync {
                service.force_sync(period).await
            } else {
                service.get_landing(period).await
            };
            pool.close().await;
            view.map_err(Failure::from)
        })
    });

    match outcome {
        Ok(view) => {
            let message = format!(
                "landing for {period}: {} ({})",
                view.snapshot.landing.landing_total,
                if view.from_cache { "cached" } else { "recomputed" }
            );
            CommandResult::success_with(COMMAND, message, view)
        }
        Err(failure) => failure.into_result(COMMAND),
    }
}
