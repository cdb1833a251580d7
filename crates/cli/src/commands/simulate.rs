use std::str::FromStr;

use funnel_core::{PeriodFilter, WeightMapping};
use rust_decimal::Decimal;

use crate::commands::support::{landing_service, load_config, open_database, runtime, Failure};
use crate::commands::CommandResult;

const COMMAND: &str = "simulate";

/// Parses a `CODE=WEIGHT` override such as `2=0.75`.
pub fn parse_override(raw: &str) -> Result<(String, Decimal), String> {
    let (code, weight) =
        raw.split_once('=').ok_or_else(|| format!("expected CODE=WEIGHT, got `{raw}`"))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(format!("missing code in `{raw}`"));
    }
    let weight = Decimal::from_str(weight.trim())
        .map_err(|error| format!("invalid weight in `{raw}`: {error}"))?;
    Ok((code.to_string(), weight))
}

/// Runs a what-if landing with the given overrides as the complete weight
/// mappings. Nothing is written to the weight tables.
pub fn run(
    year: i32,
    quarter: Option<u8>,
    quotation_weights: Vec<(String, Decimal)>,
    opportunity_weights: Vec<(String, Decimal)>,
) -> CommandResult {
    let period = match PeriodFilter::new(year, quarter) {
        Ok(period) => period,
        Err(error) => return CommandResult::failure(COMMAND, "invalid_input", error.to_string(), 7),
    };
    let quotation_weights: WeightMapping = quotation_weights.into_iter().collect();
    let opportunity_weights: WeightMapping = opportunity_weights.into_iter().collect();

    let outcome = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            let service = landing_service(&config, &pool)?;
            let outcome =
                service.simulate(period, &quotation_weights, &opportunity_weights).await;
            pool.close().await;
            outcome.map_err(Failure::from)
        })
    });

    match outcome {
        Ok(outcome) => {
            let message =
                format!("simulated landing for {period}: {}", outcome.landing.landing_total);
            CommandResult::success_with(COMMAND, message, outcome)
        }
        Err(failure) => failure.into_result(COMMAND),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::parse_override;

    #[test]
    fn override_parses_code_and_decimal_weight() {
        let (code, weight) = parse_override(" 2 = 0.75").expect("valid override");
        assert_eq!(code, "2");
        assert_eq!(weight, Decimal::new(75, 2));
    }

    #[test]
    fn override_without_separator_or_code_is_rejected() {
        assert!(parse_override("0.5").is_err());
        assert!(parse_override("=0.5").is_err());
        assert!(parse_override("3=half").is_err());
    }
}
