mod commands;

pub use commands::{Forecast, fetch, predict, setup_db, train, transform};

use {
    crate::{
        Cli, Command,
        analysis::LogReporter,
        config::{FeatureConfig, TrainingConfig, load_json_or_default},
        data::{BinanceProvider, SqliteStorage},
        domain::PairInterval,
        utils::{TimeUtils, epoch_ms_to_utc},
    },
    anyhow::{Result, anyhow},
    tabled::Table,
};

/// Executes one CLI command against the database named in `cli`.
pub async fn run(cli: Cli) -> Result<()> {
    let interval_ms = TimeUtils::interval_from_string(&cli.interval)
        .ok_or_else(|| anyhow!("Unsupported interval: {}", cli.interval))?;
    let pair = PairInterval::new(cli.symbol.to_uppercase(), interval_ms);

    let storage = SqliteStorage::new(&cli.db).await?;
    setup_db(&storage).await?;

    match cli.command {
        Command::SetupDb => {
            println!("Database ready at {}", cli.db);
        }
        Command::Fetch => {
            let provider = BinanceProvider::default();
            let stored = fetch(&storage, &provider, &pair).await?;
            println!("{}: stored {} candles", pair, stored);
        }
        Command::Transform => {
            let config: FeatureConfig = load_json_or_default(cli.feature_config.as_deref())?;
            let table = transform(&storage, &pair, config, &LogReporter).await?;
            println!(
                "{}: {} feature rows, {} columns, {:.1}% labelled up",
                pair,
                table.len(),
                table.schema().len(),
                table.up_ratio() * 100.0
            );
        }
        Command::Train => {
            let config: TrainingConfig = load_json_or_default(cli.training_config.as_deref())?;
            let run = train(&storage, &pair, &config).await?;
            println!(
                "Model run {} for {}: {} train rows, {} test rows",
                run.run_id, pair, run.model.train_rows, run.model.test_rows
            );
            println!("{}", Table::new(run.metrics().lines()));
        }
        Command::Predict => {
            let forecast = predict(&storage, &pair, &LogReporter).await?;
            println!(
                "{} after {} (close {:.2}): {} with p(up) = {:.3} [model {}]",
                pair,
                epoch_ms_to_utc(forecast.timestamp_ms),
                forecast.close,
                forecast.prediction.direction,
                forecast.prediction.probability_up,
                forecast.run_id
            );
        }
    }

    Ok(())
}
