use std::env;
use std::error::Error;
use std::process::ExitCode;

use futures_util::StreamExt;
use rollcall_core::impls::{JsonFileCandidateSource, TelegramSettings, TelegramTransport};
use rollcall_core::{CandidateFilter, ProberBuilder, ProberConfig, RunState, RunSummary};

const USAGE: &str = "usage: rollcall <candidates.json> [all|30|7|1]";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(candidates_path) = args.next() else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(2));
    };
    let filter = match args.next() {
        Some(raw) => raw.parse::<CandidateFilter>()?,
        None => CandidateFilter::Unrestricted,
    };

    let token = env::var("TELEGRAM_BOT_TOKEN").map_err(|_| "TELEGRAM_BOT_TOKEN is not set")?;
    let mut settings = TelegramSettings::new(token);
    if let Ok(api_base) = env::var("TELEGRAM_API_BASE") {
        settings = settings.with_api_base(api_base);
    }

    let config = ProberConfig::from_env()?;
    log::info!(
        "workers={} rate={}/{:?} burst={} max_retries={}",
        config.workers,
        config.throttle.max_calls,
        config.throttle.period,
        config.throttle.burst,
        config.retry.max_retries
    );

    let prober = ProberBuilder::new()
        .transport(TelegramTransport::new(settings)?)
        .candidate_source(JsonFileCandidateSource::new(&candidates_path))
        .config(config)
        .build()?;

    println!("Starting check for {}...", filter.label());
    let (mut stream, completion) = prober.start_run(filter).into_parts();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            snapshot = stream.next() => match snapshot {
                Some(snapshot) if !snapshot.is_final() => println!("{}", snapshot.progress_line()),
                Some(_) => {}
                None => break,
            },
            _ = &mut ctrl_c, if !stream.is_cancelled() => {
                log::warn!("interrupted, cancelling run (in-flight probes still finish)");
                stream.cancel();
            }
        }
    }

    match completion.wait().await {
        Ok(report) => {
            println!("\n{}", report.summary());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            log::error!("{err}");
            if let Some(partial) = err.partial() {
                let summary = RunSummary {
                    state: RunState::Failed,
                    aggregate: partial,
                };
                println!("\n{summary}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
