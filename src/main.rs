use std::sync::Arc;

use studio_onboarding::api::HttpOnboardingApi;
use studio_onboarding::config::OnboardingConfig;
use studio_onboarding::error::Error;
use studio_onboarding::onboarding::{OnboardingManager, Reconciled, RewardNotifier, Stage};
use studio_onboarding::store::LibSqlStore;

const USAGE: &str = "\
Usage: studio-onboarding <command>

Commands:
  status               Show local onboarding progress
  fetch                Pull progress from the backend
  advance <stage|path> Move to a stage (landing, trial, signup, tutorial,
                       dashboard) or a view path such as /dashboard
  complete <item>      Complete a checklist item
  step <n> <input>     Complete tutorial step n
  finish               Mark onboarding finished
  reset                Clear local progress";

enum Command {
    Status,
    Fetch,
    Advance(String),
    Complete(String),
    Step(u32, String),
    Finish,
    Reset,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            None | Some("status") => Self::Status,
            Some("fetch") => Self::Fetch,
            Some("advance") => Self::Advance(args.next().ok_or("advance needs a stage")?.into()),
            Some("complete") => Self::Complete(args.next().ok_or("complete needs an item")?.into()),
            Some("step") => {
                let step = args
                    .next()
                    .ok_or("step needs a number")?
                    .parse()
                    .map_err(|_| "step number must be a positive integer")?;
                let input = args.collect::<Vec<_>>().join(" ");
                Self::Step(step, input)
            }
            Some("finish") => Self::Finish,
            Some("reset") => Self::Reset,
            Some(other) => return Err(format!("unknown command: {other}")),
        };
        Ok(command)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args).unwrap_or_else(|e| {
        eprintln!("Error: {e}\n\n{USAGE}");
        std::process::exit(1);
    });

    let config = OnboardingConfig::from_env()?;
    let authenticated = config.auth_token.is_some();

    // ── Store + backend ─────────────────────────────────────────────────
    let store = LibSqlStore::new_local(&config.db_path, &config.user_id)
        .await
        .unwrap_or_else(|e| {
            eprintln!(
                "Error: Failed to open database at {}: {}",
                config.db_path.display(),
                e
            );
            std::process::exit(1);
        });
    let api = HttpOnboardingApi::from_config(&config)?;
    let notifier = RewardNotifier::new(config.notice_duration);

    let manager =
        OnboardingManager::open(Arc::new(api), Arc::new(store), Arc::clone(&notifier)).await?;

    match run(&manager, command, authenticated).await {
        Ok(()) => {}
        Err(Error::Sync(e)) => eprintln!("Warning: backend sync failed, kept local progress: {e}"),
        Err(e @ (Error::Checklist(_) | Error::Tutorial(_))) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    for notice in notifier.active().await {
        eprintln!(
            "🎉 {} complete: +{} credits ({} total)",
            notice.title, notice.reward, notice.total_reward
        );
    }

    let status = manager.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run(
    manager: &Arc<OnboardingManager>,
    command: Command,
    authenticated: bool,
) -> Result<(), Error> {
    let sync = match command {
        Command::Status => return Ok(()),
        Command::Fetch => return report(manager.fetch_progress().await?),
        Command::Finish => return report(manager.finish_onboarding().await?),
        Command::Reset => return manager.reset().await,
        Command::Advance(target) => {
            let queued = if target.starts_with('/') {
                manager.navigate(&target, authenticated).await?
            } else {
                let stage = target.parse::<Stage>().unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                });
                manager.advance(stage).await?
            };
            queued.sync
        }
        Command::Complete(item) => manager.complete_item(&item).await?.sync,
        Command::Step(step, input) => manager.complete_step(step, &input).await?.sync,
    };

    // Wait for the queued push so the printed status is reconciled.
    match sync {
        Some(handle) => match handle.await {
            Ok(result) => report(result?),
            Err(e) => {
                tracing::warn!(error = %e, "Background sync task failed");
                Ok(())
            }
        },
        None => Ok(()),
    }
}

fn report(outcome: Reconciled) -> Result<(), Error> {
    match outcome {
        Reconciled::Applied(_) => {}
        Reconciled::Superseded { token, latest, .. } => {
            tracing::debug!(token, latest, "Newer backend response already applied");
        }
        Reconciled::Stale { token, latest } => {
            tracing::debug!(token, latest, "Backend response predates reset");
        }
    }
    Ok(())
}
