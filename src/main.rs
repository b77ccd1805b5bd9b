use hearth::config::HearthConfig;
use hearth::intent::{IntentResolver, KeywordIntentResolver};
use hearth::pipeline::Pipeline;
use hearth::planner::{PlanGenerator, StepStatus};
use hearth::services::hub::{DeviceController, HubClient, MockHub};
use hearth::services::llm::LlmService;
use hearth::PlanCache;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Collaborators
    let config = HearthConfig::from_env();
    tracing::info!(
        strategy = ?config.cache.strategy,
        max_size = config.cache.max_size,
        mode = ?config.execution,
        "Hearth starting"
    );

    let controller: Arc<dyn DeviceController> = match &config.hub_url {
        Some(url) => Arc::new(HubClient::new(url, config.hub_token.clone())),
        None => {
            tracing::info!("No HEARTH_HUB_URL set, using the in-memory demo home");
            Arc::new(MockHub::demo_home())
        }
    };

    let (intents, generator): (Arc<dyn IntentResolver>, Option<Arc<dyn PlanGenerator>>) =
        match &config.llm_url {
            Some(url) => {
                let llm = Arc::new(LlmService::new(url));
                let generator: Arc<dyn PlanGenerator> = llm.clone();
                (llm as Arc<dyn IntentResolver>, Some(generator))
            }
            None => (
                Arc::new(KeywordIntentResolver::new()) as Arc<dyn IntentResolver>,
                None,
            ),
        };

    let cache = Arc::new(PlanCache::new(config.cache.clone()));
    let pipeline = Pipeline::new(intents, controller, generator, cache, config.execution);

    // 3. One command per line.
    println!("Type a command (e.g. 'prepare a bath'), 'stats', or Ctrl+D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("stats") {
            let stats = pipeline.stats();
            let cache = pipeline.cache().stats();
            println!(
                "requests={} ok={} failed={} hits={} ({:.0}%) fallbacks={} cache={}/{}",
                stats.total_requests,
                stats.successful_requests,
                stats.failed_requests,
                stats.cache_hits,
                stats.cache_hit_rate * 100.0,
                stats.fallback_plans,
                cache.size,
                cache.capacity
            );
            continue;
        }

        match pipeline.run(line).await {
            Ok(outcome) => {
                println!(
                    "[{}] confidence={:.2} cache_hit={} status={:?}",
                    outcome.intent.label,
                    outcome.intent.confidence,
                    outcome.cache_hit,
                    outcome.execution.status
                );
                for step in &outcome.plan.steps {
                    let marker = match step.status {
                        StepStatus::Normal => "  ",
                        StepStatus::SkippedAlreadySatisfied => "= ",
                        StepStatus::TargetMissing => "! ",
                    };
                    println!("  {}{} {} ({})", marker, step.service, step.target_name, step.description);
                }
                for issue in &outcome.feasibility {
                    println!("  note: {}", issue);
                }
            }
            Err(e) => println!("error: {}", e),
        }
    }

    Ok(())
}
