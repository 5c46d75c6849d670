//! querydesk - run SQL through an asynchronous query engine.

mod cli;

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use cli::{Cli, Command};
use querydesk::action::ActionRouter;
use querydesk::agent::create_agent;
use querydesk::chat::ChatSession;
use querydesk::config::Config;
use querydesk::engine::{self, EngineKind, LocalQueryEngine, QueryEngine};
use querydesk::error::QueryDeskError;
use querydesk::logging;
use querydesk::prompts::EXAMPLE_PROMPTS;
use querydesk::proxy::QueryProxy;
use querydesk::transcript::{render_list, Answer};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.is_interactive() {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<QueryDeskError>() {
            Some(err) => error!("{}: {:#}", err.category(), e),
            None => error!("{e:#}"),
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.command == Command::Examples {
        println!("{}", render_list("Example prompts", &EXAMPLE_PROMPTS));
        return Ok(());
    }

    let config = load_config(&cli)?;
    let engine = open_engine(&cli, &config).await?;
    let proxy = QueryProxy::new(
        engine,
        config.engine.output_location.clone(),
        config.polling,
    );

    match cli.command {
        Command::Query { sql, json, .. } => run_query(&proxy, &sql, json).await,
        Command::Invoke { event, .. } => {
            let router = ActionRouter::new(proxy, config.action.query_path.clone());
            run_invoke(&router, &event).await
        }
        Command::Chat { .. } => {
            let router = ActionRouter::new(proxy, config.action.query_path.clone());
            run_chat(&config, router).await
        }
        Command::Examples => Ok(()),
    }
}

/// Loads the config file, then applies environment and CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides();

    if let Some(kind) = cli.engine {
        config.engine.kind = kind;
    }
    match &cli.command {
        Command::Query {
            poll_interval_ms,
            timeout_secs,
            ..
        } => {
            if let Some(ms) = poll_interval_ms {
                config.polling.interval_ms = *ms;
            }
            if let Some(secs) = timeout_secs {
                config.polling.timeout_secs = *secs;
            }
        }
        Command::Chat {
            agent_url: Some(url),
            ..
        } => config.agent.endpoint = Some(url.clone()),
        _ => {}
    }

    config.validate()?;
    Ok(config)
}

/// Connects the configured engine, running the seed script first if one was given.
async fn open_engine(cli: &Cli, config: &Config) -> anyhow::Result<Arc<dyn QueryEngine>> {
    let Some(seed) = cli.seed() else {
        return Ok(engine::connect(&config.engine).await?);
    };

    if config.engine.kind != EngineKind::Local {
        return Err(QueryDeskError::config(format!(
            "--seed requires the local engine, not {}",
            config.engine.kind
        ))
        .into());
    }

    let script = std::fs::read_to_string(seed)
        .with_context(|| format!("Failed to read seed file {}", seed.display()))?;
    let engine = LocalQueryEngine::connect(&config.engine.database_url).await?;
    engine.execute_script(&script).await?;
    info!("Seeded database from {}", seed.display());
    Ok(Arc::new(engine))
}

async fn run_query(proxy: &QueryProxy, sql: &str, json: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning the wait");
            on_interrupt.cancel();
        }
    });

    let result = proxy.execute_with_cancel(sql, cancel).await?;
    info!(
        rows = result.row_count,
        "Query finished in {:?}",
        result.execution_time
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", Answer::Table(result).render());
    }
    Ok(())
}

async fn run_invoke(router: &ActionRouter, event: &str) -> anyhow::Result<()> {
    let raw = if event == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(event).with_context(|| format!("Failed to read event {event}"))?
    };

    let response = router.handle_json(&raw).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_chat(config: &Config, router: ActionRouter) -> anyhow::Result<()> {
    let agent = create_agent(&config.agent, router)?;
    info!(
        session_id = %config.agent.session_id,
        remote = config.agent.endpoint.is_some(),
        "Starting chat"
    );

    let mut session = ChatSession::new(
        agent,
        config.agent.session_id.clone(),
        config.agent.max_exchanges,
    );
    let stdin = BufReader::new(tokio::io::stdin());
    session.run(stdin, tokio::io::stdout()).await?;
    Ok(())
}
