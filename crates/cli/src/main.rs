use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use switchboard_agents::{LoggingOutbound, Orchestrator, OrchestratorConfig};
use switchboard_core::{
    detect_language, BusinessContext, IntentClassifier, InboundMessage, ResponseFormatter, Role,
};
use switchboard_ml::MlStack;
use switchboard_observability::{init_tracing, PipelineMetrics};
use switchboard_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "switchboard")]
#[command(about = "Switchboard conversational orchestration CLI")]
struct Cli {
    /// SQLite URL; sessions stay in memory when unset.
    #[arg(long, env = "SWITCHBOARD_DATABASE_URL")]
    database_url: Option<String>,

    /// JSON template resource replacing the built-in templates.
    #[arg(long, env = "SWITCHBOARD_TEMPLATES")]
    templates: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Classify {
        text: String,
        /// Skip the statistical classifier even if a dataset is present.
        #[arg(long)]
        rules_only: bool,
    },
    DetectLanguage {
        text: String,
    },
    Templates {
        #[command(subcommand)]
        command: TemplatesCommand,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long, default_value = "admin")]
    role: String,
    #[arg(long)]
    session: Option<String>,
    #[arg(long, default_value = "cli-user")]
    user: String,
    #[arg(long, env = "SWITCHBOARD_BUSINESS_NAME")]
    business_name: Option<String>,
    #[arg(long, env = "SWITCHBOARD_CURRENCY")]
    currency: Option<String>,
    /// Comma separated list used as the default telemarketing targets.
    #[arg(long, env = "SWITCHBOARD_CUSTOMER_PHONES", value_delimiter = ',')]
    customer_phones: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum TemplatesCommand {
    Check,
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    List,
    Show { id: String },
    Clear { id: String },
    Purge {
        #[arg(long, default_value_t = 24)]
        idle_hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("switchboard_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::DetectLanguage { text } => {
            let language = detect_language(&text);
            println!(
                "{}",
                serde_json::json!({
                    "language": language.unwrap_or_default().as_code(),
                    "matched": language.is_some(),
                })
            );
        }
        Command::Classify { text, rules_only } => {
            let config = OrchestratorConfig::from_env();
            let mut classifier = IntentClassifier::new().with_threshold(config.clarify_threshold);
            if !rules_only {
                if let Some(llm) = MlStack::load_default().classifier {
                    classifier = classifier.with_llm(llm, config.llm_timeout);
                }
            }
            let result = classifier.classify(&text).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Templates { command } => match command {
            TemplatesCommand::Check => {
                let formatter = load_formatter(cli.templates.as_deref())?;
                let names = formatter.template_names();
                println!("{} templates ok", names.len());
                for name in names {
                    println!("- {name}");
                }
            }
        },
        Command::Session { command } => {
            let orchestrator = build_orchestrator(&cli.database_url, cli.templates.as_deref()).await?;
            match command {
                SessionCommand::List => {
                    for id in orchestrator.session_ids().await? {
                        println!("{id}");
                    }
                }
                SessionCommand::Show { id } => match orchestrator.session_snapshot(&id).await? {
                    Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
                    None => bail!("session `{id}` not found"),
                },
                SessionCommand::Clear { id } => {
                    let removed = orchestrator.clear_session(&id).await?;
                    println!("{}", if removed { "cleared" } else { "not found" });
                }
                SessionCommand::Purge { idle_hours } => {
                    if idle_hours < 0 {
                        bail!("--idle-hours must not be negative");
                    }
                    let purged = orchestrator
                        .purge_idle_sessions(chrono::Duration::hours(idle_hours))
                        .await?;
                    println!("purged {purged} sessions");
                }
            }
        }
        Command::Chat(args) => {
            let orchestrator = build_orchestrator(&cli.database_url, cli.templates.as_deref()).await?;
            run_chat(orchestrator, args).await?;
        }
    }

    Ok(())
}

async fn run_chat(orchestrator: Orchestrator<Store>, args: ChatArgs) -> Result<()> {
    let role = Role::parse_lossy(&args.role);
    let session_id = args
        .session
        .unwrap_or_else(|| format!("cli-{}", std::process::id()));

    let defaults = BusinessContext::default();
    let business = BusinessContext {
        business_name: args.business_name.unwrap_or(defaults.business_name),
        currency: args.currency.unwrap_or(defaults.currency),
        customer_phones: args.customer_phones,
        ..defaults
    };

    println!("Switchboard chat (session {session_id}, role {role}). type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let outcome = orchestrator
            .handle(&InboundMessage {
                session_id: session_id.clone(),
                user_id: args.user.clone(),
                role,
                text: text.to_string(),
                business: business.clone(),
            })
            .await;

        println!("\n{}\n", outcome.message);
        println!(
            "[{} | {} | {}]\n",
            outcome.state.as_str(),
            outcome.result.kind().as_str(),
            outcome.language
        );
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&orchestrator.metrics().snapshot())?
    );
    Ok(())
}

fn load_formatter(path: Option<&str>) -> Result<ResponseFormatter> {
    match path {
        Some(path) => ResponseFormatter::from_path(path)
            .with_context(|| format!("failed loading templates from {path}")),
        None => ResponseFormatter::builtin().context("built-in templates are invalid"),
    }
}

async fn build_orchestrator(
    database_url: &Option<String>,
    templates: Option<&str>,
) -> Result<Orchestrator<Store>> {
    let store = match database_url {
        Some(url) => Store::sqlite(url).await?,
        None => Store::memory(),
    };
    let formatter = load_formatter(templates)?;
    let config = OrchestratorConfig::from_env();

    let mut orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(LoggingOutbound),
        Arc::new(formatter),
        PipelineMetrics::shared(),
        config,
    );

    if env::var("SWITCHBOARD_DISABLE_ML").is_err() {
        if let Some(classifier) = MlStack::load_default().classifier {
            orchestrator = orchestrator.with_classifier(classifier);
        }
    }

    Ok(orchestrator)
}
