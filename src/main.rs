use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tool_orchestrator::approval::{ApprovalDecision, ScriptedOracle};
use tool_orchestrator::catalog::ToolCatalog;
use tool_orchestrator::config::{DocumentConfig, GlobalSettings};
use tool_orchestrator::disclosure::PassthroughOracle;
use tool_orchestrator::executors::file_read::FileReadExecutor;
use tool_orchestrator::executors::vault_search::VaultSearchExecutor;
use tool_orchestrator::executors::web_search::{WebSearchExecutor, WebSearchProvider};
use tool_orchestrator::executors::ExecutorSet;
use tool_orchestrator::gate::{CapabilityGate, CompiledWhitelist};
use tool_orchestrator::provider::scripted::ScriptedAdapter;
use tool_orchestrator::provider::{AbortSignal, Message, Role};
use tool_orchestrator::sink::{StreamSink, StringDocument};
use tool_orchestrator::ConversationDriver;

#[derive(Parser)]
#[command(name = "tool-orchestrator")]
#[command(author, version, about = "AI tool-calling orchestrator with human-in-the-loop approval", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a model is permitted to use tools under a whitelist
    CheckWhitelist {
        /// Full or bare model id, e.g. "openai@gpt-5.2"
        #[arg(short, long)]
        model: String,

        /// Whitelist text, one pattern per line
        #[arg(short, long)]
        whitelist: String,

        /// Default provider for bare ids
        #[arg(long, default_value = "openai")]
        default_provider: String,
    },
    /// Run a scripted conversation turn against a vault directory, printing
    /// the resulting transcript
    Demo {
        /// Vault root for the vault_search/file_read executors
        #[arg(short = 'p', long, default_value = ".")]
        vault_path: PathBuf,

        /// Text the user sends
        #[arg(short, long, default_value = "hello")]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        println!("Verbose mode enabled");
    }

    match cli.command {
        Commands::CheckWhitelist { model, whitelist, default_provider } => {
            let gate = CapabilityGate::new(default_provider);
            gate.set_whitelist(CompiledWhitelist::from_text(&whitelist));
            println!("{}", gate.may_use_tools(&model));
        }
        Commands::Demo { vault_path, message } => run_demo(vault_path, message).await,
    }
}

async fn run_demo(vault_path: PathBuf, message: String) {
    let gate = Arc::new(CapabilityGate::new("scripted"));
    gate.set_whitelist(CompiledWhitelist::from_text("demo-model*"));

    let executors = Arc::new(ExecutorSet {
        vault_search: VaultSearchExecutor::new(vault_path),
        file_read: FileReadExecutor::new(None),
        web_search: WebSearchExecutor::new(WebSearchProvider::Custom, None, None),
    });

    let adapter = ScriptedAdapter::single_text_turn("Here is what I found.");

    let driver = ConversationDriver::new(
        gate,
        Arc::new(ToolCatalog::new()),
        Arc::new(ScriptedOracle::always(ApprovalDecision::approved())),
        Arc::new(PassthroughOracle),
        executors,
        Arc::new(adapter),
    );

    let config = DocumentConfig {
        provider: "scripted".to_string(),
        model_id: "demo-model".to_string(),
        ..DocumentConfig::default()
    };
    let settings = GlobalSettings::default();

    let messages = vec![Message {
        role: Role::User,
        content: message,
        tool_call_id: None,
        model: None,
    }];

    let mut doc = StringDocument::default();
    let mut sink = StreamSink::new(&mut doc);
    let abort = AbortSignal::new();

    match driver.run(messages, &config, &settings, &mut sink, &abort).await {
        Ok(outcome) => {
            println!("stop reason: {:?}", outcome.stop_reason);
            println!("--- document ---\n{}", doc.text);
        }
        Err(err) => eprintln!("orchestrator error: {}", err),
    }
}
