use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use lmbox::commands::ask::{self, AskArgs};
use lmbox::commands::chat::{self, ChatArgs};
use lmbox::commands::config::{self, ConfigArgs};
use lmbox::commands::index::{self, IndexArgs};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("LM_GIT_SHA"),
    " ",
    env!("LM_BUILD_TS"),
    ")"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  lmbox ask --provider groq --model llama-3.3-70b-versatile \"2+2?\"\n  echo \"2+2?\" | lmbox ask --provider watsonx --model meta-llama/llama-3-1-8b-instruct\n  lmbox chat --provider groq --model llama-3.3-70b-versatile \"Hi there, what is 196*53?\"\n  lmbox index ./data --collection notes --query \"What is the somatosensory system?\"\n  lmbox config check\n  lmbox completion bash > ~/.local/share/bash-completion/completions/lmbox";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  lmbox ask --provider groq --model llama-3.3-70b-versatile \"2+2?\"\n  echo \"2+2?\" | lmbox ask --provider watsonx --model meta-llama/llama-3-1-8b-instruct\n  lmbox ask --provider groq --model llama-3.3-70b-versatile --dry-run --json \"Explain retries\"";

const CHAT_HELP_EXAMPLES: &str = "Examples:\n  lmbox chat --provider groq --model llama-3.3-70b-versatile \"Hi there, what is 196*53?\"\n  lmbox chat --provider watsonx --model meta-llama/llama-3-1-8b-instruct --show-tools --dry-run \"196*53?\"";

#[derive(Debug, Parser)]
#[command(
    name = "lmbox",
    about = "Multi-provider LLM CLI tools",
    version = VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Ask a question to an LLM provider", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(
        about = "Ask with the built-in calculator tools bound",
        after_help = CHAT_HELP_EXAMPLES
    )]
    Chat(ChatArgs),
    #[command(about = "Chunk documents and index them into a Chroma collection")]
    Index(IndexArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "lmbox", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "lmbox", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "lmbox", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ask(args) => ask::run(args).await,
        Commands::Chat(args) => chat::run(args).await,
        Commands::Index(args) => index::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
