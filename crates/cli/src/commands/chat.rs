//! `courier chat`: single-message, file, or interactive chat.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use courier_agent::Pipeline;
use courier_config::AppConfig;
use courier_core::{Conversation, Message};
use courier_providers::{ChatCompletionClient, ModelRouter};
use courier_security::ModelAllowlist;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::Loaded;

/// Output-token cap for `--raw` when `--max-tokens` is not given.
const RAW_DEFAULT_MAX_TOKENS: u32 = 800;

#[derive(clap::Args)]
pub struct ChatArgs {
    /// Message to send; without one (and without --conversation) chat is interactive
    message: Option<String>,

    /// JSON array of prior messages (`role`/`type` + `content`)
    #[arg(short, long)]
    conversation: Option<PathBuf>,

    /// Model id or alias; defaults to the configured model
    #[arg(short, long)]
    model: Option<String>,

    /// Skip command preprocessing and print `{model, assistant_text, response}`
    #[arg(long)]
    raw: bool,

    /// Sampling temperature for --raw (defaults to gateway.chat_temperature)
    #[arg(long, requires = "raw")]
    temperature: Option<f32>,

    /// Output-token cap for --raw (default 800)
    #[arg(long, requires = "raw")]
    max_tokens: Option<u32>,

    /// Print the whole resulting conversation as JSON
    #[arg(long, conflicts_with = "raw")]
    json: bool,
}

pub async fn run(loaded: Loaded, args: ChatArgs) -> anyhow::Result<()> {
    let mut conversation = match &args.conversation {
        Some(path) => read_conversation(path)?,
        None => Conversation::new(),
    };
    if let Some(message) = &args.message {
        conversation.push(Message::user(message));
    }

    if args.raw {
        return run_raw(&loaded, conversation, &args).await;
    }

    let pipeline = Pipeline::from_config(&loaded.config, &loaded.config_dir, &super::current_dir());

    if conversation.is_empty() {
        return interactive(&pipeline, args.model.as_deref()).await;
    }

    let out = pipeline.run(conversation, args.model.as_deref()).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if let Some(last) = out.last() {
        println!("{}", last.content);
    }
    Ok(())
}

fn read_conversation(path: &Path) -> anyhow::Result<Conversation> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid conversation JSON in {}", path.display()))
}

/// One completion without preprocessing.
async fn run_raw(loaded: &Loaded, conversation: Conversation, args: &ChatArgs) -> anyhow::Result<()> {
    if conversation.is_empty() {
        return Err(anyhow!("--raw needs a message or --conversation"));
    }
    let config = &loaded.config;

    let allowlist = ModelAllowlist::from_config(&config.allowlists, &loaded.config_dir);
    let router = ModelRouter::new(Arc::new(allowlist));
    let model = router
        .route(args.model.as_deref(), &config.gateway.default_model)
        .map_err(|e| anyhow!(e.user_message()))?;

    let client = ChatCompletionClient::from_config(config);
    let (max_tokens, temperature) = raw_sampling(args, config);
    let completion = client
        .complete(&model, &conversation.messages, Some(max_tokens), Some(temperature))
        .await
        .map_err(|f| anyhow!(f.user_message()))?;

    let out = serde_json::json!({
        "model": model,
        "assistant_text": completion.text,
        "response": completion.raw,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Output-token cap and temperature for `--raw`, after defaults.
fn raw_sampling(args: &ChatArgs, config: &AppConfig) -> (u32, f32) {
    (
        args.max_tokens.unwrap_or(RAW_DEFAULT_MAX_TOKENS),
        args.temperature.unwrap_or(config.gateway.chat_temperature),
    )
}

async fn interactive(pipeline: &Pipeline, model: Option<&str>) -> anyhow::Result<()> {
    println!();
    println!("  Courier interactive chat");
    println!("  Commands: /patent-rag[+] <q>, /patent-provisional[+] <q>, /agent list, /agent <Name> <task>");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conversation = Conversation::new();

    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        conversation = pipeline
            .run(conversation.with_appended(Message::user(line)), model)
            .await;

        println!();
        if let Some(last) = conversation.last() {
            for text in last.content.lines() {
                println!("  Assistant > {text}");
            }
        }
        println!();
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        chat: ChatArgs,
    }

    fn parse(argv: &[&str]) -> ChatArgs {
        Harness::try_parse_from(std::iter::once("chat").chain(argv.iter().copied()))
            .unwrap()
            .chat
    }

    #[test]
    fn raw_defaults_cap_and_temperature() {
        let args = parse(&["--raw", "hello"]);
        assert_eq!(raw_sampling(&args, &AppConfig::default()), (800, 0.2));
    }

    #[test]
    fn raw_flags_override_defaults() {
        let args = parse(&["--raw", "--max-tokens", "64", "--temperature", "1.0", "hello"]);
        assert_eq!(raw_sampling(&args, &AppConfig::default()), (64, 1.0));
    }

    #[test]
    fn sampling_flags_require_raw() {
        let argv = ["chat", "--max-tokens", "64", "hello"];
        assert!(Harness::try_parse_from(argv).is_err());
    }
}
