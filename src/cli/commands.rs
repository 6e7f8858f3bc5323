//! CLI commands
//!
//! Special commands that can be executed in the interactive prompt.

use crate::core::{Config, Result, RetryScope};
use crate::llm::LLMProvider;

/// Result of parsing a command
pub enum CommandResult {
    /// Treat the input as a question
    Ask(String),
    /// Command was handled, show output
    Handled(String),
    /// Configuration changed; the orchestrator must be rebuilt
    Reconfigured(String),
    /// Exit the prompt loop
    Exit,
}

/// Parse and handle special commands
pub async fn handle_command(
    input: &str,
    config: &mut Config,
    llm: &dyn LLMProvider,
) -> Result<CommandResult> {
    let input = input.trim();
    let (cmd, args) = match input.split_once(' ') {
        Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
        None => (input.to_lowercase(), ""),
    };

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "models" => {
            let models = llm.list_models().await?;
            let output = format!(
                "Available models:\n{}\n\nIn use:\n{}",
                models
                    .iter()
                    .map(|m| format!("  - {}", m))
                    .collect::<Vec<_>>()
                    .join("\n"),
                config
                    .roles
                    .models()
                    .iter()
                    .map(|m| format!("  - {}", m))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
            Ok(CommandResult::Handled(output))
        }

        "status" => Ok(CommandResult::Handled(status_text(config))),

        "set" => handle_set_command(args, config),

        "config" => handle_config_command(args, config),

        _ => Ok(CommandResult::Ask(input.to_string())),
    }
}

fn status_text(config: &Config) -> String {
    let roles = &config.roles;
    format!(
        "Conclave Status:\n\
         ─────────────────────────────\n\
         Ollama:          {}\n\
         Planner:         {}\n\
         Researcher:      {}\n\
         Expert:          {}\n\
         Critic:          {}\n\
         Finalizer:       {}\n\
         Retry limit:     {} ({:?})\n\
         Max iterations:  {}",
        config.ollama_url(),
        roles.planner.model,
        roles.researcher.model,
        roles.expert.model,
        roles.critic.model,
        roles.finalizer.model,
        config.workflow.retry_limit,
        config.workflow.retry_scope,
        config.workflow.max_subworkflow_iterations,
    )
}

/// Show or persist the active configuration
fn handle_config_command(args: &str, config: &Config) -> Result<CommandResult> {
    match args.to_lowercase().as_str() {
        "" | "show" => Ok(CommandResult::Handled(config.to_toml()?)),
        "save" => {
            let path = config.save()?;
            Ok(CommandResult::Handled(format!(
                "Configuration saved to {}",
                path.display()
            )))
        }
        other => Ok(CommandResult::Handled(format!(
            "Unknown config action: {}. Use 'config' or 'config save'",
            other
        ))),
    }
}

/// Handle 'set' subcommands
fn handle_set_command(args: &str, config: &mut Config) -> Result<CommandResult> {
    let Some((key, value)) = args.split_once(' ') else {
        return Ok(CommandResult::Handled(
            "Usage: set <model|retry_limit|retry_scope|max_iterations> <value>\n\
             Examples:\n\
               set model qwen3:8b\n\
               set retry_limit 3\n\
               set retry_scope per_role"
                .to_string(),
        ));
    };
    let value = value.trim();

    match key.to_lowercase().as_str() {
        "model" => {
            config.roles.set_model(value);
            Ok(CommandResult::Reconfigured(format!(
                "All roles now use: {}",
                value
            )))
        }
        "retry_limit" => match value.parse::<u32>() {
            Ok(limit) => {
                config.workflow.retry_limit = limit;
                Ok(CommandResult::Reconfigured(format!("Retry limit: {}", limit)))
            }
            Err(_) => Ok(CommandResult::Handled(format!(
                "Invalid retry limit: {}",
                value
            ))),
        },
        "retry_scope" => {
            let scope: RetryScope = value.parse()?;
            config.workflow.retry_scope = scope;
            Ok(CommandResult::Reconfigured(format!("Retry scope: {:?}", scope)))
        }
        "max_iterations" => match value.parse::<usize>() {
            Ok(max) if max > 0 => {
                config.workflow.max_subworkflow_iterations = max;
                Ok(CommandResult::Reconfigured(format!("Max iterations: {}", max)))
            }
            _ => Ok(CommandResult::Handled(format!(
                "Invalid iteration cap: {}",
                value
            ))),
        },
        other => Ok(CommandResult::Handled(format!(
            "Unknown setting: {}. Available: model, retry_limit, retry_scope, max_iterations",
            other
        ))),
    }
}

/// Generate help text
fn help_text() -> String {
    r#"Conclave Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit Conclave
  status           Show current configuration
  models           List available Ollama models
  config           Show the active configuration as TOML
  config save      Write it to the config file

  set model <model>            Use one model for every role
  set retry_limit <n>          Rejections allowed per question
  set retry_scope <scope>      shared or per_role
  set max_iterations <n>       Tool-calling cap for researcher/expert

Anything else is answered as a question.
─────────────────────────────────────────────"#
        .to_string()
}
