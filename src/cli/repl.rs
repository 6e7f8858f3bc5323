//! Interactive prompt loop
//!
//! Reads questions from stdin and answers each one in its own session.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::agent::Orchestrator;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};
use crate::llm::LLMProvider;
use crate::tools::ToolRegistry;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    config: Config,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    orchestrator: Orchestrator,
}

impl Repl {
    pub fn new(config: Config, llm: Arc<dyn LLMProvider>, tools: Arc<ToolRegistry>) -> Self {
        let orchestrator = Orchestrator::new(&config, llm.clone(), tools.clone());
        Self {
            config,
            llm,
            tools,
            orchestrator,
        }
    }

    /// Check that every configured model is available
    async fn check_models(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for model in self.config.roles.models() {
            if !self.llm.is_model_available(&model).await? {
                missing.push(model);
            }
        }
        Ok(missing)
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        print!("Initializing...");
        io::stdout().flush()?;
        match self.check_models().await {
            Ok(missing) if missing.is_empty() => println!(" Ready!\n"),
            Ok(missing) => {
                println!();
                for model in missing {
                    println!("Model '{}' not found. Run: ollama pull {}", model, model);
                }
                println!();
            }
            Err(e) => {
                println!("\n\nInitialization Error: {}\n", e);
                return Ok(());
            }
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("Question: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.config, self.llm.as_ref()).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => println!("{}\n", output),
                Ok(CommandResult::Reconfigured(output)) => {
                    self.orchestrator =
                        Orchestrator::new(&self.config, self.llm.clone(), self.tools.clone());
                    println!("{}\n", output);
                }
                Ok(CommandResult::Ask(question)) => match self.orchestrator.run(&question, None).await {
                    Ok(outcome) => {
                        println!("\nAnswer: {}\n", outcome.final_answer);
                        println!("Reasoning:\n{}\n", outcome.final_reasoning);
                        if outcome.failed {
                            println!("(session {} could not be completed)\n", outcome.session_id);
                        }
                    }
                    Err(e) => eprintln!("\nError: {}\n", e),
                },
                Err(e) => eprintln!("Command error: {}\n", e),
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        println!("\nConclave - multi-agent question answering\n");
        println!("Ollama:  {}", self.config.ollama_url());
        println!("Models:  {}", self.config.roles.models().join(", "));
        println!("Tools:   {} registered", self.tools.len());
        println!();
        println!("Commands: help, status, models, config, set, exit");
        println!("─────────────────────────────────────────────");
    }
}
