//! Line-oriented chat session over stdin/stdout

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use gitmate_core::agent::{AgentOrchestrator, LoopEvent, SessionContext, TurnOutcome};
use gitmate_core::storage::HistoryStore;

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "/quit"];

fn prompt() {
    print!("you> ");
    let _ = std::io::stdout().flush();
}

/// Print tool activity as it happens; the answer itself is printed by `run`
async fn print_events(mut rx: mpsc::UnboundedReceiver<LoopEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            LoopEvent::ToolExecuting { name, .. } => println!("  [running {}]", name),
            LoopEvent::ToolResult { is_error: true, .. } => println!("  [tool failed]"),
            _ => {}
        }
    }
}

pub async fn run(agent: &AgentOrchestrator, history: &HistoryStore, user_id: &str) -> Result<()> {
    let session = SessionContext::new(user_id);
    let mut conversation = history.load(user_id)?;
    if !conversation.is_empty() {
        println!(
            "Resumed conversation for {} ({} messages)",
            user_id,
            conversation.len()
        );
    }
    println!("Ask about the repository or the knowledge base. Type 'exit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt();
            continue;
        }
        if EXIT_COMMANDS.contains(&input.to_lowercase().as_str()) {
            break;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(rx));
        let result = agent
            .run_turn(&session, &mut conversation, input, Some(tx))
            .await;
        let _ = printer.await;

        match result {
            Ok(TurnOutcome::Completed { answer, .. }) => println!("gitmate> {}\n", answer),
            Ok(TurnOutcome::MaxIterationsReached { iterations }) => {
                tracing::warn!(iterations, "Turn stopped at the iteration cap");
                println!("gitmate> I could not finish that request. Try asking more specifically.\n");
            }
            Err(e) => {
                tracing::error!(error = %e, "Turn failed");
                println!("gitmate> {}\n", e.user_message());
            }
        }

        // persist after every turn
        if let Err(e) = history.save(user_id, &conversation) {
            tracing::error!(error = %e, "Failed to save conversation history");
            eprintln!("Warning: conversation history was not saved: {}", e);
        }
        prompt();
    }

    println!("Goodbye.");
    Ok(())
}
