//! Interactive operator menu.
//!
//! Thin terminal layer over the registry for interactive deployments:
//! add a bot, list bots, remove a bot, exit. Unattended deployments never
//! reach this module.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::bot::{BotError, SessionRegistry};

/// Run the menu loop until the operator chooses to exit or stdin closes.
/// All sessions are shut down gracefully on the way out.
pub async fn run(registry: Arc<Mutex<SessionRegistry>>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_menu();
        let Some(choice) = prompt(&mut lines, "Choose (1-4): ").await? else {
            break;
        };

        match choice.trim() {
            "1" => add_bot(&registry, &mut lines).await?,
            "2" => list_bots(&registry).await,
            "3" => remove_bot(&registry, &mut lines).await?,
            "4" => break,
            other => println!("Invalid choice: {}", other),
        }
    }

    registry.lock().await.shutdown_all().await;
    println!("Goodbye!");
    Ok(())
}

fn print_menu() {
    println!();
    println!("==== BOT MANAGER ====");
    println!("1. Add bot");
    println!("2. List bots");
    println!("3. Remove bot");
    println!("4. Exit");
    println!("=====================");
}

async fn prompt(
    lines: &mut Lines<BufReader<Stdin>>,
    label: &str,
) -> Result<Option<String>> {
    use std::io::Write;
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

async fn add_bot(
    registry: &Arc<Mutex<SessionRegistry>>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let Some(name) = prompt(lines, "Bot name: ").await? else {
        return Ok(());
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        println!("A name is required.");
        return Ok(());
    }

    let mut registry = registry.lock().await;
    match registry.add_session(&name).await {
        Ok(id) => println!("Bot \"{}\" added with id {}.", name, id),
        Err(BotError::DuplicateName(n)) => println!("Name \"{}\" already exists.", n),
        Err(e) => println!("Could not add bot: {}", e),
    }
    Ok(())
}

async fn list_bots(registry: &Arc<Mutex<SessionRegistry>>) {
    let snapshots = registry.lock().await.snapshot();
    println!();
    println!("ACTIVE BOTS:");
    if snapshots.is_empty() {
        println!("  (none)");
        return;
    }
    for s in snapshots {
        println!(
            "  id: {}  name: {}  state: {}  auth: {}",
            s.id,
            s.name,
            s.state_label,
            if s.authenticated { "yes" } else { "no" }
        );
    }
}

async fn remove_bot(
    registry: &Arc<Mutex<SessionRegistry>>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    if registry.lock().await.is_empty() {
        println!("No active bots.");
        return Ok(());
    }
    list_bots(registry).await;

    let Some(input) = prompt(lines, "Bot id to remove: ").await? else {
        return Ok(());
    };
    let id: u64 = match input.trim().parse() {
        Ok(id) => id,
        Err(_) => {
            println!("Not a valid id.");
            return Ok(());
        }
    };

    let mut registry = registry.lock().await;
    match registry.remove_session(id).await {
        Ok(name) => println!("Bot \"{}\" removed.", name),
        Err(BotError::SessionNotFound(_)) => println!("Bot not found."),
        Err(e) => println!("Could not remove bot: {}", e),
    }
    Ok(())
}
