//! System prompt preset commands.

use anyhow::Result;
use clap::Subcommand;

use crate::domain::SystemPrompt;
use crate::prompts;
use crate::store::{JsonFileStore, PromptLibrary};

#[derive(Subcommand, Debug)]
pub enum PromptCommands {
    /// List built-in and saved prompts
    List,

    /// Save a prompt preset (replaces one with the same name)
    Add {
        name: String,
        content: String,
    },

    /// Delete a saved preset by id or name
    Delete {
        key: String,
    },
}

pub async fn execute(command: PromptCommands) -> Result<()> {
    let store = JsonFileStore::open_default()?;

    match command {
        PromptCommands::List => list(&store).await,
        PromptCommands::Add { name, content } => add(&store, name, content).await,
        PromptCommands::Delete { key } => delete(&store, &key).await,
    }
}

async fn list(store: &impl PromptLibrary) -> Result<()> {
    println!("Built-in: default, voice, ssml");
    println!();

    let saved = store.list_prompts().await?;
    if saved.is_empty() {
        println!("No saved prompts");
        return Ok(());
    }

    println!("{:<38} {:<20} CONTENT", "ID", "NAME");
    println!("{}", "-".repeat(90));
    for prompt in saved {
        let preview: String = prompt.content.lines().next().unwrap_or("").chars().take(40).collect();
        println!("{:<38} {:<20} {}", prompt.id, prompt.name, preview);
    }
    Ok(())
}

async fn add(store: &impl PromptLibrary, name: String, content: String) -> Result<()> {
    if prompts::builtin(&name).is_some() {
        anyhow::bail!("'{}' is a built-in prompt name", name);
    }
    if content.trim().is_empty() {
        anyhow::bail!("Prompt content is empty");
    }

    // Same name keeps the same id so the list order is stable
    let prompt = match store.find_prompt(&name).await? {
        Some(existing) => SystemPrompt {
            content,
            ..existing
        },
        None => SystemPrompt::new(name, content),
    };
    store.save_prompt(&prompt).await?;

    println!("Saved prompt '{}' ({})", prompt.name, prompt.id);
    Ok(())
}

async fn delete(store: &impl PromptLibrary, key: &str) -> Result<()> {
    let Some(prompt) = store.find_prompt(key).await? else {
        anyhow::bail!("No saved prompt matches '{}'", key);
    };
    store.delete_prompt(&prompt.id).await?;
    println!("Deleted prompt '{}'", prompt.name);
    Ok(())
}
