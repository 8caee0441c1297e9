//! Prompts-related command implementations

use anyhow::Result;
use montra_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

/// List all available prompts and their override status
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();
    let prompts = library.list();

    println!("Available Prompts:\n");

    println!(
        "{:<20} {:>7}  {:>11}  {}",
        "ID", "VERSION", "TEMPERATURE", "OVERRIDE"
    );
    println!("{}", "-".repeat(60));

    for info in prompts {
        let override_status = if info.has_override {
            "✓ Custom"
        } else {
            "Default"
        };
        let temperature = info
            .temperature
            .map(|t| format!("{:.1}", t))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<20} {:>7}  {:>11}  {}",
            info.id, info.version, temperature, override_status
        );
    }

    println!();
    cmd_prompts_path()?;

    println!();
    println!("To customize a prompt:");
    println!("  1. montra prompts show <id> > <override dir>/<id>.md");
    println!("  2. Edit the file with your changes");

    Ok(())
}

/// Show the content of a specific prompt
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let Some(id) = PromptId::all().iter().copied().find(|id| id.as_str() == prompt_id) else {
        eprintln!("Unknown prompt ID: {}", prompt_id);
        eprintln!();
        eprintln!("Available prompts:");
        for id in PromptId::all() {
            eprintln!("  - {}", id.as_str());
        }
        return Ok(());
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    println!("---");
    println!("id: {}", prompt.metadata.id);
    println!("version: {}", prompt.metadata.version);
    if let Some(t) = prompt.metadata.temperature {
        println!("temperature: {}", t);
    }
    println!("---");
    println!();
    println!("{}", prompt.content.trim());

    Ok(())
}

pub fn cmd_prompts_path() -> Result<()> {
    println!(
        "Override directory: {}",
        default_prompts_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );
    Ok(())
}
