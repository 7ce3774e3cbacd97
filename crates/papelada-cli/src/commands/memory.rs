//! Memory command implementation.

use crate::cli::{MemoryAction, MemoryArgs};
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use papelada_orchestrator::PatternMemory;
use std::io::{self, Write};

/// Execute the memory command.
pub async fn execute_memory(args: MemoryArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let path = config.memory_path(args.memory)?;
    let mut memory = PatternMemory::load(&path)?;

    match args.action {
        MemoryAction::Show => {
            println!("{}", formatter.format_memory(&memory)?);
        }
        MemoryAction::Clear { label, yes } => {
            let target = match &label {
                Some(label) => format!("layout '{}'", label),
                None => format!("all {} layout(s)", memory.labels().count()),
            };

            if !yes {
                print!("About to forget {} in {}. Continue? [y/N] ", target, path.display());
                io::stdout().flush()?;

                let mut response = String::new();
                io::stdin().read_line(&mut response)?;

                if !response.trim().eq_ignore_ascii_case("y") {
                    println!("{}", formatter.info("Operation cancelled"));
                    return Ok(());
                }
            }

            if !forget(&mut memory, label.as_deref()) {
                println!("{}", formatter.warning(&format!("Nothing remembered for {}", target)));
                return Ok(());
            }
            memory.save(&path)?;
            println!("{}", formatter.success(&format!("Forgot {}", target)));
        }
    }

    Ok(())
}

/// Forget one layout, or everything. Returns whether anything was removed.
fn forget(memory: &mut PatternMemory, label: Option<&str>) -> bool {
    match label {
        Some(label) => memory.forget(label),
        None => {
            let had_any = !memory.is_empty();
            memory.clear();
            had_any
        }
    }
}
