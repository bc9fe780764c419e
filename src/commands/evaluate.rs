use anyhow::Result;
use colored::Colorize;
use tagengine::MatchTable;

use super::{Session, print_json};
use crate::Context;
use crate::cli::EvaluateArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &EvaluateArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let (_, table) = session.matched(ctx, &args.rules, args.output.allow_partial)?;

    if args.output.json {
        return print_json(&table);
    }

    print_matches(&table);
    Ok(())
}

/// Print each matched resource with the rules and actions it would get.
pub fn print_matches(table: &MatchTable) {
    if table.is_empty() {
        ui::info("No resource matched any rule");
        return;
    }

    ui::header("Matches");
    for (id, entry) in table {
        println!("  {}", id.bold());
        for rule in &entry.rules {
            let actions: Vec<&str> = rule.actions.iter().map(|a| a.kind()).collect();
            println!(
                "    {} {} {}",
                "→".cyan(),
                rule.name,
                format!("[{}]", actions.join(", ")).dimmed()
            );
        }
    }

    println!();
    ui::kv("Resources", &table.len().to_string());
    ui::kv("Rule matches", &table.rule_count().to_string());
}
