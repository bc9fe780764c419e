use anyhow::{Context as _, Result};
use colored::Colorize;
use tagengine::Scanner;

use super::Session;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, with_tags: bool) -> Result<()> {
    let session = Session::open(ctx)?;
    let scanner = Scanner::with_options(session.provider(), session.scan_options());
    let groups = scanner
        .list_resource_groups(session.call())
        .context("Could not list resource groups")?;

    ui::header("Resource Groups");
    for group in &groups {
        println!("  {}", group.bold());
        if with_tags {
            let tags = scanner
                .resource_group_tags(session.call(), group)
                .with_context(|| format!("Could not read tags of {group}"))?;
            if !tags.is_empty() {
                ui::dim(&ui::format_tags(&tags));
            }
        }
    }

    println!();
    ui::success(&format!("{} group(s)", groups.len()));
    Ok(())
}
