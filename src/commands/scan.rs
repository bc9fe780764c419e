use anyhow::Result;
use colored::Colorize;

use super::{Session, print_json};
use crate::Context;
use crate::cli::ScanArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &ScanArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut resources = session.scan(ctx, args.output.allow_partial)?;
    resources.sort_by(|a, b| a.id.cmp(&b.id));

    if args.output.json {
        return print_json(&resources);
    }

    ui::header("Resources");
    for resource in &resources {
        println!(
            "  {} {}",
            resource.name.bold(),
            format!("({}, {}, {})", resource.resource_group, resource.region, resource.kind).dimmed()
        );
        if !resource.tags.is_empty() {
            ui::dim(&ui::format_tags(&resource.tags));
        }
    }

    println!();
    ui::success(&format!("{} resource(s)", resources.len()));
    Ok(())
}
