use std::path::Path;

use colored::Colorize;

use crate::cli::{format_skipped, Context};
use crate::error::Result;
use crate::importer::parse_file;

pub fn run(ctx: &Context, file: &str) -> Result<()> {
    let outcome = parse_file(Path::new(file), &ctx.settings.parse_options())?;

    println!("Rows:     {}", outcome.rows);
    println!("Valid:    {}", outcome.transactions.len());
    println!("Skipped:  {}", outcome.skipped.len());
    if let Some(span) = outcome.date_span() {
        println!("Dates:    {span}");
    }

    if outcome.skipped.is_empty() {
        println!("{}", "All rows are valid.".green());
    } else {
        println!();
        println!("{}", format_skipped(&outcome.skipped));
    }

    outcome.enforce(ctx.policy)
}
