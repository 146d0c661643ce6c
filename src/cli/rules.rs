use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::Ruleset;
use crate::cli::Context;
use crate::error::Result;

pub fn list(ctx: &Context, rules: Option<&str>, file: Option<&str>) -> Result<()> {
    let (ruleset, hits) = match file {
        Some(f) => {
            let loaded = ctx.categorized(f, rules)?;
            (loaded.ruleset, Some(loaded.result.hits))
        }
        None => (ctx.ruleset(rules)?, None),
    };
    println!("{}", format_rules(&ruleset, hits.as_deref()));
    Ok(())
}

pub fn check(ctx: &Context, rules: Option<&str>) -> Result<()> {
    let ruleset = ctx.ruleset(rules)?;
    if ruleset.is_empty() {
        println!("{}", "No rules configured.".yellow());
    } else {
        println!("{}", format!("{} rules OK", ruleset.len()).green());
    }
    Ok(())
}

/// Rules in evaluation order. `hits` lines up with `ruleset.rules()`.
pub fn format_rules(ruleset: &Ruleset, hits: Option<&[usize]>) -> String {
    if ruleset.is_empty() {
        return "No rules configured.".to_string();
    }

    let mut header = vec!["#", "Pattern", "Type", "Category", "Priority"];
    if hits.is_some() {
        header.push("Hits");
    }
    let mut table = Table::new();
    table.set_header(header);
    for (i, rule) in ruleset.rules().iter().enumerate() {
        let mut row = vec![
            Cell::new(rule.index),
            Cell::new(&rule.spec.pattern),
            Cell::new(rule.spec.match_type.key()),
            Cell::new(&rule.category),
            Cell::new(rule.spec.priority),
        ];
        if let Some(h) = hits {
            row.push(Cell::new(h.get(i).copied().unwrap_or(0)));
        }
        table.add_row(row);
    }
    let mut out = format!("Rules ({})\n{table}", ruleset.len());
    if !ruleset.categories().is_empty() {
        let names: Vec<&str> = ruleset.categories().iter().map(|c| c.as_str()).collect();
        out.push_str(&format!("\nCategories: {}", names.join(", ")));
    }
    out
}
