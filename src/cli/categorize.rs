use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::report::export;
use crate::cli::{emit, plain_if_file, Context, OutputArgs, OutputFormat};
use crate::error::Result;
use crate::fmt::amount;
use crate::models::Transaction;

pub fn run(ctx: &Context, file: &str, rules: Option<&str>, uncategorized: bool, output: &OutputArgs) -> Result<()> {
    let loaded = ctx.categorized(file, rules)?;

    let shown: Vec<Transaction> = loaded
        .outcome
        .transactions
        .iter()
        .filter(|t| !uncategorized || t.category_or_default().is_uncategorized())
        .cloned()
        .collect();

    plain_if_file(output);
    let content = match output.format {
        OutputFormat::Text => {
            let total = loaded.outcome.transactions.len();
            let preset = total - loaded.result.categorized - loaded.result.uncategorized;
            let mut summary = format!(
                "{} transactions: {} matched a rule, {} uncategorized",
                total, loaded.result.categorized, loaded.result.uncategorized
            );
            if preset > 0 {
                summary.push_str(&format!(", {preset} already categorized"));
            }
            if loaded.result.unknown_presets > 0 {
                summary.push_str(&format!(
                    "\n{} preset categor{} not in the rules file were replaced",
                    loaded.result.unknown_presets,
                    if loaded.result.unknown_presets == 1 { "y" } else { "ies" }
                ));
            }
            format!("{}\n\n{}", format_register(&shown), summary)
        }
        OutputFormat::Csv => export::transactions_csv(&shown)?,
        OutputFormat::Json => export::to_json(&shown)?,
    };
    emit(&content, output.output.as_deref())
}

pub fn format_register(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return "No transactions.".to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["Line", "Date", "Description", "Amount", "Category"]);
    for t in transactions {
        let amt = if t.amount.is_sign_negative() {
            amount(t.amount).red().to_string()
        } else {
            amount(t.amount).green().to_string()
        };
        let category = t.category_or_default();
        let category_cell = if category.is_uncategorized() {
            Cell::new(category.as_str().yellow())
        } else {
            Cell::new(category)
        };
        table.add_row(vec![
            Cell::new(t.line),
            Cell::new(t.date),
            Cell::new(&t.description),
            Cell::new(amt),
            category_cell,
        ]);
    }
    table.to_string()
}
