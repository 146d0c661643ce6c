use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::fmt::{amount, pct};
use crate::reports::{CashflowRow, ExpenseBreakdown, Report};

fn signed(val: Decimal) -> String {
    if val.is_sign_negative() && !val.is_zero() {
        amount(val).red().to_string()
    } else {
        amount(val).green().to_string()
    }
}

fn net_row(table: &mut Table, net: Decimal) {
    let label = if net.is_sign_negative() && !net.is_zero() {
        "NET".red().bold()
    } else {
        "NET".green().bold()
    };
    table.add_row(vec![Cell::new(label), Cell::new(amount(net)), Cell::new("")]);
}

pub fn format_report(report: &Report) -> String {
    if report.count == 0 {
        return format!("{}: no transactions", report.period);
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "Count"]);
    for (category, count) in &report.counts {
        table.add_row(vec![
            Cell::new(category),
            Cell::new(signed(report.total_for(category))),
            Cell::new(count),
        ]);
    }
    net_row(&mut table, report.net);

    format!("{} ({} transactions)\n{table}", report.period, report.count)
}

pub fn format_summary(reports: &[Report]) -> String {
    let mut sections: Vec<String> = reports.iter().map(format_report).collect();

    // Buckets from one aggregation never overlap, so merging always succeeds.
    if reports.len() > 1 {
        let overall = reports
            .iter()
            .skip(1)
            .try_fold(reports[0].clone(), |acc, r| acc.merge(r));
        if let Some(overall) = overall {
            sections.push(format!(
                "{} {}: {} in, {} out, net {} across {} transactions",
                "Overall".bold(),
                overall.period,
                amount(overall.inflows),
                amount(overall.outflows.abs()),
                amount(overall.net),
                overall.count
            ));
        }
    }

    format!("Summary\n\n{}", sections.join("\n\n"))
}

pub fn format_cashflow(rows: &[CashflowRow]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Period", "Inflows", "Outflows", "Net", "Running"]);
    for r in rows {
        table.add_row(vec![
            Cell::new(r.period),
            Cell::new(amount(r.inflows)),
            Cell::new(amount(r.outflows.abs())),
            Cell::new(signed(r.net)),
            Cell::new(amount(r.running_balance)),
        ]);
    }
    format!("Cash Flow\n{table}")
}

pub fn format_expenses(data: &ExpenseBreakdown) -> String {
    if data.categories.is_empty() {
        return format!("Expense Breakdown ({})\nNo expenses found.", data.period);
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "%", "Count"]);
    for item in &data.categories {
        table.add_row(vec![
            Cell::new(&item.category),
            Cell::new(amount(item.total.abs())),
            Cell::new(pct(item.pct)),
            Cell::new(item.count),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(amount(data.total.abs())),
        Cell::new(""),
        Cell::new(""),
    ]);
    format!("Expense Breakdown ({})\n{table}", data.period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, DateRange, Transaction};
    use crate::reports::{aggregate, expense_breakdown, summarize, Granularity};
    use chrono::NaiveDate;

    fn sample() -> Vec<Transaction> {
        let t = |m: u32, d: u32, amt: i64, cat: &str| Transaction {
            date: NaiveDate::from_ymd_opt(2024, m, d).unwrap(),
            description: cat.to_string(),
            amount: Decimal::new(amt, 2),
            category: Some(Category::new(cat)),
            line: 2,
        };
        vec![t(1, 5, -450, "Dining"), t(1, 9, 250000, "Income"), t(3, 2, -1000, "Dining")]
    }

    #[test]
    fn test_format_summary_lists_periods_and_overall() {
        colored::control::set_override(false);
        let reports = aggregate(&sample(), Granularity::Month, DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        ).unwrap());
        let out = format_summary(&reports);
        assert!(out.contains("2024-01-01 to 2024-01-31 (2 transactions)"));
        assert!(out.contains("Dining"));
        assert!(out.contains("-4.50"));
        assert!(out.contains("2024-02-01 to 2024-02-29: no transactions"));
        assert!(out.contains("net 2,485.50 across 3 transactions"));
    }

    #[test]
    fn test_format_expenses() {
        colored::control::set_override(false);
        let report = summarize(&sample(), DateRange::year(2024).unwrap());
        let out = format_expenses(&expense_breakdown(&report));
        assert!(out.contains("Dining"));
        assert!(out.contains("14.50"));
        assert!(out.contains("100.0%"));
        assert!(!out.contains("Income"));
    }

    #[test]
    fn test_format_expenses_empty() {
        let report = Report::empty(DateRange::year(2024).unwrap());
        assert!(format_expenses(&expense_breakdown(&report)).contains("No expenses found."));
    }
}
