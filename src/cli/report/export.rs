use serde::Serialize;

use crate::error::{Result, TallyError};
use crate::models::Transaction;
use crate::reports::{CashflowRow, ExpenseBreakdown, Report};

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().map_err(|e| TallyError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| TallyError::Other(e.to_string()))
}

// Amounts are written at full precision so totals still add up to the net
// and transaction exports re-import unchanged.

/// One row per (period, category), periods oldest first.
pub fn summary_csv(reports: &[Report]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["period_start", "period_end", "category", "total", "count"])?;
    for r in reports {
        for (category, total) in &r.totals {
            wtr.write_record([
                r.period.start.to_string(),
                r.period.end.to_string(),
                category.to_string(),
                total.to_string(),
                r.counts.get(category).copied().unwrap_or(0).to_string(),
            ])?;
        }
    }
    finish(wtr)
}

pub fn cashflow_csv(rows: &[CashflowRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["period_start", "period_end", "inflows", "outflows", "net", "running_balance"])?;
    for r in rows {
        wtr.write_record([
            r.period.start.to_string(),
            r.period.end.to_string(),
            r.inflows.to_string(),
            r.outflows.to_string(),
            r.net.to_string(),
            r.running_balance.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn expenses_csv(data: &ExpenseBreakdown) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["category", "total", "count", "pct"])?;
    for item in &data.categories {
        wtr.write_record([
            item.category.to_string(),
            item.total.to_string(),
            item.count.to_string(),
            format!("{:.1}", item.pct),
        ])?;
    }
    finish(wtr)
}

/// Same columns the importer reads, so the output can be fed back in.
pub fn transactions_csv(transactions: &[Transaction]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(crate::importer::TEMPLATE_HEADER)?;
    for t in transactions {
        wtr.write_record([
            t.date.format("%Y-%m-%d").to_string(),
            t.description.clone(),
            t.amount.to_string(),
            t.category_or_default().to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
