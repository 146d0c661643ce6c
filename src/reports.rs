use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Category, DateRange, Transaction};

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    /// ISO weeks, Monday to Sunday.
    Week,
    #[default]
    Month,
    Year,
}

impl Granularity {
    /// The full bucket containing `date`, before any clipping.
    pub fn bucket(&self, date: NaiveDate) -> DateRange {
        let (start, end) = match self {
            Self::Day => (date, date),
            Self::Week => {
                let start = date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
                (start, start + chrono::Duration::days(6))
            }
            Self::Month => {
                // Every valid date sits in a valid month.
                let m = DateRange::month(date.year(), date.month()).unwrap_or(DateRange::single(date));
                (m.start, m.end)
            }
            Self::Year => {
                let y = DateRange::year(date.year()).unwrap_or(DateRange::single(date));
                (y.start, y.end)
            }
        };
        DateRange { start, end }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub period: DateRange,
    pub totals: BTreeMap<Category, Decimal>,
    pub counts: BTreeMap<Category, usize>,
    pub inflows: Decimal,
    pub outflows: Decimal,
    pub net: Decimal,
    pub count: usize,
}

impl Report {
    pub fn empty(period: DateRange) -> Self {
        Self {
            period,
            totals: BTreeMap::new(),
            counts: BTreeMap::new(),
            inflows: Decimal::ZERO,
            outflows: Decimal::ZERO,
            net: Decimal::ZERO,
            count: 0,
        }
    }

    fn add(&mut self, txn: &Transaction) {
        let category = txn.category_or_default();
        *self.totals.entry(category.clone()).or_default() += txn.amount;
        *self.counts.entry(category).or_default() += 1;
        if txn.amount.is_sign_positive() {
            self.inflows += txn.amount;
        } else {
            self.outflows += txn.amount;
        }
        self.net += txn.amount;
        self.count += 1;
    }

    pub fn total_for(&self, category: &Category) -> Decimal {
        self.totals.get(category).copied().unwrap_or_default()
    }

    /// Combine with a report over a non-overlapping period. The result covers
    /// the span of both periods. Returns `None` when the periods overlap,
    /// since transactions in the overlap would be counted twice.
    pub fn merge(&self, other: &Report) -> Option<Report> {
        if self.period.overlaps(&other.period) {
            return None;
        }
        let mut merged = self.clone();
        merged.period = self.period.span(&other.period);
        for (cat, total) in &other.totals {
            *merged.totals.entry(cat.clone()).or_default() += *total;
        }
        for (cat, n) in &other.counts {
            *merged.counts.entry(cat.clone()).or_default() += *n;
        }
        merged.inflows += other.inflows;
        merged.outflows += other.outflows;
        merged.net += other.net;
        merged.count += other.count;
        Some(merged)
    }
}

/// Report over `range`. Transactions dated outside it are ignored, not
/// removed from the slice.
pub fn summarize(transactions: &[Transaction], range: DateRange) -> Report {
    let mut report = Report::empty(range);
    for txn in transactions.iter().filter(|t| range.contains(t.date)) {
        report.add(txn);
    }
    report
}

/// One report per `granularity` bucket intersecting `range`, oldest first.
/// Buckets are clipped to `range`; empty buckets are kept with zero totals.
pub fn aggregate(transactions: &[Transaction], granularity: Granularity, range: DateRange) -> Vec<Report> {
    let mut by_bucket: BTreeMap<NaiveDate, Report> = BTreeMap::new();
    for txn in transactions.iter().filter(|t| range.contains(t.date)) {
        let bucket = granularity.bucket(txn.date);
        by_bucket
            .entry(bucket.start)
            .or_insert_with(|| Report::empty(bucket.intersect(&range).unwrap_or(bucket)))
            .add(txn);
    }

    let mut reports = Vec::new();
    let mut cursor = Some(range.start);
    while let Some(day) = cursor.filter(|d| *d <= range.end) {
        let bucket = granularity.bucket(day);
        let report = by_bucket.remove(&bucket.start).unwrap_or_else(|| {
            Report::empty(bucket.intersect(&range).unwrap_or(bucket))
        });
        reports.push(report);
        cursor = bucket.end.succ_opt();
    }
    log::debug!("aggregated {} bucket(s) over {range}", reports.len());
    reports
}

// ---------------------------------------------------------------------------
// Cash Flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowRow {
    pub period: DateRange,
    pub inflows: Decimal,
    pub outflows: Decimal,
    pub net: Decimal,
    pub running_balance: Decimal,
}

pub fn cashflow(reports: &[Report]) -> Vec<CashflowRow> {
    let mut running = Decimal::ZERO;
    reports
        .iter()
        .map(|r| {
            running += r.net;
            CashflowRow {
                period: r.period,
                inflows: r.inflows,
                outflows: r.outflows,
                net: r.net,
                running_balance: running,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Expense Breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseItem {
    pub category: Category,
    pub total: Decimal,
    pub count: usize,
    /// Share of total spending, one decimal place.
    pub pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseBreakdown {
    pub period: DateRange,
    pub categories: Vec<ExpenseItem>,
    pub total: Decimal,
}

/// Categories whose net is negative, largest spend first.
pub fn expense_breakdown(report: &Report) -> ExpenseBreakdown {
    let spending: Vec<(&Category, Decimal)> = report
        .totals
        .iter()
        .filter(|(_, t)| t.is_sign_negative() && !t.is_zero())
        .map(|(c, t)| (c, *t))
        .collect();
    let total: Decimal = spending.iter().map(|(_, t)| *t).sum();

    let mut categories: Vec<ExpenseItem> = spending
        .into_iter()
        .map(|(cat, t)| ExpenseItem {
            category: cat.clone(),
            total: t,
            count: report.counts.get(cat).copied().unwrap_or(0),
            pct: if total.is_zero() {
                Decimal::ZERO
            } else {
                (t / total * Decimal::ONE_HUNDRED).round_dp(1)
            },
        })
        .collect();
    categories.sort_by(|a, b| a.total.cmp(&b.total).then_with(|| a.category.cmp(&b.category)));

    ExpenseBreakdown {
        period: report.period,
        categories,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn txn(date: NaiveDate, amount: &str, category: &str) -> Transaction {
        Transaction {
            date,
            description: format!("txn {category}"),
            amount: dec(amount),
            category: Some(Category::new(category)),
            line: 2,
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            txn(d(2024, 1, 5), "-4.50", "Dining"),
            txn(d(2024, 1, 20), "-60.25", "Groceries"),
            txn(d(2024, 1, 31), "2500.00", "Income"),
            txn(d(2024, 2, 1), "-12.00", "Dining"),
            txn(d(2024, 2, 14), "-80.00", "Dining"),
            txn(d(2024, 3, 3), "-1200.00", "Housing"),
        ]
    }

    fn assert_balanced(report: &Report) {
        let sum: Decimal = report.totals.values().copied().sum();
        assert_eq!(sum, report.net);
        assert_eq!(report.inflows + report.outflows, report.net);
        assert_eq!(report.counts.values().sum::<usize>(), report.count);
    }

    #[test]
    fn test_coffee_lands_in_january_dining() {
        let t = txn(d(2024, 1, 5), "-4.50", "Dining");
        let report = summarize(&[t], DateRange::month(2024, 1).unwrap());
        assert_eq!(report.total_for(&Category::new("Dining")), dec("-4.50"));
        assert_eq!(report.net, dec("-4.50"));
    }

    #[test]
    fn test_summarize_excludes_out_of_range() {
        let txns = sample();
        let jan = summarize(&txns, DateRange::month(2024, 1).unwrap());
        assert_eq!(jan.count, 3);
        assert_eq!(jan.net, dec("2435.25"));
        assert_eq!(jan.inflows, dec("2500.00"));
        assert_eq!(jan.outflows, dec("-64.75"));
        assert_balanced(&jan);
        assert_eq!(txns.len(), 6);
    }

    #[test]
    fn test_uncategorized_transactions_are_reported() {
        let mut t = txn(d(2024, 1, 5), "-3", "x");
        t.category = None;
        let report = summarize(&[t], DateRange::month(2024, 1).unwrap());
        assert_eq!(report.total_for(&Category::uncategorized()), dec("-3"));
    }

    #[test]
    fn test_empty_input_yields_zero_report() {
        let report = summarize(&[], DateRange::year(2024).unwrap());
        assert!(report.totals.is_empty());
        assert_eq!(report.net, Decimal::ZERO);
        assert_eq!(report.count, 0);
        let monthly = aggregate(&[], Granularity::Month, DateRange::year(2024).unwrap());
        assert_eq!(monthly.len(), 12);
        assert!(monthly.iter().all(|r| r.net.is_zero() && r.totals.is_empty()));
    }

    #[test]
    fn test_aggregate_by_month() {
        let txns = sample();
        let range = DateRange::new(d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        let reports = aggregate(&txns, Granularity::Month, range);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1].period, DateRange::month(2024, 2).unwrap());
        assert_eq!(reports[1].total_for(&Category::new("Dining")), dec("-92.00"));
        assert_eq!(reports[2].total_for(&Category::new("Housing")), dec("-1200.00"));
        reports.iter().for_each(assert_balanced);
    }

    #[test]
    fn test_aggregate_clips_buckets_to_range() {
        let txns = sample();
        let range = DateRange::new(d(2024, 1, 15), d(2024, 2, 10)).unwrap();
        let reports = aggregate(&txns, Granularity::Month, range);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].period, DateRange::new(d(2024, 1, 15), d(2024, 1, 31)).unwrap());
        assert_eq!(reports[0].count, 2);
        assert_eq!(reports[1].period, DateRange::new(d(2024, 2, 1), d(2024, 2, 10)).unwrap());
        assert_eq!(reports[1].count, 1);
    }

    #[test]
    fn test_week_buckets_start_on_monday() {
        // 2024-01-05 is a Friday.
        let week = Granularity::Week.bucket(d(2024, 1, 5));
        assert_eq!(week.start, d(2024, 1, 1));
        assert_eq!(week.end, d(2024, 1, 7));

        let txns = sample();
        let reports = aggregate(&txns, Granularity::Week, DateRange::month(2024, 1).unwrap());
        assert_eq!(reports.len(), 5);
        assert_eq!(reports[0].count, 1);
        assert_eq!(reports.last().unwrap().period.end, d(2024, 1, 31));
    }

    #[test]
    fn test_day_and_year_buckets() {
        let txns = sample();
        let days = aggregate(&txns, Granularity::Day, DateRange::month(2024, 2).unwrap());
        assert_eq!(days.len(), 29);
        assert_eq!(days[0].net, dec("-12.00"));
        let years = aggregate(&txns, Granularity::Year, DateRange::year(2024).unwrap());
        assert_eq!(years.len(), 1);
        assert_eq!(years[0].count, 6);
    }

    #[test]
    fn test_aggregate_matches_summarize_per_bucket() {
        let txns = sample();
        let range = DateRange::year(2024).unwrap();
        for report in aggregate(&txns, Granularity::Week, range) {
            assert_eq!(report, summarize(&txns, report.period));
        }
    }

    #[test]
    fn test_merge_disjoint_reports_equals_union() {
        let txns = sample();
        let jan = summarize(&txns, DateRange::month(2024, 1).unwrap());
        let feb = summarize(&txns, DateRange::month(2024, 2).unwrap());
        let merged = jan.merge(&feb).unwrap();
        let union = summarize(&txns, DateRange::new(d(2024, 1, 1), d(2024, 2, 29)).unwrap());
        assert_eq!(merged, union);
        assert_eq!(feb.merge(&jan).unwrap(), union);
    }

    #[test]
    fn test_merge_rejects_overlap() {
        let txns = sample();
        let jan = summarize(&txns, DateRange::month(2024, 1).unwrap());
        let q1 = summarize(&txns, DateRange::new(d(2024, 1, 1), d(2024, 3, 31)).unwrap());
        assert!(jan.merge(&q1).is_none());
    }

    #[test]
    fn test_cashflow_running_balance() {
        let txns = sample();
        let range = DateRange::new(d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        let rows = cashflow(&aggregate(&txns, Granularity::Month, range));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].running_balance, dec("2435.25"));
        assert_eq!(rows[1].net, dec("-92.00"));
        assert_eq!(rows[1].running_balance, dec("2343.25"));
        assert_eq!(rows[2].running_balance, dec("1143.25"));
    }

    #[test]
    fn test_expense_breakdown() {
        let txns = sample();
        let report = summarize(&txns, DateRange::year(2024).unwrap());
        let breakdown = expense_breakdown(&report);
        assert_eq!(breakdown.total, dec("-1356.75"));
        let names: Vec<&str> = breakdown.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Housing", "Dining", "Groceries"]);
        assert_eq!(breakdown.categories[0].pct, dec("88.4"));
        assert_eq!(breakdown.categories[1].count, 3);
    }

    #[test]
    fn test_expense_breakdown_of_empty_report() {
        let breakdown = expense_breakdown(&Report::empty(DateRange::year(2024).unwrap()));
        assert!(breakdown.categories.is_empty());
        assert_eq!(breakdown.total, Decimal::ZERO);
    }
}
