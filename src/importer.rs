use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, TallyError};
use crate::models::{Category, DateRange, Transaction};

pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
pub const DEFAULT_CURRENCY_SYMBOLS: &[&str] = &["$", "€", "£", "¥"];
pub const TEMPLATE_HEADER: &[&str] = &["Date", "Description", "Amount", "Category"];

const DATE_HEADERS: &[&str] = &["date", "posting date", "transaction date"];
const DESCRIPTION_HEADERS: &[&str] = &["description", "desc", "payee", "memo", "name"];
const AMOUNT_HEADERS: &[&str] = &["amount", "total"];
const CATEGORY_HEADERS: &[&str] = &["category"];
const LABEL_HEADERS: &[&str] = &["label"];

/// Largest accepted magnitude for a single amount. Keeps any realistic sum
/// of rows well inside `Decimal` range so report totals cannot overflow.
pub const MAX_ABS_AMOUNT: i64 = 1_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Options & results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Any skipped row fails the run.
    Strict,
    #[default]
    Lenient,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// chrono format strings, tried in order.
    pub date_formats: Vec<String>,
    pub currency_symbols: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
            currency_symbols: DEFAULT_CURRENCY_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("unrecognized date '{0}'")]
    BadDate(String),
    #[error("invalid amount '{0}'")]
    BadAmount(String),
    #[error("amount is zero")]
    ZeroAmount,
    #[error("amount '{0}' is out of range")]
    AmountOutOfRange(String),
    #[error("unknown label '{0}', expected Outcome, Income or Savings")]
    BadLabel(String),
    #[error("description is empty")]
    EmptyDescription,
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: RowError,
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkippedRow>,
    /// Data rows seen, excluding the header. Always equals
    /// `transactions.len() + skipped.len()`.
    pub rows: usize,
}

impl ParseOutcome {
    pub fn enforce(&self, policy: ValidationPolicy) -> Result<()> {
        match policy {
            ValidationPolicy::Strict if !self.skipped.is_empty() => Err(TallyError::RowsRejected {
                count: self.skipped.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Earliest to latest transaction date, if any.
    pub fn date_span(&self) -> Option<DateRange> {
        let start = self.transactions.iter().map(|t| t.date).min()?;
        let end = self.transactions.iter().map(|t| t.date).max()?;
        DateRange::new(start, end)
    }
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

fn strip_sign(s: &str) -> (Option<bool>, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (Some(true), rest.trim_start())
    } else if let Some(rest) = s.strip_prefix('+') {
        (Some(false), rest.trim_start())
    } else {
        (None, s)
    }
}

/// Parse a money string. Accepts a leading sign, a currency symbol on
/// either side of the sign, thousands separators and accounting-style
/// parentheses for negatives.
pub fn parse_amount(raw: &str, symbols: &[String]) -> Option<Decimal> {
    let cleaned = raw.trim().replace(',', "");
    let mut s = cleaned.as_str();

    let parenthesized = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => {
            s = inner.trim();
            true
        }
        None => false,
    };

    let (mut sign, mut s) = strip_sign(s);
    if let Some(sym) = symbols.iter().find(|sym| !sym.is_empty() && s.starts_with(sym.as_str())) {
        s = s[sym.len()..].trim_start();
    } else if let Some(sym) = symbols.iter().find(|sym| !sym.is_empty() && s.ends_with(sym.as_str())) {
        s = s[..s.len() - sym.len()].trim_end();
    }
    if sign.is_none() {
        (sign, s) = strip_sign(s);
    }

    let negative = sign.unwrap_or(false);
    if parenthesized && sign.is_some() {
        return None;
    }

    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = s.chars().filter(|c| *c == '.').count();
    if digits == 0 || dots > 1 || digits + dots != s.len() {
        return None;
    }

    let value = Decimal::from_str(s).ok()?;
    Some(if negative || parenthesized { -value } else { value })
}

/// First format that parses wins.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    category: Option<usize>,
    label: Option<usize>,
}

/// Direction column used by exports with unsigned totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Outcome,
    Income,
    /// Money moved out to savings; counted as an outflow.
    Savings,
}

impl Label {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "outcome" | "expense" => Some(Self::Outcome),
            "income" => Some(Self::Income),
            "savings" => Some(Self::Savings),
            _ => None,
        }
    }

    /// Signed amount: the label decides the direction, whatever sign the
    /// amount was written with.
    pub fn apply(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount.abs(),
            Self::Outcome | Self::Savings => -amount.abs(),
        }
    }
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| aliases.contains(&h.as_str()))
}

fn resolve_columns(headers: &StringRecord) -> Result<Columns> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    if normalized.iter().all(|h| h.is_empty()) {
        return Err(TallyError::Structural(
            "file is empty, expected a header row".to_string(),
        ));
    }

    let require = |name: &str, aliases: &[&str]| {
        find_column(&normalized, aliases).ok_or_else(|| {
            TallyError::Structural(format!(
                "missing required column '{name}' (found: {})",
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
    };

    Ok(Columns {
        date: require("date", DATE_HEADERS)?,
        description: require("description", DESCRIPTION_HEADERS)?,
        amount: require("amount", AMOUNT_HEADERS)?,
        category: find_column(&normalized, CATEGORY_HEADERS),
        label: find_column(&normalized, LABEL_HEADERS),
    })
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn field<'r>(record: &'r StringRecord, idx: usize, name: &'static str) -> std::result::Result<&'r str, RowError> {
    match record.get(idx).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RowError::MissingField(name)),
    }
}

fn convert_record(
    record: &StringRecord,
    cols: &Columns,
    line: u64,
    opts: &ParseOptions,
) -> std::result::Result<Transaction, RowError> {
    let raw_date = field(record, cols.date, "date")?;
    let date = parse_date(raw_date, &opts.date_formats)
        .ok_or_else(|| RowError::BadDate(raw_date.to_string()))?;

    let description = record
        .get(cols.description)
        .map(str::trim)
        .unwrap_or_default();
    if description.is_empty() {
        return Err(RowError::EmptyDescription);
    }

    let raw_amount = field(record, cols.amount, "amount")?;
    let amount = parse_amount(raw_amount, &opts.currency_symbols)
        .ok_or_else(|| RowError::BadAmount(raw_amount.to_string()))?;
    if amount.is_zero() {
        return Err(RowError::ZeroAmount);
    }
    if amount.abs() > Decimal::from(MAX_ABS_AMOUNT) {
        return Err(RowError::AmountOutOfRange(raw_amount.to_string()));
    }

    // A blank label leaves the amount's own sign in charge.
    let label = cols
        .label
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|l| !l.is_empty());
    let amount = match label {
        Some(raw) => Label::parse(raw)
            .ok_or_else(|| RowError::BadLabel(raw.to_string()))?
            .apply(amount),
        None => amount,
    };

    let category = cols
        .category
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(Category::new);

    Ok(Transaction {
        date,
        description: description.to_string(),
        amount,
        category,
        line,
    })
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn parse_reader<R: Read>(reader: R, opts: &ParseOptions) -> Result<ParseOutcome> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let cols = resolve_columns(rdr.headers()?)?;
    log::debug!("resolved columns: {cols:?}");

    let mut outcome = ParseOutcome::default();
    let mut last_line = 1u64;

    for result in rdr.records() {
        outcome.rows += 1;
        match result {
            Ok(record) => {
                let line = record.position().map_or(last_line + 1, |p| p.line());
                last_line = line;
                match convert_record(&record, &cols, line, opts) {
                    Ok(txn) => outcome.transactions.push(txn),
                    Err(reason) => outcome.skipped.push(SkippedRow { line, reason }),
                }
            }
            Err(e) => {
                let line = e.position().map_or(last_line + 1, |p| p.line());
                last_line = line;
                outcome.skipped.push(SkippedRow {
                    line,
                    reason: RowError::Malformed(e.to_string()),
                });
            }
        }
    }

    log::info!(
        "parsed {} row(s): {} valid, {} skipped",
        outcome.rows,
        outcome.transactions.len(),
        outcome.skipped.len()
    );
    Ok(outcome)
}

pub fn parse_file(file_path: &Path, opts: &ParseOptions) -> Result<ParseOutcome> {
    log::debug!("reading {}", file_path.display());
    let file = std::fs::File::open(file_path)?;
    parse_reader(std::io::BufReader::new(file), opts)
}

/// Header-only CSV users can fill in by hand.
pub fn write_template<W: Write>(writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(TEMPLATE_HEADER)?;
    wtr.flush()?;
    Ok(())
}
