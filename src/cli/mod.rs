pub mod categorize;
pub mod check;
pub mod init;
pub mod report;
pub mod rules;
pub mod template;

use std::path::{Path, PathBuf};

use chrono::Datelike;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::{CategorizeResult, Ruleset};
use crate::error::{Result, TallyError};
use crate::importer::{self, ParseOutcome, SkippedRow, ValidationPolicy};
use crate::models::DateRange;
use crate::reports::Granularity;
use crate::settings::{load_settings, settings_path, Settings};

#[derive(Parser)]
#[command(name = "tally", about = "Categorize bank CSV exports and summarize spending.")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Settings file (default: ~/.config/tally/settings.json)
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<String>,
    /// Fail when any row is skipped
    #[arg(long, global = true, conflicts_with = "lenient")]
    pub strict: bool,
    /// Report skipped rows but keep going
    #[arg(long, global = true)]
    pub lenient: bool,
    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write default settings and a starter rules file.
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Write an empty CSV with the expected columns.
    Template {
        /// Output path (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Validate a CSV file and list rows that would be skipped.
    Check {
        /// CSV file to check
        file: String,
    },
    /// Categorize a CSV file and show the result.
    Categorize {
        /// CSV file to categorize
        file: String,
        /// Rules file (overrides settings)
        #[arg(long)]
        rules: Option<String>,
        /// Only show transactions no rule matched
        #[arg(long)]
        uncategorized: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in evaluation order.
    List {
        /// Rules file (overrides settings)
        #[arg(long)]
        rules: Option<String>,
        /// Count matches against this CSV file
        #[arg(long)]
        file: Option<String>,
    },
    /// Validate the rules file.
    Check {
        /// Rules file (overrides settings)
        #[arg(long)]
        rules: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// Month filter: YYYY-MM
    #[arg(long, conflicts_with_all = ["year", "from_date", "to_date"])]
    pub month: Option<String>,
    /// Year filter: YYYY
    #[arg(long, conflicts_with_all = ["from_date", "to_date"])]
    pub year: Option<i32>,
    /// Start date (inclusive)
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date (inclusive)
    #[arg(long = "to")]
    pub to_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Write to this file instead of stdout
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Totals per category for each period.
    Summary {
        /// CSV file to report on
        file: String,
        /// Period size
        #[arg(long = "by", value_enum, default_value_t = Granularity::Month)]
        granularity: Granularity,
        #[command(flatten)]
        period: PeriodArgs,
        /// Rules file (overrides settings)
        #[arg(long)]
        rules: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Inflows, outflows and running balance per period.
    Cashflow {
        file: String,
        #[arg(long = "by", value_enum, default_value_t = Granularity::Month)]
        granularity: Granularity,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        rules: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Spending by category over the whole range.
    Expenses {
        file: String,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        rules: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

// ---------------------------------------------------------------------------
// Shared pipeline
// ---------------------------------------------------------------------------

/// Settings plus command-line overrides, resolved once per invocation.
pub struct Context {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub policy: ValidationPolicy,
}

pub struct Loaded {
    pub outcome: ParseOutcome,
    pub ruleset: Ruleset,
    pub result: CategorizeResult,
}

impl Context {
    pub fn from_args(global: &GlobalArgs) -> Result<Self> {
        let settings_path = settings_path(global.config.as_deref());
        let settings = load_settings(&settings_path)?;
        let policy = if global.strict {
            ValidationPolicy::Strict
        } else if global.lenient {
            ValidationPolicy::Lenient
        } else {
            settings.policy
        };
        Ok(Self {
            settings,
            settings_path,
            policy,
        })
    }

    pub fn ruleset(&self, rules: Option<&str>) -> Result<Ruleset> {
        self.settings.ruleset(&self.settings_path, rules)
    }

    /// Parse `file` and apply the policy. Skipped rows are reported on
    /// stderr either way.
    pub fn parse(&self, file: &str) -> Result<ParseOutcome> {
        let outcome = importer::parse_file(Path::new(file), &self.settings.parse_options())?;
        if !outcome.skipped.is_empty() {
            for row in &outcome.skipped {
                log::info!("skipped line {}: {}", row.line, row.reason);
            }
            if self.policy == ValidationPolicy::Strict {
                eprintln!("{}", format_skipped(&outcome.skipped));
            } else {
                eprintln!(
                    "{}",
                    format!("{} row(s) skipped, run `tally check {file}` for details", outcome.skipped.len())
                        .yellow()
                );
            }
        }
        outcome.enforce(self.policy)?;
        Ok(outcome)
    }

    /// Rules are loaded before the file is read so a bad ruleset fails
    /// without touching any transaction.
    pub fn categorized(&self, file: &str, rules: Option<&str>) -> Result<Loaded> {
        let ruleset = self.ruleset(rules)?;
        let mut outcome = self.parse(file)?;
        let result = ruleset.apply(&mut outcome.transactions);
        Ok(Loaded {
            outcome,
            ruleset,
            result,
        })
    }
}

/// Resolve the reporting range. `--from`/`--to` come as a pair; with no
/// filter the range is the span of the data, or the current year for an
/// empty file.
pub(crate) fn resolve_range(
    period: &PeriodArgs,
    date_formats: &[String],
    data_span: Option<DateRange>,
) -> Result<DateRange> {
    let parse = |raw: &str| {
        importer::parse_date(raw, date_formats)
            .ok_or_else(|| TallyError::Other(format!("unrecognized date '{raw}'")))
    };
    match (&period.from_date, &period.to_date) {
        (Some(from), Some(to)) => {
            let (start, end) = (parse(from)?, parse(to)?);
            return DateRange::new(start, end)
                .ok_or_else(|| TallyError::Other(format!("--from {from} is after --to {to}")));
        }
        (Some(_), None) => {
            return Err(TallyError::Other(
                "--from requires --to (both date boundaries must be specified)".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(TallyError::Other(
                "--to requires --from (both date boundaries must be specified)".to_string(),
            ));
        }
        (None, None) => {}
    }
    if let Some(m) = &period.month {
        return DateRange::parse_month(m)
            .ok_or_else(|| TallyError::Other(format!("invalid month '{m}', expected YYYY-MM")));
    }
    if let Some(y) = period.year {
        return DateRange::year(y).ok_or_else(|| TallyError::Other(format!("invalid year {y}")));
    }
    if let Some(span) = data_span {
        return Ok(span);
    }
    let current_year = chrono::Local::now().year();
    DateRange::year(current_year).ok_or_else(|| TallyError::Other("cannot determine current year".into()))
}

pub(crate) fn format_skipped(rows: &[SkippedRow]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Line", "Reason"]);
    for row in rows {
        table.add_row(vec![Cell::new(row.line), Cell::new(&row.reason)]);
    }
    format!("Skipped Rows ({})\n{table}", rows.len())
}

/// Files never get ANSI colors.
pub(crate) fn plain_if_file(output: &OutputArgs) {
    if output.output.is_some() {
        colored::control::set_override(false);
    }
}

/// Send rendered output to `path`, or stdout when none is given.
pub(crate) fn emit(content: &str, path: Option<&str>) -> Result<()> {
    match path {
        Some(p) => {
            let p = PathBuf::from(crate::settings::expand_tilde(p));
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&p, content)?;
            println!("Wrote {}", p.display());
        }
        None => println!("{}", content.trim_end()),
    }
    Ok(())
}
