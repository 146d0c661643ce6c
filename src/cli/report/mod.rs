pub mod export;
pub mod text;

use crate::cli::{emit, plain_if_file, resolve_range, Context, OutputArgs, OutputFormat, PeriodArgs};
use crate::error::Result;
use crate::reports::{self, Granularity};

use super::ReportCommands;

pub fn dispatch(ctx: &Context, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Summary { file, granularity, period, rules, output } => {
            summary(ctx, &file, granularity, &period, rules.as_deref(), &output)
        }
        ReportCommands::Cashflow { file, granularity, period, rules, output } => {
            cashflow(ctx, &file, granularity, &period, rules.as_deref(), &output)
        }
        ReportCommands::Expenses { file, period, rules, output } => {
            expenses(ctx, &file, &period, rules.as_deref(), &output)
        }
    }
}

fn summary(
    ctx: &Context,
    file: &str,
    granularity: Granularity,
    period: &PeriodArgs,
    rules: Option<&str>,
    output: &OutputArgs,
) -> Result<()> {
    let loaded = ctx.categorized(file, rules)?;
    let range = resolve_range(period, &ctx.settings.date_formats, loaded.outcome.date_span())?;
    let data = reports::aggregate(&loaded.outcome.transactions, granularity, range);

    plain_if_file(output);
    let content = match output.format {
        OutputFormat::Text => text::format_summary(&data),
        OutputFormat::Csv => export::summary_csv(&data)?,
        OutputFormat::Json => export::to_json(&data)?,
    };
    emit(&content, output.output.as_deref())
}

fn cashflow(
    ctx: &Context,
    file: &str,
    granularity: Granularity,
    period: &PeriodArgs,
    rules: Option<&str>,
    output: &OutputArgs,
) -> Result<()> {
    let loaded = ctx.categorized(file, rules)?;
    let range = resolve_range(period, &ctx.settings.date_formats, loaded.outcome.date_span())?;
    let rows = reports::cashflow(&reports::aggregate(&loaded.outcome.transactions, granularity, range));

    plain_if_file(output);
    let content = match output.format {
        OutputFormat::Text => text::format_cashflow(&rows),
        OutputFormat::Csv => export::cashflow_csv(&rows)?,
        OutputFormat::Json => export::to_json(&rows)?,
    };
    emit(&content, output.output.as_deref())
}

fn expenses(
    ctx: &Context,
    file: &str,
    period: &PeriodArgs,
    rules: Option<&str>,
    output: &OutputArgs,
) -> Result<()> {
    let loaded = ctx.categorized(file, rules)?;
    let range = resolve_range(period, &ctx.settings.date_formats, loaded.outcome.date_span())?;
    let data = reports::expense_breakdown(&reports::summarize(&loaded.outcome.transactions, range));

    plain_if_file(output);
    let content = match output.format {
        OutputFormat::Text => text::format_expenses(&data),
        OutputFormat::Csv => export::expenses_csv(&data)?,
        OutputFormat::Json => export::to_json(&data)?,
    };
    emit(&content, output.output.as_deref())
}
