mod categorizer;
mod cli;
mod error;
mod fmt;
mod importer;
mod models;
mod reports;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, Context, RulesCommands};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    match cli.command {
        Commands::Init { force } => {
            cli::init::run(&settings::settings_path(cli.global.config.as_deref()), force)
        }
        Commands::Template { output } => cli::template::run(output.as_deref()),
        command => {
            let ctx = Context::from_args(&cli.global)?;
            match command {
                Commands::Check { file } => cli::check::run(&ctx, &file),
                Commands::Categorize {
                    file,
                    rules,
                    uncategorized,
                    output,
                } => cli::categorize::run(&ctx, &file, rules.as_deref(), uncategorized, &output),
                Commands::Rules { command } => match command {
                    RulesCommands::List { rules, file } => {
                        cli::rules::list(&ctx, rules.as_deref(), file.as_deref())
                    }
                    RulesCommands::Check { rules } => cli::rules::check(&ctx, rules.as_deref()),
                },
                Commands::Report { command } => cli::report::dispatch(&ctx, command),
                Commands::Init { .. } | Commands::Template { .. } => Ok(()),
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
