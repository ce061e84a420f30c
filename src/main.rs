use anyhow::Context;
use bsrview::cli::{Cli, Command};
use bsrview::commands::render::{OutputFormat, RangeArgs};
use bsrview::error::exit_code;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(bsr_err) = e.downcast_ref::<bsrview::Error>() {
                ExitCode::from(bsr_err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    cli.validate()
        .map_err(bsrview::Error::InvalidArgument)
        .context("Invalid arguments")?;

    let layout = cli.layout();
    let config = cli.channel_config();
    let engine = cli.engine_config();

    match cli.command {
        Command::Info { file, json } => {
            bsrview::commands::info::run(&file, layout, &config, json)?;
        }
        Command::Render {
            file,
            from,
            to,
            start,
            end,
            active,
            budget,
            json,
            csv,
        } => {
            let format = if json {
                OutputFormat::Json
            } else if csv {
                OutputFormat::Csv
            } else {
                OutputFormat::Table
            };
            let range = RangeArgs {
                from,
                to,
                start,
                end,
            };
            bsrview::commands::render::run(
                &file, layout, &config, engine, range, &active, budget, format,
            )?;
        }
        Command::Scan { file, active } => {
            bsrview::commands::scan::run(&file, layout, &config, &engine, &active)?;
        }
        Command::View { file, .. } => {
            bsrview::commands::view::run(&file, layout, config, engine)
                .with_context(|| format!("Viewer failed for {}", file.display()))?;
        }
        Command::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "bsrview", &mut std::io::stdout());
        }
    }

    Ok(())
}
