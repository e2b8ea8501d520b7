use anyhow::Context;
use clap::Parser;
use conestoga::cli::Cli;
use conestoga::{exit_code, exit_code_for, mask_file_path, proxy};
use std::process::ExitCode;

fn main() -> ExitCode {
    diminuto_log::set_mask_from_environment();
    diminuto_log::import_mask_from_file(None);

    let cli = Cli::parse();

    let config = match cli.into_configuration().context("invalid configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(exit_code::ARGUMENT_PARSE_ERROR as u8);
        }
    };

    let mask_path = mask_file_path(config.log_mask_file.as_deref());
    diminuto_log::import_mask_from_file(Some(&mask_path));

    match proxy::run(&config, &mask_path) {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            diminuto_log::log(diminuto_log::LogPriority::Error, format_args!("{e}"));
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}
