use clap::Parser;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vpc_eni_plugin::config::cli::{default_settings_toml, CliArgs};
use vpc_eni_plugin::config::env::cmd_args_from_env;
use vpc_eni_plugin::config::{load_settings, LogFormat, LoggingSettings, PluginSettings};
use vpc_eni_plugin::error::AppError;
use vpc_eni_plugin::network::select_builder;
use vpc_eni_plugin::plugin::result::{requested_cni_version, write_error_reply};
use vpc_eni_plugin::plugin::{Plugin, Reply};

/// Logs never go to stdout; it carries the reply to the runtime.
fn init_logging(settings: &LoggingSettings) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    match (&settings.file, settings.format) {
        (Some(path), LogFormat::Json) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.json().with_writer(Mutex::new(file)).init();
        }
        (Some(path), LogFormat::Text) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_writer(Mutex::new(file)).init();
        }
        (None, LogFormat::Json) => builder.json().with_writer(io::stderr).init(),
        (None, LogFormat::Text) => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

async fn run(settings: &PluginSettings, stdin_data: Vec<u8>) -> Result<Option<String>, AppError> {
    let args = cmd_args_from_env(stdin_data)?;
    let plugin = Plugin::new(select_builder(settings));

    Ok(match plugin.run(&args).await? {
        Reply::Added(result) => Some(serde_json::to_string(&result)?),
        Reply::Version(version) => Some(serde_json::to_string(&version)?),
        Reply::Deleted => None,
    })
}

/// Report a failed invocation on stdout and exit non-zero.
fn fail(cni_version: &str, e: &AppError) -> ExitCode {
    if let Err(write_err) = write_error_reply(&mut io::stdout(), cni_version, e) {
        error!("Failed to print error reply: {}", write_err);
    }
    ExitCode::FAILURE
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    if cli.print_default_settings {
        return match default_settings_toml() {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to render default settings: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut stdin_data = Vec::new();
    let read = io::stdin().read_to_end(&mut stdin_data);
    let cni_version = requested_cni_version(&stdin_data);

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return fail(&cni_version, &e.into());
        }
    };

    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        return fail(&cni_version, &e);
    }

    if let Err(e) = read {
        error!("Failed to read network configuration: {}", e);
        return fail(&cni_version, &e.into());
    }

    match run(&settings, stdin_data).await {
        Ok(Some(reply)) => {
            info!("Writing result to stdout: {}", reply);
            if let Err(e) = writeln!(io::stdout(), "{}", reply) {
                error!("Failed to print result: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Invocation failed: {}", e);
            fail(&cni_version, &e)
        }
    }
}
