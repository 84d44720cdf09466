use clap::Parser;
use health_assistant_service::cli::{execute, render, CliOutput, Invocation};
use health_assistant_service::config::AssistantConfig;
use health_assistant_service::startup::build_policy;
use service_core::observability::init_cli_tracing;
use std::process::ExitCode;

fn print(output: &CliOutput) -> ExitCode {
    match render(output) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to serialize result: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse before logging so --help/--version stay clean.
    let invocation = Invocation::parse();
    init_cli_tracing("warn");

    let config = match AssistantConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            print(&CliOutput::Error {
                error: e.to_string(),
            });
            return ExitCode::FAILURE;
        }
    };

    let policy = match build_policy(&config).await {
        Ok((policy, _db)) => policy,
        Err(e) => {
            tracing::error!("Failed to initialize assistant: {}", e);
            print(&CliOutput::Error {
                error: e.to_string(),
            });
            return ExitCode::FAILURE;
        }
    };

    print(&execute(&policy, &invocation).await)
}
