//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{AdapterSet, QueuePolicy, RelayConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    mode: String,
    inputs: String,
    queue_capacity: usize,
    queue_policy: String,
    dispatch_mode: String,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let inputs = AdapterSet::from_inputs(&config.inputs)
                .map(|set| format!("{:?}", set))
                .unwrap_or_default();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    mode: format!("{:?}", config.app.mode),
                    inputs,
                    queue_capacity: config.queue.capacity,
                    queue_policy: format!("{:?}", config.queue.policy),
                    dispatch_mode: format!("{:?}", config.dispatch.mode),
                    sink_count: config.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - metrics will be discarded after dequeue".to_string());
    }

    if !config.output.prometheus.enabled {
        warnings.push("output.prometheus is disabled - relay metrics are not exposed".to_string());
    } else if !config.inputs.http.enabled {
        warnings.push(
            "output.prometheus is enabled but inputs.http is disabled - no endpoint serves it"
                .to_string(),
        );
    }

    if config.queue.policy == QueuePolicy::Reject {
        warnings.push(
            "queue.policy is \"reject\" - producers fail fast (HTTP 503) when the queue is full"
                .to_string(),
        );
    }

    if config.inputs.log.enabled && config.inputs.log.from_beginning {
        warnings.push(
            "inputs.log.from_beginning replays existing file content on every start".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Mode: {}", summary.mode);
            println!("  Inputs: {}", summary.inputs);
            println!(
                "  Queue: capacity {} ({})",
                summary.queue_capacity, summary.queue_policy
            );
            println!("  Dispatch: {}", summary.dispatch_mode);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
