//! pipeconf CLI - Command-line interface for pipeconf
//!
//! Usage:
//!   pipeconf interpolate pipeline.yml --input env=prod
//!   pipeconf check pipeline.yml --inputs-file inputs.yml
//!   pipeconf inputs pipeline.yml --format json

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use pipeconf_core::{
    DocumentSet, Header, InputArgs, InterpolationOptions, ParameterSpec, TextInterpolator, Value,
    Variables, YamlDocument,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// pipeconf - Validate inputs and interpolate CI pipeline files
#[derive(Parser)]
#[command(name = "pipeconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpolate a pipeline file and print the resulting document
    Interpolate {
        /// Pipeline file
        file: PathBuf,

        #[command(flatten)]
        inputs: InputOptions,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a pipeline file interpolates without errors
    Check {
        /// Pipeline file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        inputs: InputOptions,

        /// Only output errors (quiet mode)
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the inputs declared in a pipeline file header
    Inputs {
        /// Pipeline file
        file: PathBuf,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Args)]
struct InputOptions {
    /// Input argument as NAME=VALUE (VALUE is parsed as YAML)
    #[arg(short, long = "input", value_name = "NAME=VALUE")]
    input: Vec<String>,

    /// YAML or JSON file with a mapping of input arguments
    #[arg(long)]
    inputs_file: Option<PathBuf>,

    /// Pipeline variable as NAME=VALUE
    #[arg(long = "var", value_name = "NAME=VALUE")]
    var: Vec<String>,

    /// Expose the process environment as pipeline variables
    #[arg(long)]
    env_vars: bool,

    /// Maximum nesting depth of the body document
    #[arg(long)]
    max_depth: Option<usize>,
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Interpolate {
            file,
            inputs,
            format,
            output,
        } => cmd_interpolate(&file, &inputs, &format, output),
        Commands::Check {
            files,
            inputs,
            quiet,
        } => cmd_check(files, &inputs, quiet),
        Commands::Inputs { file, format } => cmd_inputs(&file, &format),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn read_documents(path: &Path) -> Result<DocumentSet<YamlDocument>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let documents = DocumentSet::from_yaml(&content);
    log::debug!("Loaded {} document(s) from {}", documents.len(), path.display());
    Ok(documents)
}

/// Parse a command-line value as YAML, falling back to the raw string
fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::from("");
    }
    serde_yaml::from_str::<serde_yaml::Value>(raw)
        .ok()
        .and_then(|yaml| Value::from_yaml(yaml).ok())
        .unwrap_or_else(|| Value::from(raw))
}

fn split_pair(pair: &str) -> Result<(&str, &str), String> {
    pair.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("Expected NAME=VALUE, got '{}'", pair))
}

impl InputOptions {
    fn input_args(&self) -> Result<InputArgs, String> {
        let mut args = InputArgs::new();

        if let Some(path) = &self.inputs_file {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
                .map_err(|e| format!("Invalid inputs file {}: {}", path.display(), e))?;
            match Value::from_yaml(yaml).map_err(|e| e.to_string())? {
                Value::Mapping(map) => args.extend(map),
                Value::Null => {}
                other => {
                    return Err(format!(
                        "Inputs file {} must contain a mapping, got {}",
                        path.display(),
                        other.type_name()
                    ))
                }
            }
        }

        for pair in &self.input {
            let (name, raw) = split_pair(pair)?;
            args.insert(name.to_string(), parse_value(raw));
        }

        log::debug!("Collected {} input argument(s)", args.len());
        Ok(args)
    }

    fn variables(&self) -> Result<Variables, String> {
        let mut variables = Variables::new();
        if self.env_vars {
            variables.extend(std::env::vars());
        }
        for pair in &self.var {
            let (name, value) = split_pair(pair)?;
            variables.insert(name.to_string(), value.to_string());
        }
        Ok(variables)
    }

    fn options(&self) -> InterpolationOptions {
        let mut options = InterpolationOptions::default();
        if let Some(depth) = self.max_depth {
            options.max_depth = depth;
        }
        options
    }

    fn interpolator(&self, path: &Path) -> Result<TextInterpolator<YamlDocument>, String> {
        let documents = read_documents(path)?;
        Ok(TextInterpolator::with_options(
            documents,
            self.input_args()?,
            self.variables()?,
            self.options(),
        ))
    }
}

fn cmd_interpolate(file: &Path, inputs: &InputOptions, format: &str, output: Option<PathBuf>) -> ExitCode {
    let mut interpolator = match inputs.interpolator(file) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };
    interpolator.interpolate();

    let Some(result) = interpolator.result() else {
        eprintln!("{} Interpolation failed\n", "✗".red());
        for error in interpolator.errors() {
            eprintln!("{}", error.report());
        }
        return ExitCode::from(1);
    };

    let content = match format {
        "json" => serde_json::to_string_pretty(result)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        _ => serde_yaml::to_string(result).map_err(|e| e.to_string()),
    };

    match content {
        Ok(content) => {
            if let Some(output_path) = output {
                if let Err(e) = std::fs::write(&output_path, &content) {
                    eprintln!("{}: {}", "Error writing file".red(), e);
                    return ExitCode::from(2);
                }
                eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
            } else {
                print!("{}", content);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_check(files: Vec<PathBuf>, inputs: &InputOptions, quiet: bool) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let mut interpolator = match inputs.interpolator(&file) {
            Ok(i) => i,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                all_valid = false;
                continue;
            }
        };
        interpolator.interpolate();

        if interpolator.is_valid() {
            if !quiet {
                let detail = if interpolator.is_interpolated() {
                    "inputs valid, interpolated"
                } else {
                    "no header, nothing to interpolate"
                };
                println!("{} {}: {}", "✓".green(), file.display(), detail);
            }
        } else {
            eprintln!(
                "{} {}: {}",
                "✗".red(),
                file.display(),
                interpolator.error_message()
            );
            all_valid = false;
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn cmd_inputs(file: &Path, format: &str) -> ExitCode {
    let documents = match read_documents(file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };
    if let Some(error) = documents.errors().first() {
        eprintln!("{} {}: {}", "✗".red(), file.display(), error);
        return ExitCode::from(1);
    }

    let spec = match documents.header() {
        None => ParameterSpec::default(),
        Some(header) => match Header::parse(header)
            .and_then(|h| ParameterSpec::parse(h.inputs(), &InterpolationOptions::default()))
        {
            Ok(spec) => spec,
            Err(errors) => {
                for error in errors {
                    eprintln!("{} {}", "✗".red(), error);
                }
                return ExitCode::from(1);
            }
        },
    };

    if format == "json" {
        let entries: Vec<_> = spec
            .iter()
            .map(|input| {
                serde_json::json!({
                    "name": input.name,
                    "type": input.param_type.as_str(),
                    "required": input.is_required(),
                    "default": input.default,
                    "options": input.options,
                    "regex": input.regex.as_ref().map(|r| r.as_str()),
                    "description": input.description,
                })
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                return ExitCode::from(1);
            }
        }
        return ExitCode::SUCCESS;
    }

    if spec.is_empty() {
        println!("{}: no inputs declared", file.display());
        return ExitCode::SUCCESS;
    }

    for input in spec.iter() {
        let requirement = match &input.default {
            Some(default) => format!("default: {}", default.to_text()),
            None => "required".yellow().to_string(),
        };
        println!(
            "{} ({}, {})",
            input.name.bold(),
            input.param_type,
            requirement
        );
        if let Some(options) = &input.options {
            let labels: Vec<String> = options.iter().map(Value::to_text).collect();
            println!("    options: {}", labels.join(", "));
        }
        if let Some(regex) = &input.regex {
            println!("    regex: {}", regex.as_str());
        }
        if let Some(description) = &input.description {
            println!("    {}", description.dimmed());
        }
    }

    ExitCode::SUCCESS
}
