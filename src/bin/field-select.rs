//! field-select CLI
//!
//! Command-line interface for planning, projecting and formatting field
//! selections against a type registry.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use field_select::{
    format_value, lint, load_json, load_registry_auto, prepare, run_with_policy, DenyList,
    Direction, EngineError, FileProvider, FileStatus, NamingConvention, PlanOptions, Registry,
    Request, Severity, TypeDescriptor,
};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "field-select")]
#[command(about = "Plan and project nested field selections against a type registry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a selection and print its fetch plan
    Plan {
        #[command(flatten)]
        request: RequestArgs,

        /// Also print the projection template
        #[arg(long)]
        template: bool,
    },

    /// Run a selection against a raw result file and print the response
    Project {
        #[command(flatten)]
        request: RequestArgs,

        /// Raw provider result (JSON file)
        #[arg(long)]
        raw: PathBuf,
    },

    /// Format a payload of a registered type for input or output
    Format {
        /// Registry source: file path or URL (http:// or https://)
        schema: String,

        /// Type of the payload
        #[arg(long = "type", short)]
        type_name: String,

        /// Payload file
        payload: PathBuf,

        /// Convert client data to the internal representation
        #[arg(long, conflicts_with = "output", required_unless_present = "output")]
        input: bool,

        /// Convert internal data to the client representation
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        output: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Lint registry files for errors (syntax, invalid types, broken references)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Registry source: file path or URL (http:// or https://)
    schema: String,

    /// Root type of the request
    #[arg(long = "type", short)]
    type_name: String,

    /// Selection as JSON, or @file to read it from a file
    #[arg(long, short)]
    fields: String,

    /// Deny a field (Type.field, or *.field for every type); repeatable
    #[arg(long = "deny", value_name = "TYPE.FIELD")]
    deny: Vec<String>,

    /// Reject denied fields instead of returning null
    #[arg(long)]
    strict_access: bool,

    /// Maximum selection depth
    #[arg(long)]
    max_depth: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// JSON config file with planning options and deny entries
    #[arg(long)]
    config: Option<PathBuf>,

    /// Naming convention of client-sent keys (camelCase, snake_case, PascalCase, kebab-case, preserve)
    #[arg(long)]
    input_case: Option<NamingConvention>,

    /// Naming convention of emitted keys
    #[arg(long)]
    output_case: Option<NamingConvention>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Output errors as JSON (for automation)
    #[arg(long)]
    json: bool,
}

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    #[serde(flatten)]
    options: PlanOptions,
    deny: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan { request, template } => run_plan(&request, template),
        Commands::Project { request, raw } => run_project(&request, &raw),
        Commands::Format {
            schema,
            type_name,
            payload,
            input,
            output: _,
            common,
        } => run_format(&schema, &type_name, &payload, input, &common),
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_plan(args: &RequestArgs, with_template: bool) -> Result<(), u8> {
    let json_output = args.common.json;
    let (registry, options, policy) = setup(args)?;
    let fields = read_fields(&args.fields, json_output)?;

    let (plan, template) = prepare(&registry, &args.type_name, &fields, &options, &policy)
        .map_err(|e| {
            report_error(json_output, &EngineError::Plan(e.clone()));
            e.exit_code() as u8
        })?;

    let output = if with_template {
        serde_json::json!({ "plan": plan, "template": template })
    } else {
        serde_json::to_value(&plan).map_err(|e| {
            report_message(json_output, &format!("serializing plan: {}", e));
            2u8
        })?
    };
    print_json(&output, args.common.pretty)
}

fn run_project(args: &RequestArgs, raw: &Path) -> Result<(), u8> {
    let json_output = args.common.json;
    let (registry, options, policy) = setup(args)?;
    let fields = read_fields(&args.fields, json_output)?;

    let request = Request::new(args.type_name.clone(), fields);
    let provider = FileProvider::new(raw);
    let response =
        run_with_policy(&registry, &request, &provider, &options, &policy).map_err(|e| {
            report_error(json_output, &e);
            e.exit_code() as u8
        })?;
    print_json(&response, args.common.pretty)
}

fn run_format(
    schema: &str,
    type_name: &str,
    payload: &Path,
    input: bool,
    common: &CommonArgs,
) -> Result<(), u8> {
    let registry = load_registry(schema, common.json)?;
    let (options, _) = load_options(common)?;

    if registry.lookup(type_name).is_none() {
        report_message(common.json, &format!("unknown type \"{}\"", type_name));
        return Err(2);
    }

    let value = load_json(payload).map_err(|e| {
        report_message(common.json, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    let formatted = format_value(
        &value,
        &TypeDescriptor::named(type_name),
        &Default::default(),
        &registry,
        &options.naming,
        Direction::from_input_flag(input),
    );
    print_json(&formatted, common.pretty)
}

/// Load the registry and assemble options and the deny list for a request.
fn setup(args: &RequestArgs) -> Result<(Registry, PlanOptions, DenyList), u8> {
    let json_output = args.common.json;
    let registry = load_registry(&args.schema, json_output)?;
    let (mut options, mut deny) = load_options(&args.common)?;

    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }
    if args.strict_access {
        options.strict_access = true;
    }
    deny.extend(args.deny.iter().cloned());

    let policy = DenyList::parse(&deny).map_err(|e| {
        report_message(json_output, &e);
        2u8
    })?;
    Ok((registry, options, policy))
}

fn load_registry(source: &str, json_output: bool) -> Result<Registry, u8> {
    load_registry_auto(source).map_err(|e| {
        report_message(json_output, &format!("loading registry: {}", e));
        e.exit_code() as u8
    })
}

/// Read the config file, then apply naming flags on top of it.
fn load_options(common: &CommonArgs) -> Result<(PlanOptions, Vec<String>), u8> {
    let config = match &common.config {
        Some(path) => {
            let value = load_json(path).map_err(|e| {
                report_message(common.json, &format!("loading config: {}", e));
                e.exit_code() as u8
            })?;
            serde_json::from_value::<Config>(value).map_err(|e| {
                report_message(common.json, &format!("invalid config: {}", e));
                2u8
            })?
        }
        None => Config::default(),
    };

    let mut options = config.options;
    if let Some(case) = common.input_case {
        options.naming.input = case;
    }
    if let Some(case) = common.output_case {
        options.naming.output = case;
    }
    Ok((options, config.deny))
}

/// Parse `--fields`: inline JSON or `@path`.
fn read_fields(arg: &str, json_output: bool) -> Result<Value, u8> {
    let result = match arg.strip_prefix('@') {
        Some(path) => load_json(Path::new(path)).map_err(|e| (e.to_string(), e.exit_code() as u8)),
        None => serde_json::from_str(arg).map_err(|e| (format!("invalid selection JSON: {}", e), 1)),
    };
    result.map_err(|(msg, code)| {
        report_message(json_output, &msg);
        code
    })
}

fn print_json(value: &Value, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

/// Output a request error in plain text or JSON format.
fn report_error(json_output: bool, err: &EngineError) {
    match (json_output, err) {
        (true, EngineError::Plan(e)) => {
            println!("{}", serde_json::json!({ "error": e.report() }));
        }
        _ => report_message(json_output, &err.to_string()),
    }
}

/// Output an error message in plain text or JSON format.
fn report_message(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "error": { "message": msg } }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let output = serde_json::to_value(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        print_json(&output, true)?;
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
