use clap::{Args, Parser, Subcommand};
use rokka_render::config::{self, RenderConfig};
use rokka_render::render::{self, UrlFromUrlOptions, UrlOptions};
use rokka_render::{Stack, StackOperation, StackOptions, VariableValue, Variables, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Flags selecting the stack a URL renders with.
#[derive(Args, Clone)]
struct StackArgs {
    /// Named stack (defaults to `default_stack` from the config)
    #[arg(long, conflicts_with = "ops")]
    stack: Option<String>,

    /// Inline operation: a bare name or JSON like '{"name":"resize","options":{"width":100}}'
    #[arg(long = "op", value_name = "OPERATION", value_parser = parse_operation)]
    ops: Vec<StackOperation>,

    /// Stack option as key=value, rendered as an `o-` segment (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    options: Vec<(String, VariableValue)>,
}

impl StackArgs {
    fn stack(&self, config: &RenderConfig) -> Stack {
        if !self.ops.is_empty() {
            Stack::Operations(self.ops.clone())
        } else {
            Stack::Named(
                self.stack
                    .clone()
                    .unwrap_or_else(|| config.default_stack.clone()),
            )
        }
    }

    fn stack_options(&self) -> StackOptions {
        self.options.iter().cloned().collect()
    }
}

/// Variables supplied on the command line.
#[derive(Args, Clone)]
struct VarArgs {
    /// Variable as name=value (repeatable); `true`/`false` are booleans
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    vars: Vec<(String, VariableValue)>,
}

impl VarArgs {
    /// Config variables overlaid with the command-line ones.
    fn variables(&self, config: &RenderConfig) -> Variables {
        let mut vars = config.variables.clone();
        vars.extend(self.vars.iter().cloned());
        vars
    }
}

#[derive(Parser)]
#[command(name = "rokka-render")]
#[command(about = "Build and rewrite rokka render URLs")]
#[command(long_about = "\
Build and rewrite rokka render URLs

Render URLs carry the stack, the image hash and template variables in the
path and query string:

  https://myorg.rokka.io/<stack>/v-name-value/<hash>/<filename>.<format>?v={...}

Short plain variable values are written into the path as a v-name-value
segment. Values longer than 20 characters or containing any of
* $ / \\ - # % & ? ; : or a space go into the JSON `v` query parameter.

Run 'rokka-render gen-config' to generate a documented render.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Print the `v` query parameter as readable JSON
    #[arg(long, global = true)]
    readable: bool,

    /// Log codec decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a render URL from an organization, hash and format
    Url {
        organization: String,
        hash: String,
        format: String,
        #[command(flatten)]
        stack: StackArgs,
        /// Filename shown in the URL
        #[arg(long)]
        filename: Option<String>,
        #[command(flatten)]
        vars: VarArgs,
    },
    /// Rebuild an existing render URL with another stack
    FromUrl {
        url: String,
        #[command(flatten)]
        stack: StackArgs,
        /// Change the output format
        #[arg(long)]
        format: Option<String>,
        /// Change the filename
        #[arg(long)]
        filename: Option<String>,
        /// Keep the variables already in the URL (path and query)
        #[arg(long)]
        keep_variables: bool,
        #[command(flatten)]
        vars: VarArgs,
    },
    /// Add variables to a render URL
    AddVars {
        url: String,
        #[command(flatten)]
        vars: VarArgs,
    },
    /// Show the components and variables of a render URL
    Parse { url: String },
    /// Print a stock render.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut render_config = match cli.command {
        Command::GenConfig => RenderConfig::default(),
        _ => config::load_config(&cli.config)?,
    };
    if cli.readable {
        render_config.remove_safe_url_from_query = true;
    }

    match cli.command {
        Command::Url {
            organization,
            hash,
            format,
            stack,
            filename,
            vars,
        } => {
            let options = UrlOptions {
                filename,
                stack_options: stack.stack_options(),
                variables: vars.variables(&render_config),
                remove_safe_url_from_query: render_config.remove_safe_url_from_query,
            };
            let url = render::get_url(
                &organization,
                &hash,
                &format,
                &stack.stack(&render_config),
                &options,
                &render_config.render_host,
            )?;
            println!("{url}");
        }
        Command::FromUrl {
            url,
            stack,
            format,
            filename,
            keep_variables,
            vars,
        } => {
            let options = UrlFromUrlOptions {
                filename,
                format,
                stack_options: stack.stack_options(),
                variables: vars.variables(&render_config),
                remove_safe_url_from_query: render_config.remove_safe_url_from_query,
                clear_variables: !keep_variables,
            };
            let rendered = render::get_url_from_url(
                &url,
                &stack.stack(&render_config),
                options,
                &render_config.render_host,
            )?;
            println!("{rendered}");
        }
        Command::AddVars { url, vars } => {
            let rendered = render::add_stack_variables(
                &url,
                vars.variables(&render_config),
                render_config.remove_safe_url_from_query,
            )?;
            println!("{rendered}");
        }
        Command::Parse { url } => match render::inspect_url(&url)? {
            Some(inspected) => output::print_render_url(&inspected),
            None => output::print_not_render_url(&url),
        },
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout carries only command output.
///
/// `RUST_LOG` sets the base filter (default `warn`); `--verbose` raises the
/// crate to debug on top of it.
fn init_tracing(verbose: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        if let Ok(directive) = "rokka_render=debug".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse `name=value`; `true` and `false` become booleans, anything else text.
fn parse_assignment(s: &str) -> Result<(String, VariableValue), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    if name.is_empty() {
        return Err(format!("missing name in `{s}`"));
    }
    let value = match value {
        "true" => VariableValue::Bool(true),
        "false" => VariableValue::Bool(false),
        other => VariableValue::from(other),
    };
    Ok((name.to_string(), value))
}

/// Parse an operation given as JSON or as a bare operation name.
fn parse_operation(s: &str) -> Result<StackOperation, String> {
    if s.trim_start().starts_with('{') {
        serde_json::from_str(s).map_err(|e| format!("invalid operation JSON: {e}"))
    } else if s.is_empty() {
        Err("operation name must not be empty".to_string())
    } else {
        Ok(StackOperation::new(s))
    }
}
