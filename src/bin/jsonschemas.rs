//! JSON Schema server CLI
//!
//! Command-line interface for mapping, resolving, linting and serving schemas.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jsonschemas::{
    lint, AllOfMerger, FileStatus, FileSystemLoader, IdentityTransform, JsonSchemasConfig,
    LoaderKind, Principal, ResolverKind, SchemaLoader, SchemaService, SchemaTransform, Severity,
    UrlScheme,
};

#[derive(Parser)]
#[command(name = "jsonschemas")]
#[command(about = "Resolve, lint and serve JSON Schemas by path")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options overriding the config file.
#[derive(Args)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Host schemas are published under
    #[arg(long, global = true)]
    host: Option<String>,

    /// URL path prefix for schemas (e.g. /schemas)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// URL scheme for built URLs: http or https
    #[arg(long, global = true)]
    scheme: Option<UrlScheme>,

    /// Directory holding the schema files
    #[arg(long, global = true)]
    schema_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the absolute URL of a schema path
    Url {
        /// Relative schema path (e.g. records/record-v1.0.0.json)
        path: String,
    },

    /// Print the schema path of a URL (exit 1 if the URL is not a schema URL)
    Path {
        /// Absolute schema URL
        url: String,
    },

    /// Resolve a schema and print it
    Get {
        /// Relative schema path
        path: String,

        /// Inline $ref pointers
        #[arg(long)]
        refs: bool,

        /// Run the resolve transform (implies --refs)
        #[arg(long)]
        resolved: bool,

        /// Resolve on behalf of this user
        #[arg(long)]
        principal: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the schema paths found in the schema directory
    List,

    /// Lint schema files for errors (syntax, broken refs, invalid schemas)
    Lint {
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

    /// Serve schemas over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Address to listen on (overrides `bind` in the config)
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(&cli.config).and_then(|config| match cli.command {
        Commands::Url { path } => run_url(&config, &path),
        Commands::Path { url } => run_path(&config, &url),
        Commands::Get {
            path,
            refs,
            resolved,
            principal,
            pretty,
        } => run_get(&config, &path, refs || resolved, resolved, principal, pretty),
        Commands::List => run_list(&config),
        Commands::Lint {
            format,
            strict,
            quiet,
        } => run_lint(&config, &format, strict, quiet),
        #[cfg(feature = "server")]
        Commands::Serve { bind } => run_serve(config, bind),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_config(args: &ConfigArgs) -> Result<JsonSchemasConfig, u8> {
    let mut config = match &args.config {
        Some(path) => JsonSchemasConfig::from_file(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => JsonSchemasConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(scheme) = args.scheme {
        config.url_scheme = scheme;
    }
    if let Some(dir) = &args.schema_dir {
        config.schema_dir = dir.clone();
    }

    config.validate().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    Ok(config)
}

fn build_service(config: &JsonSchemasConfig) -> Result<SchemaService, u8> {
    let mapper = config.mapper().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let loader: Arc<dyn SchemaLoader> = match config.loader {
        LoaderKind::Filesystem => Arc::new(FileSystemLoader::new(
            config.schema_dir.clone(),
            mapper.clone(),
        )),
        #[cfg(feature = "remote")]
        LoaderKind::Http => Arc::new(jsonschemas::HttpLoader::new().map_err(|e| {
            eprintln!("Error creating HTTP client: {}", e);
            3u8
        })?),
        #[cfg(not(feature = "remote"))]
        LoaderKind::Http => {
            eprintln!("Error: the http loader requires the `remote` feature");
            return Err(2);
        }
    };

    let transform: Arc<dyn SchemaTransform> = match config.resolver {
        ResolverKind::AllOf => Arc::new(AllOfMerger),
        ResolverKind::Identity => Arc::new(IdentityTransform),
    };

    Ok(SchemaService::builder(mapper, loader)
        .transform(transform)
        .cache_capacity(config.cache_capacity)
        .build())
}

fn run_url(config: &JsonSchemasConfig, path: &str) -> Result<(), u8> {
    let mapper = config.mapper().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let url = mapper.path_to_url(path).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;
    println!("{}", url);
    Ok(())
}

fn run_path(config: &JsonSchemasConfig, url: &str) -> Result<(), u8> {
    let mapper = config.mapper().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    match mapper.url_to_path(url) {
        Some(path) => {
            println!("{}", path);
            Ok(())
        }
        None => {
            eprintln!("not a schema URL for {}: {}", config.host, url);
            Err(1)
        }
    }
}

fn run_get(
    config: &JsonSchemasConfig,
    path: &str,
    refs: bool,
    resolved: bool,
    principal: Option<String>,
    pretty: bool,
) -> Result<(), u8> {
    let service = build_service(config)?;
    let principal = Principal::from_header(principal.as_deref());

    let schema = service
        .get_schema(path, refs, resolved, &principal)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(schema.as_ref())
    } else {
        serde_json::to_string(schema.as_ref())
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    println!("{}", json_output);
    Ok(())
}

fn run_list(config: &JsonSchemasConfig) -> Result<(), u8> {
    let service = build_service(config)?;
    for path in service.list_schemas() {
        println!("{}", path);
    }
    Ok(())
}

fn run_lint(config: &JsonSchemasConfig, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let root = &config.schema_dir;
    if !root.is_dir() {
        eprintln!("Error: schema directory not found: {}", root.display());
        return Err(2);
    }

    let mapper = config.mapper().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let result = lint(root, &mapper, strict);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        // Text output
        if !quiet {
            println!("Linting {} ...\n", root.display());
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

#[cfg(feature = "server")]
fn run_serve(mut config: JsonSchemasConfig, bind: Option<String>) -> Result<(), u8> {
    if !config.register_routes {
        eprintln!("Error: routes are disabled (register_routes = false)");
        return Err(2);
    }
    if let Some(bind) = bind {
        config.bind = bind;
    }

    // Held here so the service (and any blocking HTTP client inside it) is
    // dropped outside the runtime.
    let service = Arc::new(build_service(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            eprintln!("Error starting runtime: {}", e);
            3u8
        })?;

    runtime
        .block_on(jsonschemas::server::serve(Arc::clone(&service), &config))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            3u8
        })
}
