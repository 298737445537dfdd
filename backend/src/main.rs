//! Rowcheck CLI - validate CSV files against header-derived and custom rules
//!
//! # Main Commands
//!
//! ```bash
//! rowcheck validate input.csv              # Validate, print result JSON
//! rowcheck validate input.csv --report r.json --rules extra.json
//! rowcheck rules input.csv                 # Show the rules a file would get
//! rowcheck serve                           # Start HTTP server (port 3000)
//! rowcheck template list                   # Manage rule templates
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use clap::{Parser, Subcommand};
use rowcheck::{
    parse_bytes_auto, parse_bytes_with_delimiter, resolve_rules, EngineConfig, HttpProgressSink,
    ParseResult, RuleTemplateRegistry, ValidationEngine, ValidationOptions, ValidationReport,
    ValidationRule,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rowcheck")]
#[command(about = "Streaming rule-based validation of CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a CSV file and output the result as JSON
    Validate {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// JSON file with extra rules (array)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Stored rule template to apply
        #[arg(short, long)]
        template: Option<String>,

        /// Rows per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Rows kept in the preview
        #[arg(long)]
        max_preview_rows: Option<usize>,

        /// Error rate (%) above which validation stops early
        #[arg(long)]
        stop_threshold: Option<f64>,

        /// Cap on stored entries per severity
        #[arg(long)]
        max_stored_issues: Option<usize>,

        /// Output file for the result (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the rules that would apply to a CSV file
    Rules {
        /// Input CSV file
        input: PathBuf,

        /// JSON file with extra rules (array)
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage rule templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List all stored templates
    List,

    /// Import a rules JSON file as template
    Import {
        /// Rules JSON file to import
        file: PathBuf,
        /// Name for the template
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a template
    Show {
        /// Template ID
        id: String,
    },

    /// Delete a template
    Delete {
        /// Template ID
        id: String,
    },

    /// Suggest stored templates whose fields match a CSV's columns
    Match {
        /// Input CSV file
        input: PathBuf,
    },
}

/// Options collected from `validate` flags.
struct ValidateArgs {
    input: PathBuf,
    delimiter: Option<char>,
    rules: Option<PathBuf>,
    template: Option<String>,
    options: ValidationOptions,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rowcheck=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate {
            input,
            delimiter,
            rules,
            template,
            batch_size,
            max_preview_rows,
            stop_threshold,
            max_stored_issues,
            output,
            report,
        } => {
            let args = ValidateArgs {
                input,
                delimiter,
                rules,
                template,
                options: ValidationOptions {
                    batch_size,
                    max_preview_rows,
                    stop_on_error_threshold: stop_threshold,
                    max_stored_issues,
                    ..Default::default()
                },
                output,
                report,
            };
            cmd_validate(args).await
        }

        Commands::Rules { input, rules } => cmd_rules(&input, rules.as_deref()),

        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Template { action } => cmd_template(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn read_csv(
    input: &Path,
    delimiter: Option<char>,
) -> Result<ParseResult, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let parsed = match delimiter {
        Some(d) => parse_bytes_with_delimiter(&bytes, d)?,
        None => parse_bytes_auto(&bytes)?,
    };

    eprintln!(
        "📄 {} ({} rows, encoding: {}, delimiter: '{}')",
        input.display(),
        parsed.records.len(),
        parsed.encoding,
        parsed.delimiter
    );
    Ok(parsed)
}

fn read_rules(path: &Path) -> Result<Vec<ValidationRule>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Build an engine from the environment configuration.
fn build_engine(config: &EngineConfig) -> Result<ValidationEngine, Box<dyn std::error::Error>> {
    let mut engine = ValidationEngine::new().with_defaults(config.defaults.clone());
    if let Some(ref url) = config.progress_sink_url {
        engine = engine.with_sink(Arc::new(HttpProgressSink::new(url.clone())?));
    }
    Ok(engine)
}

async fn cmd_validate(args: ValidateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let parsed = read_csv(&args.input, args.delimiter)?;

    let mut options = args.options;
    if let Some(ref path) = args.rules {
        options.rules.extend(read_rules(path)?);
    }

    // Template rules, only when named
    let mut registry = RuleTemplateRegistry::new();
    let template_rules = registry.rules_for(args.template.as_deref())?;
    if let Some(ref id) = args.template {
        eprintln!("📋 Using template: {} ({} rules)", id, template_rules.len());
    }
    options.rules.extend(template_rules);

    let engine = build_engine(&config)?;
    let job_id = uuid::Uuid::new_v4().to_string();
    let result = engine
        .run(&job_id, &parsed.records, &parsed.headers, options)
        .await?;

    if let Some(ref id) = args.template {
        registry.record_use(id)?;
    }

    eprintln!("\n{}", "=".repeat(60));
    eprintln!("📊 SUMMARY ({:?})", result.status);
    eprintln!("{}", "=".repeat(60));
    eprintln!("   Rows:           {} / {}", result.processed_rows, result.total_rows);
    eprintln!("   Error rows:     {}", result.error_rows);
    eprintln!("   Warning rows:   {}", result.warning_rows);
    eprintln!("   Info rows:      {}", result.info_rows);
    eprintln!("   Duration:       {} ms", result.duration_ms);
    if result.is_valid {
        eprintln!("   ✅ Valid");
    } else {
        eprintln!("   ⚠️  Invalid");
    }
    eprintln!("{}\n", "=".repeat(60));

    if let Some(ref report_path) = args.report {
        let report = ValidationReport::from_result(&result);
        for line in &report.recommendations {
            eprintln!("💡 {}", line);
        }
        fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
        eprintln!("💾 Report written to: {}", report_path.display());
    }

    let json = serde_json::to_string_pretty(result.as_ref())?;
    write_output(&json, args.output.as_deref())
}

fn cmd_rules(input: &Path, rules: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = read_csv(input, None)?;
    let supplied = match rules {
        Some(path) => read_rules(path)?,
        None => Vec::new(),
    };

    let resolved = resolve_rules(&parsed.headers, supplied);
    eprintln!("📋 {} rules", resolved.len());
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let engine = Arc::new(build_engine(&config)?);
    let port = port.unwrap_or(config.port);

    eprintln!("🚀 Rowcheck server running on http://localhost:{}", port);
    eprintln!("   POST /api/validate          - Upload CSV file");
    eprintln!("   GET  /api/jobs/{{id}}/progress - Poll progress");
    eprintln!("   GET  /api/jobs/{{id}}/report   - Fetch report");
    eprintln!("   GET  /health                - Health check");

    rowcheck::server::start_server(engine, port).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn cmd_template(action: TemplateAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = RuleTemplateRegistry::new();

    match action {
        TemplateAction::List => {
            let templates = registry.list();
            if templates.is_empty() {
                eprintln!("📋 No templates stored yet.");
                eprintln!("   Use 'rowcheck template import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored templates ({}):\n", templates.len());
            for t in templates {
                println!("  📄 {} ({})", t.name, t.id);
                println!("     Columns: {}", t.csv_columns.join(", "));
                println!("     Rules: {}", t.rules.len());
                println!("     Uses: {}", t.use_count);
                if let Some(ref last) = t.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        TemplateAction::Import { file, name } => {
            eprintln!("📥 Importing template from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Template saved with ID: {}", id);
        }

        TemplateAction::Show { id } => {
            let t = registry
                .get(&id)
                .ok_or_else(|| format!("Template not found: {}", id))?;
            println!("📄 Template: {} ({})\n", t.name, t.id);
            println!("CSV Columns: {}", t.csv_columns.join(", "));
            println!("Created: {}", t.created_at);
            println!("Uses: {}", t.use_count);
            println!("\nRules:");
            println!("{}", serde_json::to_string_pretty(&t.rules)?);
        }

        TemplateAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Template deleted: {}", id);
        }

        TemplateAction::Match { input } => {
            let parsed = read_csv(&input, None)?;
            let matches = registry.suggest(&parsed.headers);
            if matches.is_empty() {
                eprintln!("📋 No stored template matches these columns.");
                return Ok(());
            }

            for m in matches {
                println!(
                    "  📄 {} ({}) - {:.0}% of its fields present",
                    m.template.name,
                    m.template.id,
                    m.coverage * 100.0
                );
            }
            eprintln!("\n   Apply one with 'rowcheck validate <csv> --template <id>'.");
        }
    }

    Ok(())
}
