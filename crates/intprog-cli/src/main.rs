use clap::{Args, Parser, Subcommand, ValueEnum};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use intprog_lang::{Compiler, FormInput, Report};
use intprog_solver::{Model, PivotRule, Solver, SolverConfig};

#[derive(Parser)]
#[command(name = "intprog")]
#[command(about = "Linear and mixed-integer programming solver", long_about = None)]
struct Cli {
    /// Log filter such as `debug` or `intprog_solver=trace` (default: $INTPROG_LOG, then `warn`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem and print the optimal solution
    Solve {
        /// Problem file in the text language, or a JSON form
        file: PathBuf,
        /// Read the file as a JSON form (implied by a .json extension)
        #[arg(long)]
        form: bool,
        /// Ignore integer restrictions and solve the continuous relaxation
        #[arg(long)]
        relaxation: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[command(flatten)]
        options: SolveOptions,
    },
    /// Check a problem file for errors
    Check {
        /// The file to check
        file: PathBuf,
        /// Read the file as a JSON form (implied by a .json extension)
        #[arg(long)]
        form: bool,
    },
    /// Parse a text problem and output the AST
    Parse {
        /// The file to parse
        file: PathBuf,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
}

#[derive(Args)]
struct SolveOptions {
    /// JSON file with solver settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Feasibility and optimality tolerance
    #[arg(long)]
    tolerance: Option<f64>,
    /// Distance from an integer still treated as integral
    #[arg(long)]
    integer_tolerance: Option<f64>,
    /// Pivot limit per relaxation
    #[arg(long)]
    max_iterations: Option<usize>,
    /// Branch-and-bound node limit
    #[arg(long)]
    node_limit: Option<usize>,
    /// Wall-clock limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,
    /// Entering-variable rule
    #[arg(long, value_enum)]
    pivot: Option<Pivot>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Pivot {
    Dantzig,
    Bland,
}

impl From<Pivot> for PivotRule {
    fn from(pivot: Pivot) -> Self {
        match pivot {
            Pivot::Dantzig => PivotRule::Dantzig,
            Pivot::Bland => PivotRule::Bland,
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn init_logging(level: Option<String>) -> Result<(), String> {
    let level_value = level
        .or_else(|| env::var("INTPROG_LOG").ok())
        .unwrap_or_else(|| "warn".to_string());

    let filter = if level_value.eq_ignore_ascii_case("off") {
        EnvFilter::default().add_directive(LevelFilter::OFF.into())
    } else {
        EnvFilter::try_new(&level_value).map_err(|err| format!("Invalid log filter: {err}"))?
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| format!("Failed to initialize logging: {err}"))
}

fn read_source(file: &Path) -> String {
    std::fs::read_to_string(file).unwrap_or_else(|e| fail(format!("Error reading file: {}", e)))
}

fn is_form(file: &Path, form: bool) -> bool {
    form || file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_model(file: &Path, form: bool) -> Model {
    let source = read_source(file);
    if is_form(file, form) {
        FormInput::from_json(&source)
            .and_then(FormInput::into_model)
            .unwrap_or_else(|e| fail(format!("Form error: {}", e)))
    } else {
        Compiler::compile_source(&source)
            .map(|compiled| compiled.model)
            .unwrap_or_else(|e| fail(format!("Compile error: {}", e)))
    }
}

fn load_config(options: &SolveOptions) -> SolverConfig {
    let mut config = match &options.config {
        Some(path) => serde_json::from_str(&read_source(path))
            .unwrap_or_else(|e| fail(format!("Invalid config file: {}", e))),
        None => SolverConfig::default(),
    };
    if let Some(tolerance) = options.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(tolerance) = options.integer_tolerance {
        config = config.with_integer_tolerance(tolerance);
    }
    if let Some(max) = options.max_iterations {
        config = config.with_max_iterations(max);
    }
    if let Some(nodes) = options.node_limit {
        config = config.with_node_limit(nodes);
    }
    if let Some(seconds) = options.time_limit {
        config = config.with_time_limit(seconds);
    }
    if let Some(pivot) = options.pivot {
        config = config.with_pivot_rule(pivot.into());
    }
    config
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level) {
        fail(e);
    }

    match cli.command {
        Commands::Solve {
            file,
            form,
            relaxation,
            format,
            options,
        } => {
            let model = load_model(&file, form);
            let config = load_config(&options);
            tracing::info!(
                component = "cli",
                operation = "solve",
                file = %file.display(),
                variables = model.num_variables(),
                constraints = model.num_constraints(),
                relaxation,
                "Solving problem"
            );

            let solver = Solver::with_config(config);
            let result = if relaxation {
                solver.solve_relaxation(&model)
            } else {
                solver.solve(&model)
            };

            match result {
                Ok(solution) => {
                    let report = Report::new(&model, &solution);
                    match format {
                        OutputFormat::Text => println!("{}", report),
                        OutputFormat::Json => match serde_json::to_string_pretty(&report.summary()) {
                            Ok(json) => println!("{}", json),
                            Err(e) => fail(format!("Error writing JSON: {}", e)),
                        },
                    }
                    if !solution.is_optimal() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    match format {
                        OutputFormat::Text => println!("Status: SOLVE FAILED"),
                        OutputFormat::Json => println!(
                            "{}",
                            serde_json::json!({
                                "status": "failed",
                                "code": e.code(),
                                "message": e.to_string(),
                            })
                        ),
                    }
                    fail(format!("{} ({})", e, e.code()));
                }
            }
        }
        Commands::Check { file, form } => {
            let model = load_model(&file, form);
            let integers = model.variables().iter().filter(|v| v.is_integer).count();
            println!("✓ {} is valid", file.display());
            println!("  {} variables", model.num_variables());
            println!("  {} integer", integers);
            println!("  {} constraints", model.num_constraints());
        }
        Commands::Parse { file, format } => {
            let source = read_source(&file);
            match intprog_lang::Parser::parse(&source) {
                Ok(program) => {
                    if format == "json" {
                        match serde_json::to_string_pretty(&program) {
                            Ok(json) => println!("{}", json),
                            Err(e) => fail(format!("Error writing JSON: {}", e)),
                        }
                    } else {
                        println!("{:#?}", program);
                    }
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    fail(format!("  {}", e));
                }
            }
        }
    }
}
