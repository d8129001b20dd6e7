use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use env_logger::Builder;
use lpp_lang::{CompiledProblem, Compiler, ProblemText};
use lpp_solver::{CancelToken, Direction, Solution, SolutionStatus, Solver};

#[derive(Parser)]
#[command(name = "lpp")]
#[command(about = "Solve linear and mixed-integer programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem given on the command line
    Solve {
        /// Number of variables (x1..xN)
        #[arg(short = 'n', long)]
        vars: usize,
        /// Objective function, e.g. "3x1 + 2x2"
        #[arg(short, long)]
        objective: String,
        /// Minimize instead of maximize
        #[arg(long)]
        minimize: bool,
        /// Constraint, e.g. "x1 + x2 <= 4" (repeatable)
        #[arg(short, long = "constraint")]
        constraints: Vec<String>,
        /// 1-based indices of integer variables
        #[arg(short, long = "integer", value_delimiter = ',')]
        integers: Vec<usize>,
        #[command(flatten)]
        options: SolveOptions,
    },
    /// Solve a problem stored as JSON
    SolveFile {
        /// The JSON problem file
        file: PathBuf,
        #[command(flatten)]
        options: SolveOptions,
    },
    /// Check a JSON problem file for errors without solving it
    Check {
        /// The JSON problem file
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct SolveOptions {
    /// Give up after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    match cli.command {
        Commands::Solve {
            vars,
            objective,
            minimize,
            constraints,
            integers,
            options,
        } => {
            let direction = if minimize {
                Direction::Minimize
            } else {
                Direction::Maximize
            };
            let mut problem = ProblemText::new(vars, objective, direction)
                .integers(&integers)
                .context("reading --integer")?;
            problem.constraints = constraints;
            run(&problem, &options)
        }
        Commands::SolveFile { file, options } => {
            let problem = read_problem(&file)?;
            run(&problem, &options)
        }
        Commands::Check { file } => {
            let problem = read_problem(&file)?;
            let compiled = compile(&problem)?;
            let integers = compiled
                .model
                .domains()
                .iter()
                .filter(|d| **d == lpp_solver::Domain::Integer)
                .count();

            println!("✓ {} is valid", file.display());
            println!("  {} variables ({} integer)", compiled.variables.len(), integers);
            println!("  {} constraints", compiled.constraints.len());
            for (i, c) in compiled.model.constraints().iter().enumerate() {
                println!("    {}: {}", i + 1, c);
            }
            Ok(())
        }
    }
}

fn read_problem(path: &Path) -> Result<ProblemText> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("parsing {}", path.display()))
}

fn compile(problem: &ProblemText) -> Result<CompiledProblem> {
    Compiler::new()
        .compile(problem)
        .context("compiling problem")
}

fn run(problem: &ProblemText, options: &SolveOptions) -> Result<()> {
    let compiled = compile(problem)?;

    let cancel = match options.timeout_ms {
        Some(ms) => CancelToken::with_timeout(Duration::from_millis(ms)),
        None => CancelToken::new(),
    };
    let solution = Solver::new().solve(&compiled.model, &cancel);
    log::info!(
        "{} after {} nodes, {} pivots",
        solution.status,
        solution.nodes_explored,
        solution.iterations
    );

    match options.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&solution)?),
        Format::Pretty => print_pretty(problem, &compiled, &solution),
    }

    if !solution.is_optimal() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_pretty(problem: &ProblemText, compiled: &CompiledProblem, solution: &Solution) {
    let sense = match problem.direction {
        Direction::Maximize => "Maximize",
        Direction::Minimize => "Minimize",
    };
    println!("{}: Z = {}", sense, problem.objective.trim());
    for (i, c) in compiled.constraints.iter().enumerate() {
        println!("  Constraint {}: {}", i + 1, c);
    }
    println!();

    match solution.status {
        SolutionStatus::Optimal => {
            println!("Status: OPTIMAL");
            for (name, value) in solution.assignment() {
                println!("  {:6} = {}", name, value);
            }
            println!("Objective value: {}", solution.objective_value);
        }
        SolutionStatus::Infeasible => {
            println!("Status: INFEASIBLE");
            println!("No solution exists that satisfies all constraints.");
        }
        SolutionStatus::Unbounded => {
            println!("Status: UNBOUNDED");
            println!("The problem has no finite optimal solution.");
        }
        SolutionStatus::Cancelled | SolutionStatus::IterationLimit => {
            println!("Status: {}", solution.status.as_str().to_uppercase());
            if solution.values.is_empty() {
                println!("No integer-feasible solution was found before stopping.");
            } else {
                println!("Best solution found before stopping:");
                for (name, value) in solution.assignment() {
                    println!("  {:6} = {}", name, value);
                }
                println!("Objective value: {}", solution.objective_value);
            }
        }
    }
}
