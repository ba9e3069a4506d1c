use std::fs;
use std::process::ExitCode;

use clap::Parser;
use rt::{Allocator, CompileInfo, Diagnostic, Environment, EnvironmentCreateInfo, Global};
use rt_core::types::TypeId;

/// rt - compile and run a source file against the embeddable scripting runtime
#[derive(Parser, Debug)]
#[command(name = "rt")]
#[command(about = "Compile and run a source file, printing its return value", long_about = None)]
struct Cli {
    /// Source file to compile and run
    path: std::path::PathBuf,

    /// Name reported in diagnostics in place of the file path
    #[arg(long)]
    name: Option<String>,

    /// Print a disassembly of the compiled unit before running it
    #[arg(long)]
    disassemble: bool,

    /// Override the parser's recursion guard (default 500, see `rt-core`)
    #[arg(long)]
    max_parse_depth: Option<usize>,

    /// Raise the log level (stackable: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<(), Diagnostic> {
    let source = fs::read_to_string(&cli.path).unwrap_or_else(|err| {
        eprintln!("{}: {err}", cli.path.display());
        std::process::exit(1);
    });
    let name = cli
        .name
        .clone()
        .unwrap_or_else(|| cli.path.display().to_string());
    tracing::info!(name = %name, bytes = source.len(), "compiling source file");

    let mut env = Environment::new(EnvironmentCreateInfo { allocator: Global });
    env.reserve(2);

    let result_type = env.compile(
        0,
        CompileInfo {
            name: &name,
            source: &source,
            max_parse_depth: cli.max_parse_depth,
        },
    )?;

    if cli.disassemble {
        env.disassemble(1, 0)
            .expect("register 0 holds a compiled unit after a successful compile");
        println!("{}", env.get_string(1));
    }

    tracing::info!("running compiled unit");
    env.call(0, Some(1))?;
    print_result(&env, result_type);
    Ok(())
}

fn print_result<A: Allocator + Clone>(env: &Environment<A>, result_type: Option<TypeId>) {
    match result_type {
        Some(TypeId::Int) => println!("{}", env.get_int(1)),
        Some(TypeId::Float) => println!("{}", env.get_float(1)),
        Some(TypeId::Void) | None => {}
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(diagnostic) => {
            let report = miette::Report::new(diagnostic);
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}
