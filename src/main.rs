use clap::{Parser as ClapParser, Subcommand};
use mac_lang::cli::{self, CliError};
use std::fs;
use std::io::{self, Read, Write};

#[derive(ClapParser)]
#[command(name = "mac")]
#[command(about = "mac - compile and run operational policy scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and report its shape
    Check {
        /// Script file (reads from stdin if not provided)
        file: Option<String>,

        /// Only report success or failure, no details
        #[arg(short, long)]
        quiet: bool,
    },

    /// Compile and execute a script with the standard library
    Run {
        /// Script file (reads from stdin if not provided)
        file: Option<String>,

        /// Environment variables for the machine, as NAME=VALUE
        #[arg(short, long = "env")]
        env: Vec<String>,
    },

    /// Compile a script and emit its portable IR
    Emit {
        /// Script file (reads from stdin if not provided)
        file: Option<String>,

        /// Write the IR here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { file, quiet } => run_check(file, quiet),
        Commands::Run { file, env } => run_run(file, env),
        Commands::Emit { file, output } => run_emit(file, output),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_source(file: Option<String>) -> Result<String, CliError> {
    match file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        None => Err(CliError::NoInput),
    }
}

fn run_check(file: Option<String>, quiet: bool) -> Result<(), CliError> {
    let source = read_source(file)?;
    let report = cli::check_source(&source)?;

    if quiet {
        println!("OK");
        return Ok(());
    }

    println!("{} statement(s)", report.statements);
    for (name, count) in &report.func_calls {
        println!("  {} x{}", name, count);
    }
    print!("{}", report.source);

    Ok(())
}

fn run_run(file: Option<String>, env: Vec<String>) -> Result<(), CliError> {
    let source = read_source(file)?;

    let pairs = env
        .into_iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or(CliError::BadEnvPair(pair.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    cli::run_source(&source, &pairs)
}

fn run_emit(file: Option<String>, output: Option<String>) -> Result<(), CliError> {
    let source = read_source(file)?;
    let ir = cli::emit_ir(&source)?;

    match output {
        Some(path) => fs::write(path, ir)?,
        None => io::stdout().write_all(&ir)?,
    }

    Ok(())
}
