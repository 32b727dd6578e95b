//! Corten Lang CLI
//!
//! Entry point for the compiler and virtual machine. Parses CLI arguments
//! and delegates to the Runtime for execution.

use clap::Parser as ClapParser;
use interpreter::MachineConfig;
use lang_cli::error::EXIT_FAILURE;
use lang_cli::{repl, Cli, CliError, CliResult, Command, Runtime};
use log::info;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // help and version are not failures
            std::process::exit(if err.use_stderr() { EXIT_FAILURE } else { 0 });
        }
    };

    let level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(&cli) {
        match &err {
            // program diagnostics go to stdout next to the program output
            CliError::Compile(_) | CliError::Runtime(_) => println!("{}", err),
            _ => eprintln!("Error: {}", err),
        }
        std::process::exit(err.exit_code());
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let mut config = MachineConfig::default().with_trace(cli.trace);
    if let Some(stack_size) = cli.stack_size {
        config = config.with_stack_size(stack_size);
    }
    let mut runtime = Runtime::with_config(config)?.with_print_bytecode(cli.print_bytecode);

    match &cli.command {
        Command::Compile { source, output } => {
            info!("compiling {} to {}", source, output);
            runtime.compile_file(source, output)?;
        }
        Command::Run { file } => {
            info!("running {}", file);
            runtime.run_file(file)?;
        }
        Command::Exec { source } => {
            info!("executing {}", source);
            runtime.exec_file(source)?;
        }
        Command::Disasm { file } => {
            let program = Runtime::load_file(file)?;
            print!("{}", Runtime::disassemble(&program));
        }
        Command::Repl => repl::run_repl(&mut runtime)?,
    }
    Ok(())
}
