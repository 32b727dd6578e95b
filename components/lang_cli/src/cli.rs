//! Command-line arguments

use clap::{Parser, Subcommand};

/// Compiler and virtual machine for the Corten procedural language
#[derive(Parser, Debug)]
#[command(name = "corten-lang", version, about, long_about = None)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Stack slots the machine reserves up front
    #[arg(long, global = true, value_name = "SLOTS")]
    pub stack_size: Option<usize>,

    /// Print the block listings before running
    #[arg(long, global = true)]
    pub print_bytecode: bool,

    /// Log every executed instruction
    #[arg(long, global = true)]
    pub trace: bool,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the driver
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compile a source file to the text bytecode format
    Compile {
        /// Source file
        source: String,
        /// Bytecode file to write
        output: String,
    },
    /// Run a compiled bytecode file
    Run {
        /// Bytecode file
        file: String,
    },
    /// Compile and run a source file in memory
    Exec {
        /// Source file
        source: String,
    },
    /// Print the listing of every block of a bytecode file
    Disasm {
        /// Bytecode file
        file: String,
    },
    /// Start an interactive session
    Repl,
}
