//! reprint - rework EPUB styling for e-ink reading devices

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use reprint::{clean_book, epub};

#[derive(Parser)]
#[command(name = "reprint")]
#[command(version, about = "Rework EPUB styling for e-ink reading devices", long_about = None)]
#[command(after_help = "EXAMPLES:
    reprint run book.epub book-eink.epub    Clean a book and write the result
    reprint check book.epub                 Validate that a book cleans without errors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean a book and write the result
    Run {
        /// Input EPUB file
        #[arg(value_name = "INPUT")]
        input: String,
        /// Output EPUB file
        #[arg(value_name = "OUTPUT")]
        output: String,
    },
    /// Run the cleaning pipeline without writing output
    Check {
        /// Input EPUB file
        #[arg(value_name = "INPUT")]
        input: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { input, output } => run(&input, &output),
        Command::Check { input } => check(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &str, output: &str) -> reprint::Result<()> {
    let mut book = epub::read_epub(input)?;
    println!("{}", book.title);
    clean_book(&mut book)?;
    epub::write_epub(&book, output)
}

fn check(input: &str) -> reprint::Result<()> {
    let mut book = epub::read_epub(input)?;
    println!("{}", book.title);
    clean_book(&mut book)
}
