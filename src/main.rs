use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use betalox as lox;

use lox::ast::Stmt;
use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking Lox interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Emit the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Runs a script file, or starts a REPL when no file is given
    Run { filename: Option<PathBuf> },
}

/// Map the script file read-only; the scanner works straight off the bytes.
fn map_file(filename: &PathBuf) -> Result<Mmap> {
    info!("Mapping file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mmap = unsafe { Mmap::map(&file) }
        .context(format!("Failed to map file {:?}", filename))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), filename);

    Ok(mmap)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Route records to the file with module path and source line.
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("betalox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");

    Ok(())
}

/// How one execution unit (a file, or one REPL line) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Ok,
    StaticError,
    RuntimeError,
}

/// One interpreter plus the node-id counter it shares across inputs, so
/// REPL lines can keep referring to earlier definitions.
struct Session {
    interpreter: Interpreter,
    next_id: u32,
}

impl Session {
    fn new() -> Self {
        Session {
            interpreter: Interpreter::new(),
            next_id: 0,
        }
    }

    /// scan → parse → resolve → interpret, reporting every diagnostic of
    /// each stage before giving up on the input.
    fn run(&mut self, source: &[u8], repl_mode: bool) -> RunStatus {
        let (tokens, lex_errors) = scan_all(source);

        if !lex_errors.is_empty() {
            for e in &lex_errors {
                eprintln!("{}", e);
            }

            return RunStatus::StaticError;
        }

        let mut parser = Parser::new(tokens, self.next_id);
        let (statements, parse_errors) = parser.parse();
        self.next_id = parser.next_id();

        if !parse_errors.is_empty() {
            for e in &parse_errors {
                eprintln!("{}", e);
            }

            return RunStatus::StaticError;
        }

        info!("Parsed {} statement(s)", statements.len());

        let resolution = Resolver::new().resolve(&statements);

        // Warnings never block execution.
        for warning in &resolution.warnings {
            eprintln!("{}", warning);
        }

        if !resolution.errors.is_empty() {
            for e in &resolution.errors {
                eprintln!("{}", e);
            }

            return RunStatus::StaticError;
        }

        self.interpreter.add_bindings(resolution.bindings);

        // A REPL line holding a single expression echoes its value.
        if repl_mode && statements.len() == 1 {
            if let Stmt::Expression(expr) = &statements[0] {
                return match self.interpreter.evaluate(expr) {
                    Ok(value) => {
                        println!("{}", value);

                        RunStatus::Ok
                    }

                    Err(e) => {
                        eprintln!("{}", e);

                        RunStatus::RuntimeError
                    }
                };
            }
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => RunStatus::Ok,

            Err(e) => {
                debug!("Runtime error: {}", e);
                eprintln!("{}", e);

                RunStatus::RuntimeError
            }
        }
    }
}

/// Drain the scanner, partitioning tokens from lexical errors so every
/// error in the input gets reported.
fn scan_all(source: &[u8]) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for item in Scanner::new(source) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    (tokens, errors)
}

fn repl() -> Result<()> {
    let mut session = Session::new();

    println!("betalox REPL (Ctrl-D to exit)");

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = stdin.lock().read_line(&mut line)?;

        if read == 0 {
            println!();
            break; // EOF
        }

        if line.trim().is_empty() {
            continue;
        }

        // Errors are reported and the loop continues; definitions persist
        // across lines in the shared session.
        session.run(line.as_bytes(), true);
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Minimal logger so `log` records have somewhere to go.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => match filename {
            Some(filename) => {
                info!("Running Tokenize subcommand");

                let mmap = map_file(&filename)?;
                let (tokens, errors) = scan_all(&mmap);

                for e in &errors {
                    eprintln!("{}", e);
                }

                if json {
                    println!("{}", serde_json::to_string_pretty(&tokens)?);
                } else {
                    for token in &tokens {
                        println!("{}", token);
                    }
                }

                if !errors.is_empty() {
                    debug!("Tokenization failed, exiting with code 65");

                    std::process::exit(65);
                }
            }

            None => {
                println!("No input filepath was provided. Exiting...");

                std::process::exit(0);
            }
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => {
                info!("Running Parse subcommand");

                let mmap = map_file(&filename)?;
                let (tokens, errors) = scan_all(&mmap);

                if !errors.is_empty() {
                    for e in &errors {
                        eprintln!("{}", e);
                    }

                    std::process::exit(65);
                }

                let mut parser = Parser::new(tokens, 0);

                match parser.parse_expression() {
                    Ok(expr) => {
                        println!("{}", AstPrinter.print(&expr));
                    }

                    Err(e) => {
                        eprintln!("{}", e);

                        std::process::exit(65);
                    }
                }
            }

            None => {
                println!("No input filepath was provided. Exiting...");

                std::process::exit(0);
            }
        },

        Commands::Run { filename } => match filename {
            Some(filename) => {
                info!("Running Run subcommand");

                let mmap = map_file(&filename)?;
                let mut session = Session::new();

                match session.run(&mmap, false) {
                    RunStatus::Ok => {
                        info!("Program executed successfully");
                    }

                    RunStatus::StaticError => std::process::exit(65),

                    RunStatus::RuntimeError => std::process::exit(70),
                }
            }

            None => {
                info!("No file given; starting REPL");

                repl()?;
            }
        },
    }

    Ok(())
}
