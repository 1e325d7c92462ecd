//! Jua CLI and REPL
//!
//! Usage:
//!   jua run <file.jua>   - Execute a Jua file
//!   jua repl             - Start interactive REPL
//!   jua help             - Show help message

use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::rc::Rc;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use jua::config::PATH_VAR;
use jua::{Config, FsHost, Host, Interpreter, JuaError, Result, Value, VERSION};

/// File system modules, errors in red
struct CliHost(FsHost);

impl Host for CliHost {
    fn find_module(&self, name: &str) -> Result<String> {
        self.0.find_module(name)
    }

    fn stdout(&self, line: &str) {
        self.0.stdout(line);
    }

    fn stderr(&self, err: &JuaError) {
        eprintln!("{}", format!("{}", err).red());
    }
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "run" => {
            if args.len() < 3 {
                eprintln!("{}: missing file argument", "error".red());
                eprintln!("Usage: jua run <file.jua>");
                process::exit(1);
            }
            run_file(&args[2]);
        }
        "repl" => run_repl(),
        "help" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-v" => println!("Jua {}", VERSION),
        _ => {
            // Assume it's a file
            if args[1].ends_with(".jua") {
                run_file(&args[1]);
            } else {
                eprintln!("{}: unknown command '{}'", "error".red(), args[1]);
                print_help();
                process::exit(1);
            }
        }
    }
}

/// Log to stderr, only when `RUST_LOG` is set
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn print_help() {
    println!("{}", "Jua".cyan().bold());
    println!("A small prototype-based scripting language");
    println!("{} {}\n", "Version".cyan(), VERSION);
    println!("{}", "USAGE:".yellow());
    println!("  jua run <file.jua>   Execute a Jua file");
    println!("  jua repl             Start interactive REPL");
    println!("  jua help             Show this help message");
    println!("  jua version          Show version\n");
    println!("{}", "ENVIRONMENT:".yellow());
    println!("  JUA_PATH             Directory searched by require()");
    println!("  JUA_MAX_DEPTH        Nested call limit (default 10000)");
    println!("  RUST_LOG             Interpreter logging, e.g. jua=debug\n");
    println!("{}", "LANGUAGE FEATURES:".yellow());
    println!("  let x = 10                 Declaration");
    println!("  fun add(a, b) = a + b      Function definition");
    println!("  let P = class({{ init(self) {{ }} }})");
    println!("  for (i in 0..3) {{ print(i) }}");
    println!("  print(\"sum: ${{add(1, 2)}}\") Template string");
}

fn interpreter(config: Config) -> Interpreter {
    let host = Rc::new(CliHost(FsHost::new(
        config.module_root.clone(),
        config.module_extension.clone(),
    )));
    Interpreter::with_host_and_config(host, config)
}

fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: cannot read file '{}': {}", "error".red(), path, e);
            process::exit(1);
        }
    };

    // Modules sit next to the script unless JUA_PATH says otherwise
    let mut config = Config::from_env();
    if env::var(PATH_VAR).is_err() {
        let base = Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        config = config.with_module_root(base);
    }

    let name = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");
    let interp = interpreter(config);
    if !interp.run(&source, name) {
        process::exit(1);
    }
}

fn run_repl() {
    println!("{} {} - {}",
        "Jua".cyan().bold(),
        VERSION.cyan(),
        "A prototype-based scripting language".dimmed()
    );
    println!("Type {} to exit, {} for help\n",
        "exit".yellow(),
        "help".yellow()
    );

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}: cannot start REPL: {}", "error".red(), e);
            process::exit(1);
        }
    };

    // One interpreter for the session so declarations persist
    let mut interp = interpreter(Config::from_env());

    loop {
        match rl.readline(&format!("{} ", "jua>".green().bold())) {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    "exit" | "quit" => {
                        println!("{}", "Goodbye!".cyan());
                        break;
                    }
                    "help" => {
                        print_repl_help();
                        continue;
                    }
                    "clear" => {
                        interp = interpreter(Config::from_env());
                        println!("{}", "State cleared.".dimmed());
                        continue;
                    }
                    _ => {}
                }

                match interp.eval_line(line) {
                    Ok(Value::Null) => {}
                    Ok(value) => {
                        let shown = value.to_display().unwrap_or_else(|_| value.safe_string());
                        println!("{} {}", "=>".dimmed(), shown.cyan());
                    }
                    Err(e) => {
                        let err = e.with_source(line);
                        eprintln!("{}", format!("{}", err).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(err) => {
                eprintln!("{}: {:?}", "error".red(), err);
                break;
            }
        }
    }
}

fn print_repl_help() {
    println!("{}", "REPL Commands:".yellow());
    println!("  exit, quit   Exit the REPL");
    println!("  clear        Start over with a fresh global scope");
    println!("  help         Show this help\n");
    println!("{}", "Language Examples:".yellow());
    println!("  let x = 10");
    println!("  x * 2");
    println!("  fun double(n) {{ return n * 2 }}");
    println!("  [1, 2, 3]:join(' - ')");
}
