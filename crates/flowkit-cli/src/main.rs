use std::env;
use std::process;

use flowkit_codegen::compiler::{CompileOutput, compile_source};
use flowkit_registry::registry::ScriptRegistry;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "compile" => {
            if args.len() < 3 {
                eprintln!("Usage: flowkit compile <blocks.json> [--registry <scripts.json>] [-o <out.json>]");
                process::exit(1);
            }
            cmd_compile(&args[2], &args[3..]);
        }
        "check" => {
            if args.len() < 3 {
                eprintln!("Usage: flowkit check <blocks.json> [--registry <scripts.json>]");
                process::exit(1);
            }
            cmd_check(&args[2], &args[3..]);
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("flowkit {}", env!("CARGO_PKG_VERSION"));
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Flowkit - block program lowering compiler");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  flowkit compile <blocks.json> [--registry <scripts.json>] [-o <out.json>]");
    eprintln!("                               Compile a block tree to a behaviour program");
    eprintln!("  flowkit check <blocks.json> [--registry <scripts.json>]");
    eprintln!("                               Compile and report diagnostics only");
    eprintln!("  flowkit version              Show version");
    eprintln!("  flowkit help                 Show this help");
}

/// Parse trailing `--registry` / `-o` options.
fn parse_options(rest: &[String]) -> (Option<String>, Option<String>) {
    let mut registry = None;
    let mut output = None;
    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--registry" if i + 1 < rest.len() => {
                registry = Some(rest[i + 1].clone());
                i += 2;
            }
            "-o" | "--output" if i + 1 < rest.len() => {
                output = Some(rest[i + 1].clone());
                i += 2;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                process::exit(1);
            }
        }
    }
    (registry, output)
}

fn load_registry(path: Option<&str>) -> ScriptRegistry {
    let Some(path) = path else {
        return ScriptRegistry::new();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            process::exit(1);
        }
    };
    match ScriptRegistry::from_json(&text) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Registry error: {}", e);
            process::exit(1);
        }
    }
}

fn run_compile(path: &str, registry_path: Option<&str>) -> CompileOutput {
    let registry = load_registry(registry_path);
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            process::exit(1);
        }
    };
    match compile_source(&source, &registry) {
        Ok(out) => {
            for diagnostic in &out.diagnostics {
                eprintln!("{}", diagnostic);
            }
            out
        }
        Err(e) => {
            eprintln!("Compile error: {}", e);
            process::exit(1);
        }
    }
}

/// Compile a block tree and write the behaviour program document.
fn cmd_compile(path: &str, rest: &[String]) {
    let (registry_path, output) = parse_options(rest);
    let out = run_compile(path, registry_path.as_deref());
    match output {
        Some(dest) => {
            if let Err(e) = std::fs::write(&dest, &out.document) {
                eprintln!("Error writing '{}': {}", dest, e);
                process::exit(1);
            }
            println!("Wrote {}", dest);
        }
        None => println!("{}", out.document),
    }
}

/// Compile without writing output; exit non-zero on any error-level
/// diagnostic.
fn cmd_check(path: &str, rest: &[String]) {
    let (registry_path, output) = parse_options(rest);
    if output.is_some() {
        eprintln!("check does not take -o");
        process::exit(1);
    }
    let out = run_compile(path, registry_path.as_deref());
    if out.has_errors() {
        process::exit(1);
    }
    println!(
        "OK: {} behaviour(s), {} diagnostic(s)",
        out.program.behaviours.len(),
        out.diagnostics.len()
    );
}
