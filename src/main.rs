use ardent::bytecode;
use ardent::infer::{CompilationMode, TypeChecker, TypeInferrer};
use ardent::{parse, tokenize, Interpreter};
use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionMode {
    Interpret,
    Vm,
}

struct Options {
    filename: String,
    mode: ExecutionMode,
    aot: bool,
    quiet_assign: bool,
    emit_avm: Option<String>,
}

fn print_usage() {
    println!("Usage: ardent <file.ardent> [options]");
    println!();
    println!("Options:");
    println!("  --vm               Run on the bytecode VM instead of the tree-walking interpreter");
    println!("  --aot              Check in strict (ahead-of-time) mode; reject dynamic features");
    println!("  --verbose-assign   Print a diagnostic line on every variable binding");
    println!("  --emit-avm <file>  Compile to bytecode and write the .avm file instead of running");
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let mode = if args.contains(&"--vm".to_string()) { ExecutionMode::Vm } else { ExecutionMode::Interpret };
    let opts = Options {
        filename: args[1].clone(),
        mode,
        aot: args.contains(&"--aot".to_string()),
        quiet_assign: !args.contains(&"--verbose-assign".to_string()),
        emit_avm: args
            .iter()
            .position(|a| a == "--emit-avm")
            .and_then(|idx| args.get(idx + 1))
            .cloned(),
    };

    let source = match fs::read_to_string(&opts.filename) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: could not read '{}': {}", opts.filename, e);
            return ExitCode::FAILURE;
        }
    };

    let tokens = tokenize(&source);
    let program = match parse(&tokens) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ParseError: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut inferrer = TypeInferrer::new();
    let warnings = inferrer.infer_program(&program);
    for w in &warnings {
        println!("{}", w);
    }

    let check_mode = if opts.aot { CompilationMode::Aot } else { CompilationMode::Interpreter };
    let mut checker = TypeChecker::new(check_mode, inferrer.spells.clone());
    let result = checker.check(&program);
    for w in &result.warnings {
        println!("{}", w);
    }
    if !result.success() {
        for e in &result.errors {
            eprintln!("{}", e);
        }
        return ExitCode::FAILURE;
    }

    if let Some(out_path) = opts.emit_avm {
        return match bytecode::compile(&program) {
            Ok(chunk) => {
                let bytes = bytecode::write_avm(&chunk);
                match fs::write(&out_path, bytes) {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(e) => {
                        eprintln!("Error: could not write '{}': {}", out_path, e);
                        ExitCode::FAILURE
                    }
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match opts.mode {
        ExecutionMode::Interpret => {
            let source_name = Path::new(&opts.filename)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| opts.filename.clone());
            let base_dir = Path::new(&opts.filename).parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let resolver = Rc::new(ardent::interpreter::FsResolver { base_dir });
            let mut interp = Interpreter::with_resolver(source_name, resolver);
            interp.set_quiet_assign(opts.quiet_assign);
            let run_result = interp.run(&program);
            print!("{}", interp.output());
            for d in interp.diagnostics() {
                println!("{}", d);
            }
            if run_result.is_err() {
                return ExitCode::FAILURE;
            }
        }
        ExecutionMode::Vm => match bytecode::compile(&program) {
            Ok(chunk) => {
                let mut vm = bytecode::Vm::new();
                match vm.run(&chunk) {
                    Ok(()) => {
                        for line in &vm.output {
                            println!("{}", line);
                        }
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    ExitCode::SUCCESS
}
