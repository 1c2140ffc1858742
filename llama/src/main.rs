//! llamaScript command-line runner: read a source file, compile it, optionally
//! verify and disassemble the resulting module, then execute it on the VM.

use std::fmt;
use std::fs;

use clap::Parser;
use llama_bytecode::IrBuilder;
use llama_core::diagnostics::Status;
use llama_core::Logger;
use llama_vm::Vm;

/// llamaScript interpreter
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Source file to compile and run
    source: String,

    /// Disassemble every compiled function instead of (or before) running it
    #[arg(long, default_value_t = false)]
    dump_bytecode: bool,

    /// Run llama-verify's static checks on the compiled module before executing it
    #[arg(long, default_value_t = false)]
    verify: bool,

    /// Operand stack depth ceiling
    #[arg(long, default_value_t = 64 * 1024)]
    max_stack: usize,

    /// Keep running after a diagnostic error instead of exiting the process
    #[arg(long, default_value_t = false)]
    recoverable: bool,
}

const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024; // 1GB

#[derive(Debug)]
enum CliError {
    FileIsTooLarge(String, u64),
    CompileFailed,
    VerifyFailed(llama_verify::VerifyError),
    RunFailed,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::FileIsTooLarge(path, size) => write!(f, "file {path} is too large: {size} bytes, max is 1GB"),
            CliError::CompileFailed => write!(f, "compilation failed"),
            CliError::VerifyFailed(e) => write!(f, "bytecode verification failed: {e}"),
            CliError::RunFailed => write!(f, "execution failed"),
        }
    }
}

impl std::error::Error for CliError {}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let metadata = fs::metadata(&args.source).map_err(|err| {
        eprintln!("{err}");
        err
    })?;
    if metadata.len() >= MAX_FILE_SIZE {
        let err = CliError::FileIsTooLarge(args.source.clone(), metadata.len());
        eprintln!("{err}");
        return Err(err.into());
    }

    let source = fs::read_to_string(&args.source).map_err(|err| {
        eprintln!("{err}");
        err
    })?;

    if cfg!(feature = "verbose") {
        eprintln!("[LOG] compiling {}", args.source);
    }
    let mut log = Logger::new();
    log.set_source(args.source.clone());
    log.set_recoverable(args.recoverable);

    let module = match llama_compiler::compile(&source, &mut log) {
        Ok(m) => m,
        Err(Status::Failure) => {
            eprintln!("{}", CliError::CompileFailed);
            return Err(CliError::CompileFailed.into());
        }
        Err(Status::Ok) => unreachable!("compile() never returns Err(Status::Ok)"),
    };

    if args.dump_bytecode {
        for idx in 0..module.funcs.size() {
            let entry = module.funcs.at(idx).unwrap();
            println!("; {}", module.funcs.dump_signature(idx));
            let mut ir = IrBuilder::new();
            ir.read(&entry.data);
            println!("{}", ir.disassemble(&module.consts));
        }
    }

    if args.verify {
        let report = llama_verify::Verifier::new(&module).verify().map_err(|e| {
            let err = CliError::VerifyFailed(e);
            eprintln!("{err}");
            err
        })?;
        if cfg!(feature = "verbose") {
            eprintln!("[LOG] verified {} function(s), {} dead instruction(s)", report.functions_checked, report.dead_instructions);
        }
    }

    let mut vm = Vm::new(module);
    vm.set_max_stack(args.max_stack);
    vm.log.set_source(args.source);
    vm.log.set_recoverable(args.recoverable);
    llama_vm::stdlib::install(&mut vm);

    if cfg!(feature = "verbose") {
        eprintln!("[LOG] running");
    }
    match vm.run_main() {
        Ok(value) => {
            if cfg!(feature = "verbose") {
                eprintln!("[LOG] program returned {value:?}");
            }
            Ok(())
        }
        Err(_) => Err(CliError::RunFailed.into()),
    }
}
