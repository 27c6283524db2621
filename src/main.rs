// src/main.rs

use std::fs;
use std::process;

use clap::Parser;
use log::debug;
use newtc::bytecode::disassemble;
use newtc::source::SourceStream;
use newtc::{CompatMode, Compiler, CompilerOptions, Heap};

/// A compiler for NewtonScript source to Newton bytecode.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source file to compile
    #[arg(required_unless_present = "eval")]
    input_file: Option<String>,

    /// Compile this source text instead of a file
    #[arg(short = 'e', long = "eval", value_name = "SOURCE", conflicts_with = "input_file")]
    eval: Option<String>,

    /// Call-frame layout of the generated code blocks
    #[arg(long, value_enum, env = "NEWTC_COMPAT", default_value_t = CompatMode::Native)]
    compat: CompatMode,

    /// Attach function, argument and local names to every code block
    #[arg(long, env = "NEWTC_DEBUG_NAMES")]
    debug_names: bool,

    /// Only compile the first top-level command
    #[arg(long)]
    first_only: bool,

    /// Compile every top-level command separately, continuing after errors
    #[arg(long)]
    each: bool,

    /// Do not report warnings
    #[arg(long)]
    no_warnings: bool,
}

impl Cli {
    fn options(&self) -> CompilerOptions {
        CompilerOptions {
            compat: self.compat,
            debug_names: self.debug_names,
            first_command_only: self.first_only,
            warnings: !self.no_warnings,
        }
    }

    /// (file name, source text)
    fn read_source(&self) -> Result<(String, String), String> {
        match (&self.eval, &self.input_file) {
            (Some(text), _) => Ok(("<eval>".to_string(), text.clone())),
            (None, Some(path)) => fs::read_to_string(path)
                .map(|text| (path.clone(), text))
                .map_err(|e| format!("Failed to read file '{}': {}", path, e)),
            (None, None) => Err("no input given".to_string()),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let (file_name, source) = cli.read_source()?;
    let options = cli.options();
    debug!("compiling {} with {:?}", file_name, options);

    let mut heap = Heap::new();
    let mut stream = SourceStream::new(source.as_str(), file_name.as_str());
    let mut compiler = Compiler::new(&mut stream, &mut heap, options);

    let results = if cli.each { compiler.compile_each() } else { vec![compiler.compile()] };

    let mut failed = false;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(block) => {
                if cli.each {
                    println!(";; command {}", i + 1);
                }
                print!("{}", disassemble(block)?);
            }
            Err(e) => {
                failed = true;
                compiler.diagnostics().report_error(e);
            }
        }
    }

    // 统一打印所有收集到的错误与警告
    compiler.diagnostics().print(&file_name, &source)?;

    if failed {
        eprintln!("Compilation failed.");
        process::exit(1);
    }
    Ok(())
}
