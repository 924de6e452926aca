use clap::Parser as ClapParser;
use std::{fs, path::PathBuf, process};

use cinder::action::disasm::disassemble_program;
use cinder::lang::Program;
use cinder::lower::{Compiler, LowerConfig, STATIC_INIT_UNIT};
use cinder::runtime::{Engine, EngineConfig, Outcome};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Resolved program tree, as JSON
    #[arg(help = "The program .json file to lower")]
    program: PathBuf,

    /// Lowering knobs, as JSON; missing fields take their defaults
    #[arg(long, help = "LowerConfig JSON file")]
    config: Option<PathBuf>,

    /// Print the action listing of every unit
    #[arg(long, help = "Dump the compiled action lists")]
    disasm: bool,

    /// Run every unit on the reference engine after lowering
    #[arg(long, help = "Execute the units on the reference engine")]
    run: bool,

    /// Actor the units run as
    #[arg(long, default_value_t = cinder::runtime::DEFAULT_ACTOR)]
    actor: i64,

    /// Write the compiled program in binary form
    #[arg(long, help = "Output file for the postcard-encoded program")]
    emit: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let program: Program = read_json(&cli.program, "program");
    let config: LowerConfig = match &cli.config {
        Some(path) => read_json(path, "config"),
        None => LowerConfig::default(),
    };

    let mut compiler = Compiler::new(config);
    let output = compiler.compile(&program);

    for diagnostic in &output.diagnostics {
        eprintln!("{}", diagnostic);
    }
    println!(
        "{} units, {} elements",
        output.program.units.len(),
        output.element_count
    );

    if cli.disasm {
        print!("{}", disassemble_program(&output.program));
    }

    if let Some(path) = &cli.emit {
        let bytes = match output.program.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("Error encoding program: {}", err);
                process::exit(1);
            }
        };
        if let Err(err) = fs::write(path, bytes) {
            eprintln!("Error writing '{}': {}", path.display(), err);
            process::exit(1);
        }
    }

    if cli.run {
        run_units(&output.program, cli.actor, compiler.config());
    }

    if output.has_errors() {
        process::exit(1);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf, what: &str) -> T {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Error reading {} '{}': {}", what, path.display(), err);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Error parsing {} '{}': {}", what, path.display(), err);
            process::exit(1);
        }
    }
}

/// Static initializers first, then every rule in order.
fn run_units(program: &cinder::action::CompiledProgram, actor: i64, config: &LowerConfig) {
    let mut engine = Engine::with_config(EngineConfig {
        global_capacity: config.global_capacity,
        actor_capacity: config.actor_capacity,
        ..EngineConfig::default()
    });

    let order = program
        .units
        .keys()
        .filter(|name| name.as_str() == STATIC_INIT_UNIT)
        .chain(program.units.keys().filter(|name| name.as_str() != STATIC_INIT_UNIT));

    for name in order {
        match engine.run_as(program, name, actor) {
            Ok(Outcome::Completed) => println!("{}: completed in {} steps", name, engine.steps()),
            Ok(Outcome::Aborted) => println!("{}: aborted after {} steps", name, engine.steps()),
            Err(err) => {
                eprintln!("{}: {}", name, err);
                process::exit(1);
            }
        }
    }
}
