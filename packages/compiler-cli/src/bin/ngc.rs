/**
 * Template Compiler CLI - ngc
 *
 * Compiles a free-standing style sheet into its `STYLES` modules.
 */
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process;

use template_compiler_cli::compiler::config::CompilerConfig;
use template_compiler_cli::perform_compile::{perform_compilation, read_configuration, CompileOptions};

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = Command::new("ngc")
        .version(template_compiler_cli::version())
        .about("Template compiler: style sheet modules")
        .arg(
            Arg::new("input")
                .value_name("STYLESHEET")
                .required(true)
                .help("Style sheet to compile"),
        )
        .arg(
            Arg::new("module-id")
                .short('m')
                .long("module-id")
                .value_name("ID")
                .help("Module id of the style sheet (defaults to its path)"),
        )
        .arg(
            Arg::new("out-dir")
                .short('o')
                .long("out-dir")
                .value_name("DIR")
                .help("Directory the generated modules are written to"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Compiler configuration (JSON)"),
        )
        .arg(
            Arg::new("link")
                .long("link")
                .action(ArgAction::SetTrue)
                .help("Print the linked sources"),
        )
        .get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => read_configuration(PathBuf::from(path).as_path())?,
        None => CompilerConfig::default(),
    };
    let options = CompileOptions {
        input: matches
            .get_one::<String>("input")
            .map(PathBuf::from)
            .unwrap_or_default(),
        module_id: matches.get_one::<String>("module-id").cloned(),
        out_dir: matches.get_one::<String>("out-dir").map(PathBuf::from),
        config,
    };

    let emitted = perform_compilation(&options)?;
    if matches.get_flag("link") {
        for module in &emitted {
            println!("// {}", module.file_name);
            println!("{}", module.linked_source());
        }
    } else if options.out_dir.is_none() {
        for module in &emitted {
            println!("// {}", module.file_name);
            println!("{}", module.module.source_with_module_refs);
        }
    }
    Ok(())
}
