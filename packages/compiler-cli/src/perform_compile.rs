//! Perform Compile
//!
//! Compiles a free-standing style sheet into its plain and `.shim`
//! `STYLES` modules and writes them to an output directory.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::compiler::config::CompilerConfig;
use crate::compiler::resource_loader::FileResourceLoader;
use crate::compiler::source_module::SourceModule;
use crate::compiler::style_compiler::StyleCompiler;
use crate::compiler::url_resolver::DefaultUrlResolver;

/// Options of one `ngc` run.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// The style sheet to compile.
    pub input: PathBuf,
    /// Module id of the style sheet; defaults to the input path.
    pub module_id: Option<String>,
    /// Where the generated modules are written. Nothing is written when unset.
    pub out_dir: Option<PathBuf>,
    pub config: CompilerConfig,
}

/// A generated module and the file it belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedModule {
    pub file_name: String,
    pub module: SourceModule,
}

impl EmittedModule {
    /// Source with module refs replaced by `require`d aliases.
    pub fn linked_source(&self) -> String {
        let linked = self.module.get_source_with_imports();
        let mut out = String::new();
        for (module_id, alias) in &linked.imports {
            out.push_str(&format!("var {} = require('{}');\n", alias, module_id));
        }
        out.push_str(&linked.source);
        out
    }
}

/// Read a JSON compiler configuration file.
pub fn read_configuration(path: &Path) -> Result<CompilerConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    CompilerConfig::from_json(&json).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn perform_compilation(options: &CompileOptions) -> Result<Vec<EmittedModule>> {
    if !options.input.is_file() {
        bail!("Input style sheet not found: {}", options.input.display());
    }
    let css_text = fs::read_to_string(&options.input)
        .with_context(|| format!("Failed to read {}", options.input.display()))?;
    let module_id = options
        .module_id
        .clone()
        .unwrap_or_else(|| default_module_id(&options.input));

    let root_dir = options
        .input
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();
    let compiler = StyleCompiler::with_config(
        Rc::new(FileResourceLoader::new(root_dir)),
        Rc::new(DefaultUrlResolver::new()),
        &options.config,
    );

    debug!("Compiling style sheet {} as {}", options.input.display(), module_id);
    let emitted: Vec<EmittedModule> = compiler
        .compile_stylesheet_codegen(&module_id, &css_text)
        .into_iter()
        .map(|module| EmittedModule {
            file_name: format!("{}.js", module.module_id.as_deref().unwrap_or(&module_id)),
            module,
        })
        .collect();

    if let Some(out_dir) = &options.out_dir {
        write_modules(out_dir, &emitted)?;
    }
    Ok(emitted)
}

fn write_modules(out_dir: &Path, modules: &[EmittedModule]) -> Result<()> {
    for emitted in modules {
        let path = out_dir.join(module_file_path(&emitted.file_name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, &emitted.module.source_with_module_refs)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn default_module_id(input: &Path) -> String {
    input
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .filter(|c| c != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// `package:` and absolute module ids are written relative to the output directory.
fn module_file_path(file_name: &str) -> PathBuf {
    let relative = file_name
        .strip_prefix("package:")
        .unwrap_or(file_name)
        .trim_start_matches('/');
    PathBuf::from(relative)
}
