use super::namer;
use crate::config::{BuildConfig, Module};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Compile,
    Link,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Compile => write!(f, "compile"),
            JobKind::Link => write!(f, "link"),
        }
    }
}

/// One schedulable unit of compiler or linker work.
///
/// Identity is the output path alone, so reordering the module list or adding
/// unrelated modules never changes another job's key in the build record.
#[derive(Debug, Clone)]
pub struct Job {
    pub kind: JobKind,
    pub id: String,
    /// Output file, relative to the project root.
    pub output: PathBuf,
    /// Declared inputs: the source for a compile, the artifacts (in link order) for a link.
    pub inputs: Vec<PathBuf>,
    /// Module name for compile jobs.
    pub module: Option<String>,
    pub argv: Vec<String>,
}

impl Job {
    /// `{compiler} {flags} -c {source} -o {artifact}`
    pub fn compile(cfg: &BuildConfig, module: &Module) -> Self {
        let output = namer::name_for(&cfg.obj_dir, &module.name);

        let mut argv = Vec::with_capacity(cfg.compile_flags.len() + module.flags.len() + 5);
        argv.push(cfg.compiler.clone());
        argv.extend(cfg.compile_flags.iter().cloned());
        argv.extend(module.flags.iter().cloned());
        argv.push("-c".to_string());
        argv.push(module.source.to_string_lossy().to_string());
        argv.push("-o".to_string());
        argv.push(output.to_string_lossy().to_string());

        Self {
            kind: JobKind::Compile,
            id: output.to_string_lossy().to_string(),
            output,
            inputs: vec![module.source.clone()],
            module: Some(module.name.clone()),
            argv,
        }
    }

    /// `{linker} {link_flags} -o {binary} {artifacts...} -l{libs...}`
    pub fn link(cfg: &BuildConfig) -> Self {
        let artifacts: Vec<PathBuf> = cfg
            .source_modules
            .iter()
            .map(|m| namer::name_for(&cfg.obj_dir, &m.name))
            .collect();

        let mut argv = vec![cfg.linker.clone()];
        argv.extend(cfg.link_flags.iter().cloned());
        argv.push("-o".to_string());
        argv.push(cfg.output_binary.to_string_lossy().to_string());
        argv.extend(artifacts.iter().map(|a| a.to_string_lossy().to_string()));
        argv.extend(cfg.libs.iter().map(|lib| format!("-l{}", lib)));

        Self {
            kind: JobKind::Link,
            id: cfg.output_binary.to_string_lossy().to_string(),
            output: cfg.output_binary.clone(),
            inputs: artifacts,
            module: None,
            argv,
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Human-facing name: the module for a compile, the output for a link.
    pub fn label(&self) -> &str {
        self.module.as_deref().unwrap_or(&self.id)
    }

    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}
