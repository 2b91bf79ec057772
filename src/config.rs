use crate::build::COMPDB_FILE;
use crate::build::namer;
use crate::error::ConfigError;
use crate::state::STATE_FILE;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "fab.toml";

/// Raw `fab.toml` as written by the user.
#[derive(Deserialize, Debug, Default)]
pub struct FabConfig {
    pub package: PackageConfig,
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Deserialize, Debug, Default)]
pub struct PackageConfig {
    /// Name of the linked executable.
    pub name: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct BuildSection {
    pub compiler: Option<String>,
    pub linker: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub source_ext: Option<String>,
    pub obj_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub link_flags: Vec<String>,
    #[serde(default)]
    pub libs: Vec<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

/// A module is either a bare name or a table carrying extra compile flags.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ModuleEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        flags: Vec<String>,
    },
}

impl ModuleEntry {
    pub fn name(&self) -> &str {
        match self {
            ModuleEntry::Name(name) => name,
            ModuleEntry::Detailed { name, .. } => name,
        }
    }

    fn flags(&self) -> &[String] {
        match self {
            ModuleEntry::Name(_) => &[],
            ModuleEntry::Detailed { flags, .. } => flags,
        }
    }
}

/// One translation unit. Paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub source: PathBuf,
    /// Extra flags appended after the global compile flags.
    pub flags: Vec<String>,
}

/// Validated configuration the build engine works from.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding `fab.toml`; every tool runs with this as its working directory.
    pub root: PathBuf,
    pub source_modules: Vec<Module>,
    pub compiler: String,
    pub linker: String,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub libs: Vec<String>,
    pub obj_dir: PathBuf,
    pub output_binary: PathBuf,
    pub state_dir: PathBuf,
    pub jobs: usize,
    pub timeout: Option<Duration>,
}

impl BuildConfig {
    /// Parse `fab.toml` text. `root` is where relative paths are anchored.
    pub fn parse(text: &str, root: &Path) -> Result<Self, ConfigError> {
        let raw: FabConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: root.join(CONFIG_FILE),
            source,
        })?;
        raw.resolve(root)
    }

    pub fn abs(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }
}

impl FabConfig {
    pub fn resolve(self, root: &Path) -> Result<BuildConfig, ConfigError> {
        let build = self.build;

        if self.package.name.trim().is_empty() {
            return Err(ConfigError::EmptyBinaryName);
        }
        if build.modules.is_empty() {
            return Err(ConfigError::NoModules);
        }
        if build.jobs == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }

        let source_dir = build.source_dir.unwrap_or_else(|| PathBuf::from("."));
        let ext = build.source_ext.unwrap_or_else(|| "c".to_string());

        let mut seen = HashSet::new();
        let mut source_modules = Vec::with_capacity(build.modules.len());
        for (idx, entry) in build.modules.iter().enumerate() {
            let name = entry.name();
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyModuleName(idx));
            }
            if Path::new(name).is_absolute() || name.starts_with('/') || name.starts_with('\\') {
                return Err(ConfigError::AbsoluteModuleName(name.to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::DuplicateModule(name.to_string()));
            }
            source_modules.push(Module {
                name: name.to_string(),
                source: source_dir.join(format!("{}.{}", name, ext)),
                flags: entry.flags().to_vec(),
            });
        }

        let bin_name = if cfg!(target_os = "windows") {
            format!("{}.exe", self.package.name)
        } else {
            self.package.name.clone()
        };

        let obj_dir = build.obj_dir.unwrap_or_else(|| PathBuf::from(".obj"));
        let output_binary = build
            .out_dir
            .unwrap_or_else(|| PathBuf::from("."))
            .join(bin_name);
        let state_dir = build.state_dir.unwrap_or_else(|| PathBuf::from(".fab"));
        check_distinct_paths(&source_modules, &obj_dir, &output_binary, &state_dir)?;

        let compiler = build.compiler.unwrap_or_else(|| "cc".to_string());
        let linker = build.linker.unwrap_or_else(|| compiler.clone());
        let jobs = build.jobs.unwrap_or_else(default_jobs);

        Ok(BuildConfig {
            root: root.to_path_buf(),
            source_modules,
            compiler,
            linker,
            compile_flags: build.flags,
            link_flags: build.link_flags,
            libs: build.libs,
            obj_dir,
            output_binary,
            state_dir,
            jobs,
            timeout: build.timeout_secs.map(Duration::from_secs),
        })
    }
}

// `./a.o` and `a.o` name the same file.
fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Every file the build reads or writes must have exactly one owner, or two
/// jobs would share a record entry and overwrite each other's output.
fn check_distinct_paths(
    modules: &[Module],
    obj_dir: &Path,
    output_binary: &Path,
    state_dir: &Path,
) -> Result<(), ConfigError> {
    let mut claimed = HashSet::new();
    let paths = modules
        .iter()
        .flat_map(|m| [m.source.clone(), namer::name_for(obj_dir, &m.name)])
        .chain([
            output_binary.to_path_buf(),
            PathBuf::from(COMPDB_FILE),
            state_dir.join(STATE_FILE),
        ]);
    for path in paths {
        if !claimed.insert(lexical(&path)) {
            return Err(ConfigError::DuplicateArtifact(path));
        }
    }
    Ok(())
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Load and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let root = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    BuildConfig::parse(&text, &root)
}
