//! Fake toolchain shared by the integration tests.
//!
//! The scripts are run through `sh <script>` rather than executed directly so
//! that a freshly written script never trips `ETXTBSY` while other test
//! threads are forking.

#![allow(dead_code)]

use fabrik::build::BuildOptions;
use fabrik::config::BuildConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Copies the source to the object file; fails on a `#error` line.
/// Every invocation is appended to `calls.log`.
const FAKE_CC: &str = r##"
src=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -c) src="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "cc $src" >> calls.log
if grep -q "#error" "$src"; then
  echo "$src:1: error: #error directive" >&2
  exit 1
fi
cp "$src" "$out"
"##;

/// Concatenates the objects into the output.
const FAKE_LD: &str = r#"
out=""; objs=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -*) shift ;;
    *) objs="$objs $1"; shift ;;
  esac
done
echo "ld $out" >> calls.log
cat $objs > "$out"
"#;

const SLOW_CC: &str = "exec sleep 10\n";

const BROKEN_LD: &str = r#"
echo "undefined reference to \`main'" >&2
exit 1
"#;

pub struct Project {
    pub dir: TempDir,
    tools: TempDir,
}

impl Project {
    pub fn new(modules: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("fakecc", FAKE_CC),
            ("fakeld", FAKE_LD),
            ("slowcc", SLOW_CC),
            ("brokenld", BROKEN_LD),
        ] {
            fs::write(tools.path().join(name), body).unwrap();
        }

        let project = Self { dir, tools };
        for m in modules {
            project.write_source(m, &format!("int {};\n", m.replace(['/', '\\'], "_")));
        }
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn tool(&self, name: &str) -> String {
        self.tools.path().join(name).to_string_lossy().to_string()
    }

    pub fn source_path(&self, module: &str) -> PathBuf {
        self.root().join("compiler").join(format!("{}.c", module))
    }

    pub fn write_source(&self, module: &str, content: &str) {
        let path = self.source_path(module);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// `modules` is a TOML array body, e.g. `"lexer", "parser"`.
    pub fn config_text(&self, modules: &str, extra: &str) -> String {
        self.config_text_with(modules, extra, "fakecc", "fakeld")
    }

    pub fn config_text_with(&self, modules: &str, extra: &str, cc: &str, ld: &str) -> String {
        format!(
            r#"[package]
name = "llc"

[build]
compiler = "sh"
linker = "sh"
source_dir = "compiler"
flags = ["{cc}"]
link_flags = ["{ld}"]
jobs = 4
modules = [{modules}]
{extra}
"#,
            cc = self.tool(cc),
            ld = self.tool(ld),
        )
    }

    pub fn config(&self, modules: &str) -> BuildConfig {
        BuildConfig::parse(&self.config_text(modules, ""), self.root()).unwrap()
    }

    pub fn write_config(&self, text: &str) -> PathBuf {
        let path = self.root().join("fab.toml");
        fs::write(&path, text).unwrap();
        path
    }

    pub fn object(&self, module: &str) -> PathBuf {
        self.root()
            .join(fabrik::build::namer::name_for(Path::new(".obj"), module))
    }

    pub fn binary(&self) -> PathBuf {
        self.root().join("llc")
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.root().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn reset_calls(&self) {
        let _ = fs::remove_file(self.root().join("calls.log"));
    }
}

pub fn opts() -> BuildOptions {
    BuildOptions {
        jobs: Some(4),
        ..Default::default()
    }
}
