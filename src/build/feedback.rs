use crate::error::ExecutionError;
use colored::*;

pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn for_error(err: &ExecutionError) -> Option<String> {
        match err {
            ExecutionError::ToolchainLaunch { program, .. } => Some(format!(
                "Could not start {}.\nInstall it or point {} / {} in fab.toml at a toolchain that exists.",
                program.bold().yellow(),
                "compiler".bold().green(),
                "linker".bold().green()
            )),
            ExecutionError::TimedOut(_) => Some(format!(
                "The tool ran past its deadline.\nRaise {} in fab.toml or pass {}.",
                "timeout_secs".bold().green(),
                "--timeout".bold().green()
            )),
            _ => err.stderr().and_then(Self::analyze),
        }
    }

    pub fn analyze(output: &str) -> Option<String> {
        // Linker cannot find the entry point
        if output.contains("undefined reference to `main'")
            || output.contains("entry point must be defined")
        {
            return Some(format!(
                "No module defines {}.\nCheck that the module holding the entry point is listed in {}.",
                "main()".bold().yellow(),
                "modules".bold().green()
            ));
        }

        if output.contains("LNK2019") || output.contains("undefined reference to") {
            return Some(format!(
                "It looks like a {} error.\nA module may be missing from {}, or a library from {} in fab.toml.",
                "Linker".bold().red(),
                "modules".bold().yellow(),
                "libs".bold().yellow()
            ));
        }

        if output.contains("fatal error: ") && output.contains("No such file or directory")
            || output.contains("cannot open include file")
        {
            return Some(format!(
                "It looks like a {} error.\nAdd the include directory to {} in fab.toml (e.g. {}).",
                "Missing Header".bold().red(),
                "flags".bold().yellow(),
                "\"-Isrc\"".bold().green()
            ));
        }

        None
    }
}
