//! Incremental build behaviour of the engine, driven through the library API
//! with a fake shell-script toolchain.

#![cfg(unix)]

mod common;

use common::{Project, opts};
use fabrik::build::{self, BuildOptions, CancelToken, JobKind, JobStatus};
use fabrik::config::BuildConfig;
use fabrik::error::{ConfigError, ExecutionError};
use fabrik::state::{STATE_FILE, StateStore};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[test]
fn test_lexer_parser_scenario() {
    let p = Project::new(&["lexer", "parser"]);
    let cfg = p.config(r#""lexer", "parser""#);

    // First build: both compiled, then linked
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 3);
    assert!(p.object("lexer").exists());
    assert!(p.object("parser").exists());
    assert_eq!(fs::read_to_string(p.binary()).unwrap(), "int lexer;\nint parser;\n");

    // No changes: nothing runs
    p.reset_calls();
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 0);
    assert!(p.calls().is_empty());

    // Touch parser: parser + link only
    let lexer_before = fs::metadata(p.object("lexer")).unwrap().modified().unwrap();
    p.write_source("parser", "int parser2;\n");
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed_of(JobKind::Compile), vec!["parser"]);
    assert_eq!(report.executed_of(JobKind::Link).len(), 1);
    let lexer_after = fs::metadata(p.object("lexer")).unwrap().modified().unwrap();
    assert_eq!(lexer_before, lexer_after);
    assert_eq!(fs::read_to_string(p.binary()).unwrap(), "int lexer;\nint parser2;\n");

    // Clean: everything gone
    let cleaned = build::clean(&cfg).unwrap();
    assert_eq!(cleaned.records_cleared, 3);
    assert!(!p.object("lexer").exists());
    assert!(!p.object("parser").exists());
    assert!(!p.binary().exists());
    assert!(!p.root().join(build::COMPDB_FILE).exists());
    assert!(StateStore::open(&p.root().join(".fab")).snapshot().is_empty());

    // And everything again
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 3);
}

#[test]
fn test_module_flag_change_recompiles_only_that_module() {
    let p = Project::new(&["a", "b"]);
    let before = p.config(r#"{ name = "a", flags = ["-DLEVEL=1"] }, "b""#);
    build::build_project(&before, &opts()).unwrap();

    let after = p.config(r#"{ name = "a", flags = ["-DLEVEL=2"] }, "b""#);
    let report = build::build_project(&after, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed_of(JobKind::Compile), vec!["a"]);
    assert_eq!(
        report.outcome(".obj/a.o").unwrap().reason,
        Some(build::Staleness::CommandChanged)
    );
    // a's artifact fingerprint changed, so the binary is relinked
    assert_eq!(report.executed_of(JobKind::Link).len(), 1);
}

#[test]
fn test_global_flag_change_recompiles_everything() {
    let p = Project::new(&["a", "b"]);
    build::build_project(&p.config(r#""a", "b""#), &opts()).unwrap();

    // The script must stay the first flag; add -O2 after it
    let text = p
        .config_text(r#""a", "b""#, "")
        .replace(r#"fakecc"]"#, r#"fakecc", "-O2"]"#);
    let cfg = BuildConfig::parse(&text, p.root()).unwrap();
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert_eq!(report.executed_of(JobKind::Compile).len(), 2);
}

#[test]
fn test_failure_isolation_and_recovery() {
    let p = Project::new(&["a", "b"]);
    p.write_source("a", "#error broken\n");
    let cfg = p.config(r#""a", "b""#);

    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(!report.success());
    let failed: Vec<&str> = report.failures().map(|o| o.id.as_str()).collect();
    assert_eq!(failed, vec![".obj/a.o"]);
    assert!(matches!(
        report.outcome(".obj/b.o").unwrap().status,
        JobStatus::Succeeded
    ));
    assert!(matches!(
        report.outcome("./llc").unwrap().status,
        JobStatus::Skipped(_)
    ));
    assert!(!p.object("a").exists());
    assert!(!p.binary().exists());

    // Fix a: only a recompiles, then link
    p.write_source("a", "int a;\n");
    p.reset_calls();
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed_of(JobKind::Compile), vec!["a"]);
    assert_eq!(report.executed_of(JobKind::Link).len(), 1);
    assert_eq!(p.calls().iter().filter(|c| c.starts_with("cc")).count(), 1);
}

#[test]
fn test_failed_job_is_retried_without_changes() {
    let p = Project::new(&["a", "b"]);
    p.write_source("a", "#error broken\n");
    let cfg = p.config(r#""a", "b""#);
    build::build_project(&cfg, &opts()).unwrap();

    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(!report.success());
    assert_eq!(report.executed_of(JobKind::Compile), vec!["a"]);
    assert_eq!(
        report.outcome(".obj/a.o").unwrap().reason,
        Some(build::Staleness::PreviousFailure)
    );
}

#[test]
fn test_failed_link_is_retried() {
    let p = Project::new(&["a"]);
    let broken = BuildConfig::parse(
        &p.config_text_with(r#""a""#, "", "fakecc", "brokenld"),
        p.root(),
    )
    .unwrap();

    let report = build::build_project(&broken, &opts()).unwrap();
    assert!(!report.success());
    let link = report.outcome("./llc").unwrap();
    match &link.status {
        JobStatus::Failed(err) => {
            assert!(matches!(err, ExecutionError::LinkFailure { .. }));
            assert!(build::FeedbackAnalyzer::for_error(err).is_some());
        }
        other => panic!("expected link failure, got {:?}", other),
    }

    // Same config again: compile is fresh, the link is attempted again
    let report = build::build_project(&broken, &opts()).unwrap();
    assert_eq!(report.executed_of(JobKind::Compile).len(), 0);
    assert_eq!(report.executed_of(JobKind::Link).len(), 1);

    // Working linker: only the link runs
    let report = build::build_project(&p.config(r#""a""#), &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 1);
}

#[test]
fn test_reordering_and_adding_modules_keeps_compiles_fresh() {
    let p = Project::new(&["a", "b", "c"]);
    build::build_project(&p.config(r#""a", "b""#), &opts()).unwrap();

    let report = build::build_project(&p.config(r#""c", "b", "a""#), &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed_of(JobKind::Compile), vec!["c"]);
    assert_eq!(report.executed_of(JobKind::Link).len(), 1);
    assert_eq!(
        fs::read_to_string(p.binary()).unwrap(),
        "int c;\nint b;\nint a;\n"
    );
}

#[test]
fn test_deleted_artifact_is_rebuilt() {
    let p = Project::new(&["a", "b"]);
    let cfg = p.config(r#""a", "b""#);
    build::build_project(&cfg, &opts()).unwrap();

    fs::remove_file(p.object("b")).unwrap();
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert_eq!(report.executed_of(JobKind::Compile), vec!["b"]);
    assert_eq!(
        report.outcome(".obj/b.o").unwrap().reason,
        Some(build::Staleness::OutputMissing)
    );
    // Same source, same command: the link inputs did not change
    assert_eq!(report.executed_of(JobKind::Link).len(), 0);
}

#[test]
fn test_corrupt_state_forces_full_rebuild() {
    let p = Project::new(&["a", "b"]);
    let cfg = p.config(r#""a", "b""#);
    build::build_project(&cfg, &opts()).unwrap();

    fs::write(p.root().join(".fab").join(STATE_FILE), "\u{0}garbage").unwrap();
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 3);
}

#[test]
fn test_separator_lookalike_modules_get_distinct_artifacts() {
    let p = Project::new(&["a/b", "a_b"]);
    let cfg = p.config(r#""a/b", "a_b""#);
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_ne!(p.object("a/b"), p.object("a_b"));
    assert_eq!(fs::read_to_string(p.object("a/b")).unwrap(), "int a_b;\n");
    assert!(p.object("a_b").exists());
}

#[test]
fn test_missing_source_fails_without_running_compiler() {
    let p = Project::new(&["a"]);
    let cfg = p.config(r#""a", "ghost""#);
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(!report.success());
    match &report.outcome(".obj/ghost.o").unwrap().status {
        JobStatus::Failed(ExecutionError::SourceUnreadable { .. }) => {}
        other => panic!("expected unreadable source, got {:?}", other),
    }
    assert_eq!(p.calls(), vec!["cc compiler/a.c".to_string()]);
    // Only the compile of `a` launched a tool
    assert_eq!(report.executed(), 1);
}

#[test]
fn test_damaged_entry_is_dropped_and_record_rewritten() {
    let p = Project::new(&["a"]);
    let cfg = p.config(r#""a""#);
    build::build_project(&cfg, &opts()).unwrap();

    let state = p.root().join(".fab").join(STATE_FILE);
    let body = fs::read_to_string(&state).unwrap();
    fs::write(&state, body.replacen(r#""jobs": {"#, r#""jobs": { "junk": 42,"#, 1)).unwrap();
    assert_eq!(StateStore::open(&p.root().join(".fab")).warnings().len(), 1);

    // Intact entries keep their jobs fresh; the damaged one is gone for good
    let report = build::build_project(&cfg, &opts()).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 0);
    let reopened = StateStore::open(&p.root().join(".fab"));
    assert!(reopened.warnings().is_empty());
    assert!(reopened.get("junk").is_none());
}

#[test]
fn test_clean_names_modules_that_left_the_list() {
    let p = Project::new(&["a", "old/b"]);
    build::build_project(&p.config(r#""a", "old/b""#), &opts()).unwrap();

    let cfg = p.config(r#""a""#);
    let cleaned = build::clean(&cfg).unwrap();
    assert_eq!(cleaned.orphaned, vec!["old/b".to_string()]);
    assert!(!p.object("old/b").exists());
    assert!(!p.object("a").exists());
}

#[test]
fn test_binary_over_an_object_is_rejected() {
    let p = Project::new(&["a", "b"]);
    let text = p
        .config_text(r#""a", "b""#, r#"out_dir = ".obj""#)
        .replace(r#"name = "llc""#, r#"name = "a.o""#);
    let err = BuildConfig::parse(&text, p.root()).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateArtifact(_)));
}

#[test]
fn test_deadline_fails_hanging_compile() {
    let p = Project::new(&["a"]);
    let cfg = BuildConfig::parse(
        &p.config_text_with(r#""a""#, "", "slowcc", "fakeld"),
        p.root(),
    )
    .unwrap();
    let options = BuildOptions {
        timeout: Some(Duration::from_millis(200)),
        ..opts()
    };
    let report = build::build_project(&cfg, &options).unwrap();
    assert!(!report.success());
    assert!(matches!(
        report.outcome(".obj/a.o").unwrap().status,
        JobStatus::Failed(ExecutionError::TimedOut(_))
    ));
}

#[test]
fn test_cancelled_build_runs_nothing() {
    let p = Project::new(&["a", "b"]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let options = BuildOptions {
        cancel,
        ..opts()
    };
    let report = build::build_project(&p.config(r#""a", "b""#), &options).unwrap();
    assert!(!report.success());
    assert_eq!(report.executed(), 0);
    assert!(p.calls().is_empty());
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| matches!(o.status, JobStatus::Skipped(_)))
    );
}

#[test]
fn test_dry_run_executes_and_records_nothing() {
    let p = Project::new(&["a", "b"]);
    let options = BuildOptions {
        dry_run: true,
        ..opts()
    };
    let report = build::build_project(&p.config(r#""a", "b""#), &options).unwrap();
    assert_eq!(report.executed(), 3);
    assert!(p.calls().is_empty());
    assert!(!p.root().join(".fab").exists());
}

#[test]
fn test_unwritable_output_dir_is_config_error() {
    let p = Project::new(&["a"]);
    fs::write(p.root().join("blocker"), "not a directory").unwrap();
    let text = p.config_text(r#""a""#, r#"obj_dir = "blocker/obj""#);
    let cfg = BuildConfig::parse(&text, p.root()).unwrap();

    let err = build::build_project(&cfg, &opts()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Unwritable { .. })
    ));
    assert!(p.calls().is_empty());
}

#[test]
fn test_single_worker_builds_everything() {
    let p = Project::new(&["a", "b", "c"]);
    let options = BuildOptions {
        jobs: Some(1),
        ..Default::default()
    };
    let report = build::build_project(&p.config(r#""a", "b", "c""#), &options).unwrap();
    assert!(report.success());
    assert_eq!(report.executed(), 4);
    assert!(Path::new(&p.binary()).exists());
}
