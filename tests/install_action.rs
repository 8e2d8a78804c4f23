// tests/install_action.rs

mod common;
use crate::common::builders::{relay_with, ConfigFileBuilder};
use crate::common::fake_backend::{Script, ScriptedBackend};
use crate::common::{init_tracing, with_timeout};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bones::classify::{ClassifierPolicy, Outcome, RunFailure};
use bones::config::InstallerSection;
use bones::fs::mock::MockFileSystem;
use bones::fs::{FileSystem, RealFileSystem};
use bones::install::{AddComponentInput, ComponentInstaller, FileSpec, InstallError, InstallFilesInput};
use bones::relay::RelayOptions;

struct Fixture {
    fs: MockFileSystem,
    backend: ScriptedBackend,
    installer: ComponentInstaller,
}

fn settings() -> InstallerSection {
    let cfg = ConfigFileBuilder::new()
        .with_project_dir(Path::new("/proj"))
        .build();
    cfg.installer
}

fn fixture(script: Script) -> Fixture {
    let fs = MockFileSystem::new();
    let backend = ScriptedBackend::new().with_script("npx", script);
    let relay = relay_with(Arc::new(backend.clone()), RelayOptions::default());
    let installer = ComponentInstaller::new(
        Arc::new(fs.clone()),
        relay,
        settings(),
        ClassifierPolicy::installer(),
    );
    Fixture {
        fs,
        backend,
        installer,
    }
}

fn preflight(message: &str) -> Outcome {
    Outcome::Failure(RunFailure::Preflight(message.to_string()))
}

#[tokio::test]
async fn adds_a_component() {
    init_tracing();
    let fx = fixture(Script::new().stdout("✔ Done.\n").exit(0));
    fx.fs.add_file("/proj/components.json", "{}");

    let outcome = with_timeout(fx.installer.add(AddComponentInput::new("button")))
        .await
        .expect("valid input");
    assert_eq!(outcome, Outcome::Success(Some("✔ Done.".to_string())));

    let requests = fx.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].program(), "npx");
    assert_eq!(requests[0].args(), ["shadcn@latest", "add", "button", "--yes"]);
    assert_eq!(requests[0].cwd(), Path::new("/proj"));
    assert!(!requests[0].flags().overwrite);
}

#[tokio::test]
async fn missing_config_fails_before_spawning() {
    init_tracing();
    let fx = fixture(Script::new().exit(0));

    let outcome = with_timeout(fx.installer.add(AddComponentInput::new("button")))
        .await
        .expect("valid input");
    assert_eq!(
        outcome,
        preflight("Configuration is missing. Please run init to create a components.json file.")
    );
    assert!(fx.backend.requests().is_empty());
}

#[tokio::test]
async fn existing_component_needs_overwrite() {
    init_tracing();
    let fx = fixture(Script::new().stderr("overwriting\n").exit(1));
    fx.fs.add_file("/proj/components.json", "{}");
    fx.fs.add_file("/proj/components/ui/card.tsx", "export {}");

    let outcome = with_timeout(fx.installer.add(AddComponentInput::new("card")))
        .await
        .expect("valid input");
    assert_eq!(
        outcome,
        preflight("Component card already exists. Use the overwrite option if you want to replace it.")
    );
    assert!(fx.backend.requests().is_empty());

    // With overwrite the installer runs, and its exit code 1 counts as success.
    let outcome = with_timeout(
        fx.installer
            .add(AddComponentInput::new("card").with_overwrite(true)),
    )
    .await
    .expect("valid input");
    assert!(outcome.is_success(), "{outcome:?}");

    let requests = fx.backend.requests();
    assert_eq!(
        requests[0].args(),
        ["shadcn@latest", "add", "card", "--yes", "--overwrite"]
    );
    assert!(requests[0].flags().overwrite);
}

#[tokio::test]
async fn custom_path_is_checked_and_forwarded() {
    init_tracing();
    let fx = fixture(Script::new().exit(0));
    fx.fs.add_file("/proj/components.json", "{}");
    // Present in the default directory only: not a conflict for a custom path.
    fx.fs.add_file("/proj/components/ui/dialog.tsx", "");

    let input = AddComponentInput::new("dialog").with_path("src/ui");
    let outcome = with_timeout(fx.installer.add(input)).await.expect("valid input");
    assert!(outcome.is_success());
    assert_eq!(
        fx.backend.requests()[0].args(),
        ["shadcn@latest", "add", "dialog", "--yes", "--path", "src/ui"]
    );

    fx.fs.add_file("/proj/src/ui/dialog.tsx", "");
    let input = AddComponentInput::new("dialog").with_path("src/ui");
    let outcome = with_timeout(fx.installer.add(input)).await.expect("valid input");
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn keyword_in_installer_stderr_fails() {
    init_tracing();
    let fx = fixture(Script::new().stderr("Error: button already exists\n").exit(0));
    fx.fs.add_file("/proj/components.json", "{}");

    let outcome = with_timeout(fx.installer.add(AddComponentInput::new("button")))
        .await
        .expect("valid input");
    assert_eq!(
        outcome.failure().map(ToString::to_string),
        Some("button already exists".to_string())
    );
}

#[tokio::test]
async fn invalid_input_is_an_error() {
    init_tracing();
    let fx = fixture(Script::new().exit(0));
    fx.fs.add_file("/proj/components.json", "{}");

    for name in ["", "Button", "-x", "a b", "../evil"] {
        let err = fx
            .installer
            .add(AddComponentInput::new(name))
            .await
            .expect_err("invalid name");
        assert!(err.is_invalid_input(), "{name}: {err}");
    }

    for path in ["/abs", "../up", "a/../../b"] {
        let err = fx
            .installer
            .add(AddComponentInput::new("button").with_path(path))
            .await
            .expect_err("unsafe path");
        assert_eq!(err, InstallError::UnsafePath(path.to_string()));
    }
    assert!(fx.backend.requests().is_empty());
}

#[test]
fn plan_reports_the_command_line() {
    let fx = fixture(Script::new());
    fx.fs.add_file("/proj/components.json", "{}");
    let request = fx
        .installer
        .plan(&AddComponentInput::new("badge").with_overwrite(true))
        .expect("plan");
    assert_eq!(
        request.command_line(),
        "npx shadcn@latest add badge --yes --overwrite"
    );
}

#[test]
fn writes_files_relative_to_the_project() {
    let fx = fixture(Script::new());
    let files = vec![
        FileSpec {
            path: "components/ui/a.tsx".to_string(),
            content: "a".to_string(),
        },
        FileSpec {
            path: "./lib/utils.ts".to_string(),
            content: "u".to_string(),
        },
    ];

    assert_eq!(fx.installer.write_files(&files), Ok(2));
    assert_eq!(
        fx.fs.written(),
        vec![
            PathBuf::from("/proj/components/ui/a.tsx"),
            PathBuf::from("/proj/./lib/utils.ts"),
        ]
    );
    assert_eq!(fx.fs.contents("/proj/components/ui/a.tsx"), Some(b"a".to_vec()));
}

#[test]
fn one_unsafe_path_writes_nothing() {
    let fx = fixture(Script::new());
    let files = vec![
        FileSpec {
            path: "ok.txt".to_string(),
            content: String::new(),
        },
        FileSpec {
            path: "/etc/passwd".to_string(),
            content: String::new(),
        },
    ];
    assert_eq!(
        fx.installer.write_files(&files),
        Err(InstallError::UnsafePath("/etc/passwd".to_string()))
    );
    assert!(fx.fs.written().is_empty());
}

#[test]
fn write_into_a_directory_is_a_write_error() {
    let fx = fixture(Script::new());
    fx.fs.add_dir("/proj/taken");
    let files = vec![FileSpec {
        path: "taken".to_string(),
        content: "x".to_string(),
    }];
    assert!(matches!(
        fx.installer.write_files(&files),
        Err(InstallError::Write(_))
    ));
}

#[test]
fn real_filesystem_creates_parents() {
    let dir = tempfile::tempdir().unwrap();
    let fs = RealFileSystem;
    let target = dir.path().join("deep/nested/file.txt");

    bones::install::files::write_all(
        &fs,
        dir.path(),
        &[FileSpec {
            path: "deep/nested/file.txt".to_string(),
            content: "hello".to_string(),
        }],
    )
    .expect("write");

    assert!(fs.is_file(&target));
    assert_eq!(fs.read_to_string(&target).unwrap(), "hello");
}

#[test]
fn files_input_accepts_both_shapes() {
    let many: InstallFilesInput =
        serde_json::from_str(r#"{"files":[{"path":"a","content":"1"},{"path":"b","content":"2"}]}"#)
            .unwrap();
    assert_eq!(many.into_files().len(), 2);

    let one: InstallFilesInput = serde_json::from_str(r#"{"path":"a","content":"1"}"#).unwrap();
    assert_eq!(
        one.into_files(),
        vec![FileSpec {
            path: "a".to_string(),
            content: "1".to_string(),
        }]
    );
}
