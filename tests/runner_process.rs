// tests/runner_process.rs
//
// Real OS processes through `sh`.
#![cfg(unix)]

mod common;
use crate::common::builders::{relay_with, request, request_in};
use crate::common::{init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bones::classify::{ClassifierPolicy, Outcome, RunFailure};
use bones::exec::{ProcessBackend, ProcessRequest, RealProcessBackend, RequestFlags, RunnerOptions};
use bones::relay::{Relay, RelayOptions, RunStream};
use bones::types::{OutputEvent, RunId};

fn real_relay() -> Relay {
    relay_with(Arc::new(RealProcessBackend::default()), RelayOptions::default())
}

fn sh(script: &str) -> ProcessRequest {
    request("sh", &["-c", script])
}

async fn drain(stream: &mut RunStream) -> Vec<OutputEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

fn joined(events: &[OutputEvent], stderr: bool) -> String {
    events
        .iter()
        .filter_map(|e| match (e, stderr) {
            (OutputEvent::Output { content }, false) => Some(content.as_str()),
            (OutputEvent::Error { content }, true) => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn echo_succeeds_with_last_line() {
    init_tracing();
    let outcome = with_timeout(
        real_relay().collect(sh("echo first; echo second"), ClassifierPolicy::default()),
    )
    .await;
    assert_eq!(outcome, Outcome::Success(Some("second".to_string())));
}

#[tokio::test]
async fn stdout_and_stderr_are_relayed_then_exit() {
    init_tracing();
    let relay = real_relay();
    let mut stream = with_timeout(relay.stream(
        sh("echo out; echo err >&2; exit 3"),
        ClassifierPolicy::default(),
    ))
    .await
    .expect("spawn");

    let events = with_timeout(drain(&mut stream)).await;
    assert_eq!(events.last(), Some(&OutputEvent::exit(3)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(joined(&events, false), "out\n");
    assert_eq!(joined(&events, true), "err\n");

    assert_eq!(
        with_timeout(stream.outcome()).await,
        Outcome::Failure(RunFailure::Runtime {
            code: Some(3),
            message: "err".to_string(),
        })
    );
}

#[tokio::test]
async fn missing_binary_is_a_spawn_failure() {
    init_tracing();
    let relay = real_relay();
    let outcome = with_timeout(relay.collect(
        request("bones-definitely-not-installed", &[]),
        ClassifierPolicy::default(),
    ))
    .await;

    assert_eq!(
        outcome,
        Outcome::Failure(RunFailure::Spawn(
            "failed to start 'bones-definitely-not-installed': program not found".to_string()
        ))
    );
    assert!(relay.table().is_empty());
}

#[tokio::test]
async fn missing_working_directory_is_a_spawn_failure() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let gone = dir.path().join("gone");

    let backend = RealProcessBackend::default();
    let err = with_timeout(backend.spawn(RunId(1), request_in("echo", &["hi"], &gone)))
        .await
        .expect_err("cwd does not exist");
    assert!(err.to_string().contains("does not exist"), "{err}");
}

#[tokio::test]
async fn runs_in_the_requested_directory() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

    let outcome = with_timeout(real_relay().collect(
        request_in("cat", &["marker.txt"], dir.path()),
        ClassifierPolicy::default(),
    ))
    .await;
    assert_eq!(outcome, Outcome::Success(Some("here".to_string())));
}

#[tokio::test]
async fn cancel_kills_a_long_process() {
    init_tracing();
    let relay = real_relay();
    let mut stream = with_timeout(relay.stream(
        sh("echo started; sleep 30; echo never"),
        ClassifierPolicy::default(),
    ))
    .await
    .expect("spawn");

    assert_eq!(
        with_timeout(stream.next()).await,
        Some(OutputEvent::output("started\n"))
    );
    stream.canceller().cancel();

    let rest = with_timeout(drain(&mut stream)).await;
    assert_eq!(rest, vec![OutputEvent::Cancelled]);
    assert_eq!(
        with_timeout(stream.outcome()).await,
        Outcome::Failure(RunFailure::Cancelled)
    );
}

#[tokio::test]
async fn killed_by_signal_has_no_exit_code() {
    init_tracing();
    let mut stream = with_timeout(
        real_relay().stream(sh("kill -9 $$"), ClassifierPolicy::default()),
    )
    .await
    .expect("spawn");

    let events = with_timeout(drain(&mut stream)).await;
    assert_eq!(events.last(), Some(&OutputEvent::Exit { code: None }));
    assert_eq!(
        with_timeout(stream.outcome()).await.failure().map(RunFailure::kind),
        Some("runtime")
    );
}

#[tokio::test]
async fn shell_mode_runs_a_command_line() {
    init_tracing();
    let req = ProcessRequest::new("echo", ["a", "&&", "echo", "b"], Path::new(".")).with_flags(
        RequestFlags {
            overwrite: false,
            shell: true,
        },
    );
    let mut stream = with_timeout(real_relay().stream(req, ClassifierPolicy::default()))
        .await
        .expect("spawn");

    let events = with_timeout(drain(&mut stream)).await;
    assert_eq!(joined(&events, false), "a\nb\n");
    assert_eq!(events.last(), Some(&OutputEvent::exit(0)));
}

#[tokio::test]
async fn arguments_are_not_shell_interpreted_by_default() {
    init_tracing();
    let outcome = with_timeout(
        real_relay().collect(request("echo", &["a", "&&", "echo", "b"]), ClassifierPolicy::default()),
    )
    .await;
    assert_eq!(outcome, Outcome::Success(Some("a && echo b".to_string())));
}

#[tokio::test]
async fn large_output_through_tiny_buffers() {
    init_tracing();
    let backend = RealProcessBackend::new(RunnerOptions {
        buffer_events: 1,
        chunk_bytes: 64,
    });
    let relay = relay_with(
        Arc::new(backend),
        RelayOptions {
            buffer_events: 1,
            capture_limit: 256,
            ..RelayOptions::default()
        },
    );

    let mut stream = tokio::time::timeout(
        Duration::from_secs(20),
        relay.stream(sh("i=0; while [ $i -lt 5000 ]; do echo line$i; i=$((i+1)); done"), ClassifierPolicy::default()),
    )
    .await
    .expect("timed out")
    .expect("spawn");

    let events = tokio::time::timeout(Duration::from_secs(20), drain(&mut stream))
        .await
        .expect("timed out");
    let text = joined(&events, false);
    assert_eq!(text.lines().count(), 5000);
    assert!(text.ends_with("line4999\n"));

    assert_eq!(
        stream.outcome().await,
        Outcome::Success(Some("line4999".to_string()))
    );
}

#[tokio::test]
async fn real_handle_reports_os_pid() {
    init_tracing();
    let backend = RealProcessBackend::default();
    let mut handle = with_timeout(backend.spawn(RunId(7), sh("echo up")))
        .await
        .expect("spawn");

    assert_eq!(handle.id(), RunId(7));
    assert!(handle.pid().is_some_and(|pid| pid > 0));

    let mut events = Vec::new();
    while let Some(event) = with_timeout(handle.next_event()).await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    assert_eq!(events, vec![OutputEvent::output("up\n"), OutputEvent::exit(0)]);
}
