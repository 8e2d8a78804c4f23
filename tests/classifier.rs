// tests/classifier.rs

use bones::classify::{
    classify, normalize_message, ActionResult, ClassifierPolicy, KeywordRule, Outcome, PolicySet,
    RunFailure,
};
use bones::exec::RequestFlags;
use proptest::prelude::*;

fn plain() -> RequestFlags {
    RequestFlags::default()
}

fn overwrite() -> RequestFlags {
    RequestFlags {
        overwrite: true,
        shell: false,
    }
}

#[test]
fn exit_zero_is_success_with_last_stdout_line() {
    let out = classify(
        Some(0),
        "Checking registry.\nInstalled button\n\n",
        "",
        plain(),
        &ClassifierPolicy::exit_code_only(),
    );
    assert_eq!(out, Outcome::Success(Some("Installed button".to_string())));
}

#[test]
fn silent_success_has_no_message() {
    let out = classify(Some(0), "", "", plain(), &ClassifierPolicy::exit_code_only());
    assert_eq!(out, Outcome::Success(None));
}

#[test]
fn nonzero_exit_uses_normalized_stderr() {
    let out = classify(
        Some(2),
        "",
        "\x1b[31mError: error: something broke\x1b[0m\n\n  details here\n",
        plain(),
        &ClassifierPolicy::exit_code_only(),
    );
    assert_eq!(
        out,
        Outcome::Failure(RunFailure::Runtime {
            code: Some(2),
            message: "something broke details here".to_string(),
        })
    );
}

#[test]
fn nonzero_exit_without_stderr_reports_code() {
    let out = classify(Some(7), "partial", "", plain(), &ClassifierPolicy::exit_code_only());
    let failure = out.failure().expect("should fail").clone();
    assert_eq!(failure.to_string(), "process exited with code 7");
    assert_eq!(failure.kind(), "runtime");
}

#[test]
fn signal_exit_is_failure() {
    let out = classify(None, "", "", plain(), &ClassifierPolicy::exit_code_only());
    assert_eq!(
        out,
        Outcome::Failure(RunFailure::Runtime {
            code: None,
            message: "process was terminated by a signal".to_string(),
        })
    );
}

#[test]
fn sentinel_requires_overwrite_flag() {
    let policy = ClassifierPolicy::exit_code_only().with_sentinel(Some(1));
    assert!(classify(Some(1), "", "", overwrite(), &policy).is_success());
    assert!(!classify(Some(1), "", "", plain(), &policy).is_success());
    // Other codes are not covered by the override.
    assert!(!classify(Some(2), "", "", overwrite(), &policy).is_success());
}

#[test]
fn keyword_beats_zero_exit() {
    let out = classify(
        Some(0),
        "done",
        "warning: ok\nError: button ALREADY EXISTS\n",
        plain(),
        &ClassifierPolicy::installer(),
    );
    assert_eq!(
        out,
        Outcome::Failure(RunFailure::Keyword {
            keyword: "already exists".to_string(),
            context: "button ALREADY EXISTS".to_string(),
        })
    );
}

#[test]
fn overwrite_sentinel_wins_over_conflict_keyword() {
    let out = classify(
        Some(1),
        "",
        "Error: button already exists",
        overwrite(),
        &ClassifierPolicy::installer(),
    );
    assert!(out.is_success(), "got {out:?}");
}

#[test]
fn conflict_keyword_fails_without_overwrite() {
    let out = classify(
        Some(1),
        "",
        "Error: button already exists",
        plain(),
        &ClassifierPolicy::installer(),
    );
    assert_eq!(
        out,
        Outcome::Failure(RunFailure::Keyword {
            keyword: "already exists".to_string(),
            context: "button already exists".to_string(),
        })
    );
}

#[test]
fn keyword_still_fails_other_codes_under_overwrite() {
    let out = classify(
        Some(2),
        "",
        "Error: button already exists",
        overwrite(),
        &ClassifierPolicy::installer(),
    );
    assert_eq!(out.failure().map(RunFailure::kind), Some("keyword"));
}

#[test]
fn benign_phrase_suppresses_only_its_own_line() {
    let rule = KeywordRule::new(["error"], ["0 errors"]);
    let policy = ClassifierPolicy::exit_code_only().with_keywords(rule);

    let clean = classify(Some(0), "", "compiled with 0 errors\n", plain(), &policy);
    assert!(clean.is_success());

    let dirty = classify(
        Some(0),
        "",
        "compiled with 0 errors\nlinker error: missing symbol\n",
        plain(),
        &policy,
    );
    assert_eq!(
        dirty,
        Outcome::Failure(RunFailure::Keyword {
            keyword: "error".to_string(),
            context: "linker error: missing symbol".to_string(),
        })
    );
}

#[test]
fn keyword_listed_as_benign_is_disabled() {
    let rule = KeywordRule::new(["fatal"], ["FATAL"]);
    let policy = ClassifierPolicy::exit_code_only().with_keywords(rule);
    assert!(classify(Some(0), "", "fatal: nope", plain(), &policy).is_success());
}

#[test]
fn keyword_scan_ignores_stdout() {
    let out = classify(
        Some(0),
        "file already exists, skipping",
        "",
        plain(),
        &ClassifierPolicy::installer(),
    );
    assert!(out.is_success());
}

#[test]
fn default_policy_does_not_scan_for_error_words() {
    let out = classify(
        Some(0),
        "",
        "error: this is just a log line",
        plain(),
        &ClassifierPolicy::exit_code_only(),
    );
    assert!(out.is_success());
}

#[test]
fn normalize_strips_prefixes_and_escapes() {
    assert_eq!(normalize_message("ERROR: Error:  boom"), "boom");
    assert_eq!(normalize_message("\x1b[1;31merror:\x1b[0m red"), "red");
    assert_eq!(normalize_message("\n\n  \n"), "");
    assert_eq!(normalize_message("one\r\ntwo\n"), "one two");
    // Only a leading prefix is stripped.
    assert_eq!(normalize_message("parse error: bad"), "parse error: bad");
}

#[test]
fn cancelled_failure_displays_as_cancelled() {
    assert_eq!(RunFailure::Cancelled.to_string(), "cancelled");
    let result = ActionResult::from(Outcome::Failure(RunFailure::Cancelled));
    assert_eq!(result, ActionResult::failed("cancelled"));
}

#[test]
fn action_result_json_shape() {
    let ok = serde_json::to_value(ActionResult::ok()).unwrap();
    assert_eq!(ok, serde_json::json!({ "success": true }));

    let failed = serde_json::to_value(ActionResult::failed("nope")).unwrap();
    assert_eq!(failed, serde_json::json!({ "success": false, "error": "nope" }));
}

#[test]
fn policy_set_resolution() {
    let set = PolicySet::default();
    assert_eq!(set.resolve(None), Some(ClassifierPolicy::exit_code_only()));
    assert_eq!(set.resolve(Some("installer")), Some(ClassifierPolicy::installer()));
    assert_eq!(set.resolve(Some("nope")), None);
    assert_eq!(set.names().collect::<Vec<_>>(), vec!["default", "installer"]);
}

fn random_case(word: &str, mask: &[bool]) -> String {
    word.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| {
            if *upper {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn zero_exit_without_keywords_always_succeeds(stdout in ".*", stderr in ".*") {
        let out = classify(Some(0), &stdout, &stderr, plain(), &ClassifierPolicy::exit_code_only());
        prop_assert!(out.is_success());
    }

    #[test]
    fn sentinel_under_overwrite_always_succeeds(
        sentinel in 1i32..=255,
        stdout in ".*",
        stderr in "[a-z .:]{0,60}",
    ) {
        let policy = ClassifierPolicy::exit_code_only().with_sentinel(Some(sentinel));
        let out = classify(Some(sentinel), &stdout, &stderr, overwrite(), &policy);
        prop_assert!(out.is_success());
    }

    #[test]
    fn keyword_fails_regardless_of_exit_code(
        code in proptest::option::of(any::<i32>()),
        prefix in "[a-z ]{0,20}",
        suffix in "[a-z ]{0,20}",
        mask in proptest::collection::vec(any::<bool>(), 1..8),
        overwrite_flag in any::<bool>(),
    ) {
        let keyword = random_case("already exists", &mask);
        let stderr = format!("{prefix}{keyword}{suffix}");
        let flags = RequestFlags { overwrite: overwrite_flag, shell: false };

        let policy = ClassifierPolicy::installer();
        prop_assume!(!(overwrite_flag && code.is_some() && code == policy.overwrite_sentinel));

        let out = classify(code, "", &stderr, flags, &policy);
        prop_assert_eq!(out.failure().map(RunFailure::kind), Some("keyword"));
    }

    #[test]
    fn benign_keyword_never_triggers(
        prefix in "[a-z ]{0,20}",
        mask in proptest::collection::vec(any::<bool>(), 1..8),
    ) {
        let keyword = random_case("already exists", &mask);
        let stderr = format!("{prefix}{keyword}");
        let rule = KeywordRule::new(["already exists"], ["already exists"]);
        let policy = ClassifierPolicy::exit_code_only().with_keywords(rule);

        let out = classify(Some(0), "", &stderr, plain(), &policy);
        prop_assert!(out.is_success());
    }
}
