//! Tests for the authentication automaton against scripted processes.

use std::time::Duration;

use autoauth::mock::{Script, ScriptProbe, ScriptedProcess};
use autoauth::{
    AuthOptions, EOF_EXIT_CODE, FailureKind, OutputSink, Pattern, ProcessExitStatus, ProcessHandle, TIMEOUT_EXIT_CODE,
    authenticate,
};

const SHORT: Duration = Duration::from_millis(50);

fn handle(script: Script) -> (ProcessHandle<ScriptedProcess>, ScriptProbe) {
    let (process, probe) = script.build();
    let argv = vec![
        "/usr/bin/ssh".to_string(),
        "backup@10.0.0.5".to_string(),
        "tar czf /tmp/etc.tgz /etc".to_string(),
    ];
    (ProcessHandle::new(process, argv, None, OutputSink::Discard), probe)
}

fn with_secret() -> AuthOptions {
    AuthOptions::new().secret("hunter2").password_mandatory(true)
}

/// Test a plain password exchange followed by a clean exit.
#[tokio::test]
async fn password_then_clean_exit() {
    let (mut handle, probe) = handle(
        Script::new()
            .output("backup@10.0.0.5's password: ")
            .await_line()
            .output("\r\ntar: Removing leading `/' from member names\r\n")
            .eof()
            .exit(0),
    );

    let verdict = authenticate(&mut handle, &with_secret()).await.unwrap();
    assert!(verdict.is_success());
    assert_eq!(verdict.exit_code(), 0);
    assert_eq!(probe.sent_lines(), vec!["hunter2"]);
    assert!(!handle.is_alive());
}

/// Test that an unknown host key is accepted before the password is sent.
#[tokio::test]
async fn host_key_confirmation_precedes_password() {
    let (mut handle, probe) = handle(
        Script::new()
            .output("The authenticity of host '10.0.0.5' can't be established.\r\n")
            .output("Are you sure you want to continue connecting (yes/no/[fingerprint])? ")
            .await_line()
            .output("Warning: Permanently added '10.0.0.5' to the list of known hosts.\r\n")
            .output("Password: ")
            .await_line()
            .eof()
            .exit(0),
    );

    let verdict = authenticate(&mut handle, &with_secret()).await.unwrap();
    assert!(verdict.is_success());
    assert_eq!(probe.sent_lines(), vec!["yes", "hunter2"]);
}

/// Test that the secret is sent exactly once even with other prompts answered first.
#[tokio::test]
async fn secret_sent_exactly_once() {
    let (mut handle, probe) = handle(
        Script::new()
            .output("Are you sure you want to continue connecting (yes/no)? ")
            .await_line()
            .output("Terminal type? ")
            .await_line()
            .output("Password: ")
            .await_line()
            .output("done\r\n")
            .eof()
            .exit(0),
    );

    let options = with_secret().command(Pattern::literal("Terminal type?"), "vt100");
    let verdict = authenticate(&mut handle, &options).await.unwrap();
    assert!(verdict.is_success());

    let sent = probe.sent_lines();
    assert_eq!(sent, vec!["yes", "vt100", "hunter2"]);
    assert_eq!(sent.iter().filter(|line| *line == "hunter2").count(), 1);
}

/// Test that a second password prompt and a failing exit are reported as a bad credential.
#[tokio::test]
async fn repeated_prompt_is_invalid_credential() {
    let (mut handle, probe) = handle(
        Script::new()
            .output("Password: ")
            .await_line()
            .output("\r\nPermission denied, please try again.\r\nPassword: ")
            .exit(255),
    );

    let verdict = authenticate(&mut handle, &with_secret().timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::InvalidCredential);
    assert_eq!(failure.exit_code(), 255);
    assert!(failure.secret_offered());
    assert_eq!(probe.sent_lines(), vec!["hunter2"]);
    assert_eq!(probe.terminate_calls(), 1);
}

/// Test that a repeated prompt does not matter when the process still succeeds.
#[tokio::test]
async fn repeated_prompt_with_success_exit_is_success() {
    let (mut handle, probe) = handle(
        Script::new()
            .output("Password: ")
            .await_line()
            .output("\r\nPassword: ")
            .exit(0),
    );

    let verdict = authenticate(&mut handle, &with_secret()).await.unwrap();
    assert!(verdict.is_success());
    assert_eq!(probe.sent_lines(), vec!["hunter2"]);
}

/// Test that a run needing no password succeeds when the password is optional.
#[tokio::test]
async fn optional_password_eof_with_success() {
    let (mut handle, probe) = handle(Script::new().output("nothing to do\r\n").eof().exit(0));

    let options = AuthOptions::new().secret("hunter2").password_mandatory(false);
    let verdict = authenticate(&mut handle, &options).await.unwrap();
    assert!(verdict.is_success());
    assert!(probe.sent_lines().is_empty());
    assert_eq!(probe.terminate_calls(), 1);
}

/// Test that an optional-password run still reports its failing exit status.
#[tokio::test]
async fn optional_password_eof_with_failure() {
    let (mut handle, _) = handle(Script::new().output("tar: /etc: Cannot open\r\n").eof().exit(2));

    let options = AuthOptions::new()
        .secret("hunter2")
        .password_mandatory(false)
        .failure_message("backup failed");
    let verdict = authenticate(&mut handle, &options).await.unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::CommandFailed);
    assert_eq!(failure.message(), "backup failed");
    assert_eq!(failure.exit_code(), 2);
    assert!(!failure.secret_offered());
    assert!(failure.transcript().contains("Cannot open"));
}

/// Test that a mandatory password with no prompt fails with the end-of-stream code.
#[tokio::test]
async fn mandatory_password_eof_fails() {
    let (mut handle, probe) = handle(Script::new().output("Welcome\r\n").eof().exit(0));

    let verdict = authenticate(&mut handle, &with_secret()).await.unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::HandshakeFailed);
    assert_eq!(failure.exit_code(), EOF_EXIT_CODE);
    assert!(!failure.secret_offered());
    assert!(failure.transcript().contains("Welcome"));
    assert_eq!(probe.terminate_calls(), 1);
}

/// Test that silence before any prompt fails with the timeout code and closes the process.
#[tokio::test]
async fn idle_before_prompt_times_out() {
    let (mut handle, probe) = handle(Script::new().output("Connecting to 10.0.0.5...\r\n"));

    let verdict = authenticate(&mut handle, &with_secret().timeout(SHORT)).await.unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::HandshakeFailed);
    assert_eq!(failure.exit_code(), TIMEOUT_EXIT_CODE);
    assert!(probe.sent_lines().is_empty());
    assert_eq!(probe.terminate_calls(), 1);
    assert!(probe.is_closed());
    assert!(!handle.is_alive());
}

/// Test that silence after the secret is sent is reported as a timeout with the hang-up status.
#[tokio::test]
async fn idle_after_secret_times_out() {
    let (mut handle, probe) = handle(
        Script::new()
            .output("Password: ")
            .await_line()
            .output("Last login: Mon Oct 12 09:14:02 2026\r\n"),
    );

    let verdict = authenticate(&mut handle, &with_secret().timeout(SHORT)).await.unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::Timeout);
    assert_eq!(failure.signal(), Some(1));
    assert_eq!(failure.exit_code(), ProcessExitStatus::Signaled(1).exit_code());
    assert!(failure.secret_offered());
    assert_eq!(probe.sent_lines(), vec!["hunter2"]);
    assert_eq!(probe.terminate_calls(), 1);
}

/// Test that a caller exit-code pattern stops the run before the password is sent.
#[tokio::test]
async fn exit_code_pattern_before_prompt() {
    let (mut handle, probe) = handle(Script::new().output("Permission denied\r\nPassword: "));

    let options = with_secret()
        .exit_code(Pattern::literal("Permission denied"), 42)
        .failure_message("backup host refused the login");
    let verdict = authenticate(&mut handle, &options).await.unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::HandshakeFailed);
    assert_eq!(failure.exit_code(), 42);
    assert_eq!(failure.message(), "backup host refused the login");
    assert_eq!(verdict.exit_code(), 42);
    assert!(!failure.secret_offered());
    assert_eq!(failure.secret(), Some("hunter2"));
    assert!(probe.sent_lines().is_empty());
    assert_eq!(probe.terminate_calls(), 1);
}

/// Test that patterns starting at the same offset resolve to the earlier entry.
#[tokio::test]
async fn equal_start_prefers_earlier_entry() {
    let (mut handle, _) = handle(Script::new().output("Permission denied (publickey).\r\n"));

    let options = with_secret()
        .exit_code(Pattern::literal("Permission"), 41)
        .exit_code(Pattern::literal("Permission denied"), 42);
    let verdict = authenticate(&mut handle, &options).await.unwrap();
    assert_eq!(verdict.exit_code(), 41);
}

/// Test that a prompt with no configured secret fails without writing anything.
#[tokio::test]
async fn prompt_without_secret_fails() {
    let (mut handle, probe) = handle(Script::new().output("Password: "));

    let verdict = authenticate(&mut handle, &AuthOptions::new().password_mandatory(true))
        .await
        .unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::HandshakeFailed);
    assert_eq!(failure.exit_code(), 1);
    assert!(probe.sent_lines().is_empty());
}

/// Test that a write failing midway still closes the process exactly once.
#[tokio::test]
async fn failed_send_closes_once() {
    let (mut handle, probe) = handle(Script::new().output("Password: ").fail_writes());

    let err = authenticate(&mut handle, &with_secret()).await.unwrap_err();
    assert!(!err.is_failure());
    assert_eq!(probe.terminate_calls(), 1);

    handle.close().await.unwrap();
    assert_eq!(probe.terminate_calls(), 1);
}

/// Test that the failure never shows the secret in text or JSON form.
#[tokio::test]
async fn failure_output_hides_secret() {
    let (mut handle, _) = handle(
        Script::new()
            .output("Password: ")
            .await_line()
            .output("\r\nPermission denied, please try again.\r\nPassword: ")
            .exit(255),
    );

    let verdict = authenticate(&mut handle, &with_secret()).await.unwrap();
    let failure = verdict.failure().unwrap();
    assert_eq!(failure.secret(), Some("hunter2"));

    let text = failure.to_string();
    assert!(text.contains("/usr/bin/ssh"));
    assert!(!text.contains("hunter2"));

    let json = failure.to_json().unwrap();
    assert!(json.contains("invalid_credential"));
    assert!(!json.contains("hunter2"));
}

/// Test that the converted result carries the failure exit code.
#[tokio::test]
async fn verdict_into_result() {
    let (mut handle, _) = handle(Script::new().output("Password: ").await_line().eof().exit(5));

    let err = authenticate(&mut handle, &with_secret())
        .await
        .unwrap()
        .into_result()
        .unwrap_err();
    assert!(err.is_failure());
    assert_eq!(err.exit_code(), 5);
}
