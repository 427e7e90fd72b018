//! Configuration loading tests.

use std::io::Write;
use std::time::Duration;

use autoauth::{CaptureMode, EnvConfig, ExpectError, SessionConfig};

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
modifier = "-p 2222 -o LogLevel=Error"

[timeout]
default = 120

[binaries]
scp = "/usr/local/bin/scp"

[env]
LC_ALL = "C"
"#
    )
    .unwrap();

    let config = SessionConfig::from_file(file.path()).unwrap();
    assert_eq!(config.modifier, "-p 2222 -o LogLevel=Error");
    assert_eq!(config.timeout.default, Duration::from_secs(120));
    assert_eq!(config.binaries.scp, "/usr/local/bin/scp");
    assert_eq!(config.binaries.ssh, "/usr/bin/ssh");
    assert_eq!(config.env.get("LC_ALL").map(String::as_str), Some("C"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SessionConfig::from_file(dir.path().join("autoauth.toml")).unwrap_err();
    assert!(matches!(err, ExpectError::IoWithContext { .. }), "{err}");
}

#[test]
fn environment_overrides_file() {
    let mut config = SessionConfig::from_toml_str("modifier = \"-p 2222\"\n[timeout]\ndefault = 30").unwrap();
    let env = EnvConfig::from_vars(
        "AUTOAUTH",
        [
            ("AUTOAUTH_TIMEOUT", "2.5"),
            ("AUTOAUTH_CAPTURE", "discard"),
            ("AUTOAUTH_SSH", "/opt/openssh/bin/ssh"),
            ("HOME", "/root"),
        ],
    );
    env.apply(&mut config).unwrap();

    assert_eq!(config.timeout.default, Duration::from_millis(2500));
    assert_eq!(config.modifier, "-p 2222");
    assert_eq!(config.capture, Some(CaptureMode::Discard));
    assert_eq!(config.binaries.ssh, "/opt/openssh/bin/ssh");
}

#[test]
fn invalid_environment_values_are_rejected() {
    let mut config = SessionConfig::default();
    for (name, value) in [("AUTOAUTH_TIMEOUT", "soon"), ("AUTOAUTH_CAPTURE", "syslog")] {
        let env = EnvConfig::from_vars("AUTOAUTH", [(name, value)]);
        let err = env.apply(&mut config).unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));
        assert!(err.to_string().contains(name));
    }
}
