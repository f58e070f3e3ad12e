//! Loading configuration files from disk.

use std::io::Write;
use std::path::Path;

use restcore::config::{load_config, ConfigError};
use restcore::HttpServer;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_round_trip_into_server() {
    let file = write_config(
        r#"
[listener]
bind_address = "127.0.0.1:0"

[security]
token_url = "https://auth.example.com/api"
service_name = "tokens"

[jwt]
secret = "hello"
algorithms = ["HS256", "HS512"]
authorize = true

[limits]
max_body_bytes = 4096

[timeouts]
request_secs = 5
shutdown_grace_secs = 1

[observability]
log_level = "debug"
json_logs = true

[heartbeat]
enabled = true
interval_secs = 2
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.security.service_name, "tokens");
    assert_eq!(config.jwt.as_ref().unwrap().algorithms, vec!["HS256", "HS512"]);
    assert_eq!(config.limits.max_body_bytes, 4096);
    assert!(config.observability.json_logs);
    assert!(config.heartbeat.enabled);

    let server = HttpServer::builder(config).build().unwrap();
    let services = server.router().services();
    assert_eq!(services.names(), vec!["tokens", "jwt"]);
    assert!(services.is_auth("tokens"));
    assert!(services.is_auth("jwt"));
}

#[test]
fn test_invalid_file_reports_every_problem() {
    let file = write_config(
        r#"
[listener]
bind_address = "not-an-address"

[jwt]
secret = ""
algorithms = ["none"]
"#,
    );

    match load_config(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
            assert_eq!(fields, vec!["listener.bind_address", "jwt.secret", "jwt.algorithms"]);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file_and_bad_toml() {
    assert!(matches!(
        load_config(Path::new("/definitely/not/here.toml")),
        Err(ConfigError::Io(_))
    ));

    let file = write_config("[timeouts]\nrequest_secs = \"soon\"\n");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
}
