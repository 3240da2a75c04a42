//! CLI integration tests
use httpmock::{Method::GET, MockServer};
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rolodex");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn serve_fixture<'a>(server: &'a MockServer, path: &str, fixture: &str) -> httpmock::Mock<'a> {
    let body = std::fs::read_to_string(get_fixture_path(fixture)).unwrap();
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200).header("content-type", "text/html").body(&body);
    })
}

fn read_csv(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
    reader
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_cli_scrapes_to_csv() {
    let server = MockServer::start();
    let mock = serve_fixture(&server, "/directory", "listing.html");
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("leads.csv");

    cmd()
        .args([server.url("/directory").as_str(), "-o", output.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved 4 records"))
        .stderr(predicate::str::contains("1 empty card(s) skipped"));

    mock.assert();
    assert_eq!(
        read_csv(&output),
        vec![
            vec!["name", "email"],
            vec!["Acme Plumbing", "info@acme-plumbing.example"],
            vec!["Beta Bakery", ""],
            vec!["Gamma Garage", "service@gamma-garage.example"],
            vec!["", "sales@delta.example"],
        ]
    );
}

#[test]
fn test_cli_default_output_path() {
    let server = MockServer::start();
    serve_fixture(&server, "/directory", "listing.html");
    let tmp = TempDir::new().unwrap();

    cmd().current_dir(tmp.path()).arg(server.url("/directory")).assert().success();

    assert!(tmp.path().join("marketing_list.csv").exists());
}

#[test]
fn test_cli_json_to_stdout() {
    let server = MockServer::start();
    serve_fixture(&server, "/old", "malformed.html");

    let assert = cmd()
        .args([server.url("/old").as_str(), "--format", "json", "--output", "-"])
        .assert()
        .success();

    let value: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(value[0]["name"], "Zeta Zoo");
    assert_eq!(value[1]["email"], "eta@sons.example");
}

#[test]
fn test_cli_extension_follows_format() {
    let server = MockServer::start();
    serve_fixture(&server, "/directory", "listing.html");
    let tmp = TempDir::new().unwrap();

    cmd()
        .args([server.url("/directory").as_str(), "-f", "json", "-o", tmp.path().join("out.txt").to_str().unwrap()])
        .assert()
        .success();

    assert!(tmp.path().join("out.json").exists());
    assert!(!tmp.path().join("out.txt").exists());
}

#[test]
fn test_cli_custom_selectors_and_fields() {
    let server = MockServer::start();
    serve_fixture(&server, "/vcards", "no_cards.html");

    cmd()
        .args([
            server.url("/vcards").as_str(),
            "--card-selector",
            "li.vcard",
            "--name-selector",
            "h3.fn",
            "--email-selector",
            "a.email",
            "--field",
            "profile=a.email@href",
            "-o",
            "-",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("name,email,profile\n"))
        .stdout(predicate::str::contains(
            "Acme Plumbing,info@acme-plumbing.example,mailto:info@acme-plumbing.example?subject=Hello",
        ))
        .stdout(predicate::str::contains("Beta Bakery,,\n"));
}

#[test]
fn test_cli_missing_value_placeholder() {
    let server = MockServer::start();
    serve_fixture(&server, "/directory", "listing.html");

    cmd()
        .args([server.url("/directory").as_str(), "--missing-value", "N/A", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Beta Bakery,N/A\n"))
        .stdout(predicate::str::contains("N/A,sales@delta.example\n"));
}

#[test]
fn test_cli_no_cards_writes_nothing() {
    let server = MockServer::start();
    serve_fixture(&server, "/vcards", "no_cards.html");
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("out.csv");

    cmd()
        .args([server.url("/vcards").as_str(), "-o", output.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("No cards matched"))
        .stderr(predicate::str::contains("No data found"));

    assert!(!output.exists());
}

#[test]
fn test_cli_not_found_exits_with_fetch_code() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/gone");
        then.status(404);
    });
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("out.csv");

    cmd()
        .args([server.url("/gone").as_str(), "-o", output.to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("404"));

    mock.assert_calls(1);
    assert!(!output.exists());
}

#[test]
fn test_cli_retries_are_bounded() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/busy");
        then.status(503);
    });

    cmd()
        .args([server.url("/busy").as_str(), "--retries", "1", "--backoff", "0.01", "-o", "-"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("503"));

    mock.assert_calls(2);
}

#[test]
fn test_cli_invalid_url() {
    cmd()
        .args(["not a url", "-o", "-"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid URL"));
}

#[test]
fn test_cli_invalid_selector_fails_before_fetching() {
    let server = MockServer::start();
    let mock = serve_fixture(&server, "/directory", "listing.html");

    cmd()
        .args([server.url("/directory").as_str(), "--email-selector", "span[[", "-o", "-"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("email"));

    mock.assert_calls(0);
}

#[test]
fn test_cli_output_failure_exit_code() {
    let server = MockServer::start();
    serve_fixture(&server, "/directory", "listing.html");
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    cmd()
        .args([server.url("/directory").as_str(), "-o", blocker.join("out.csv").to_str().unwrap()])
        .assert()
        .code(3);
}

#[test]
fn test_cli_multiple_urls_are_concatenated() {
    let server = MockServer::start();
    serve_fixture(&server, "/page1", "listing.html");
    serve_fixture(&server, "/page2", "malformed.html");

    let assert = cmd()
        .args([server.url("/page1").as_str(), &server.url("/page2"), "-o", "-"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "name,email");
    assert_eq!(lines[6], "Eta & Sons,eta@sons.example");
}

#[test]
fn test_cli_requires_url() {
    cmd().assert().code(2).stderr(predicate::str::contains("URL"));
}

#[test]
fn test_cli_rejects_zero_timeout() {
    cmd().args(["https://example.com", "--timeout", "0"]).assert().code(2);
}

#[test]
fn test_cli_rejects_unknown_format() {
    cmd()
        .args(["https://example.com", "--format", "xml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Valid options"));
}

#[test]
fn test_cli_verbose() {
    let server = MockServer::start();
    serve_fixture(&server, "/directory", "listing.html");

    cmd()
        .args(["-v", &server.url("/directory"), "-o", "-"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Rolodex"))
        .stderr(predicate::str::contains("Attempts"))
        .stderr(predicate::str::contains("Columns"));
}

#[test]
fn test_cli_quiet() {
    let server = MockServer::start();
    serve_fixture(&server, "/directory", "listing.html");

    cmd()
        .args(["-q", &server.url("/directory"), "-o", "-"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_cli_version() {
    cmd().arg("--version").assert().success().stdout(predicate::str::contains("rolodex"));
}
