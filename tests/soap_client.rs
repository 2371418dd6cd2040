//! End-to-end tests of the SOAP client and command execution over HTTP.

use std::time::Duration;

use mantis_connect::cli::{execute, Cli};
use mantis_connect::envelope::NAMESPACE;
use mantis_connect::transport::SOAP_PATH;
use mantis_connect::{CallContext, Config, MantisError, SoapClient};

use clap::Parser;
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUE_GET: &str = include_str!("fixtures/issue_get_response.xml");

fn envelope(operation: &str, inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ns1="{}"><SOAP-ENV:Body><ns1:{}Response>{}</ns1:{}Response></SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
        NAMESPACE, operation, inner, operation
    )
}

async fn mount(server: &MockServer, operation: &str, body: String) {
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(body_string_contains(format!("ns1:{}>", operation)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer) {
    mount(
        server,
        "mc_login",
        envelope(
            "mc_login",
            "<return><account_data><id>3</id><name>admin</name><real_name>Ad Min</real_name>\
             </account_data><access_level>90</access_level></return>",
        ),
    )
    .await;
}

fn test_config(server: &MockServer) -> Config {
    Config::new(server.uri(), "admin", "s3cret-pw")
        .unwrap()
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_connect_and_get_issue() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount(&server, "mc_issue_get", ISSUE_GET.to_string()).await;

    let ctx = CallContext::new();
    let client = SoapClient::connect(&test_config(&server), &ctx).await.unwrap();
    assert_eq!(client.user().unwrap().display_name(), "Ad Min");

    let issue = client.issue_get(&ctx, 1000).await.unwrap();
    assert_eq!(issue.id, Some(1000));
    assert_eq!(issue.attachments.len(), 2);
    assert_eq!(issue.notes[1].id, Some(7520));
    assert!(issue.due_date.is_zero());
    assert!(issue.is_monitored_by("v"));
    assert_eq!(issue.last_updated.format(), "2013-08-16T17:39:49+01:00");
}

#[tokio::test]
async fn test_fault_over_http_500() {
    let server = MockServer::start().await;
    let fault = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><SOAP-ENV:Fault><faultcode>Client</faultcode><faultstring>Issue #404 not found.</faultstring></SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(fault))
        .mount(&server)
        .await;

    let client = SoapClient::new(&test_config(&server)).unwrap();
    let err = client.issue_get(&CallContext::new(), 404).await.unwrap_err();
    match err {
        MantisError::Fault { code, message } => {
            assert_eq!(code, "Client");
            assert_eq!(message, "Issue #404 not found.");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(envelope("mc_issue_exists", "<return>true</return>"))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let client = SoapClient::new(&test_config(&server)).unwrap();
    let ctx = CallContext::new();
    let cancel = ctx.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let err = client.issue_exists(&ctx, 1).await.unwrap_err();
    assert!(matches!(err, MantisError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_execute_issue_get_outputs_json() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount(&server, "mc_issue_get", ISSUE_GET.to_string()).await;

    let ctx = CallContext::new();
    let client = SoapClient::connect(&test_config(&server), &ctx).await.unwrap();
    let cli = Cli::try_parse_from(["mantis", "issue", "get", "1000"]).unwrap();

    let output = execute(&cli.command, &client, &ctx).await.unwrap();
    assert_eq!(output["id"], 1000);
    assert_eq!(output["last_updated"], "2013-08-16T17:39:49+01:00");
    assert_eq!(output["monitors"][0]["name"], "v");
}

#[tokio::test]
async fn test_execute_note_add_reports_as_logged_in_user() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount(
        &server,
        "mc_issue_note_add",
        envelope("mc_issue_note_add", "<return>7600</return>"),
    )
    .await;

    let ctx = CallContext::new();
    let client = SoapClient::connect(&test_config(&server), &ctx).await.unwrap();
    let cli = Cli::try_parse_from(["mantis", "note", "add", "1000", "fixed", "in", "r42"]).unwrap();

    let output = execute(&cli.command, &client, &ctx).await.unwrap();
    assert_eq!(output["note_id"], 7600);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests.last().unwrap().body.clone()).unwrap();
    assert!(body.contains("<text>fixed in r42</text>"));
    assert!(body.contains("<name>admin</name>"));
}

#[tokio::test]
async fn test_execute_attach_skips_existing_and_uploads_new() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount(&server, "mc_issue_get", ISSUE_GET.to_string()).await;
    Mock::given(method("POST"))
        .and(body_string_contains("ns1:mc_issue_attachment_add>"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(envelope("mc_issue_attachment_add", "<return>901</return>")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = std::env::temp_dir().join(format!("mantis-attach-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let new_file = dir.join("fresh.txt");
    std::fs::write(&new_file, b"hello mantis").unwrap();

    let ctx = CallContext::new();
    let client = SoapClient::connect(&test_config(&server), &ctx).await.unwrap();
    let cli = Cli::try_parse_from([
        "mantis".to_string(),
        "issue".to_string(),
        "attach".to_string(),
        "1000".to_string(),
        new_file.display().to_string(),
    ])
    .unwrap();

    let output = execute(&cli.command, &client, &ctx).await.unwrap();
    assert_eq!(output[0]["file"], "fresh.txt");
    assert_eq!(output[0]["id"], 901);
    assert_eq!(output[0]["skipped"], false);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests.last().unwrap().body.clone()).unwrap();
    assert!(body.contains("<file_type>text/plain</file_type>"));
    assert!(body.contains("<content>aGVsbG8gbWFudGlz</content>"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_wrong_password_never_appears_in_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("login failed for s3cret-pw"))
        .mount(&server)
        .await;

    let ctx = CallContext::new();
    let err = SoapClient::connect(&test_config(&server), &ctx)
        .await
        .err()
        .unwrap();
    assert!(!err.to_string().contains("s3cret-pw"));
}
