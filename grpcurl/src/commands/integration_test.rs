use crate::cli::Cli;
use crate::output::{HEADERS_MARKER, REQUEST_MARKER, RESPONSE_MARKER, TRAILER_MARKER};
use clap::Parser;
use grpcurl_core::tonic::transport::Server;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;

async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = test_service::routes().expect("Failed to setup Reflection Service");

    tokio::spawn(async move {
        Server::builder()
            .add_routes(routes)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr.to_string()
}

async fn run(args: &[&str], input: &str) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("grpcurl").chain(args.iter().copied()))?;

    let mut out = Vec::new();
    super::run(cli, input.as_bytes(), &mut out).await?;

    Ok(String::from_utf8(out)?)
}

#[derive(Debug, Default)]
struct VerboseOutput {
    request: Vec<String>,
    response: Vec<String>,
    headers: Vec<String>,
    trailer: Vec<String>,
}

fn parse_verbose(text: &str) -> VerboseOutput {
    let mut parsed = VerboseOutput::default();
    let mut current: Option<&str> = None;

    for line in text.lines() {
        if [REQUEST_MARKER, RESPONSE_MARKER, HEADERS_MARKER, TRAILER_MARKER].contains(&line) {
            current = Some(line);
            continue;
        }

        let target = match current {
            Some(REQUEST_MARKER) => &mut parsed.request,
            Some(RESPONSE_MARKER) => &mut parsed.response,
            Some(HEADERS_MARKER) => &mut parsed.headers,
            Some(TRAILER_MARKER) => &mut parsed.trailer,
            _ => panic!("Unexpected line before any marker: {line}"),
        };
        target.push(line.to_string());
    }

    parsed
}

#[tokio::test]
async fn test_list_services() {
    let addr = spawn_server().await;

    let output = run(&["-k", "list_services", &addr], "").await.unwrap();
    let services: Vec<_> = output.lines().collect();

    assert!(services.contains(&"grpcurl.test.Echo"));
    assert!(services.contains(&"grpcurl.test.Everything"));
    assert!(services.contains(&"grpcurl.test.v2.Echo"));
}

#[tokio::test]
async fn test_list_methods() {
    let addr = spawn_server().await;

    let output = run(&["-k", "ls", &addr, "grpcurl.test.Echo"], "")
        .await
        .unwrap();

    assert_eq!(
        output,
        "grpcurl.test.Echo.Echo\n\
         grpcurl.test.Echo.ClientStreamingEcho\n\
         grpcurl.test.Echo.ServerStreamingEcho\n\
         grpcurl.test.Echo.BidiStreamingBulkEcho\n"
    );
}

#[tokio::test]
async fn test_list_methods_long() {
    let addr = spawn_server().await;

    let output = run(&["-k", "ls", "-l", &addr, "grpcurl.test.Echo"], "")
        .await
        .unwrap();

    assert_eq!(
        output,
        "grpcurl.test.Echo.Echo(grpcurl.test.EchoMessage) return (grpcurl.test.EchoMessage)\n\
         grpcurl.test.Echo.ClientStreamingEcho(streaming grpcurl.test.EchoMessage) return (grpcurl.test.EchoMessage)\n\
         grpcurl.test.Echo.ServerStreamingEcho(grpcurl.test.EchoMessage) return (streaming grpcurl.test.EchoMessage)\n\
         grpcurl.test.Echo.BidiStreamingBulkEcho(streaming grpcurl.test.EchoMessage) return (streaming grpcurl.test.EchoMessage)\n"
    );
}

#[tokio::test]
async fn test_list_unknown_service() {
    let addr = spawn_server().await;

    let result = run(&["-k", "ls", &addr, "grpcurl.test.Ghost"], "").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_call() {
    let addr = spawn_server().await;

    let output = run(
        &["-k", "call", &addr, "grpcurl.test.Echo.Echo"],
        r#"{"value":"xxx"}"#,
    )
    .await
    .unwrap();

    assert_eq!(output, "{\"value\":\"xxx\",\"error_code\":0}\n");
}

#[tokio::test]
async fn test_call_error_status_succeeds() {
    let addr = spawn_server().await;

    let output = run(
        &["-k", "call", &addr, "grpcurl.test.Echo.Echo"],
        r#"{"value":"xxx","error_code":5}"#,
    )
    .await
    .unwrap();

    let status: serde_json::Value = serde_json::from_str(output.trim_end()).unwrap();
    assert_eq!(status["code"], 5);
    assert_eq!(status["message"], "error msg: xxx");
    assert_eq!(status["details"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_call_verbose() {
    let addr = spawn_server().await;

    let output = run(
        &[
            "-k",
            "-v",
            "call",
            &addr,
            "grpcurl.test.Echo.Echo",
            "-H",
            "x-user: alice",
            "-H",
            "not-a-header",
        ],
        r#"{"value":"xxx"}"#,
    )
    .await
    .unwrap();

    let parsed = parse_verbose(&output);

    assert_eq!(parsed.request, [r#"{"value":"xxx","error_code":0}"#]);
    assert_eq!(parsed.response, [r#"{"value":"xxx","error_code":0}"#]);
    assert!(parsed.headers.contains(&"x-user: alice".to_string()));
    assert!(!parsed.headers.iter().any(|h| h.starts_with("not-a-header")));
    assert!(parsed.trailer.iter().all(|line| line.contains(": ")));
}

#[tokio::test]
async fn test_call_rejects_bad_input() {
    let addr = spawn_server().await;

    let result = run(&["-k", "call", &addr, "grpcurl.test.Echo.Echo"], "{").await;
    assert!(result.is_err());

    let result = run(
        &["-k", "call", &addr, "grpcurl.test.Everything.Enums"],
        r#"{"numeric_enum_value":"THREE"}"#,
    )
    .await;
    assert!(result.is_err());

    let result = run(&["-k", "call", &addr, "Echo"], "{}").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_call_streaming_method_is_rejected() {
    let addr = spawn_server().await;

    let result = run(
        &["-k", "call", &addr, "grpcurl.test.Echo.ServerStreamingEcho"],
        "{}",
    )
    .await;

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("grpcurl.test.Echo.ServerStreamingEcho"));
}

#[tokio::test]
async fn test_unreachable_server() {
    let result = run(
        &[
            "-k",
            "--connect-timeout",
            "5",
            "call",
            "127.0.0.1:1",
            "grpcurl.test.Echo.Echo",
        ],
        "{}",
    )
    .await;

    assert!(result.is_err());
}
