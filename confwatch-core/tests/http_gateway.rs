//! HTTP mapping tests against a canned single-connection responder.
//!
//! Each test binds an ephemeral port, serves exactly one response, and hands
//! the raw request (request line + body) back for assertions.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use confwatch_core::{
    ConfigSnapshot, CreateOutcome, GatewayError, HttpGateway, NamespaceId, PageQuery,
    PublishRequest, RegistryGateway, SearchMode, WatchKey,
};

struct Captured {
    request_line: String,
    body: String,
}

fn serve_once(status: u16, body: &'static str) -> (HttpGateway, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("request line");

        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).expect("header");
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("content-length");
                }
            }
        }
        let mut raw_body = vec![0u8; content_length];
        reader.read_exact(&mut raw_body).expect("body");

        let mut stream = stream;
        let response = format!(
            "HTTP/1.1 {status} X\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write response");
        stream.flush().expect("flush");

        Captured {
            request_line: request_line.trim_end().to_string(),
            body: String::from_utf8(raw_body).expect("utf8 body"),
        }
    });
    let gateway = HttpGateway::new(&format!("http://{addr}"), Duration::from_secs(5));
    (gateway, handle)
}

fn key() -> WatchKey {
    WatchKey::new("t1", "G", "D")
}

#[test]
fn get_config_requests_detail_and_parses_json() {
    let (gateway, server) = serve_once(200, r#"{"dataId":"D","group":"G","content":"k=v1"}"#);
    let snapshot = gateway.get_config(&key()).expect("get");
    let captured = server.join().expect("server");

    assert!(captured.request_line.starts_with("GET /nacos/v1/cs/configs?"));
    assert!(captured.request_line.contains("dataId=D"));
    assert!(captured.request_line.contains("group=G"));
    assert!(captured.request_line.contains("tenant=t1"));
    assert!(captured.request_line.contains("show=all"));
    assert_eq!(snapshot.content(), Some("k=v1"));
}

#[test]
fn get_config_blank_body_is_empty_snapshot() {
    let (gateway, server) = serve_once(200, "   ");
    let snapshot = gateway.get_config(&key()).expect("get");
    server.join().expect("server");
    assert_eq!(snapshot, ConfigSnapshot::Empty);
}

#[test]
fn get_config_404_is_not_found() {
    let (gateway, server) = serve_once(404, "config data not exist");
    let err = gateway.get_config(&key()).unwrap_err();
    server.join().expect("server");
    assert!(err.is_not_found(), "got: {err}");
}

#[test]
fn server_error_body_is_propagated_verbatim() {
    let (gateway, server) = serve_once(500, "caused: tenant quota exceeded;");
    let err = gateway.get_config(&key()).unwrap_err();
    server.join().expect("server");
    assert!(matches!(err, GatewayError::Status { status: 500, .. }));
    assert!(err.to_string().contains("caused: tenant quota exceeded;"));
    assert!(err.to_string().contains("dataId 'D'"));
}

#[test]
fn publish_sends_form_content_and_metadata() {
    let (gateway, server) = serve_once(200, "true");
    let mut request = PublishRequest::new(key(), "k=v1");
    request.content_type = "properties".to_string();
    request.app_name = "orders".to_string();
    gateway.publish_config(&request).expect("publish");
    let captured = server.join().expect("server");

    assert!(captured.request_line.starts_with("POST /nacos/v1/cs/configs?"));
    assert!(captured.request_line.contains("type=properties"));
    assert!(captured.request_line.contains("appName=orders"));
    assert!(captured.request_line.contains("namespaceId=t1"));
    assert_eq!(captured.body, "content=k%3Dv1");
}

#[test]
fn publish_not_applied_is_rejected() {
    let (gateway, server) = serve_once(200, "false");
    let err = gateway
        .publish_config(&PublishRequest::new(key(), "k=v1"))
        .unwrap_err();
    server.join().expect("server");
    assert!(matches!(err, GatewayError::Rejected { .. }), "got: {err}");
}

#[test]
fn create_namespace_passes_custom_id() {
    let (gateway, server) = serve_once(200, "true");
    let outcome = gateway
        .create_namespace(&NamespaceId::from("t1"), "Team One", "first team")
        .expect("create");
    let captured = server.join().expect("server");

    assert_eq!(outcome, CreateOutcome::Created);
    assert!(captured
        .request_line
        .starts_with("POST /nacos/v1/console/namespaces?"));
    assert!(captured.request_line.contains("customNamespaceId=t1"));
}

#[test]
fn list_page_parses_page_result() {
    let (gateway, server) = serve_once(
        200,
        r#"{"totalCount":3,"pageNumber":2,"pagesAvailable":2,"pageItems":[{"dataId":"D","group":"G","content":"x","type":"yaml"}]}"#,
    );
    let page = gateway
        .list_page(&PageQuery {
            namespace: NamespaceId::from("t1"),
            group: String::new(),
            data_id: "*D*".to_string(),
            search: SearchMode::Blur,
            page_no: 2,
            page_size: 2,
        })
        .expect("list");
    let captured = server.join().expect("server");

    assert!(captured.request_line.contains("search=blur"));
    assert!(captured.request_line.contains("pageNo=2"));
    assert!(captured.request_line.contains("pageSize=2"));
    assert_eq!(page.page_number, 2);
    assert_eq!(page.pages_available, 2);
    assert_eq!(page.page_items[0].content_type.as_deref(), Some("yaml"));
}

#[test]
fn list_page_garbage_is_decode_error() {
    let (gateway, server) = serve_once(200, "<html>login</html>");
    let err = gateway
        .list_page(&PageQuery {
            namespace: NamespaceId::from("t1"),
            group: String::new(),
            data_id: String::new(),
            search: SearchMode::Accurate,
            page_no: 1,
            page_size: 10,
        })
        .unwrap_err();
    server.join().expect("server");
    assert!(matches!(err, GatewayError::Decode { .. }), "got: {err}");
}

#[test]
fn list_namespaces_unwraps_envelope() {
    let (gateway, server) = serve_once(
        200,
        r#"{"code":200,"message":null,"data":[{"namespace":"","namespaceShowName":"public","quota":200,"configCount":1,"type":0},{"namespace":"t1","namespaceShowName":"t1","namespaceDesc":"team","quota":200,"configCount":0,"type":2}]}"#,
    );
    let namespaces = gateway.list_namespaces().expect("list");
    server.join().expect("server");

    assert_eq!(namespaces.len(), 2);
    assert!(namespaces[0].id.is_public());
    assert_eq!(namespaces[1].description.as_deref(), Some("team"));
}

#[test]
fn unreachable_registry_is_transport_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    };
    let gateway = HttpGateway::new(&format!("http://{addr}"), Duration::from_secs(2));
    let err = gateway.list_namespaces().unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }), "got: {err}");
}
