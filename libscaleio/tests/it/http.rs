//! `ReqwestTransport` against a one-shot local HTTP server.

use libscaleio::{Client, ClientOptions, ConnectionConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Accept one connection, capture the request head, answer with `body`.
async fn serve_once(listener: TcpListener, status: &'static str, body: &'static str) -> String {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        head.extend_from_slice(&chunk[..n]);
    }
    let reply = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(reply.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
    String::from_utf8_lossy(&head).into_owned()
}

#[tokio::test]
async fn login_over_real_http() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(serve_once(listener, "200 OK", "\"tok-http\""));

    let client = Client::new(ClientOptions::new(&endpoint).with_version("3.6")).unwrap();
    client
        .authenticate_with(ConnectionConfig::new(&endpoint, "", "admin", "secret"))
        .await
        .unwrap();
    assert_eq!(client.current_token().unwrap().as_str(), "tok-http");

    let head = server.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /api/login http/1.1"), "{head}");
    // base64("admin:secret")
    assert!(head.contains("authorization: basic ywrtaw46c2vjcmv0"), "{head}");
}

#[tokio::test]
async fn error_status_reaches_the_dispatcher() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(serve_once(
        listener,
        "403 Forbidden",
        r#"{"message":"locked","httpStatusCode":403,"errorCode":1}"#,
    ));

    let client = Client::new(ClientOptions::new(&endpoint).with_version("3.6")).unwrap();
    let err = client
        .authenticate_with(ConnectionConfig::new(&endpoint, "", "admin", "secret"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("locked"), "{err}");
    server.await.unwrap();
}
