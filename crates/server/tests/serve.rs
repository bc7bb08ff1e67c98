use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shuttle::{Server, ServerConfig, ServerError};
use shuttle_http::handler::make_handler;
use shuttle_http::protocol::{BoxError, Request, Response};

async fn echo(request: Request) -> Result<Response, BoxError> {
    let path = request.path().to_string();
    let body = request.into_body().collect().await?;
    Ok(Response::text(format!("{path} {}", body.decode(shuttle_http::protocol::Charset::Utf8))))
}

fn start(config: ServerConfig) -> Server {
    Server::bind("127.0.0.1:0", config, Arc::new(make_handler(echo))).unwrap()
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream
}

/// Reads one response with a `Content-Length` body, returns its head and body.
fn read_response(reader: &mut BufReader<TcpStream>) -> (String, String) {
    let mut head = String::new();
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if line == "\r\n" {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap();
        }
        head.push_str(&line);
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).unwrap();
    (head, String::from_utf8(body).unwrap())
}

fn stop(server: Server) {
    server.shutdown_handle().shutdown();
    server.wait();
}

#[test]
fn serves_on_acceptor_threads() {
    let server = start(ServerConfig::default());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("connection: close\r\n"));
    assert!(response.ends_with("\r\n\r\n/hello "));

    stop(server);
}

#[test]
fn keep_alive_on_worker_threads() {
    let server = start(ServerConfig { workers: Some(2), ..Default::default() });

    let stream = connect(server.local_addr());
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    writer.write_all(b"POST /first HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody").unwrap();
    let (head, body) = read_response(&mut reader);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, "/first body");

    writer.write_all(b"POST /second HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nab\r\n0\r\n\r\n").unwrap();
    let (_, body) = read_response(&mut reader);
    assert_eq!(body, "/second ab");

    stop(server);
}

#[test]
fn concurrent_connections() {
    let server = start(ServerConfig { acceptor_threads: 2, workers: Some(4), ..Default::default() });
    let addr = server.local_addr();

    let clients: Vec<_> = (0..8)
        .map(|index| {
            thread::spawn(move || {
                let stream = connect(addr);
                let mut writer = stream.try_clone().unwrap();
                let mut reader = BufReader::new(stream);
                writer.write_all(format!("GET /client/{index} HTTP/1.1\r\n\r\n").as_bytes()).unwrap();
                read_response(&mut reader).1
            })
        })
        .collect();

    for (index, client) in clients.into_iter().enumerate() {
        assert_eq!(client.join().unwrap(), format!("/client/{index} "));
    }

    stop(server);
}

#[test]
fn malformed_request_gets_bad_request() {
    let server = start(ServerConfig::default());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"NOT HTTP\r\n\r\n").unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));

    stop(server);
}

#[test]
fn idle_connection_is_closed() {
    let server = start(ServerConfig { read_timeout: Duration::from_millis(100), ..Default::default() });

    let mut stream = connect(server.local_addr());
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    assert!(response.is_empty());

    stop(server);
}

#[test]
fn address_in_use_is_a_bind_failure() {
    let server = start(ServerConfig::default());

    let result = Server::bind(server.local_addr(), ServerConfig::default(), Arc::new(make_handler(echo)));
    match result {
        Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, Some(server.local_addr())),
        other => panic!("unexpected bind result {other:?}"),
    }

    stop(server);
}
