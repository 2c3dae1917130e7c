//! Serving a dispatcher over a real socket.

use std::net::{SocketAddr, TcpListener as StdListener};
use std::time::Duration;

use keel::{Application, Config, Error, Request, Routes, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

fn free_addr() -> SocketAddr {
    StdListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap()
}

async fn echo(req: Request) -> String {
    let peer = req.remote_addr().map(|a| a.to_string()).unwrap_or_default();
    format!("{} {} peer={peer}", req.method(), String::from_utf8_lossy(req.body()))
}

fn start(addr: SocketAddr) -> (oneshot::Sender<()>, JoinHandle<Result<(), Error>>) {
    let dispatcher = Application::new(Config::default())
        .routes(Routes::new().route("/echo", echo))
        .build()
        .unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(Server::bind(addr).serve_with_shutdown(dispatcher, async {
        let _ = stopped.await;
    }));
    (stop, server)
}

async fn connect(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {addr}");
}

async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !String::from_utf8_lossy(&buf).contains(needle) {
        let n = timeout(Duration::from_secs(3), stream.read(&mut chunk))
            .await
            .expect("no response within 3s")
            .unwrap();
        assert!(n > 0, "connection closed early: {}", String::from_utf8_lossy(&buf));
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn serves_buffered_body_with_peer_address() {
    let addr = free_addr();
    let (stop, server) = start(addr);

    let mut client = connect(addr).await;
    let client_addr = client.local_addr().unwrap();
    client
        .write_all(b"POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: 5\r\n\r\nhello")
        .await
        .unwrap();

    let expected = format!("POST hello peer={client_addr}");
    let res = read_until(&mut client, &expected).await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");

    let _ = stop.send(());
    timeout(Duration::from_secs(3), server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn unknown_path_over_the_wire_is_404() {
    let addr = free_addr();
    let (stop, server) = start(addr);

    let mut client = connect(addr).await;
    client
        .write_all(b"GET /nowhere HTTP/1.1\r\nhost: localhost\r\n\r\n")
        .await
        .unwrap();

    let res = read_until(&mut client, "404 page not found").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "{res}");

    let _ = stop.send(());
    timeout(Duration::from_secs(3), server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let addr = free_addr();
    let (stop, server) = start(addr);

    let mut client = connect(addr).await;
    let client_addr = client.local_addr().unwrap();
    client
        .write_all(b"GET /echo HTTP/1.1\r\nhost: localhost\r\n\r\n")
        .await
        .unwrap();
    read_until(&mut client, &format!("peer={client_addr}")).await;

    // The client keeps its keep-alive connection open and idle.
    let _ = stop.send(());
    let finished = timeout(Duration::from_secs(3), server).await;
    assert!(finished.is_ok(), "serve did not return while an idle connection was open");
    finished.unwrap().unwrap().unwrap();

    let mut rest = Vec::new();
    let n = timeout(Duration::from_secs(1), client.read_to_end(&mut rest)).await.unwrap().unwrap();
    assert_eq!(n, 0);
    assert!(TcpStream::connect(addr).await.is_err());
}
