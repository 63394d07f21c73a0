//! End-to-end tests against an in-process fake server speaking the façade's
//! handshake, envelope, and per-operation body formats.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use codec::connect::{ConnectRequest, ConnectResponse};
use codec::envelope::{ReplyHeader, RequestHeader, XID_NOTIFICATION};
use codec::error_code::ErrorCode;
use codec::methods::OpCode;

use coord_client::acl::{self, Acl};
use coord_client::config::{ClientConfig, Log};
use coord_client::data::{CreateMode, Stat};
use coord_client::error::ClientError;
use coord_client::Client;

fn put_str(out: &mut BytesMut, s: &str) {
    out.put_i32(s.len() as i32);
    out.put(s.as_bytes());
}

fn get_str(buf: &mut BytesMut) -> String {
    let len = buf.get_i32() as usize;
    String::from_utf8(buf.split_to(len).to_vec()).unwrap()
}

fn put_bytes(out: &mut BytesMut, data: &[u8]) {
    out.put_i32(data.len() as i32);
    out.put(data);
}

fn get_bytes(buf: &mut BytesMut) -> Vec<u8> {
    let len = buf.get_i32() as usize;
    buf.split_to(len).to_vec()
}

struct Node {
    data: Vec<u8>,
    acl: Vec<Acl>,
    stat: Stat,
}

struct Tree {
    nodes: HashMap<String, Node>,
    zxid: AtomicI64,
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            zxid: AtomicI64::new(1),
        }
    }

    fn next_zxid(&self) -> i64 {
        self.zxid.fetch_add(1, Ordering::SeqCst)
    }
}

async fn read_frame(stream: &mut TcpStream) -> Option<BytesMut> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if let Ok(Some(frame)) = codec::decode_frame(&mut buf, codec::MAX_FRAME_LEN) {
            return Some(frame);
        }

        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn write_frame(stream: &mut TcpStream, payload: &BytesMut) {
    let mut framed = BytesMut::new();
    codec::write_frame(payload, &mut framed);
    stream.write_all(&framed).await.unwrap();
}

fn handle_request(op_code: i32, mut body: BytesMut, tree: &Arc<Mutex<Tree>>) -> (ErrorCode, BytesMut) {
    let op = match OpCode::try_from(op_code) {
        Ok(op) => op,
        Err(_) => return (ErrorCode::Unimplemented, BytesMut::new()),
    };

    let mut out = BytesMut::new();
    match op {
        OpCode::Create => {
            let path = get_str(&mut body);
            let data = get_bytes(&mut body);
            let acl = acl::decode_acl_list(&mut body).unwrap();
            let mode = CreateMode::from_flag(body.get_i32());

            let mut guard = tree.lock();
            if guard.nodes.contains_key(&path) {
                return (ErrorCode::NodeExists, BytesMut::new());
            }

            let zxid = guard.next_zxid();
            let stat = Stat {
                czxid: zxid,
                mzxid: zxid,
                ctime: zxid,
                mtime: zxid,
                version: 0,
                cversion: 0,
                aversion: 0,
                ephemeral_owner: if mode.is_ephemeral() { 1 } else { 0 },
                data_length: data.len() as i32,
                num_children: 0,
                pzxid: zxid,
            };

            guard.nodes.insert(path.clone(), Node { data, acl, stat });
            put_str(&mut out, &path);
            (ErrorCode::Ok, out)
        }

        OpCode::Delete => {
            let path = get_str(&mut body);
            let _version = body.get_i32();

            let mut guard = tree.lock();
            if guard.nodes.remove(&path).is_none() {
                return (ErrorCode::NoNode, BytesMut::new());
            }
            (ErrorCode::Ok, out)
        }

        OpCode::Exists => {
            let path = get_str(&mut body);
            let _watch = body.get_u8();

            let guard = tree.lock();
            match guard.nodes.get(&path) {
                Some(node) => {
                    node.stat.encode(&mut out);
                    (ErrorCode::Ok, out)
                }
                None => (ErrorCode::NoNode, BytesMut::new()),
            }
        }

        OpCode::GetData => {
            let path = get_str(&mut body);
            let _watch = body.get_u8();

            let guard = tree.lock();
            match guard.nodes.get(&path) {
                Some(node) => {
                    put_bytes(&mut out, &node.data);
                    node.stat.encode(&mut out);
                    (ErrorCode::Ok, out)
                }
                None => (ErrorCode::NoNode, BytesMut::new()),
            }
        }

        OpCode::SetData => {
            let path = get_str(&mut body);
            let data = get_bytes(&mut body);
            let version = body.get_i32();

            let mut guard = tree.lock();
            let zxid = guard.next_zxid();
            let stat = match guard.nodes.get_mut(&path) {
                Some(node) => {
                    if version >= 0 && node.stat.version != version {
                        return (ErrorCode::BadVersion, BytesMut::new());
                    }
                    node.data = data;
                    node.stat.version += 1;
                    node.stat.mzxid = zxid;
                    node.stat.mtime = zxid;
                    node.stat.data_length = node.data.len() as i32;
                    node.stat
                }
                None => return (ErrorCode::NoNode, BytesMut::new()),
            };

            stat.encode(&mut out);
            (ErrorCode::Ok, out)
        }

        OpCode::GetACL => {
            let path = get_str(&mut body);

            let guard = tree.lock();
            match guard.nodes.get(&path) {
                Some(node) => {
                    acl::encode_acl_list(&node.acl, &mut out);
                    node.stat.encode(&mut out);
                    (ErrorCode::Ok, out)
                }
                None => (ErrorCode::NoNode, BytesMut::new()),
            }
        }

        OpCode::SetACL => {
            let path = get_str(&mut body);
            let acl_list = acl::decode_acl_list(&mut body).unwrap();
            let version = body.get_i32();

            let mut guard = tree.lock();
            let zxid = guard.next_zxid();
            let stat = match guard.nodes.get_mut(&path) {
                Some(node) => {
                    if version >= 0 && node.stat.aversion != version {
                        return (ErrorCode::BadVersion, BytesMut::new());
                    }
                    node.acl = acl_list;
                    node.stat.aversion += 1;
                    node.stat.mzxid = zxid;
                    node.stat
                }
                None => return (ErrorCode::NoNode, BytesMut::new()),
            };

            stat.encode(&mut out);
            (ErrorCode::Ok, out)
        }

        OpCode::GetChildren2 => {
            let path = get_str(&mut body);
            let _watch = body.get_u8();

            let guard = tree.lock();
            if path != "/" && !guard.nodes.contains_key(&path) {
                return (ErrorCode::NoNode, BytesMut::new());
            }

            let prefix = if path == "/" {
                "/".to_string()
            } else {
                format!("{path}/")
            };

            let mut children: Vec<String> = guard
                .nodes
                .keys()
                .filter_map(|candidate| {
                    candidate
                        .strip_prefix(prefix.as_str())
                        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                        .map(|rest| rest.to_string())
                })
                .collect();
            children.sort();

            out.put_i32(children.len() as i32);
            for child in &children {
                put_str(&mut out, child);
            }
            (ErrorCode::Ok, out)
        }

        _ => (ErrorCode::Unimplemented, BytesMut::new()),
    }
}

async fn handle_connection(mut stream: TcpStream, tree: Arc<Mutex<Tree>>) {
    let mut connect_body = match read_frame(&mut stream).await {
        Some(b) => b,
        None => return,
    };
    let request = match ConnectRequest::decode(&mut connect_body) {
        Ok(r) => r,
        Err(_) => return,
    };

    let response = ConnectResponse {
        protocol_version: 0,
        negotiated_timeout_ms: request.timeout_ms,
        session_id: 0x5a5a_0001,
        password: vec![1, 2, 3, 4],
    };
    let mut response_body = BytesMut::new();
    response.encode(&mut response_body);
    write_frame(&mut stream, &response_body).await;

    loop {
        let mut frame = match read_frame(&mut stream).await {
            Some(f) => f,
            None => return,
        };
        let header = match RequestHeader::decode(&mut frame) {
            Ok(h) => h,
            Err(_) => return,
        };

        if header.op_code == i32::from(OpCode::CloseSession) {
            let zxid = tree.lock().next_zxid();
            let mut out = BytesMut::new();
            ReplyHeader { xid: header.xid, zxid, err: 0 }.encode(&mut out);
            write_frame(&mut stream, &out).await;
            return;
        }

        let (err, body) = handle_request(header.op_code, frame, &tree);
        let zxid = tree.lock().next_zxid();

        let mut out = BytesMut::new();
        ReplyHeader { xid: header.xid, zxid, err: err.into() }.encode(&mut out);
        if err.is_ok() {
            out.extend_from_slice(&body);
        }
        write_frame(&mut stream, &out).await;
    }
}

async fn spawn_fake_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tree = Arc::new(Mutex::new(Tree::new()));

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(handle_connection(stream, tree.clone()));
        }
    });

    addr.to_string()
}

/// Accepts connections but never answers the connect handshake, so the
/// client's read deadline is the only thing that can end the attempt.
async fn spawn_black_hole_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((stream, _)) => held.push(stream),
                Err(_) => return,
            }
        }
    });

    addr.to_string()
}

/// Accepts one connection, answers exactly one `GetData` request with a
/// fabricated node, then immediately pushes a server-side notification for
/// `notification_path` (which the caller is expected to pass already
/// chroot-prefixed, matching what a real server would echo back).
async fn spawn_watch_firing_server(notification_path: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(_) => return,
        };

        let mut connect_body = match read_frame(&mut stream).await {
            Some(b) => b,
            None => return,
        };
        let request = match ConnectRequest::decode(&mut connect_body) {
            Ok(r) => r,
            Err(_) => return,
        };

        let response = ConnectResponse {
            protocol_version: 0,
            negotiated_timeout_ms: request.timeout_ms,
            session_id: 0x5a5a_0002,
            password: vec![1, 2, 3, 4],
        };
        let mut response_body = BytesMut::new();
        response.encode(&mut response_body);
        write_frame(&mut stream, &response_body).await;

        loop {
            let mut frame = match read_frame(&mut stream).await {
                Some(f) => f,
                None => return,
            };
            let header = match RequestHeader::decode(&mut frame) {
                Ok(h) => h,
                Err(_) => return,
            };

            if header.op_code == i32::from(OpCode::CloseSession) {
                let mut out = BytesMut::new();
                ReplyHeader { xid: header.xid, zxid: 1, err: 0 }.encode(&mut out);
                write_frame(&mut stream, &out).await;
                return;
            }

            if header.op_code != i32::from(OpCode::GetData) {
                continue;
            }

            let stat = Stat {
                czxid: 1,
                mzxid: 1,
                ctime: 1,
                mtime: 1,
                version: 0,
                cversion: 0,
                aversion: 0,
                ephemeral_owner: 0,
                data_length: 5,
                num_children: 0,
                pzxid: 1,
            };

            let mut body = BytesMut::new();
            put_bytes(&mut body, b"hello");
            stat.encode(&mut body);

            let mut out = BytesMut::new();
            ReplyHeader { xid: header.xid, zxid: 1, err: 0 }.encode(&mut out);
            out.extend_from_slice(&body);
            write_frame(&mut stream, &out).await;

            let mut notification = BytesMut::new();
            notification.put_i32(3); // NodeDataChanged
            put_str(&mut notification, &notification_path);

            let mut notification_out = BytesMut::new();
            ReplyHeader { xid: XID_NOTIFICATION, zxid: 2, err: 0 }.encode(&mut notification_out);
            notification_out.extend_from_slice(&notification);
            write_frame(&mut stream, &notification_out).await;
        }
    });

    addr.to_string()
}

fn config_for(connect_string: String, session_timeout_ms: i32) -> ClientConfig {
    ClientConfig {
        connect_string,
        session_timeout_ms,
        max_frame_len: codec::MAX_FRAME_LEN,
        log: Log::default(),
    }
}

#[tokio::test]
async fn create_exists_delete_round_trip() {
    let connect_string = spawn_fake_server().await;
    let client = Client::connect(&config_for(connect_string, 10_000), None, None).unwrap();

    let created = client
        .create("/widget", b"hello", &acl::open_acl_unsafe(), CreateMode::Persistent)
        .await
        .unwrap();
    assert_eq!(created, "/widget");

    let stat = client.exists("/widget", None).await.unwrap();
    assert_eq!(stat.unwrap().version, 0);

    client.delete("/widget", -1).await.unwrap();
    assert!(client.exists("/widget", None).await.unwrap().is_none());

    client.close().await.unwrap();
}

#[tokio::test]
async fn set_then_get_data_round_trip() {
    let connect_string = spawn_fake_server().await;
    let client = Client::connect(&config_for(connect_string, 10_000), None, None).unwrap();

    client
        .create("/counter", b"0", &acl::open_acl_unsafe(), CreateMode::Persistent)
        .await
        .unwrap();

    let stat = client.set_data("/counter", b"1", -1).await.unwrap();
    assert_eq!(stat.version, 1);

    let (data, stat) = client.get_data("/counter", None).await.unwrap();
    assert_eq!(data, b"1");
    assert_eq!(stat.version, 1);

    client.close().await.unwrap();
}

#[tokio::test]
async fn acl_round_trip() {
    let connect_string = spawn_fake_server().await;
    let client = Client::connect(&config_for(connect_string, 10_000), None, None).unwrap();

    client
        .create("/secured", b"", &acl::creator_all_acl(), CreateMode::Persistent)
        .await
        .unwrap();

    let (acl_list, _stat) = client.get_acl("/secured").await.unwrap();
    assert_eq!(acl_list, acl::creator_all_acl());

    let stat = client.set_acl("/secured", &acl::read_acl_unsafe(), -1).await.unwrap();
    assert_eq!(stat.aversion, 1);

    let (acl_list, _stat) = client.get_acl("/secured").await.unwrap();
    assert_eq!(acl_list, acl::read_acl_unsafe());

    client.close().await.unwrap();
}

#[tokio::test]
async fn get_children_lists_direct_descendants_only() {
    let connect_string = spawn_fake_server().await;
    let client = Client::connect(&config_for(connect_string, 10_000), None, None).unwrap();

    for path in ["/parent", "/parent/a", "/parent/b", "/parent/a/grandchild"] {
        client
            .create(path, b"", &acl::open_acl_unsafe(), CreateMode::Persistent)
            .await
            .unwrap();
    }

    let mut children = client.get_children("/parent", None).await.unwrap();
    children.sort();
    assert_eq!(children, vec!["a".to_string(), "b".to_string()]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn duplicate_create_returns_node_exists() {
    let connect_string = spawn_fake_server().await;
    let client = Client::connect(&config_for(connect_string, 10_000), None, None).unwrap();

    client
        .create("/once", b"", &acl::open_acl_unsafe(), CreateMode::Persistent)
        .await
        .unwrap();
    let err = client
        .create("/once", b"", &acl::open_acl_unsafe(), CreateMode::Persistent)
        .await
        .unwrap_err();

    match err {
        ClientError::Server(ErrorCode::NodeExists) => {}
        other => panic!("expected NodeExists, got {other:?}"),
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn impossibly_short_timeout_does_not_hang_forever() {
    let connect_string = spawn_black_hole_server().await;
    let client = Client::connect(&config_for(connect_string, 1), None, None).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        client.create("/x", b"", &acl::open_acl_unsafe(), CreateMode::Persistent),
    )
    .await;

    let result = outcome.expect("operation must not hang past the requested session timeout");
    assert!(result.is_err());
}

#[tokio::test]
async fn data_watch_installed_through_a_chrooted_client_fires_on_the_client_path() {
    let bare_connect_string = spawn_watch_firing_server("/app/watched".into()).await;
    let connect_string = format!("{bare_connect_string}/app");
    let client = Client::connect(&config_for(connect_string, 10_000), None, None).unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let watcher = coord_client::watcher_fn(move |event| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(event.clone());
        }
    });

    let (_data, _stat) = client.get_data("/watched", Some(watcher)).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), rx)
        .await
        .expect("watch should fire")
        .unwrap();

    match event {
        coord_client::WatchedEvent::Node { event_type, path } => {
            assert_eq!(event_type, coord_client::EventType::NodeDataChanged);
            assert_eq!(path, "/watched");
        }
        other => panic!("expected a node event, got {other:?}"),
    }
}
