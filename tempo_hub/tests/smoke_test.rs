// Integration smoke test for the hub server.
//
// Starts a hub on localhost and connects real WebSocket clients. Exercises the
// protocol end to end: init, election, scheduled command broadcast, late
// joiners, main disconnect, lenient and malformed input, and upgrade rejection.
//
// Most clients are `tempo_hub::client::HubClient`. A few tests use a bare
// tungstenite socket so they can send frames the client type never would and
// check the exact JSON the hub writes.

use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tempo_hub::client::HubClient;
use tempo_hub::hub::HubStatus;
use tempo_hub::server::HubHandle;
use tempo_hub::{HubConfig, HubError, start_hub};
use tempo_protocol::{ClientId, RelayMessage};
use serde_json::{Value, json};
use tungstenite::{Message, WebSocket};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);
const LOOKAHEAD_NANOS: i64 = 100_000_000;

fn start() -> (HubHandle, SocketAddr) {
    let config = HubConfig {
        listen: SocketAddr::from(([127, 0, 0, 1], 0)), // OS picks a free port
        ..HubConfig::default()
    };
    start_hub(config).unwrap()
}

fn connect(addr: SocketAddr) -> HubClient {
    HubClient::connect(addr, "/ws").unwrap()
}

/// Poll the hub until it reports `expected`, or panic after `WAIT`.
fn wait_for_status(handle: &HubHandle, expected: HubStatus) {
    let deadline = Instant::now() + WAIT;
    loop {
        let status = handle.status().unwrap();
        if status == expected {
            return;
        }
        assert!(Instant::now() < deadline, "hub stuck at {status:?}, expected {expected:?}");
        thread::sleep(Duration::from_millis(10));
    }
}

fn recv(client: &HubClient) -> RelayMessage {
    client
        .recv_timeout(WAIT)
        .unwrap_or_else(|| panic!("client {} received nothing", client.client_id()))
}

fn assert_quiet(client: &HubClient) {
    let msg = client.recv_timeout(QUIET);
    assert!(msg.is_none(), "client {} got unexpected {msg:?}", client.client_id());
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap()
}

fn main_status(id: &ClientId) -> RelayMessage {
    RelayMessage::main_status(Some(id.clone()))
}

fn status(sessions: usize, main: Option<&ClientId>) -> HubStatus {
    HubStatus {
        sessions,
        main: main.cloned(),
    }
}

/// Connect a bare WebSocket and consume its `init`. Returns the socket and
/// the assigned ID.
fn raw_connect(addr: SocketAddr) -> (WebSocket<TcpStream>, ClientId) {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    let Ok((mut raw, _)) = tungstenite::client(format!("ws://{addr}/ws"), stream) else {
        panic!("websocket handshake failed");
    };
    let init = read_json(&mut raw);
    assert_eq!(init["type"], "init");
    let id = ClientId::from(init["clientId"].as_str().unwrap());
    (raw, id)
}

/// Next text frame from a bare socket, parsed as untyped JSON.
fn read_json(raw: &mut WebSocket<TcpStream>) -> Value {
    loop {
        if let Message::Text(text) = raw.read().unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[test]
fn full_session_lifecycle() {
    let (handle, addr) = start();

    // 1. A and B connect; each gets its own ID.
    let mut a = connect(addr);
    let b = connect(addr);
    assert_ne!(a.client_id(), b.client_id());
    wait_for_status(&handle, status(2, None));

    // 2. A claims main; both learn about it.
    a.become_main().unwrap();
    let id_a = a.client_id().clone();
    assert_eq!(recv(&a), main_status(&id_a));
    assert_eq!(recv(&b), main_status(&id_a));

    // 3. A plays; both receive the command scheduled ~100ms ahead.
    let sent_at = now_nanos();
    a.send_command("play").unwrap();
    for client in [&a, &b] {
        match recv(client) {
            RelayMessage::Command {
                command,
                time: Some(time),
                client_id,
            } => {
                let received_at = now_nanos();
                assert_eq!(command, "play");
                assert_eq!(client_id.as_ref(), Some(&id_a));
                assert!(time >= sent_at + LOOKAHEAD_NANOS);
                assert!(time <= received_at + LOOKAHEAD_NANOS);
            }
            other => panic!("expected Command, got {other:?}"),
        }
    }

    // 4. B leaves; A stays main and hears nothing.
    b.disconnect();
    wait_for_status(&handle, status(1, Some(&id_a)));
    assert_quiet(&a);

    // 5. A leaves; the registry is empty.
    a.disconnect();
    wait_for_status(&handle, status(0, None));

    handle.stop();
}

#[test]
fn late_joiner_sees_init_then_main_status_first() {
    let (handle, addr) = start();

    let mut a = connect(addr);
    a.become_main().unwrap();
    let id_a = a.client_id().clone();
    assert_eq!(recv(&a), main_status(&id_a));

    // `connect` has already consumed C's init; the next message must be the
    // main status, before any command.
    let c = connect(addr);
    assert_eq!(recv(&c), main_status(&id_a));
    wait_for_status(&handle, status(2, Some(&id_a)));

    a.send_command("pause").unwrap();
    assert!(matches!(recv(&c), RelayMessage::Command { command, .. } if command == "pause"));

    handle.stop();
}

#[test]
fn second_claim_and_non_main_commands_are_ignored() {
    let (handle, addr) = start();

    let mut a = connect(addr);
    let mut b = connect(addr);
    wait_for_status(&handle, status(2, None));

    a.become_main().unwrap();
    let id_a = a.client_id().clone();
    assert_eq!(recv(&a), main_status(&id_a));
    assert_eq!(recv(&b), main_status(&id_a));

    // B's claim changes nothing and produces no reply.
    b.become_main().unwrap();
    b.send_command("stop").unwrap();
    assert_quiet(&a);
    assert_quiet(&b);
    assert_eq!(handle.status().unwrap().main, Some(id_a));

    handle.stop();
}

#[test]
fn main_disconnect_broadcasts_vacancy_once() {
    let (handle, addr) = start();

    let mut a = connect(addr);
    let b = connect(addr);
    let c = connect(addr);
    wait_for_status(&handle, status(3, None));

    a.become_main().unwrap();
    let id_a = a.client_id().clone();
    assert_eq!(recv(&b), main_status(&id_a));
    assert_eq!(recv(&c), main_status(&id_a));

    a.disconnect();
    for client in [&b, &c] {
        assert_eq!(recv(client), RelayMessage::main_status(None));
        assert_quiet(client);
    }
    wait_for_status(&handle, status(2, None));

    handle.stop();
}

#[test]
fn malformed_record_ends_only_that_session() {
    let (handle, addr) = start();
    let bystander = connect(addr);
    let (mut raw, _) = raw_connect(addr);
    wait_for_status(&handle, status(2, None));

    raw.send(Message::text("this is not json")).unwrap();

    // The hub drops the connection: reads end in a close frame or an error.
    loop {
        match raw.read() {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    wait_for_status(&handle, status(1, None));
    assert_quiet(&bystander);

    handle.stop();
}

#[test]
fn unknown_type_and_null_command_keep_the_session_open() {
    let (handle, addr) = start();
    let bystander = connect(addr);
    let (mut raw, raw_id) = raw_connect(addr);
    wait_for_status(&handle, status(2, None));

    // Skipped, not fatal: the claim that follows is still processed.
    raw.send(Message::text(r#"{"type":"ping"}"#)).unwrap();
    raw.send(Message::text(r#"{"type":"become_main"}"#)).unwrap();
    assert_eq!(
        read_json(&mut raw),
        json!({"type": "main_status", "mainId": raw_id.as_str()})
    );
    assert_eq!(recv(&bystander), main_status(&raw_id));

    raw.send(Message::text(r#"{"type":"command","command":null}"#)).unwrap();
    match recv(&bystander) {
        RelayMessage::Command {
            command, client_id, ..
        } => {
            assert_eq!(command, "");
            assert_eq!(client_id, Some(raw_id.clone()));
        }
        other => panic!("expected Command, got {other:?}"),
    }
    assert_eq!(handle.status().unwrap(), status(2, Some(&raw_id)));

    handle.stop();
}

#[test]
fn vacancy_is_sent_with_an_empty_main_id() {
    let (handle, addr) = start();
    let mut a = connect(addr);
    let (mut raw, _) = raw_connect(addr);
    wait_for_status(&handle, status(2, None));

    a.become_main().unwrap();
    let id_a = a.client_id().clone();
    assert_eq!(
        read_json(&mut raw),
        json!({"type": "main_status", "mainId": id_a.as_str()})
    );

    a.disconnect();
    assert_eq!(read_json(&mut raw), json!({"type": "main_status", "mainId": ""}));
    wait_for_status(&handle, status(1, None));

    handle.stop();
}

#[test]
fn wrong_path_never_becomes_a_session() {
    let (handle, addr) = start();

    let result = HubClient::connect(addr, "/not-the-endpoint");
    assert!(matches!(
        result,
        Err(HubError::WebSocket(tungstenite::Error::Http(ref response)))
            if response.status() == tungstenite::http::StatusCode::NOT_FOUND
    ));

    thread::sleep(QUIET);
    assert_eq!(handle.status().unwrap(), status(0, None));

    handle.stop();
}
