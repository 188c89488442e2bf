//! Drives the JSON-lines front end over a real TCP socket.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use hrd::auth::AdminAuth;
use hrd::engine::BookingEngine;
use hrd::policy::SystemClock;
use hrd::service::Service;
use hrd::session::{SessionConfig, SessionManager};
use hrd::store::WalStore;
use hrd::wire;

const ADMIN: &str = "let-me-in";

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("hrd_test_protocol");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn day(offset: i64) -> NaiveDate {
    Local::now().date_naive() + Duration::days(offset)
}

async fn start_server(wal: &str) -> String {
    let store = Arc::new(WalStore::open(&test_wal_path(wal)).unwrap());
    let service = Arc::new(Service::new(
        BookingEngine::new(store.clone(), Arc::new(SystemClock)),
        Arc::new(SessionManager::new(store, SessionConfig::default())),
        AdminAuth::new(ADMIN.into()),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let svc = service.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, svc).await;
            });
        }
    });
    addr
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let (read, write) = TcpStream::connect(addr).await.unwrap().into_split();
        Self { lines: BufReader::new(read).lines(), write }
    }

    async fn call(&mut self, request: Value) -> Value {
        let mut line = request.to_string();
        line.push('\n');
        self.write.write_all(line.as_bytes()).await.unwrap();
        let reply = self.lines.next_line().await.unwrap().expect("connection closed");
        serde_json::from_str(&reply).unwrap()
    }

    async fn sign_up(&mut self, username: &str, password: &str) -> (String, i64) {
        let reply = self
            .call(json!({"op": "sign_up", "username": username, "password": password}))
            .await;
        assert_eq!(reply["kind"], "login", "{reply}");
        (
            reply["session_token"].as_str().unwrap().to_string(),
            reply["user_id"].as_i64().unwrap(),
        )
    }
}

#[tokio::test]
async fn booking_flow_over_tcp() {
    let addr = start_server("flow.wal").await;
    let mut admin = Client::connect(&addr).await;
    for i in 1..=7 {
        let reply = admin
            .call(json!({"op": "create_room", "admin_password": ADMIN, "name": format!("Room {i}")}))
            .await;
        assert_eq!(reply["room"]["id"], i);
    }

    let mut guest = Client::connect(&addr).await;
    let (token, _) = guest.sign_up("ana", "pw").await;

    let first = guest
        .call(json!({
            "op": "reserve_room", "token": token, "room_id": 7,
            "start": day(30), "end": day(31)
        }))
        .await;
    assert_eq!(first, json!({"kind": "booking", "reservation_id": 1, "status": "success"}));

    let second = guest
        .call(json!({
            "op": "reserve_room", "token": token, "room_id": 7,
            "start": day(30), "end": day(32)
        }))
        .await;
    assert_eq!(second["status"], "room_not_available");
    assert_eq!(second["reservation_id"], -1);

    let mine = guest.call(json!({"op": "my_reservations", "token": token})).await;
    assert_eq!(mine["reservations"].as_array().unwrap().len(), 1);

    let available = guest
        .call(json!({"op": "is_room_available", "room_id": 7, "start": day(31), "end": day(33)}))
        .await;
    assert_eq!(available["available"], true);

    let windows = guest
        .call(json!({"op": "free_windows", "room_id": 7, "start": day(28), "end": day(34)}))
        .await;
    assert_eq!(
        windows["windows"],
        json!([
            {"start": day(28), "end": day(30)},
            {"start": day(31), "end": day(34)}
        ])
    );
}

#[tokio::test]
async fn policy_failures_are_reported() {
    let addr = start_server("policy.wal").await;
    let mut client = Client::connect(&addr).await;
    client
        .call(json!({"op": "create_room", "admin_password": ADMIN, "name": "Loft"}))
        .await;
    let (token, _) = client.sign_up("ana", "pw").await;

    let cases = [
        (day(40), day(39), "invalid_reservation_dates"),
        (day(29), day(30), "reservation_too_early"),
        (day(40), day(44), "reservation_too_long"),
    ];
    for (start, end, expected) in cases {
        let reply = client
            .call(json!({
                "op": "reserve_room", "token": token, "room_id": 1, "start": start, "end": end
            }))
            .await;
        assert_eq!(reply["status"], expected);
    }

    let reply = client
        .call(json!({
            "op": "reserve_room", "token": token, "room_id": 2, "start": day(40), "end": day(41)
        }))
        .await;
    assert_eq!(reply["status"], "room_does_not_exist");
}

#[tokio::test]
async fn reservations_are_private_to_their_owner() {
    let addr = start_server("owners.wal").await;
    let mut ana = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    ana.call(json!({"op": "create_room", "admin_password": ADMIN, "name": "Loft"}))
        .await;
    let (ana_token, ana_id) = ana.sign_up("ana", "pw").await;
    let (bob_token, _) = bob.sign_up("bob", "pw").await;

    let booked = ana
        .call(json!({
            "op": "reserve_room", "token": ana_token, "room_id": 1,
            "start": day(35), "end": day(36)
        }))
        .await;
    let id = booked["reservation_id"].as_i64().unwrap();

    let moved = json!({
        "id": id, "room_id": 1, "user_id": ana_id,
        "start_date": day(45), "end_date": day(46)
    });
    let hijack = bob
        .call(json!({"op": "update_reservation", "token": bob_token, "reservation": moved}))
        .await;
    assert_eq!(hijack, json!({"kind": "updated", "ok": false}));
    let delete = bob
        .call(json!({"op": "delete_reservation", "token": bob_token, "reservation_id": id}))
        .await;
    assert_eq!(delete, json!({"kind": "deleted", "ok": false}));

    let update = ana
        .call(json!({"op": "update_reservation", "token": ana_token, "reservation": moved}))
        .await;
    assert_eq!(update, json!({"kind": "updated", "ok": true}));

    let stored = bob.call(json!({"op": "reservation", "id": id})).await;
    assert_eq!(stored["reservation"], moved);
}

#[tokio::test]
async fn tokens_and_admin_password_are_enforced() {
    let addr = start_server("enforced.wal").await;
    let mut client = Client::connect(&addr).await;

    let reply = client
        .call(json!({
            "op": "reserve_room", "token": "forged", "room_id": 1,
            "start": day(40), "end": day(41)
        }))
        .await;
    assert_eq!(reply["code"], "unauthenticated");

    let reply = client
        .call(json!({"op": "create_room", "admin_password": "guess", "name": "Loft"}))
        .await;
    assert_eq!(reply["code"], "forbidden");

    let (first, user) = client.sign_up("ana", "pw").await;
    let (second, same_user) = client.sign_up("ana", "pw").await;
    assert_ne!(first, second);
    assert_eq!(user, same_user);

    let reply = client
        .call(json!({"op": "sign_up", "username": "ana", "password": "nope"}))
        .await;
    assert_eq!(reply["code"], "invalid_credentials");
}

#[tokio::test]
async fn concurrent_clients_cannot_double_book() {
    let addr = start_server("race.wal").await;
    let mut admin = Client::connect(&addr).await;
    admin
        .call(json!({"op": "create_room", "admin_password": ADMIN, "name": "Loft"}))
        .await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let addr = addr.clone();
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&addr).await;
            let (token, _) = client.sign_up(&format!("guest{i}"), "pw").await;
            client
                .call(json!({
                    "op": "reserve_room", "token": token, "room_id": 1,
                    "start": day(50), "end": day(52)
                }))
                .await
        }));
    }

    let mut successes = 0;
    for h in handles {
        let reply = h.await.unwrap();
        if reply["status"] == "success" {
            successes += 1;
        } else {
            assert_eq!(reply["status"], "room_not_available");
        }
    }
    assert_eq!(successes, 1);
}
