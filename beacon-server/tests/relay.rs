//! Server-side relay peer: offer/answer brokering, the data-channel
//! forwarding protocol, and relay lifetime across teardown.

mod common;

use common::relay_client::{establish, RelayTestClient};
use common::{init_tracing, packet, packet_to, test_server, TestPeer};
use beacon_server::signaling::session;
use serde_json::json;

fn relay_lobby(lobby_id: &str) -> serde_json::Value {
    json!({
        "lobby_id": lobby_id,
        "use_server_relay": true,
        "allow_host_reclaim": false,
        "allow_peers_to_claim_host": false,
        "max_peers": 0,
        "password": "",
        "locked": false,
    })
}

#[tokio::test]
async fn voice_candidates_are_refused_by_the_relay() {
    init_tracing();
    let server = test_server();

    let mut a = TestPeer::connect(&server);
    a.init(&server, "alice").await;
    a.open_lobby(&server, relay_lobby("arena")).await;
    let discover = a.expect("DISCOVER").await;
    assert_eq!(discover.payload.unwrap()["id"], json!("relay"));

    let client = RelayTestClient::new().await.expect("test client");
    let offer = client.create_offer().await.expect("offer");

    a.send(
        &server,
        packet_to(
            "MAKE_OFFER",
            Some(json!({ "type": 1, "contents": serde_json::to_value(&offer).unwrap() })),
            "relay",
        ),
    )
    .await;
    let warning = a.expect("WARNING").await;
    assert_eq!(
        warning.payload,
        Some(json!("voice connections are not supported by the server relay"))
    );

    client.close().await.ok();
}

#[tokio::test]
async fn relay_answers_offers_and_forwards_broadcasts() {
    init_tracing();
    let server = test_server();

    let mut a = TestPeer::connect(&server);
    a.init(&server, "alice").await;
    a.open_lobby(&server, relay_lobby("arena")).await;
    a.expect("DISCOVER").await;

    let mut b = TestPeer::connect(&server);
    b.init(&server, "bob").await;
    b.join_lobby(&server, "arena").await;
    b.expect("ANTICIPATE").await;
    b.expect("DISCOVER").await;
    a.expect("NEW_PEER").await;

    let alice_rtc = RelayTestClient::new().await.expect("alice rtc");
    establish(&server, &mut a, &alice_rtc)
        .await
        .expect("alice relay channel");

    let bob_rtc = RelayTestClient::new().await.expect("bob rtc");
    establish(&server, &mut b, &bob_rtc)
        .await
        .expect("bob relay channel");

    // Lobby-wide broadcast: everyone but the sender, origin rewritten,
    // channel label preserved.
    alice_rtc
        .send_packet(json!({
            "opcode": "G_MSG",
            "payload": { "text": "hello mesh" },
            "channel": "default",
        }))
        .await
        .expect("send G_MSG");

    let received = bob_rtc.next_message(10_000).await.expect("bob got G_MSG");
    assert_eq!(received["opcode"], json!("G_MSG"));
    assert_eq!(received["payload"], json!({ "text": "hello mesh" }));
    assert_eq!(received["origin"]["id"], json!(a.id()));
    assert_eq!(received["origin"]["user"], json!("alice"));
    assert_eq!(received["channel"], json!("default"));

    // Direct delivery to a validated recipient.
    bob_rtc
        .send_packet(json!({
            "opcode": "P_MSG",
            "payload": "psst",
            "recipient": a.id(),
        }))
        .await
        .expect("send P_MSG");

    let received = alice_rtc.next_message(10_000).await.expect("alice got P_MSG");
    assert_eq!(received["opcode"], json!("P_MSG"));
    assert_eq!(received["payload"], json!("psst"));
    assert_eq!(received["origin"]["id"], json!(b.id()));

    // Unknown opcodes bounce back to the sender only.
    alice_rtc
        .send_packet(json!({ "opcode": "Q_MSG", "payload": 1 }))
        .await
        .expect("send unknown");
    let warn = alice_rtc.next_message(10_000).await.expect("alice got WARN");
    assert_eq!(warn["opcode"], json!("WARN"));
    assert_eq!(warn["payload"], json!("Unknown opcode: Q_MSG"));
    assert!(bob_rtc.next_message(500).await.is_none());

    alice_rtc.close().await.ok();
    bob_rtc.close().await.ok();
}

#[tokio::test]
async fn teardown_destroys_every_member_relay() {
    init_tracing();
    let server = test_server();

    let mut a = TestPeer::connect(&server);
    a.init(&server, "alice").await;
    a.open_lobby(&server, relay_lobby("arena")).await;
    a.drain();

    let mut b = TestPeer::connect(&server);
    b.init(&server, "bob").await;
    b.join_lobby(&server, "arena").await;
    b.drain();

    assert!(server.relays.contains(a.client.id()));
    assert!(server.relays.contains(b.client.id()));
    assert_eq!(server.relays_in_lobby("arena", "").len(), 2);

    // Host departure with reclaim disabled destroys the lobby; every
    // member relay goes with it.
    session::close(&server, &a.client).await;

    assert!(!server.relays.contains(a.client.id()));
    assert!(!server.relays.contains(b.client.id()));
    assert!(!server.games.lobby_exists("arena", ""));
}

#[tokio::test]
async fn leaving_peer_takes_its_relay_along() {
    init_tracing();
    let server = test_server();

    let mut a = TestPeer::connect(&server);
    a.init(&server, "alice").await;
    a.open_lobby(&server, relay_lobby("arena")).await;
    a.drain();

    let mut b = TestPeer::connect(&server);
    b.init(&server, "bob").await;
    b.join_lobby(&server, "arena").await;
    b.drain();

    session::close(&server, &b.client).await;

    assert!(!server.relays.contains(b.client.id()));
    assert!(server.relays.contains(a.client.id()), "host relay is untouched");

    let relay = server.relays.get(a.client.id()).unwrap();
    assert_eq!(relay.owner(), a.client.id());
    assert_eq!(relay.lobby_id(), "arena");
}

#[tokio::test]
async fn make_offer_to_relay_without_relay_lobby_is_ignored() {
    init_tracing();
    let server = test_server();

    let mut a = TestPeer::connect(&server);
    a.init(&server, "alice").await;
    a.open_lobby(&server, common::plain_lobby("quiet")).await;

    let client = RelayTestClient::new().await.expect("test client");
    let offer = client.create_offer().await.expect("offer");
    a.send(
        &server,
        packet_to(
            "MAKE_OFFER",
            Some(json!({ "type": 0, "contents": serde_json::to_value(&offer).unwrap() })),
            "relay",
        ),
    )
    .await;
    a.assert_no_pending();

    // The rest of the protocol still works on this connection.
    a.send(&server, packet("KEEPALIVE", None)).await;
    a.expect("KEEPALIVE").await;

    client.close().await.ok();
}
