//! Integration tests for operator commands: OPER, KILL, the K/Q/Z-line
//! commands, module control, REHASH and DIE.

mod common;

use common::{TestClient, TestServer};
use lantern_proto::Message;
use std::time::Duration;

fn notices_containing<'a>(messages: &'a [Message], needle: &str) -> Vec<&'a Message> {
    messages
        .iter()
        .filter(|m| m.command == "NOTICE" && m.params.get(1).is_some_and(|t| t.contains(needle)))
        .collect()
}

#[tokio::test]
async fn oper_grants_modes_and_reports_each_failure_once() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();

    alice.send_raw("OPER root test").await.unwrap();
    let seen = alice.recv_until(|m| m.command == "381").await.unwrap();
    let mode = seen.iter().find(|m| m.command == "MODE").unwrap();
    assert_eq!(mode.params, vec!["alice", "+aos"]);
    alice.drain().await;

    bob.send_raw("OPER root wrong").await.unwrap();
    bob.expect("464").await.unwrap();
    bob.send_raw("OPER nobody test").await.unwrap();
    bob.expect("464").await.unwrap();
    bob.send_raw("OPER helper test").await.unwrap();
    bob.expect("491").await.unwrap();

    let notices = alice.drain().await;
    let failures = notices_containing(&notices, "Failed OPER attempt by bob");
    assert_eq!(failures.len(), 3);
    assert!(failures[0].params[1].ends_with("bad password"));
    assert!(failures[1].params[1].ends_with("unknown oper name"));
    assert!(failures[2].params[1].ends_with("host mismatch"));

    let bob_uid = server.server.directory.uid_for_nick("bob").unwrap();
    assert!(!server.server.directory.is_operator(&bob_uid));
}

#[tokio::test]
async fn kill_requires_oper_and_closes_the_target() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();

    bob.send_raw("KILL alice :mutiny").await.unwrap();
    bob.expect("481").await.unwrap();

    alice.oper().await.unwrap();
    alice.send_raw("KILL nobody").await.unwrap();
    alice.expect("401").await.unwrap();

    alice.send_raw("KILL bob :spamming").await.unwrap();
    let lines = bob.read_to_close().await;
    let kill = lines.iter().find(|m| m.command == "KILL").unwrap();
    assert_eq!(kill.prefix.as_deref(), Some("alice!alice@127.0.0.1"));
    assert_eq!(kill.params, vec!["bob", "spamming"]);
    let error = lines.iter().find(|m| m.command == "ERROR").unwrap();
    assert!(error.params[0].contains("Killed (alice (spamming))"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.server.directory.find_user_by_nick("bob").is_none());
}

#[tokio::test]
async fn kline_is_persisted_enforced_and_removable() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut victim = TestClient::registered(server.address(), "victim").await.unwrap();
    alice.oper().await.unwrap();

    alice.send_raw("KLINE victim@127.0.0.1 24 :spam").await.unwrap();
    let added = alice.recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Added")).await.unwrap();
    assert!(added.last().unwrap().params[1].contains("K-line for victim@127.0.0.1 (24 hours): spam"));

    let lines = victim.read_to_close().await;
    let error = lines.iter().find(|m| m.command == "ERROR").unwrap();
    assert!(error.params[0].contains("K-line: spam"));

    let stored = std::fs::read_to_string(server.path("klines.jsonl")).unwrap();
    assert_eq!(stored.lines().count(), 1);
    assert!(stored.contains("victim@127.0.0.1"));

    alice.send_raw("KLINE VICTIM@127.0.0.1 1").await.unwrap();
    let dup = alice.recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Cannot add")).await.unwrap();
    assert!(dup.last().unwrap().params[1].contains("already listed"));

    // The ident is only known at registration; the ban bites there.
    let mut again = TestClient::connect(server.address(), "victim").await.unwrap();
    again.send_raw("NICK victim").await.unwrap();
    again.send_raw("USER victim 0 * :Victim").await.unwrap();
    let refused = again.read_to_close().await;
    assert!(refused.iter().any(|m| m.command == "465"));
    assert!(refused.iter().all(|m| m.command != "001"));

    alice.send_raw("STATS k").await.unwrap();
    let stats = alice.recv_until(|m| m.command == "219").await.unwrap();
    let row = stats.iter().find(|m| m.command == "216").unwrap();
    assert_eq!(row.params[2], "victim@127.0.0.1");

    alice.send_raw("UNKLINE victim@127.0.0.1").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Removed K-line"))
        .await
        .unwrap();
    let stored = std::fs::read_to_string(server.path("klines.jsonl")).unwrap();
    assert!(!stored.contains("victim@127.0.0.1"));

    TestClient::registered(server.address(), "victim").await.unwrap();
}

#[tokio::test]
async fn qline_reserves_nicks_for_non_operators() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    alice.oper().await.unwrap();

    alice.send_raw("QLINE Serv* 0 :Reserved for services").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Added Q-line"))
        .await
        .unwrap();

    let mut bob = TestClient::connect(server.address(), "bob").await.unwrap();
    bob.send_raw("NICK ServBot").await.unwrap();
    let refused = bob.expect("432").await.unwrap();
    assert_eq!(refused.params[1], "ServBot");
    assert_eq!(refused.params[2], "Reserved for services");

    // Operators may take reserved nicks.
    alice.send_raw("NICK ServBot").await.unwrap();
    alice.expect("NICK").await.unwrap();
}

#[tokio::test]
async fn zline_refuses_connections_from_the_address() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    alice.oper().await.unwrap();

    alice.send_raw("ZLINE 127.0.0.* 1 :local abuse").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Added Z-line"))
        .await
        .unwrap();

    // Bob is dropped; the operator stays.
    let lines = bob.read_to_close().await;
    assert!(lines.iter().any(|m| m.command == "ERROR"));

    let mut late = TestClient::connect(server.address(), "late").await.unwrap();
    let refused = late.read_to_close().await;
    let banned = refused.iter().find(|m| m.command == "465").unwrap();
    assert!(banned.params[1].contains("local abuse"));
    let error = refused.iter().find(|m| m.command == "ERROR").unwrap();
    assert!(error.params[0].ends_with("(Banned)"));

    alice.send_raw("UNZLINE 127.0.0.*").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Removed Z-line"))
        .await
        .unwrap();
    TestClient::registered(server.address(), "late").await.unwrap();
}

#[tokio::test]
async fn modules_load_and_unload_at_runtime() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();

    bob.send_raw("MODUNLOAD messaging").await.unwrap();
    bob.expect("481").await.unwrap();

    alice.oper().await.unwrap();
    alice.send_raw("MODUNLOAD messaging").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1] == "*** Module messaging unloaded")
        .await
        .unwrap();

    bob.privmsg("alice", "anyone there?").await.unwrap();
    let unknown = bob.expect("421").await.unwrap();
    assert_eq!(unknown.params[1], "PRIVMSG");

    alice.send_raw("MODUNLOAD core").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("module core is permanent"))
        .await
        .unwrap();
    alice.send_raw("MODLOAD plugins").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("unknown module plugins"))
        .await
        .unwrap();

    alice.send_raw("MODLIST").await.unwrap();
    let listed = alice.recv_until(|m| m.command == "703").await.unwrap();
    let names: Vec<&str> = listed
        .iter()
        .filter(|m| m.command == "702")
        .map(|m| m.params[1].as_str())
        .collect();
    assert!(names.contains(&"core"));
    assert!(!names.contains(&"messaging"));

    alice.send_raw("MODLOAD messaging").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1] == "*** Module messaging loaded")
        .await
        .unwrap();
    bob.privmsg("alice", "back again").await.unwrap();
    let msg = alice.expect("PRIVMSG").await.unwrap();
    assert_eq!(msg.params[1], "back again");
}

#[tokio::test]
async fn rehash_reports_and_validates_domains() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    alice.oper().await.unwrap();

    alice.send_raw("REHASH links").await.unwrap();
    alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("Unknown rehash domain links"))
        .await
        .unwrap();

    alice.send_raw("REHASH opers").await.unwrap();
    let rehashing = alice.expect("382").await.unwrap();
    assert!(rehashing.params[1].ends_with("lanternd.toml"));
    let done = alice
        .recv_until(|m| m.command == "NOTICE" && m.params[1].contains("is rehashing"))
        .await
        .unwrap();
    assert!(done.last().unwrap().params[1].contains("reloaded [opers]"));
    assert!(notices_containing(&done, "Rehash error").is_empty());
}

#[tokio::test]
async fn die_needs_the_secret_and_stops_everything() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    alice.oper().await.unwrap();

    bob.send_raw("DIE test").await.unwrap();
    bob.expect("481").await.unwrap();

    alice.send_raw("DIE guess").await.unwrap();
    alice.expect("464").await.unwrap();
    assert!(!server.is_stopped());

    alice.send_raw("DIE test").await.unwrap();
    let lines = bob.read_to_close().await;
    assert!(!notices_containing(&lines, "shutting down by request of alice").is_empty());
    let error = lines.iter().find(|m| m.command == "ERROR").unwrap();
    assert!(error.params[0].contains("shutting down"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(server.is_stopped());
}
