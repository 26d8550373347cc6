//! Integration tests for channel flows: JOIN, PART, KICK, PRIVMSG, TOPIC,
//! MODE and INVITE, plus the user/channel membership invariants.

mod common;

use common::{TestClient, TestServer};
use lanternd::state::Server;

/// Both sides of the membership relation agree for `nick` in `channel`.
fn membership(server: &Server, nick: &str, channel: &str) -> (bool, bool) {
    let uid = server.directory.uid_for_nick(nick);
    let in_channel = server
        .directory
        .channel_members(channel)
        .unwrap_or_default()
        .iter()
        .any(|(u, _)| Some(&u.uid) == uid.as_ref());
    let in_user = uid
        .map(|uid| {
            server
                .directory
                .user_channels(&uid)
                .iter()
                .any(|(c, _)| lantern_proto::irc_eq(&c.name, channel))
        })
        .unwrap_or(false);
    (in_channel, in_user)
}

#[tokio::test]
async fn first_joiner_gets_ops_and_default_modes_then_channel_empties() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();

    let joined = alice.join("#test").await.unwrap();
    let echo = joined.iter().find(|m| m.command == "JOIN").unwrap();
    assert_eq!(echo.prefix.as_deref(), Some("alice!alice@127.0.0.1"));
    assert_eq!(echo.params[0], "#test");
    let names = joined.iter().find(|m| m.command == "353").unwrap();
    assert_eq!(names.params, vec!["alice", "=", "#test", "@alice"]);

    alice.send_raw("MODE #test").await.unwrap();
    let modes = alice.expect("324").await.unwrap();
    assert_eq!(modes.params[1], "#test");
    assert_eq!(modes.params[2], "+nt");
    alice.expect("329").await.unwrap();

    alice.send_raw("PART #test :done").await.unwrap();
    let part = alice.expect("PART").await.unwrap();
    assert_eq!(part.params, vec!["#test", "done"]);
    assert!(server.server.directory.find_channel("#test").is_none());
    assert_eq!(membership(&server.server, "alice", "#test"), (false, false));
}

#[tokio::test]
async fn persistent_channel_survives_its_last_member() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    alice.oper().await.unwrap();
    alice.join("#keep").await.unwrap();

    alice.send_raw("MODE #keep +P").await.unwrap();
    let mode = alice.expect("MODE").await.unwrap();
    assert_eq!(mode.params, vec!["#keep", "+P"]);

    alice.send_raw("PART #keep").await.unwrap();
    alice.expect("PART").await.unwrap();
    let channel = server.server.directory.find_channel("#keep").unwrap();
    assert!(channel.members.is_empty());
}

#[tokio::test]
async fn membership_stays_symmetric_through_join_kick_and_quit() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();

    alice.join("#sym").await.unwrap();
    bob.join("#sym").await.unwrap();
    alice.expect("JOIN").await.unwrap();
    assert_eq!(membership(&server.server, "alice", "#sym"), (true, true));
    assert_eq!(membership(&server.server, "bob", "#sym"), (true, true));

    // Non-op cannot kick.
    bob.send_raw("KICK #sym alice").await.unwrap();
    bob.expect("482").await.unwrap();

    alice.send_raw("KICK #sym bob :behave").await.unwrap();
    let kick = bob.expect("KICK").await.unwrap();
    assert_eq!(kick.prefix.as_deref(), Some("alice!alice@127.0.0.1"));
    assert_eq!(kick.params, vec!["#sym", "bob", "behave"]);
    alice.expect("KICK").await.unwrap();
    assert_eq!(membership(&server.server, "bob", "#sym"), (false, false));

    bob.join("#sym").await.unwrap();
    alice.expect("JOIN").await.unwrap();
    alice.quit(None).await.unwrap();
    let quit = bob.expect("QUIT").await.unwrap();
    assert_eq!(quit.prefix.as_deref(), Some("alice!alice@127.0.0.1"));
    assert_eq!(quit.params, vec!["Client Quit"]);
    assert_eq!(membership(&server.server, "alice", "#sym"), (false, false));
    assert_eq!(membership(&server.server, "bob", "#sym"), (true, true));
    assert_eq!(
        server.server.directory.find_channel("#sym").unwrap().members.len(),
        1
    );
}

#[tokio::test]
async fn channel_messages_reach_everyone_but_the_sender() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    let mut carol = TestClient::registered(server.address(), "carol").await.unwrap();

    alice.join("#chat").await.unwrap();
    bob.join("#chat").await.unwrap();
    alice.expect("JOIN").await.unwrap();

    alice.privmsg("#chat", "hello from alice").await.unwrap();
    let msg = bob.expect("PRIVMSG").await.unwrap();
    assert_eq!(msg.prefix.as_deref(), Some("alice!alice@127.0.0.1"));
    assert_eq!(msg.params, vec!["#chat", "hello from alice"]);
    assert!(alice.drain().await.iter().all(|m| m.command != "PRIVMSG"));

    // +n keeps outsiders out.
    carol.privmsg("#chat", "let me in").await.unwrap();
    let refused = carol.expect("404").await.unwrap();
    assert_eq!(refused.params[1], "#chat");

    // +m silences everyone without voice.
    alice.send_raw("MODE #chat +m").await.unwrap();
    bob.expect("MODE").await.unwrap();
    bob.privmsg("#chat", "can you hear me").await.unwrap();
    bob.expect("404").await.unwrap();

    alice.send_raw("MODE #chat +v bob").await.unwrap();
    let voiced = bob.expect("MODE").await.unwrap();
    assert_eq!(voiced.params, vec!["#chat", "+v", "bob"]);
    bob.privmsg("#chat", "now?").await.unwrap();
    let heard = alice.expect("PRIVMSG").await.unwrap();
    assert_eq!(heard.params[1], "now?");
}

#[tokio::test]
async fn private_messages_and_away_replies() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();

    bob.send_raw("AWAY :lunch").await.unwrap();
    bob.expect("306").await.unwrap();

    alice.privmsg("bob", "ping?").await.unwrap();
    let away = alice.expect("301").await.unwrap();
    assert_eq!(away.params, vec!["alice", "bob", "lunch"]);
    let msg = bob.expect("PRIVMSG").await.unwrap();
    assert_eq!(msg.params, vec!["bob", "ping?"]);

    alice.privmsg("nobody", "hello").await.unwrap();
    alice.expect("401").await.unwrap();

    // NOTICE never answers with errors.
    alice.send_raw("NOTICE nobody :hello").await.unwrap();
    alice.send_raw("NOTICE bob :quiet").await.unwrap();
    let notice = bob.expect("NOTICE").await.unwrap();
    assert_eq!(notice.params[1], "quiet");
    assert!(alice.drain().await.iter().all(|m| m.command != "401" && m.command != "301"));
}

#[tokio::test]
async fn topic_lock_and_topic_replies() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    alice.join("#topic").await.unwrap();
    bob.join("#topic").await.unwrap();
    alice.expect("JOIN").await.unwrap();

    bob.send_raw("TOPIC #topic").await.unwrap();
    bob.expect("331").await.unwrap();

    bob.send_raw("TOPIC #topic :mine now").await.unwrap();
    bob.expect("482").await.unwrap();

    alice.send_raw("TOPIC #topic :Welcome all").await.unwrap();
    let topic = bob.expect("TOPIC").await.unwrap();
    assert_eq!(topic.params, vec!["#topic", "Welcome all"]);

    bob.send_raw("TOPIC #topic").await.unwrap();
    let current = bob.expect("332").await.unwrap();
    assert_eq!(current.params[2], "Welcome all");
    let who = bob.expect("333").await.unwrap();
    assert!(who.params[2].starts_with("alice"));

    // Dropping +t lets anyone set it.
    alice.send_raw("MODE #topic -t").await.unwrap();
    bob.expect("MODE").await.unwrap();
    bob.send_raw("TOPIC #topic :open season").await.unwrap();
    let seen = alice
        .recv_until(|m| m.command == "TOPIC" && m.params.get(1).is_some_and(|t| t == "open season"))
        .await
        .unwrap();
    let changed = seen.last().unwrap();
    assert_eq!(changed.prefix.as_deref(), Some("bob!bob@127.0.0.1"));
}

#[tokio::test]
async fn invite_only_key_and_limit() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    alice.join("#vip").await.unwrap();

    alice.send_raw("MODE #vip +ik sesame").await.unwrap();
    let set = alice.expect("MODE").await.unwrap();
    assert_eq!(set.params, vec!["#vip", "+ik", "sesame"]);

    bob.send_raw("JOIN #vip").await.unwrap();
    bob.expect("473").await.unwrap();

    alice.send_raw("INVITE bob #vip").await.unwrap();
    let inviting = alice.expect("341").await.unwrap();
    assert_eq!(inviting.params[1], "bob");
    let invite = bob.expect("INVITE").await.unwrap();
    assert_eq!(invite.params, vec!["bob", "#vip"]);

    // The invite gets past +i but not past the key.
    bob.send_raw("JOIN #vip").await.unwrap();
    bob.expect("475").await.unwrap();
    bob.send_raw("JOIN #vip sesame").await.unwrap();
    bob.expect("366").await.unwrap();

    alice.send_raw("MODE #vip +k other").await.unwrap();
    alice.expect("467").await.unwrap();

    alice.send_raw("MODE #vip -ik *").await.unwrap();
    alice.expect("MODE").await.unwrap();
    alice.send_raw("MODE #vip +l 2").await.unwrap();
    alice.expect("MODE").await.unwrap();
    let mut carol = TestClient::registered(server.address(), "carol").await.unwrap();
    carol.send_raw("JOIN #vip").await.unwrap();
    carol.expect("471").await.unwrap();
}

#[tokio::test]
async fn bans_block_joins_and_list_for_anyone() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    alice.join("#ban").await.unwrap();

    alice.send_raw("MODE #ban +b bob").await.unwrap();
    let ban = alice.expect("MODE").await.unwrap();
    assert_eq!(ban.params, vec!["#ban", "+b", "bob!*@*"]);

    bob.send_raw("JOIN #ban").await.unwrap();
    bob.expect("474").await.unwrap();

    bob.send_raw("MODE #ban b").await.unwrap();
    let listed = bob.recv_until(|m| m.command == "368").await.unwrap();
    let entry = listed.iter().find(|m| m.command == "367").unwrap();
    assert_eq!(entry.params[2], "bob!*@*");

    // Listing needs no ops; changing does.
    bob.send_raw("MODE #ban -b bob!*@*").await.unwrap();
    bob.expect("482").await.unwrap();
}

#[tokio::test]
async fn unknown_mode_letters_are_reported_and_the_rest_applied() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    alice.join("#modes").await.unwrap();

    alice.send_raw("MODE #modes +sXm").await.unwrap();
    let unknown = alice.expect("472").await.unwrap();
    assert_eq!(unknown.params[1], "X");
    let applied = alice.expect("MODE").await.unwrap();
    assert_eq!(applied.params, vec!["#modes", "+sm"]);

    // Already set: nothing to broadcast.
    alice.send_raw("MODE #modes +s").await.unwrap();
    alice.send_raw("PING sync").await.unwrap();
    let seen = alice.recv_until(|m| m.command == "PONG").await.unwrap();
    assert!(seen.iter().all(|m| m.command != "MODE"));
}

#[tokio::test]
async fn user_modes() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let _bob = TestClient::registered(server.address(), "bob").await.unwrap();

    alice.send_raw("MODE alice +iw").await.unwrap();
    let set = alice.expect("MODE").await.unwrap();
    assert_eq!(set.params, vec!["alice", "+iw"]);

    alice.send_raw("MODE alice").await.unwrap();
    let current = alice.expect("221").await.unwrap();
    assert_eq!(current.params[1], "+iw");

    alice.send_raw("MODE alice +o").await.unwrap();
    alice.send_raw("MODE bob +i").await.unwrap();
    alice.expect("502").await.unwrap();
    assert!(!server.server.directory.is_operator(
        &server.server.directory.uid_for_nick("alice").unwrap()
    ));

    alice.send_raw("MODE alice +Z").await.unwrap();
    alice.expect("501").await.unwrap();
}

#[tokio::test]
async fn secret_channels_are_hidden_from_outsiders() {
    let server = TestServer::start().await.unwrap();
    let mut alice = TestClient::registered(server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(server.address(), "bob").await.unwrap();
    alice.join("#hidden").await.unwrap();
    alice.send_raw("MODE #hidden +s").await.unwrap();
    alice.expect("MODE").await.unwrap();

    bob.send_raw("NAMES #hidden").await.unwrap();
    let names = bob.recv_until(|m| m.command == "366").await.unwrap();
    assert!(names.iter().all(|m| m.command != "353"));

    bob.send_raw("WHOIS alice").await.unwrap();
    let whois = bob.recv_until(|m| m.command == "318").await.unwrap();
    assert!(whois.iter().all(|m| m.command != "319"));

    alice.send_raw("NAMES #hidden").await.unwrap();
    let own = alice.recv_until(|m| m.command == "366").await.unwrap();
    let list = own.iter().find(|m| m.command == "353").unwrap();
    assert_eq!(list.params[1], "@");
}
