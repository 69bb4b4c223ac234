//! End-to-end scenarios exercising real UDP/TCP sockets on loopback:
//! two-node join, suspect-to-dead promotion after an unclean kill,
//! self-refutation over the wire, and a graceful leave.

use std::time::Duration;

use tattle_rs::membership::NodeStatus;
use tattle_rs::wire::{self, Message};
use tattle_rs::{ClusterCore, Config};
use tokio::net::UdpSocket;
use tokio::time::sleep;

fn fast_config(name: &str) -> Config {
    Config {
        node_name: name.to_string(),
        bind_address: "127.0.0.1".to_string(),
        bind_port: 0,
        probe_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_millis(100),
        probe_indirect_nodes: 1,
        sync_interval: Duration::from_millis(200),
        sync_nodes: 1,
        retransmit_multi: 4,
        suspicion_min_multi: 1,
        suspicion_max_multi: 2,
        ..Config::default()
    }
}

async fn local_port(core: &ClusterCore, name: &str) -> u16 {
    core.members()
        .await
        .into_iter()
        .find(|node| node.name == name)
        .expect("local node registered")
        .port
}

#[tokio::test]
async fn two_node_join_converges_to_mutual_alive() {
    let a = ClusterCore::new(fast_config("a")).unwrap();
    let b = ClusterCore::new(fast_config("b")).unwrap();
    a.start().await.unwrap();
    b.start().await.unwrap();

    let a_port = local_port(&a, "a").await;
    b.join(&[("127.0.0.1".to_string(), a_port)]).await.unwrap();

    sleep(Duration::from_millis(500)).await;

    let a_members = a.members().await;
    let b_members = b.members().await;
    assert_eq!(a_members.len(), 2);
    assert_eq!(b_members.len(), 2);
    assert!(a_members
        .iter()
        .find(|n| n.name == "b")
        .is_some_and(|n| n.status == NodeStatus::Alive));
    assert!(b_members
        .iter()
        .find(|n| n.name == "a")
        .is_some_and(|n| n.status == NodeStatus::Alive));

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn unclean_kill_promotes_peer_to_suspect_then_dead() {
    let a = ClusterCore::new(fast_config("a")).unwrap();
    let b = ClusterCore::new(fast_config("b")).unwrap();
    a.start().await.unwrap();
    b.start().await.unwrap();

    let a_port = local_port(&a, "a").await;
    b.join(&[("127.0.0.1".to_string(), a_port)]).await.unwrap();
    sleep(Duration::from_millis(300)).await;

    // Simulate an unclean kill: tear b down without a graceful leave.
    b.stop().await;

    sleep(Duration::from_millis(1000)).await;

    let b_view = a
        .members()
        .await
        .into_iter()
        .find(|n| n.name == "b")
        .expect("b still known for gossip convergence");
    assert_eq!(b_view.status, NodeStatus::Dead);

    a.stop().await;
}

#[tokio::test]
async fn suspect_message_about_self_triggers_refutation() {
    let a = ClusterCore::new(fast_config("a")).unwrap();
    a.start().await.unwrap();
    let a_port = local_port(&a, "a").await;

    let incarnation_before = a
        .members()
        .await
        .into_iter()
        .find(|n| n.name == "a")
        .unwrap()
        .incarnation;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let suspect = Message::Suspect {
        node: "a".to_string(),
        incarnation: incarnation_before,
        sender: "attacker".to_string(),
    };
    let frame = wire::encode(&suspect, None).unwrap();
    socket
        .send_to(&frame, ("127.0.0.1", a_port))
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;

    let node = a
        .members()
        .await
        .into_iter()
        .find(|n| n.name == "a")
        .unwrap();
    assert_eq!(node.status, NodeStatus::Alive);
    assert!(node.incarnation > incarnation_before);

    a.stop().await;
}

#[tokio::test]
async fn graceful_leave_is_not_refuted_and_propagates() {
    let a = ClusterCore::new(fast_config("a")).unwrap();
    let b = ClusterCore::new(fast_config("b")).unwrap();
    a.start().await.unwrap();
    b.start().await.unwrap();

    let a_port = local_port(&a, "a").await;
    b.join(&[("127.0.0.1".to_string(), a_port)]).await.unwrap();
    sleep(Duration::from_millis(300)).await;

    a.leave().await;
    sleep(Duration::from_millis(500)).await;

    let a_self = a
        .members()
        .await
        .into_iter()
        .find(|n| n.name == "a")
        .unwrap();
    assert_eq!(a_self.status, NodeStatus::Dead);

    let b_view_of_a = b
        .members()
        .await
        .into_iter()
        .find(|n| n.name == "a")
        .expect("b learned about a before it left");
    assert_eq!(b_view_of_a.status, NodeStatus::Dead);

    a.stop().await;
    b.stop().await;
}
