//! End-to-end cluster scenarios: several nodes on one membership bus, jobs
//! submitted through a non-leader facade, and leader failover.

use stats_cluster::client::ask::ask;
use stats_cluster::config::ClusterConfig;
use stats_cluster::dispatch::protocol::{AGGREGATOR_PATH, Job, JobReply};
use stats_cluster::membership::bus::MembershipBus;
use stats_cluster::node::ClusterNode;
use stats_cluster::transport::fabric::MessageFabric;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const CLIENT_PORT: u16 = 2999;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

async fn start_cluster(
    config: &ClusterConfig,
    bus: &Arc<MembershipBus>,
    fabric: &Arc<MessageFabric>,
    ports: &[u16],
) -> Vec<ClusterNode> {
    let mut nodes = Vec::new();
    for &port in ports {
        let node = ClusterNode::start(config, bus.clone(), fabric.clone(), addr(port), &["compute"])
            .await
            .unwrap();
        nodes.push(node);
    }

    for node in &nodes {
        let expected = ports.len();
        let converged = tokio::time::timeout(
            Duration::from_secs(5),
            node.tracker.wait_until(|members| members.len() == expected),
        )
        .await
        .unwrap();
        assert!(converged);
    }
    nodes
}

#[tokio::test]
async fn test_job_through_follower_is_processed_by_leader() {
    let config = ClusterConfig::default();
    let bus = MembershipBus::new();
    let fabric = MessageFabric::new(true);
    let nodes = start_cluster(&config, &bus, &fabric, &[2551, 2552, 2553]).await;

    for node in &nodes {
        assert_eq!(node.tracker.current_leader().unwrap().address, addr(2551));
    }

    let reply = ask(
        &fabric,
        addr(CLIENT_PORT),
        nodes[2].facade_address(),
        Job::new(config.sample_text.clone()),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(
        reply,
        JobReply::Result {
            mean_word_length: 3.875
        }
    );
    assert_eq!(nodes[0].jobs_accepted(), 1);
    assert_eq!(nodes[1].jobs_accepted(), 0);
    assert_eq!(nodes[2].jobs_accepted(), 0);

    // The aggregator disposed of itself after replying.
    assert_eq!(fabric.count_endpoints(AGGREGATOR_PATH), 0);

    for node in nodes {
        node.stop().await;
    }
}

#[tokio::test]
async fn test_leader_failover_moves_routing_to_next_oldest() {
    let config = ClusterConfig::default();
    let bus = MembershipBus::new();
    let fabric = MessageFabric::new(true);
    let mut nodes = start_cluster(&config, &bus, &fabric, &[2651, 2652, 2653]).await;

    let old_leader = nodes.remove(0);
    old_leader.stop().await;

    for node in &nodes {
        let moved = tokio::time::timeout(
            Duration::from_secs(5),
            node.tracker
                .wait_until(|members| members.first().map(|n| n.address) == Some(addr(2652))),
        )
        .await
        .unwrap();
        assert!(moved);
    }

    let reply = ask(
        &fabric,
        addr(CLIENT_PORT),
        nodes[1].facade_address(),
        Job::new("one three"),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(
        reply,
        JobReply::Result {
            mean_word_length: 4.0
        }
    );
    assert_eq!(nodes[0].jobs_accepted(), 1);
    assert_eq!(nodes[1].jobs_accepted(), 0);

    for node in nodes {
        node.stop().await;
    }
}

#[tokio::test]
async fn test_every_node_sees_the_same_leader_after_churn() {
    let config = ClusterConfig::default();
    let bus = MembershipBus::new();
    let fabric = MessageFabric::new(false);
    let mut nodes = start_cluster(&config, &bus, &fabric, &[2751, 2752, 2753, 2754]).await;

    let middle = nodes.remove(1);
    middle.stop().await;
    let late = ClusterNode::start(&config, bus.clone(), fabric.clone(), addr(2755), &["compute"])
        .await
        .unwrap();
    nodes.push(late);

    for node in &nodes {
        let settled = tokio::time::timeout(
            Duration::from_secs(5),
            node.tracker.wait_until(|members| {
                members.len() == 4 && members.first().map(|n| n.address) == Some(addr(2751))
            }),
        )
        .await
        .unwrap();
        assert!(settled);
    }

    for node in nodes {
        node.stop().await;
    }
}
