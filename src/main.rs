use stats_cluster::client::driver::{ClientDriver, ClientTarget};
use stats_cluster::client::handlers::{HttpState, router};
use stats_cluster::config::ClusterConfig;
use stats_cluster::dispatch::protocol::Job;
use stats_cluster::membership::bus::MembershipBus;
use stats_cluster::node::ClusterNode;
use stats_cluster::transport::fabric::MessageFabric;
use stats_cluster::transport::types::Address;

use anyhow::{Context, bail};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const CLIENT_ROLE: &str = "client";

struct Args {
    nodes: u16,
    base_port: u16,
    http_addr: SocketAddr,
    run_client: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().collect();

    let mut parsed = Args {
        nodes: 3,
        base_port: 2551,
        http_addr: "127.0.0.1:8080".parse()?,
        run_client: true,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--nodes" => {
                let value = args.get(i + 1).context("--nodes needs a value")?;
                parsed.nodes = value.parse().context("--nodes must be a number")?;
                i += 2;
            }
            "--base-port" => {
                let value = args.get(i + 1).context("--base-port needs a value")?;
                parsed.base_port = value.parse().context("--base-port must be a port")?;
                i += 2;
            }
            "--http" => {
                let value = args.get(i + 1).context("--http needs a value")?;
                parsed.http_addr = value.parse().context("--http must be addr:port")?;
                i += 2;
            }
            "--no-client" => {
                parsed.run_client = false;
                i += 1;
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: {} [--nodes <n>] [--base-port <port>] [--http <addr:port>] [--no-client]",
                    args[0]
                );
                eprintln!("Example: {} --nodes 3 --base-port 2551 --http 127.0.0.1:8080", args[0]);
                std::process::exit(0);
            }
            other => {
                tracing::warn!("Ignoring unknown argument {}", other);
                i += 1;
            }
        }
    }

    if parsed.nodes == 0 {
        bail!("--nodes must be at least 1");
    }

    Ok(parsed)
}

/// Addresses for `nodes` compute nodes followed by one client node, on
/// consecutive ports starting at `base_port`.
fn node_addresses(host: IpAddr, base_port: u16, nodes: u16) -> anyhow::Result<Vec<SocketAddr>> {
    (0..=nodes)
        .map(|i| {
            base_port
                .checked_add(i)
                .map(|port| SocketAddr::new(host, port))
                .with_context(|| {
                    format!("--base-port {} leaves no room for {} nodes", base_port, nodes)
                })
        })
        .collect()
}

fn log_level() -> tracing::Level {
    std::env::var("STATS_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing::Level::INFO)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(log_level()).init();

    let args = parse_args()?;
    let config = ClusterConfig::from_env()?;
    tracing::info!("Configuration: {:?}", config);

    // 1. Shared membership bus and message fabric:
    let bus = MembershipBus::new();
    let fabric = MessageFabric::new(config.serialize_messages);
    let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let mut addresses = node_addresses(host, args.base_port, args.nodes)?;
    let client_addr = addresses.pop().context("no client address")?;

    // 2. Compute nodes, oldest first:
    let mut nodes = Vec::new();
    for address in addresses {
        let node = ClusterNode::start(
            &config,
            bus.clone(),
            fabric.clone(),
            address,
            &[config.role.as_str()],
        )
        .await?;
        nodes.push(node);
    }

    // 3. Client node and driver:
    let client_node = ClusterNode::start(
        &config,
        bus.clone(),
        fabric.clone(),
        client_addr,
        &[CLIENT_ROLE],
    )
    .await?;

    let driver = if args.run_client {
        Some(ClientDriver::spawn(
            fabric.clone(),
            Address::new(client_addr, "/user/client"),
            client_node.tracker.clone(),
            ClientTarget::RandomMember {
                facade_path: config.facade_path.clone(),
            },
            Job::new(config.sample_text.clone()),
            config.client_interval,
        )?)
    } else {
        None
    };

    // 4. Spawn stats reporter:
    let stats_tracker = client_node.tracker.clone();
    let stats_fabric = fabric.clone();
    let router_metrics: Vec<_> = nodes
        .iter()
        .filter_map(|node| {
            node.router
                .as_ref()
                .map(|router| (node.address(), router.metrics.clone()))
        })
        .collect();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let members = stats_tracker.members();
            tracing::info!(
                "Cluster stats: {} compute nodes, {} delivered, {} dropped",
                members.len(),
                stats_fabric.delivered_count(),
                stats_fabric.dropped_count()
            );
            for node in members.iter() {
                tracing::info!("  - {} roles={:?} (age={})", node.address, node.roles, node.age);
            }
            for (address, metrics) in &router_metrics {
                tracing::info!(
                    "  router {}: {} accepted, {} rejected, {} subtasks",
                    address,
                    metrics.jobs_accepted(),
                    metrics.jobs_rejected(),
                    metrics.subtasks_dispatched()
                );
            }
        }
    });

    // 5. Start HTTP server:
    let state = HttpState {
        fabric: fabric.clone(),
        local: client_node.address(),
        facade: client_node.facade_address().clone(),
        tracker: client_node.tracker.clone(),
        reply_timeout: config.aggregation_timeout + Duration::from_secs(1),
    };
    let app = router(state);

    tracing::info!("HTTP server listening on {}", args.http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(args.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await?;

    // 6. Shutdown:
    tracing::info!("Shutting down");
    if let Some(driver) = driver {
        driver.stop(&fabric);
    }
    client_node.stop().await;
    for node in nodes {
        node.stop().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_addresses_are_consecutive() {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let addresses = node_addresses(host, 2551, 3).unwrap();

        let ports: Vec<u16> = addresses.iter().map(|a| a.port()).collect();
        assert_eq!(ports, vec![2551, 2552, 2553, 2554]);
    }

    #[test]
    fn test_node_addresses_reject_port_overflow() {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);

        assert!(node_addresses(host, u16::MAX, 1).is_err());
        assert!(node_addresses(host, 65000, 1000).is_err());
        assert!(node_addresses(host, u16::MAX - 1, 1).is_ok());
    }
}
