//! Starts three cluster-core nodes on loopback, joins them together, and
//! prints the membership view each of them converges to.

use std::time::Duration;

use tattle_rs::{ClusterCore, Config};

fn config(name: &str, port: u16) -> Config {
    Config {
        node_name: name.to_string(),
        bind_address: "127.0.0.1".to_string(),
        bind_port: port,
        probe_interval: Duration::from_millis(100),
        sync_interval: Duration::from_secs(2),
        ..Config::default()
    }
}

#[tokio::main]
async fn main() -> tattle_rs::Result<()> {
    tracing_subscriber::fmt::init();

    let a = ClusterCore::new(config("a", 17946))?;
    let b = ClusterCore::new(config("b", 17947))?;
    let c = ClusterCore::new(config("c", 17948))?;

    a.start().await?;
    b.start().await?;
    c.start().await?;

    b.join(&[("127.0.0.1".to_string(), 17946)]).await?;
    c.join(&[("127.0.0.1".to_string(), 17946)]).await?;

    tokio::time::sleep(Duration::from_secs(3)).await;

    for (name, core) in [("a", &a), ("b", &b), ("c", &c)] {
        let members = core.members().await;
        println!("{name} sees {} member(s):", members.len());
        for member in members {
            println!("  {} @ {}:{} ({:?})", member.name, member.host, member.port, member.status);
        }
    }

    a.stop().await;
    b.stop().await;
    c.stop().await;
    Ok(())
}
