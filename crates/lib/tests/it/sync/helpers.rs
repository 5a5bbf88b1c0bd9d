use std::sync::Arc;

use driftdoc::{
    FixedClock,
    config::NetworkConfig,
    sync::{ChannelLink, Network},
};

use crate::helpers::replica;

/// Creates a coordinator with a fixed peer id over a fresh replica.
pub async fn peer(id: &str, clock: &Arc<FixedClock>) -> Network {
    let document = replica(clock.clone()).await;
    Network::with_config(
        document,
        NetworkConfig {
            peer_id: Some(id.to_string()),
            ..NetworkConfig::default()
        },
    )
    .await
    .expect("Failed to create network")
}

/// Pumps every link until a full pass delivers nothing.
pub async fn settle(links: &mut [ChannelLink]) -> usize {
    let mut total = 0;
    loop {
        let mut delivered = 0;
        for link in links.iter_mut() {
            delivered += link.pump().await.expect("link failed");
        }
        if delivered == 0 {
            return total;
        }
        total += delivered;
    }
}
