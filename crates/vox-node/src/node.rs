//! The node: listener, peer connections, message dispatch, and the
//! discovery tasks.
//!
//! One read loop per connection feeds the envelope dispatch; writes go
//! through the shared [`Peer`] handles. Three periodic tasks keep the mesh
//! alive: a reconnect sweep over inactive catalog entries, a ping sweep
//! over live connections, and catalog gossip. A failed bind is the only
//! fatal error; everything else is logged and retried or dropped.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use vox_chain::Resolution;
use vox_p2p::{Envelope, MessagePayload, Peer, PeerCatalog, PeerReader};
use vox_types::{Block, PeerEntry, Transaction};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::ledger::{CommitOutcome, Ledger, RemoteChainVerdict};
use crate::miner::{MineOutcome, Miner};

/// A running VoxChain node. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    miner: Arc<Miner>,
    catalog: PeerCatalog,
    /// Live connections, keyed by peer id (or a synthetic key for inbound
    /// connections whose catalog identity is unknown).
    peers: RwLock<HashMap<String, Arc<Peer>>>,
    listen_addr: OnceLock<SocketAddr>,
    inbound_seq: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let ledger = Arc::new(Ledger::new(
            config.chain.difficulty,
            config.chain.block_tx_limit,
            config.chain.fork_strategy,
        ));
        let miner = Arc::new(Miner::new(Arc::clone(&ledger), &config.id, &config.mining));
        let catalog = PeerCatalog::with_bootstrap(config.bootstrap_entries(), &config.id);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(NodeInner {
                config,
                ledger,
                miner,
                catalog,
                peers: RwLock::new(HashMap::new()),
                listen_addr: OnceLock::new(),
                inbound_seq: AtomicU64::new(0),
                shutdown,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.inner.ledger
    }

    /// Address the listener actually bound to. Available after `start`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.listen_addr.get().copied()
    }

    /// Bind the listener and spawn the accept loop, the miner loop, and
    /// the discovery tasks. Returns once the node is serving.
    pub async fn start(&self) -> Result<(), NodeError> {
        let addr = self.inner.config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NodeError::Bind { addr, source })?;
        let bound = listener
            .local_addr()
            .map_err(|source| NodeError::Bind { addr, source })?;
        let _ = self.inner.listen_addr.set(bound);
        info!(id = %self.id(), addr = %bound, "node listening");

        tokio::spawn(
            self.clone()
                .accept_loop(listener, self.inner.shutdown.subscribe()),
        );

        // Miner loop plus a small task that broadcasts what it commits.
        let (commit_tx, mut commit_rx) = mpsc::channel::<Block>(16);
        tokio::spawn(
            Arc::clone(&self.inner.miner).run(self.inner.shutdown.subscribe(), commit_tx),
        );
        let node = self.clone();
        tokio::spawn(async move {
            while let Some(block) = commit_rx.recv().await {
                node.broadcast(MessagePayload::NewBlock(Box::new(block))).await;
            }
        });

        self.spawn_discovery_tasks();
        Ok(())
    }

    /// Signal every task to stop and mark all connections dead.
    pub async fn shutdown(&self) {
        info!(id = %self.id(), "shutting down");
        let _ = self.inner.shutdown.send(true);
        let mut peers = self.inner.peers.write().await;
        for peer in peers.values() {
            peer.disconnect();
        }
        peers.clear();
    }

    /// Admit a locally submitted transaction and gossip it. Returns whether
    /// it was new.
    pub async fn submit_transaction(&self, tx: Transaction) -> bool {
        if !self.inner.ledger.add_transaction(tx.clone()) {
            debug!(tx_id = %tx.id, "duplicate transaction dropped");
            return false;
        }
        info!(tx_id = %tx.id, kind = %tx.kind.tag(), "transaction admitted");
        self.broadcast(MessagePayload::NewTransaction(tx)).await;
        true
    }

    /// One immediate mining attempt, cooldown bypassed. The committed block
    /// (if any) is broadcast before returning.
    pub async fn mine_now(&self) -> MineOutcome {
        let outcome = self.inner.miner.mine_once(false).await;
        if let MineOutcome::Committed(block) = &outcome {
            self.broadcast(MessagePayload::NewBlock(block.clone())).await;
        }
        outcome
    }

    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.inner.ledger.chain_snapshot()
    }

    pub fn chain_len(&self) -> u64 {
        self.inner.ledger.chain_len()
    }

    pub fn pool_size(&self) -> usize {
        self.inner.ledger.pool_len()
    }

    /// One-line status summary, for the periodic status log.
    pub async fn status(&self) -> String {
        format!(
            "[{}] chain: {} blocks ({} tx) | pool: {} | connections: {} | catalog: {} ({} active)",
            self.id(),
            self.inner.ledger.chain_len(),
            self.inner.ledger.total_transactions(),
            self.inner.ledger.pool_len(),
            self.inner.peers.read().await.len(),
            self.inner.catalog.len(),
            self.inner.catalog.active_count(),
        )
    }

    async fn accept_loop(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        // Inbound connections get a synthetic key until (and
                        // unless) gossip ties them to a catalog identity.
                        let key = format!(
                            "remote-{}",
                            self.inner.inbound_seq.fetch_add(1, Ordering::Relaxed)
                        );
                        debug!(peer = %key, %remote, "inbound connection");
                        self.register_peer(key, stream).await;
                    }
                    Err(err) => warn!(error = %err, "accept failed"),
                },
            }
        }
        debug!("accept loop stopped");
    }

    /// Dial a catalog entry, register the connection under the entry's id,
    /// and ask for its chain.
    pub async fn connect_to_peer(&self, entry: &PeerEntry) {
        if entry.id == self.id() || self.inner.peers.read().await.contains_key(&entry.id) {
            return;
        }
        // Stamp the attempt so a failed dial waits out the retry cooldown.
        self.inner.catalog.touch(&entry.id);

        match TcpStream::connect((entry.address.as_str(), entry.port)).await {
            Ok(stream) => {
                info!(peer = %entry.id, endpoint = %entry.endpoint(), "connected to peer");
                self.inner.catalog.mark_active(&entry.id);
                let peer = self.register_peer(entry.id.clone(), stream).await;
                // Catch up immediately rather than waiting for gossip.
                if peer
                    .send(&self.envelope(MessagePayload::RequestChain))
                    .await
                    .is_err()
                {
                    self.drop_peer(&entry.id).await;
                }
            }
            Err(err) => {
                debug!(peer = %entry.id, endpoint = %entry.endpoint(), error = %err, "dial failed");
            }
        }
    }

    async fn register_peer(&self, key: String, stream: TcpStream) -> Arc<Peer> {
        let (peer, reader) = Peer::from_stream(key.clone(), stream);
        let peer = Arc::new(peer);
        self.inner
            .peers
            .write()
            .await
            .insert(key.clone(), Arc::clone(&peer));
        tokio::spawn(self.clone().read_loop(key, Arc::clone(&peer), reader));
        peer
    }

    async fn read_loop(self, key: String, peer: Arc<Peer>, mut reader: PeerReader) {
        loop {
            match reader.next().await {
                Ok(Some(envelope)) => {
                    debug!(
                        peer = %key,
                        sender = %envelope.sender_id,
                        kind = %envelope.kind(),
                        "message received"
                    );
                    self.handle_envelope(&key, envelope).await;
                }
                Ok(None) => {
                    info!(peer = %key, "peer closed the connection");
                    break;
                }
                Err(err) => {
                    warn!(peer = %key, error = %err, "read failed");
                    break;
                }
            }
            if !peer.is_connected() {
                break;
            }
        }
        peer.disconnect();
        self.drop_peer(&key).await;
    }

    async fn handle_envelope(&self, key: &str, envelope: Envelope) {
        let sender_id = envelope.sender_id;
        match envelope.payload {
            MessagePayload::NewTransaction(tx) => {
                if self.inner.ledger.add_transaction(tx.clone()) {
                    info!(tx_id = %tx.id, from = %sender_id, "transaction accepted from peer");
                    self.broadcast_except(MessagePayload::NewTransaction(tx), key)
                        .await;
                } else {
                    debug!(tx_id = %tx.id, from = %sender_id, "duplicate transaction ignored");
                }
            }
            MessagePayload::NewBlock(block) => {
                self.process_new_block(*block, key, &sender_id).await;
            }
            MessagePayload::RequestChain => {
                let snapshot = self.inner.ledger.chain_snapshot();
                self.send_to(key, MessagePayload::ChainResponse(snapshot))
                    .await;
            }
            MessagePayload::ChainResponse(blocks) => {
                self.process_chain_response(&blocks, &sender_id);
            }
            MessagePayload::Ping => {
                self.inner.catalog.touch(&sender_id);
                self.send_to(key, MessagePayload::Pong).await;
            }
            MessagePayload::Pong => {
                self.inner.catalog.touch(&sender_id);
            }
            MessagePayload::ListPeers => {
                let entries = self.inner.catalog.snapshot();
                self.send_to(key, MessagePayload::PeersResponse(entries))
                    .await;
            }
            MessagePayload::PeersResponse(entries) => {
                let added = self.inner.catalog.merge(entries, self.id());
                if added > 0 {
                    info!(added, from = %sender_id, "peer catalog grew from gossip");
                }
            }
        }
    }

    /// Dispatch an inbound block by how its index compares to our chain
    /// length: the expected next block goes through the commit path and is
    /// rebroadcast on success; a block from the future means we are behind
    /// and should fetch the sender's chain; a block from the past is
    /// ignored unless it falls within the configured fork-depth tolerance,
    /// in which case we fetch the sender's chain and let conflict
    /// resolution arbitrate.
    async fn process_new_block(&self, block: Block, key: &str, sender_id: &str) {
        let local_len = self.inner.ledger.chain_len();
        let index = block.index;

        if index == local_len {
            match self.inner.ledger.commit_block(block.clone()) {
                CommitOutcome::Committed => {
                    info!(
                        index,
                        hash = %block.short_hash(),
                        miner = %block.miner_id,
                        from = %sender_id,
                        "block accepted from peer"
                    );
                    self.broadcast_except(MessagePayload::NewBlock(Box::new(block)), key)
                        .await;
                }
                CommitOutcome::Superseded { chain_len } => {
                    debug!(index, chain_len, from = %sender_id, "block lost the commit race");
                }
                CommitOutcome::Invalid(err) => {
                    warn!(index, from = %sender_id, error = %err, "invalid block rejected");
                }
            }
        } else if index > local_len {
            debug!(index, local_len, from = %sender_id, "peer is ahead, requesting its chain");
            self.send_to(key, MessagePayload::RequestChain).await;
        } else {
            let behind = local_len - index;
            if behind <= self.inner.config.chain.fork_depth_tolerance {
                debug!(index, local_len, from = %sender_id, "possible fork, requesting peer chain");
                self.send_to(key, MessagePayload::RequestChain).await;
            } else {
                debug!(index, local_len, from = %sender_id, "stale block ignored");
            }
        }
    }

    fn process_chain_response(&self, blocks: &[Block], sender_id: &str) {
        let remote_len = blocks.len();
        match self.inner.ledger.handle_remote_chain(blocks) {
            RemoteChainVerdict::Replaced { old_len, new_len } => {
                info!(old_len, new_len, from = %sender_id, "chain replaced by longer remote chain");
            }
            RemoteChainVerdict::Resolved {
                resolution,
                analysis,
            } => {
                if let Some(analysis) = &analysis {
                    debug!(
                        divergence = ?analysis.divergence_point,
                        local_branch = analysis.local_branch_len,
                        remote_branch = analysis.remote_branch_len,
                        local_work = analysis.local_branch_work,
                        remote_work = analysis.remote_branch_work,
                        from = %sender_id,
                        "fork analyzed"
                    );
                }
                match resolution {
                    Resolution::AdoptRemote { reason, .. } => {
                        info!(remote_len, from = %sender_id, %reason, "remote chain adopted");
                    }
                    Resolution::KeepLocal { reason, .. } => {
                        debug!(remote_len, from = %sender_id, %reason, "local chain kept");
                    }
                    Resolution::LocalInvalid(err) => {
                        warn!(error = %err, "local chain invalid, manual intervention needed");
                    }
                }
            }
            RemoteChainVerdict::Rejected(err) => {
                warn!(remote_len, from = %sender_id, error = %err, "invalid remote chain rejected");
            }
        }
    }

    fn envelope(&self, payload: MessagePayload) -> Envelope {
        Envelope::new(self.id(), payload)
    }

    async fn send_to(&self, key: &str, payload: MessagePayload) {
        let peer = self.inner.peers.read().await.get(key).cloned();
        if let Some(peer) = peer {
            if peer.send(&self.envelope(payload)).await.is_err() {
                self.drop_peer(key).await;
            }
        }
    }

    /// Send to every live connection.
    pub async fn broadcast(&self, payload: MessagePayload) {
        self.broadcast_except(payload, "").await;
    }

    /// Send to every live connection except `exclude` — the connection a
    /// relayed message arrived on, so it is not echoed back.
    async fn broadcast_except(&self, payload: MessagePayload, exclude: &str) {
        let targets: Vec<(String, Arc<Peer>)> = self
            .inner
            .peers
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.as_str() != exclude)
            .map(|(key, peer)| (key.clone(), Arc::clone(peer)))
            .collect();

        let envelope = self.envelope(payload);
        for (key, peer) in targets {
            if peer.send(&envelope).await.is_err() {
                self.drop_peer(&key).await;
            }
        }
    }

    async fn drop_peer(&self, key: &str) {
        if let Some(peer) = self.inner.peers.write().await.remove(key) {
            peer.disconnect();
            self.inner.catalog.mark_inactive(key);
            debug!(peer = %key, "peer dropped");
        }
    }

    fn spawn_discovery_tasks(&self) {
        let discovery = &self.inner.config.discovery;

        // Reconnect sweep: dial inactive catalog entries past the cooldown.
        let node = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        let connect_every = Duration::from_secs(discovery.connect_interval_secs);
        let retry_cooldown = discovery.retry_cooldown_ms;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(connect_every);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        for entry in node.inner.catalog.due_for_connect(retry_cooldown) {
                            node.connect_to_peer(&entry).await;
                        }
                    }
                }
            }
        });

        // Health sweep: ping every live connection; sends that fail mark
        // the peer dead and drop it.
        let node = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        let health_every = Duration::from_secs(discovery.health_check_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(health_every);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        node.broadcast(MessagePayload::Ping).await;
                    }
                }
            }
        });

        // Gossip: ask everyone for their catalog.
        let node = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        let gossip_every = Duration::from_secs(discovery.gossip_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gossip_every);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        node.broadcast(MessagePayload::ListPeers).await;
                    }
                }
            }
        });
    }
}
