//! End-to-end node scenarios over real TCP: mining a submitted batch,
//! transaction and block gossip between two nodes, chain catch-up on
//! connect, and the commit race between competing blocks at the same index.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use vox_node::{MineOutcome, Node, NodeConfig};
use vox_p2p::{Envelope, MessageKind, MessagePayload, Peer, PeerReader};
use vox_types::{payload, Block, PeerEntry, Transaction, TransactionKind};

const WAIT: Duration = Duration::from_secs(10);

/// Test config: loopback, ephemeral port, low difficulty, and a scheduled
/// miner polling so rarely it never runs inside a test.
fn test_config(id: &str) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.id = id.to_string();
    config.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.port = 0;
    config.chain.difficulty = 1;
    config.mining.cooldown_ms = 0;
    config.mining.poll_interval_ms = 3_600_000;
    config
}

async fn start_node(id: &str) -> Node {
    let node = Node::new(test_config(id));
    node.start().await.expect("node should start");
    node
}

fn vote_tx(origin: &str, n: u64) -> Transaction {
    let vote = payload::Vote {
        election_id: "EL-2026".into(),
        voting_token: format!("token-{n}"),
        candidate_number: "13".into(),
        cast_at_ms: 1_700_000_000_000 + n,
    };
    Transaction::new(TransactionKind::Vote, &vote, origin).unwrap()
}

/// Poll `check` until it passes or the deadline expires.
async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// A hand-driven wire endpoint standing in for a remote node.
struct FakePeer {
    peer: Peer,
    reader: PeerReader,
    id: String,
}

impl FakePeer {
    async fn connect(node: &Node, id: &str) -> Self {
        let addr = node.local_addr().expect("node is listening");
        let stream = TcpStream::connect(addr).await.unwrap();
        let (peer, reader) = Peer::from_stream(id, stream);
        Self {
            peer,
            reader,
            id: id.to_string(),
        }
    }

    async fn send(&self, payload: MessagePayload) {
        self.peer
            .send(&Envelope::new(&self.id, payload))
            .await
            .unwrap();
    }

    /// Next envelope of `kind`, skipping the node's periodic pings and
    /// gossip probes.
    async fn expect(&mut self, kind: MessageKind) -> Envelope {
        loop {
            let envelope = timeout(WAIT, self.reader.next())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
                .expect("read should not fail")
                .expect("connection should stay open");
            if envelope.kind() == kind {
                return envelope;
            }
        }
    }
}

#[tokio::test]
async fn submitted_batch_is_mined_into_one_valid_block() {
    let node = start_node("TSE-SP").await;
    for n in 1..=5 {
        assert!(node.submit_transaction(vote_tx("TSE-SP", n)).await);
    }
    assert_eq!(node.pool_size(), 5);

    match node.mine_now().await {
        MineOutcome::Committed(block) => {
            assert_eq!(block.index, 1);
            assert_eq!(block.transactions.len(), 5);
        }
        other => panic!("expected Committed, got {other:?}"),
    }

    assert_eq!(node.chain_len(), 2);
    assert_eq!(node.pool_size(), 0);
    node.ledger().validate_chain().unwrap();
    node.shutdown().await;
}

#[tokio::test]
async fn transactions_and_blocks_gossip_between_two_nodes() {
    let a = start_node("TSE-SP").await;
    let b = start_node("TSE-RJ").await;

    let b_addr = b.local_addr().unwrap();
    a.connect_to_peer(&PeerEntry::new("TSE-RJ", b_addr.ip().to_string(), b_addr.port()))
        .await;

    // A's transaction reaches B's pool.
    a.submit_transaction(vote_tx("TSE-SP", 1)).await;
    eventually("transaction gossip to B", || b.pool_size() == 1).await;

    // B mines it; the block flows back to A over B's inbound connection.
    assert!(matches!(b.mine_now().await, MineOutcome::Committed(_)));
    eventually("block gossip to A", || a.chain_len() == 2).await;

    assert_eq!(a.ledger().tip_hash(), b.ledger().tip_hash());
    assert_eq!(a.pool_size(), 0);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn late_joiner_adopts_the_longer_chain_on_connect() {
    let a = start_node("TSE-SP").await;
    a.submit_transaction(vote_tx("TSE-SP", 1)).await;
    a.submit_transaction(vote_tx("TSE-SP", 2)).await;
    assert!(matches!(a.mine_now().await, MineOutcome::Committed(_)));
    assert_eq!(a.chain_len(), 2);

    // B starts from genesis and dials A; the connect path requests A's
    // chain immediately.
    let b = start_node("TSE-RJ").await;
    let a_addr = a.local_addr().unwrap();
    b.connect_to_peer(&PeerEntry::new("TSE-SP", a_addr.ip().to_string(), a_addr.port()))
        .await;

    eventually("B adopts A's chain", || b.chain_len() == 2).await;
    assert_eq!(b.ledger().tip_hash(), a.ledger().tip_hash());

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn first_block_at_an_index_wins_and_the_loser_is_ignored() {
    let node = start_node("TSE-SP").await;
    let genesis_hash = node.ledger().tip_hash();

    let mut first = FakePeer::connect(&node, "TSE-RJ").await;
    let mut second = FakePeer::connect(&node, "TSE-MG").await;

    // Two valid blocks competing for index 1.
    let mut winner = Block::new(
        1,
        vec![vote_tx("TSE-RJ", 10)],
        genesis_hash.clone(),
        "TSE-RJ".to_string(),
        Some(1_700_000_001_000),
    );
    winner.mine(1);
    let mut loser = Block::new(
        1,
        vec![vote_tx("TSE-MG", 20)],
        genesis_hash,
        "TSE-MG".to_string(),
        Some(1_700_000_002_000),
    );
    loser.mine(1);

    // The first arrival commits and is relayed to everyone but its sender.
    first.send(MessagePayload::NewBlock(Box::new(winner.clone()))).await;
    let relayed = second.expect(MessageKind::NewBlock).await;
    match relayed.payload {
        MessagePayload::NewBlock(block) => assert_eq!(block.hash, winner.hash),
        other => panic!("expected NewBlock, got {other:?}"),
    }

    // The second arrival is now behind the tip and is dropped silently.
    second.send(MessagePayload::NewBlock(Box::new(loser))).await;

    // The chain still ends at the winner.
    first.send(MessagePayload::RequestChain).await;
    let response = first.expect(MessageKind::ChainResponse).await;
    match response.payload {
        MessagePayload::ChainResponse(blocks) => {
            assert_eq!(blocks.len(), 2);
            assert_eq!(blocks.last().unwrap().hash, winner.hash);
        }
        other => panic!("expected ChainResponse, got {other:?}"),
    }

    node.shutdown().await;
}

#[tokio::test]
async fn stale_block_within_fork_tolerance_triggers_a_chain_exchange() {
    let mut config = test_config("TSE-SP");
    config.chain.fork_depth_tolerance = 2;
    let node = Node::new(config);
    node.start().await.expect("node should start");

    let genesis_hash = node.ledger().tip_hash();
    node.submit_transaction(vote_tx("TSE-SP", 1)).await;
    assert!(matches!(node.mine_now().await, MineOutcome::Committed(_)));
    assert_eq!(node.chain_len(), 2);

    // A competing block for the index our tip already occupies — one
    // behind the chain length, inside the tolerance window.
    let mut fork = Block::new(
        1,
        vec![vote_tx("TSE-RJ", 2)],
        genesis_hash,
        "TSE-RJ".to_string(),
        Some(1_700_000_003_000),
    );
    fork.mine(1);

    let mut peer = FakePeer::connect(&node, "TSE-RJ").await;
    peer.send(MessagePayload::NewBlock(Box::new(fork))).await;

    // Instead of dropping the old block, the node opens a full-chain
    // exchange with its sender so the fork can be arbitrated.
    peer.expect(MessageKind::RequestChain).await;
    assert_eq!(node.chain_len(), 2);

    node.shutdown().await;
}

#[tokio::test]
async fn ping_is_answered_and_catalogs_gossip() {
    let node = start_node("TSE-SP").await;
    let mut fake = FakePeer::connect(&node, "TSE-RJ").await;

    fake.send(MessagePayload::Ping).await;
    fake.expect(MessageKind::Pong).await;

    fake.send(MessagePayload::PeersResponse(vec![PeerEntry::new(
        "TSE-MG",
        "localhost",
        8003,
    )]))
    .await;

    fake.send(MessagePayload::ListPeers).await;
    let response = fake.expect(MessageKind::PeersResponse).await;
    match response.payload {
        MessagePayload::PeersResponse(entries) => {
            assert!(entries.iter().any(|e| e.id == "TSE-MG"));
        }
        other => panic!("expected PeersResponse, got {other:?}"),
    }

    node.shutdown().await;
}
