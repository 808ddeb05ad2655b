use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::bonding::BondingProcess;
use super::maintenance;
use super::topology;
use crate::domain::{
    Node, NodeId, NodeRole, TableConfig, TableError, TableResult, Timestamp, TransportError,
};
use crate::metrics;
use crate::ports::{ConfigProvider, NodeStore, TimeSource, Transport};
use crate::routing::Storage;

/// Pending on-demand refresh: the sender fires once the refresh completes.
pub(crate) type RefreshRequest = oneshot::Sender<()>;

/// Shared state of the discovery table.
///
/// Owned through an `Arc` by the [`Table`] handle, the maintenance loop and
/// every in-flight lookup task.
pub(crate) struct TableCore {
    pub(crate) self_node: Node,
    pub(crate) config: TableConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn NodeStore>,
    clock: Arc<dyn TimeSource>,
    /// Validated bootstrap nodes, used when the node store has no seeds.
    nursery: Vec<Node>,
    storages: HashMap<NodeRole, Arc<dyn Storage>>,
    /// In-flight handshakes, at most one per remote node.
    pub(super) bonding: Mutex<HashMap<NodeId, Arc<BondingProcess>>>,
    /// Caps concurrent ping/pong exchanges.
    pub(super) bond_slots: Semaphore,
    init_done: AtomicBool,
    closed: AtomicBool,
    refresh_req: mpsc::UnboundedSender<RefreshRequest>,
}

impl TableCore {
    /// Build the core and the receiving end of its refresh-request channel.
    pub(crate) fn new(
        self_node: Node,
        config: TableConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn NodeStore>,
        clock: Arc<dyn TimeSource>,
        nursery: Vec<Node>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<RefreshRequest>) {
        let storages = topology::build_storages(&self_node, &config);
        let (refresh_req, refresh_rx) = mpsc::unbounded_channel();
        let core = Arc::new(Self {
            bond_slots: Semaphore::new(config.max_bonding),
            self_node,
            config,
            transport,
            store,
            clock,
            nursery,
            storages,
            bonding: Mutex::new(HashMap::new()),
            init_done: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            refresh_req,
        });
        (core, refresh_rx)
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) fn storage(&self, role: NodeRole) -> Option<Arc<dyn Storage>> {
        self.storages.get(&role).cloned()
    }

    /// All routing sets, in role order.
    pub(crate) fn storages(&self) -> Vec<Arc<dyn Storage>> {
        NodeRole::ALL
            .iter()
            .filter_map(|role| self.storages.get(role).cloned())
            .collect()
    }

    pub(crate) fn roles(&self) -> Vec<NodeRole> {
        self.storages().iter().map(|s| s.role()).collect()
    }

    pub(crate) fn is_init_done(&self) -> bool {
        self.init_done.load(Ordering::Acquire)
    }

    pub(crate) fn mark_init_done(&self) {
        self.init_done.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Routing sets that hold nodes of `role`: bootnodes go everywhere.
    fn storages_for(&self, role: NodeRole) -> Vec<Arc<dyn Storage>> {
        if role == NodeRole::Bootnode {
            self.storages()
        } else {
            self.storage(role).into_iter().collect()
        }
    }

    /// Insert a freshly bonded node into its routing set(s).
    pub(crate) fn add(&self, node: Node) {
        let targets = self.storages_for(node.role);
        if targets.is_empty() {
            trace!(node = %node, "no routing set for role, ignoring");
            return;
        }
        for storage in targets {
            storage.add(node.clone());
            self.record_occupancy(storage.as_ref());
        }
    }

    /// Remove a node from its routing set(s). The node store record stays.
    pub(crate) fn delete(&self, node: &Node) {
        for storage in self.storages_for(node.role) {
            if storage.delete(node) {
                self.record_occupancy(storage.as_ref());
            }
        }
    }

    pub(crate) fn record_occupancy(&self, storage: &dyn Storage) {
        metrics::set_occupancy(storage.role(), storage.len(), storage.replacement_len());
    }

    /// Ping `id` and record the bond time on success.
    pub(crate) async fn ping(&self, id: NodeId, addr: SocketAddr) -> Result<(), TransportError> {
        self.transport.ping(id, addr).await?;
        if let Err(e) = self.store.update_last_bond(&id, self.now()) {
            warn!(node = ?id, error = %e, "failed to record bond time");
        }
        Ok(())
    }

    /// Ask the maintenance loop for a refresh and wait for it to finish.
    ///
    /// Returns immediately once the loop has shut down.
    pub(crate) async fn refresh(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.refresh_req.send(done_tx).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Refresh every routing set concurrently.
    pub(crate) async fn do_refresh(self: &Arc<Self>) {
        let storages = self.storages();
        join_all(storages.iter().map(|s| s.do_refresh(self))).await;
    }

    /// Revalidate one member of every routing set.
    pub(crate) async fn do_revalidate(self: &Arc<Self>) {
        let storages = self.storages();
        join_all(storages.iter().map(|s| s.do_revalidate(self))).await;
    }

    pub(crate) fn copy_bonded_nodes(&self) {
        for storage in self.storages() {
            storage.copy_bonded_nodes(self);
        }
    }

    /// Seeds for a refresh of `role`'s routing set: recent nodes from the
    /// node store plus the bootstrap nodes, bonded before use.
    pub(crate) async fn load_seed_nodes(self: &Arc<Self>, role: NodeRole) -> Vec<Node> {
        let now = self.now();
        let mut seeds = self.store.query_seeds(
            role,
            self.config.seed_count,
            self.config.seed_max_age_secs,
            now,
        );
        seeds.extend(self.nursery.iter().cloned());

        let bonded = self.bond_all(seeds).await;
        for seed in &bonded {
            let age = self
                .store
                .last_bond(&seed.id)
                .map(|t| now.secs_since(t))
                .unwrap_or_default();
            debug!(%role, seed = %seed, age_secs = age, "found seed node");
        }
        bonded
    }
}

/// Discovery table handle.
///
/// Creating a table spawns its maintenance loop on the current tokio
/// runtime. Call [`Table::close`] to stop it and release the transport and
/// node store; dropping the handle stops the loop as well, without waiting.
pub struct Table {
    pub(crate) core: Arc<TableCore>,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Table {
    /// Create a table and start its maintenance loop.
    ///
    /// # Arguments
    ///
    /// * `self_node` - Our own node record; its role selects the topology
    /// * `config` - Table tuning parameters
    /// * `transport` - Discovery wire protocol
    /// * `store` - Durable node cache
    /// * `clock` - Provider for current time
    /// * `bootstrap` - Seed nodes; must carry id, IP and UDP port and not be us
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for unusable parameters, `InvalidSeed` for an
    /// incomplete bootstrap node or one carrying our own id.
    pub fn new(
        self_node: Node,
        config: TableConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn NodeStore>,
        clock: Arc<dyn TimeSource>,
        bootstrap: Vec<Node>,
    ) -> TableResult<Self> {
        config.validate()?;

        let mut nursery = Vec::with_capacity(bootstrap.len());
        for seed in bootstrap {
            if let Err(reason) = seed.validate_complete() {
                return Err(TableError::InvalidSeed {
                    node: seed.to_string(),
                    reason: reason.to_string(),
                });
            }
            if seed.id == self_node.id {
                return Err(TableError::InvalidSeed {
                    node: seed.to_string(),
                    reason: "seed is the local node".into(),
                });
            }
            nursery.push(seed);
        }

        let (core, refresh_rx) =
            TableCore::new(self_node, config, transport, store, clock, nursery);
        let (close_tx, close_rx) = oneshot::channel();
        let handle = tokio::spawn(maintenance::run(Arc::clone(&core), refresh_rx, close_rx));

        info!(
            node = %core.self_node,
            roles = ?core.roles(),
            "discovery table started"
        );

        Ok(Self {
            core,
            close_tx: Mutex::new(Some(close_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Create a table from a configuration source.
    pub fn from_provider(
        self_node: Node,
        provider: &dyn ConfigProvider,
        transport: Arc<dyn Transport>,
        store: Arc<dyn NodeStore>,
        clock: Arc<dyn TimeSource>,
    ) -> TableResult<Self> {
        Self::new(
            self_node,
            provider.get_table_config(),
            transport,
            store,
            clock,
            provider.get_bootstrap_nodes(),
        )
    }

    /// Stop the maintenance loop and wait until in-flight work has drained
    /// and the transport and node store are closed. Idempotent.
    pub async fn close(&self) {
        if let Some(close_tx) = self.close_tx.lock().take() {
            let _ = close_tx.send(());
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "maintenance loop terminated abnormally");
            }
        }
    }
}
