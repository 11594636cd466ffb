//! Central connection hub: registry, advisory lock table and routing.
//!
//! The hub is the only place where cross-connection state lives. It
//! keeps three indices over live connections (`all`, `by_company`,
//! `by_user`) plus the advisory record-lock table, and routes both
//! inbound client messages and outbound pushes from the adapters.
//!
//! # Concurrency
//!
//! Structural mutations (register/unregister) are serialized through a
//! single-consumer command channel owned by a dedicated registry task,
//! so the indices never observe a half-applied state. Everything else
//! (broadcast snapshots, presence reads, lock-table updates) goes
//! through a reader/writer lock that allows concurrent broadcasts
//! while serializing writes.
//!
//! # Delivery semantics
//!
//! Best-effort only. Sends resolve a snapshot of the relevant index at
//! call time and push to each target's bounded queue without blocking;
//! a full queue drops that single delivery. Envelope encoding failures
//! abort only the affected send. Nothing here retries, acknowledges or
//! persists.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};

use crate::domain::foundation::{CompanyId, ConnectionId, UserId};

use super::connection::Connection;
use super::messages::{
    DashboardUpdatePayload, Envelope, MessageType, PresencePayload, RecordLockPayload,
    TypingIndicatorPayload,
};

/// Key of an advisory record lock: the entity kind plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub entity_type: String,
    pub entity_id: String,
}

impl LockKey {
    /// Creates a lock key.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// Point-in-time view of the registry, for monitoring and tests.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub connections: Vec<ConnectionId>,
    pub by_user: HashMap<UserId, Vec<ConnectionId>>,
    pub by_company: HashMap<CompanyId, Vec<ConnectionId>>,
    pub locks: Vec<(LockKey, ConnectionId)>,
}

/// Commands consumed by the registry task.
enum RegistryCommand {
    Register {
        conn: Arc<Connection>,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        id: ConnectionId,
        ack: oneshot::Sender<()>,
    },
}

/// Shared mutable state behind the reader/writer lock.
#[derive(Default)]
struct HubState {
    all: HashMap<ConnectionId, Arc<Connection>>,
    by_company: HashMap<CompanyId, HashSet<ConnectionId>>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    locks: HashMap<LockKey, ConnectionId>,
}

impl HubState {
    /// Inserts a connection into all indices in one step.
    ///
    /// Returns whether this is the user's first live connection.
    fn insert(&mut self, conn: Arc<Connection>) -> bool {
        let came_online = !self.by_user.contains_key(conn.user_id());

        self.by_user
            .entry(conn.user_id().clone())
            .or_default()
            .insert(conn.id());
        if let Some(company) = conn.company_id() {
            self.by_company
                .entry(company.clone())
                .or_default()
                .insert(conn.id());
        }
        self.all.insert(conn.id(), conn);

        came_online
    }

    /// Removes a connection from all indices and sweeps its locks in
    /// the same step.
    ///
    /// Returns the removed connection, whether the user went offline,
    /// and the lock keys it held. Removing an unknown id is a no-op.
    fn remove(&mut self, id: ConnectionId) -> Option<(Arc<Connection>, bool, Vec<LockKey>)> {
        let conn = self.all.remove(&id)?;

        let mut went_offline = false;
        if let Some(bucket) = self.by_user.get_mut(conn.user_id()) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.by_user.remove(conn.user_id());
                went_offline = true;
            }
        }

        if let Some(company) = conn.company_id() {
            if let Some(bucket) = self.by_company.get_mut(company) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.by_company.remove(company);
                }
            }
        }

        let swept: Vec<LockKey> = self
            .locks
            .iter()
            .filter(|(_, holder)| **holder == id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &swept {
            self.locks.remove(key);
        }

        Some((conn, went_offline, swept))
    }

    /// Live connections of a company, in index order.
    fn company_targets(&self, company: &CompanyId) -> Vec<Arc<Connection>> {
        self.by_company
            .get(company)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.all.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Live connections of a user, in index order.
    fn user_targets(&self, user: &UserId) -> Vec<Arc<Connection>> {
        self.by_user
            .get(user)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.all.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Count of distinct users with at least one connection in the company.
    fn company_user_count(&self, company: &CompanyId) -> usize {
        self.by_company
            .get(company)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.all.get(id))
                    .map(|conn| conn.user_id())
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }
}

/// Process-wide registry and router for all live connections.
///
/// Created once at startup and shared as `Arc<Hub>`; it is never torn
/// down before process exit.
pub struct Hub {
    state: Arc<RwLock<HubState>>,
    registry_tx: mpsc::UnboundedSender<RegistryCommand>,
}

impl Hub {
    /// Creates the hub and spawns its registry task.
    ///
    /// Must run inside a tokio runtime.
    pub fn new() -> Arc<Self> {
        let state = Arc::new(RwLock::new(HubState::default()));
        let (registry_tx, registry_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_registry(Arc::clone(&state), registry_rx));

        Arc::new(Self { state, registry_tx })
    }

    /// Registers a connection.
    ///
    /// Serialized with every other structural mutation; returns once
    /// the indices are updated and the presence broadcast went out.
    pub async fn register(&self, conn: Arc<Connection>) {
        let (ack, done) = oneshot::channel();
        if self
            .registry_tx
            .send(RegistryCommand::Register { conn, ack })
            .is_err()
        {
            tracing::error!("registry task unavailable, register dropped");
            return;
        }
        let _ = done.await;
    }

    /// Unregisters a connection, purging every index entry and every
    /// lock it holds. Safe to call for an already-removed id.
    pub async fn unregister(&self, id: ConnectionId) {
        let (ack, done) = oneshot::channel();
        if self
            .registry_tx
            .send(RegistryCommand::Unregister { id, ack })
            .is_err()
        {
            tracing::error!("registry task unavailable, unregister dropped");
            return;
        }
        let _ = done.await;
    }

    /// Sends an envelope to every company connection registered at
    /// call time. Later registrants do not receive it.
    pub async fn broadcast_to_company(&self, company: &CompanyId, envelope: &Envelope) {
        let targets = self.state.read().await.company_targets(company);
        deliver(&targets, envelope);
    }

    /// Sends an envelope to every connection of a user registered at
    /// call time. Delivery per connection is independent; partial
    /// delivery is possible and not reported.
    pub async fn send_to_user(&self, user: &UserId, envelope: &Envelope) {
        let targets = self.state.read().await.user_targets(user);
        deliver(&targets, envelope);
    }

    /// Whether the user has at least one live connection.
    pub async fn is_user_online(&self, user: &UserId) -> bool {
        self.state.read().await.by_user.contains_key(user)
    }

    /// Distinct users with at least one live connection in the company.
    pub async fn online_users(&self, company: &CompanyId) -> Vec<UserId> {
        let state = self.state.read().await;
        let mut users: Vec<UserId> = state
            .company_targets(company)
            .iter()
            .map(|conn| conn.user_id().clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        users.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        users
    }

    /// Count of distinct online users in the company.
    pub async fn online_count(&self, company: &CompanyId) -> usize {
        self.state.read().await.company_user_count(company)
    }

    /// Current holder of an advisory lock, if any.
    pub async fn lock_holder(&self, entity_type: &str, entity_id: &str) -> Option<ConnectionId> {
        self.state
            .read()
            .await
            .locks
            .get(&LockKey::new(entity_type, entity_id))
            .copied()
    }

    /// Point-in-time view of the registry for monitoring and tests.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read().await;
        RegistrySnapshot {
            connections: state.all.keys().copied().collect(),
            by_user: state
                .by_user
                .iter()
                .map(|(user, ids)| (user.clone(), ids.iter().copied().collect()))
                .collect(),
            by_company: state
                .by_company
                .iter()
                .map(|(company, ids)| (company.clone(), ids.iter().copied().collect()))
                .collect(),
            locks: state
                .locks
                .iter()
                .map(|(key, holder)| (key.clone(), *holder))
                .collect(),
        }
    }

    /// Routes one decoded inbound envelope.
    ///
    /// Identity fields in trust-bearing payloads are replaced with the
    /// sending connection's verified identity before any relay; client
    /// values are never forwarded.
    pub async fn handle_client_message(&self, conn: &Arc<Connection>, envelope: Envelope) {
        match envelope.message_type {
            MessageType::Ping => {
                deliver(std::slice::from_ref(conn), &Envelope::bare(MessageType::Pong));
            }
            // Liveness pongs are consumed by the read loop.
            MessageType::Pong => {}
            MessageType::RecordLock => self.handle_record_lock(conn, &envelope).await,
            MessageType::RecordUnlock => self.handle_record_unlock(conn, &envelope).await,
            MessageType::TypingIndicator => self.handle_typing_indicator(conn, &envelope).await,
            other => {
                tracing::debug!(
                    connection_id = %conn.id(),
                    message_type = ?other,
                    "ignoring inbound message of server-originated type"
                );
            }
        }
    }

    /// Acquire an advisory lock and broadcast it to the company.
    ///
    /// The table entry is overwritten unconditionally: no conflict
    /// check against an existing different holder, last write wins.
    async fn handle_record_lock(&self, conn: &Arc<Connection>, envelope: &Envelope) {
        let payload: RecordLockPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(connection_id = %conn.id(), %error, "dropping malformed record_lock");
                return;
            }
        };

        let key = LockKey::new(&payload.entity_type, &payload.entity_id);
        let targets = {
            let mut state = self.state.write().await;
            state.locks.insert(key, conn.id());
            match conn.company_id() {
                Some(company) => state.company_targets(company),
                None => Vec::new(),
            }
        };

        let stamped = stamp_lock_payload(conn, payload);
        match Envelope::with_payload(MessageType::RecordLock, &stamped) {
            Ok(envelope) => deliver(&targets, &envelope),
            Err(error) => tracing::warn!(%error, "failed to encode record_lock, send aborted"),
        }
    }

    /// Release an advisory lock if the requester holds it, then
    /// broadcast the unlock either way.
    ///
    /// Unlocking a key that is unheld, or held by another connection,
    /// is a silent no-op: no error is surfaced to the caller.
    async fn handle_record_unlock(&self, conn: &Arc<Connection>, envelope: &Envelope) {
        let payload: RecordLockPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(connection_id = %conn.id(), %error, "dropping malformed record_unlock");
                return;
            }
        };

        let key = LockKey::new(&payload.entity_type, &payload.entity_id);
        let targets = {
            let mut state = self.state.write().await;
            if state.locks.get(&key) == Some(&conn.id()) {
                state.locks.remove(&key);
            }
            match conn.company_id() {
                Some(company) => state.company_targets(company),
                None => Vec::new(),
            }
        };

        let stamped = stamp_lock_payload(conn, payload);
        match Envelope::with_payload(MessageType::RecordUnlock, &stamped) {
            Ok(envelope) => deliver(&targets, &envelope),
            Err(error) => tracing::warn!(%error, "failed to encode record_unlock, send aborted"),
        }
    }

    /// Relay a typing indicator to the rest of the company.
    ///
    /// Every other company connection receives it, including other
    /// devices of the same user, but never the sender itself.
    async fn handle_typing_indicator(&self, conn: &Arc<Connection>, envelope: &Envelope) {
        let mut payload: TypingIndicatorPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(connection_id = %conn.id(), %error, "dropping malformed typing_indicator");
                return;
            }
        };
        payload.user_id = conn.user_id().to_string();

        let targets: Vec<Arc<Connection>> = match conn.company_id() {
            Some(company) => self
                .state
                .read()
                .await
                .company_targets(company)
                .into_iter()
                .filter(|target| target.id() != conn.id())
                .collect(),
            None => return,
        };

        match Envelope::with_payload(MessageType::TypingIndicator, &payload) {
            Ok(envelope) => deliver(&targets, &envelope),
            Err(error) => tracing::warn!(%error, "failed to encode typing_indicator, send aborted"),
        }
    }
}

/// Registry task: the single owner of structural mutations.
async fn run_registry(
    state: Arc<RwLock<HubState>>,
    mut commands: mpsc::UnboundedReceiver<RegistryCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            RegistryCommand::Register { conn, ack } => {
                let (came_online, targets, online_users) = {
                    let mut state = state.write().await;
                    let came_online = state.insert(Arc::clone(&conn));
                    match conn.company_id() {
                        Some(company) => (
                            came_online,
                            state.company_targets(company),
                            state.company_user_count(company),
                        ),
                        None => (came_online, Vec::new(), 0),
                    }
                };

                tracing::info!(
                    connection_id = %conn.id(),
                    user_id = %conn.user_id(),
                    "connection registered"
                );

                if came_online {
                    announce_presence(&targets, &conn, true);
                }
                announce_dashboard(&targets, online_users);
                let _ = ack.send(());
            }
            RegistryCommand::Unregister { id, ack } => {
                let removed = {
                    let mut state = state.write().await;
                    state.remove(id).map(|(conn, went_offline, swept)| {
                        let (targets, online_users) = match conn.company_id() {
                            Some(company) => (
                                state.company_targets(company),
                                state.company_user_count(company),
                            ),
                            None => (Vec::new(), 0),
                        };
                        (conn, went_offline, swept, targets, online_users)
                    })
                };

                if let Some((conn, went_offline, swept, targets, online_users)) = removed {
                    tracing::info!(
                        connection_id = %conn.id(),
                        user_id = %conn.user_id(),
                        released_locks = swept.len(),
                        "connection unregistered"
                    );

                    // Tell the write loop to close out the transport.
                    conn.request_close();

                    for key in swept {
                        let payload = RecordLockPayload {
                            entity_type: key.entity_type,
                            entity_id: key.entity_id,
                            user_id: conn.user_id().to_string(),
                            user_email: conn.identity().email.clone(),
                        };
                        match Envelope::with_payload(MessageType::RecordUnlock, &payload) {
                            Ok(envelope) => deliver(&targets, &envelope),
                            Err(error) => {
                                tracing::warn!(%error, "failed to encode swept unlock, send aborted")
                            }
                        }
                    }

                    if went_offline {
                        announce_presence(&targets, &conn, false);
                    }
                    announce_dashboard(&targets, online_users);
                }
                let _ = ack.send(());
            }
        }
    }
}

/// Replaces client-supplied identity fields with the verified identity.
fn stamp_lock_payload(conn: &Arc<Connection>, payload: RecordLockPayload) -> RecordLockPayload {
    RecordLockPayload {
        entity_type: payload.entity_type,
        entity_id: payload.entity_id,
        user_id: conn.user_id().to_string(),
        user_email: conn.identity().email.clone(),
    }
}

fn announce_presence(targets: &[Arc<Connection>], conn: &Arc<Connection>, online: bool) {
    if targets.is_empty() {
        return;
    }
    let payload = PresencePayload {
        user_id: conn.user_id().clone(),
        user_email: conn.identity().email.clone(),
        online,
    };
    match Envelope::with_payload(MessageType::Presence, &payload) {
        Ok(envelope) => deliver(targets, &envelope),
        Err(error) => tracing::warn!(%error, "failed to encode presence, send aborted"),
    }
}

fn announce_dashboard(targets: &[Arc<Connection>], online_users: usize) {
    if targets.is_empty() {
        return;
    }
    let payload = DashboardUpdatePayload { online_users };
    match Envelope::with_payload(MessageType::DashboardUpdate, &payload) {
        Ok(envelope) => deliver(targets, &envelope),
        Err(error) => tracing::warn!(%error, "failed to encode dashboard_update, send aborted"),
    }
}

/// Serializes once and pushes to each target without blocking.
///
/// An encoding failure aborts only this send; a full queue drops only
/// that connection's copy.
fn deliver(targets: &[Arc<Connection>], envelope: &Envelope) {
    if targets.is_empty() {
        return;
    }
    let frame = match serde_json::to_string(envelope) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!(
                %error,
                message_type = ?envelope.message_type,
                "failed to encode envelope, send aborted"
            );
            return;
        }
    };
    for conn in targets {
        if !conn.push(frame.clone()) {
            tracing::debug!(
                connection_id = %conn.id(),
                message_type = ?envelope.message_type,
                "outbound queue full or closed, frame dropped"
            );
        }
    }
}
