use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::conversation::{Role, SessionFlag, SessionFlags, Turn};
use crate::domain::slots::{SlotError, SlotName, SlotSet, SlotValue};
use crate::session::clock::{Clock, SystemClock};

pub const DEFAULT_MAX_HISTORY: usize = 20;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Most recent turns kept per session; older turns are dropped first.
    pub max_history: usize,
    /// Sessions idle for at least this long are evicted by the sweep.
    pub idle_timeout: Duration,
    /// Period of the background eviction sweep.
    pub sweep_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Copy of one session's state taken under a single lock acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub history: Vec<Turn>,
    pub slots: SlotSet,
    pub flags: SessionFlags,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug)]
struct SessionState {
    history: VecDeque<Turn>,
    slots: SlotSet,
    flags: SessionFlags,
    last_active: DateTime<Utc>,
}

impl SessionState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            history: VecDeque::new(),
            slots: SlotSet::default(),
            flags: SessionFlags::default(),
            last_active: now,
        }
    }
}

/// Thread-safe, in-memory conversation state keyed by session id.
///
/// All sessions share one mutex. Public operations lock exactly once and
/// work on the locked map through private helpers, so no operation ever
/// needs to re-acquire the lock it already holds. Reads hand out owned
/// copies. Sessions are created lazily on first access.
pub struct SessionStore<C = SystemClock> {
    sessions: Mutex<HashMap<String, SessionState>>,
    clock: C,
    settings: SessionSettings,
    sweep_started: AtomicBool,
}

impl SessionStore<SystemClock> {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl Default for SessionStore<SystemClock> {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl<C> SessionStore<C>
where
    C: Clock,
{
    pub fn with_clock(settings: SessionSettings, clock: C) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            settings,
            sweep_started: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn get_history(&self, session_id: &str) -> Vec<Turn> {
        self.with_session(session_id, |state| {
            let history = state.history.iter().cloned().collect::<Vec<_>>();
            debug!(session_id, messages = history.len(), "history read");
            history
        })
    }

    /// Appends a turn and truncates to the most recent `max_history` turns.
    pub fn add_message(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let max_history = self.settings.max_history;
        self.with_session(session_id, |state| {
            state.history.push_back(Turn::new(role, content));
            let mut dropped = 0usize;
            while state.history.len() > max_history {
                state.history.pop_front();
                dropped += 1;
            }
            if dropped > 0 {
                debug!(session_id, dropped, max_history, "history truncated");
            }
            debug!(session_id, role = role.as_str(), "message added");
        });
    }

    pub fn get_slots(&self, session_id: &str) -> SlotSet {
        self.with_session(session_id, |state| state.slots.clone())
    }

    pub fn update_slot(
        &self,
        session_id: &str,
        name: SlotName,
        value: SlotValue,
    ) -> Result<(), SlotError> {
        self.with_session(session_id, |state| {
            let rendered = value.to_string();
            state.slots.set(name, value)?;
            info!(session_id, slot = name.as_str(), value = %rendered, "slot updated");
            Ok(())
        })
    }

    /// Overwrites only the slots that `update` defines. Returns the slots
    /// whose value changed.
    pub fn update_slots(&self, session_id: &str, update: &SlotSet) -> Vec<SlotName> {
        self.with_session(session_id, |state| {
            let changed = state.slots.merge_defined(update);
            for name in &changed {
                info!(
                    session_id,
                    slot = name.as_str(),
                    value = %state.slots.get(*name),
                    "slot updated"
                );
            }
            changed
        })
    }

    pub fn clear_slots(&self, session_id: &str) {
        self.with_session(session_id, |state| {
            state.slots = SlotSet::default();
            info!(session_id, "slots cleared");
        });
    }

    pub fn get_flags(&self, session_id: &str) -> SessionFlags {
        self.with_session(session_id, |state| state.flags)
    }

    pub fn set_flag(&self, session_id: &str, flag: SessionFlag, value: bool) {
        self.with_session(session_id, |state| {
            state.flags.set(flag, value);
            info!(session_id, flag = flag.as_str(), value, "flag set");
        });
    }

    pub fn clear_flags(&self, session_id: &str) {
        self.with_session(session_id, |state| {
            state.flags = SessionFlags::default();
            info!(session_id, "flags cleared");
        });
    }

    /// History, slots and flags read atomically together.
    pub fn snapshot(&self, session_id: &str) -> SessionSnapshot {
        self.with_session(session_id, |state| SessionSnapshot {
            history: state.history.iter().cloned().collect(),
            slots: state.slots.clone(),
            flags: state.flags,
            last_active: state.last_active,
        })
    }

    /// Drops the session entirely. Returns whether it existed.
    pub fn reset(&self, session_id: &str) -> bool {
        let existed = self.lock().remove(session_id).is_some();
        if existed {
            info!(session_id, "session reset");
        } else {
            warn!(session_id, "reset requested for unknown session");
        }
        existed
    }

    /// Known session ids, sorted. Does not create or touch sessions.
    pub fn list_sessions(&self) -> Vec<String> {
        let mut ids = self.lock().keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Last activity of an existing session. Does not create or touch it.
    pub fn last_active(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.lock().get(session_id).map(|state| state.last_active)
    }

    /// Evicts every session idle for at least `idle_timeout`.
    ///
    /// The lock is taken once to enumerate and once per eviction, never
    /// for the whole sweep.
    pub fn sweep(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut evicted = Vec::new();

        for session_id in self.list_sessions() {
            match self.evict_if_idle(&session_id, now) {
                Some(true) => evicted.push(session_id),
                Some(false) => {}
                None => debug!(session_id, "session vanished before eviction check"),
            }
        }

        if !evicted.is_empty() {
            info!(
                event_name = "session.sweep.completed",
                evicted = evicted.len(),
                "idle sessions evicted"
            );
        }
        evicted
    }

    fn evict_if_idle(&self, session_id: &str, now: DateTime<Utc>) -> Option<bool> {
        let mut sessions = self.lock();
        let last_active = sessions.get(session_id)?.last_active;
        let idle = match (now - last_active).to_std() {
            Ok(idle) => idle,
            // Activity stamped after `now` was read; not idle.
            Err(_) => return Some(false),
        };
        if idle < self.settings.idle_timeout {
            return Some(false);
        }
        sessions.remove(session_id);
        info!(
            event_name = "session.evicted",
            session_id,
            idle_secs = idle.as_secs(),
            "session evicted after inactivity"
        );
        Some(true)
    }

    fn with_session<R>(&self, session_id: &str, op: impl FnOnce(&mut SessionState) -> R) -> R {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let state = sessions.entry(session_id.to_string()).or_insert_with(|| {
            info!(session_id, "session created");
            SessionState::new(now)
        });
        state.last_active = now;
        op(state)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionState>> {
        // A panic while holding the lock leaves the map structurally valid.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C> SessionStore<C>
where
    C: Clock + 'static,
{
    /// Spawns the periodic eviction sweep on the current tokio runtime.
    ///
    /// Only the first call per store spawns a task; later calls return
    /// `None`. The task stops once the store is dropped.
    pub fn start_eviction(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.sweep_started.swap(true, Ordering::SeqCst) {
            debug!("eviction sweep already running");
            return None;
        }

        let period = self.settings.sweep_interval;
        let store = Arc::downgrade(self);
        info!(
            event_name = "session.sweep.started",
            period_secs = period.as_secs(),
            "eviction sweep started"
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("session store dropped, stopping eviction sweep");
                    break;
                };
                store.sweep();
            }
        }))
    }
}
