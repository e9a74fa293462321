use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use loginas_api::{
    LoginAsError, SecretStore, SessionBackend, SessionId, UnixSeconds, UserId, UserRecord,
    UserStore,
};
use loginas_auth::Clock;
use rand::RngCore;

pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, secret_ref: &str) -> Result<String, LoginAsError> {
        std::env::var(secret_ref)
            .map_err(|_| LoginAsError::NotFound(format!("missing secret env var {secret_ref}")))
    }
}

/// User store kept in memory. Counts every read and write it serves.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<UserId, UserRecord>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
            ..Self::default()
        }
    }

    pub fn insert(&self, user: UserRecord) -> Result<(), LoginAsError> {
        self.write_guard()?.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn remove(&self, id: &UserId) -> Result<Option<UserRecord>, LoginAsError> {
        Ok(self.write_guard()?.remove(id))
    }

    /// Current record, without touching the counters.
    pub fn snapshot(&self, id: &UserId) -> Option<UserRecord> {
        self.users.read().ok()?.get(id).cloned()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read_guard(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<UserId, UserRecord>>, LoginAsError> {
        self.users
            .read()
            .map_err(|_| LoginAsError::Internal("user store poisoned".to_string()))
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<UserId, UserRecord>>, LoginAsError> {
        self.users
            .write()
            .map_err(|_| LoginAsError::Internal("user store poisoned".to_string()))
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, LoginAsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.read_guard()?.get(id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, LoginAsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .read_guard()?
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn set_last_login(
        &self,
        id: &UserId,
        last_login: Option<UnixSeconds>,
    ) -> Result<(), LoginAsError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut users = self.write_guard()?;
        let user = users
            .get_mut(id)
            .ok_or_else(|| LoginAsError::NotFound(format!("user {id}")))?;
        user.last_login = last_login;
        Ok(())
    }
}

/// Sessions kept in memory. Logging in stamps the user's `last_login`
/// with the current time, the way an interactive login would.
pub struct MemorySessionBackend {
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    sessions: RwLock<BTreeMap<SessionId, UserId>>,
}

impl MemorySessionBackend {
    pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            clock,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// User a session belongs to.
    pub fn user_for(&self, session_id: &str) -> Option<UserId> {
        self.sessions.read().ok()?.get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map_or(0, |s| s.len())
    }
}

impl SessionBackend for MemorySessionBackend {
    fn login(&self, user: &UserRecord) -> Result<SessionId, LoginAsError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let session_id = hex::encode(bytes);

        self.sessions
            .write()
            .map_err(|_| LoginAsError::Session("session table poisoned".to_string()))?
            .insert(session_id.clone(), user.id.clone());
        self.users.set_last_login(&user.id, Some(self.clock.now()))?;

        tracing::debug!(user_id = %user.id, "session established");
        Ok(session_id)
    }

    fn logout(&self, session_id: &str) -> Result<(), LoginAsError> {
        self.sessions
            .write()
            .map_err(|_| LoginAsError::Session("session table poisoned".to_string()))?
            .remove(session_id);
        Ok(())
    }
}
