//! File-based credential store
//!
//! Stores tokens in `<token_dir>/<user>.json` and pending OAuth states in
//! `<token_dir>/oauth_state.json`.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::{CredentialStore, OAuthTokens};

const STATE_FILE: &str = "oauth_state.json";

/// A pending OAuth state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingState {
    user_id: String,
    expires_at: i64,
}

/// File-based credential store
///
/// All reads and writes go through one mutex, which serialises access per
/// user (and across users) within a process.
pub struct FileCredentialStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::CredentialStore(format!("Failed to create {:?}: {}", dir, e))
        })?;
        debug!("Credential store at {:?}", dir);
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn token_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(user_id)))
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn read_states(&self) -> Result<HashMap<String, PendingState>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_states(&self, states: &HashMap<String, PendingState>) -> Result<()> {
        let data = serde_json::to_string_pretty(states)?;
        write_atomic(&self.state_path(), data.as_bytes())
    }
}

/// Write via a temp file and rename so readers never see a partial file
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get_tokens(&self, user_id: &str) -> Result<Option<OAuthTokens>> {
        let _guard = self.lock.lock();
        let path = self.token_path(user_id);
        if !path.exists() {
            debug!("No tokens found for {}", user_id);
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let tokens: OAuthTokens = serde_json::from_str(&contents)?;
        Ok(Some(tokens))
    }

    async fn store_tokens(&self, user_id: &str, tokens: &OAuthTokens) -> Result<()> {
        let _guard = self.lock.lock();
        let data = serde_json::to_string_pretty(tokens)?;
        write_atomic(&self.token_path(user_id), data.as_bytes())?;
        debug!("Stored OAuth tokens for {}", user_id);
        Ok(())
    }

    async fn delete_tokens(&self, user_id: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let path = self.token_path(user_id);
        if !path.exists() {
            debug!("No tokens to delete for {}", user_id);
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!("Deleted OAuth tokens for {}", user_id);
        Ok(true)
    }

    async fn save_state(&self, user_id: &str, state: &str, ttl_secs: u64) -> Result<()> {
        let _guard = self.lock.lock();
        let mut states = self.read_states()?;
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires_at = chrono::Utc::now().timestamp().saturating_add(ttl);
        states.insert(
            state.to_string(),
            PendingState {
                user_id: user_id.to_string(),
                expires_at,
            },
        );
        self.write_states(&states)
    }

    async fn consume_state(&self, state: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        let now = chrono::Utc::now().timestamp();
        let mut states = self.read_states()?;
        let entry = states.remove(state);
        states.retain(|_, pending| pending.expires_at >= now);
        self.write_states(&states)?;

        Ok(entry
            .filter(|pending| pending.expires_at >= now)
            .map(|pending| pending.user_id))
    }
}
