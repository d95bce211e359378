//! Session persistence
//!
//! One JSON document per session under `~/.gmn/sessions/<id>.json`. A named
//! session also writes an identical alias copy `<name>.json` that acts as a
//! secondary lookup key. Writes are atomic (temp file then rename).

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

use gmn_protocol::{Content, JsonMap, TokenUsage};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("multiple sessions match '{0}', be more specific")]
    Ambiguous(String),

    #[error("no sessions found")]
    Empty,

    #[error("failed to parse session file: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persisted unit of conversation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Content>,
    #[serde(default)]
    pub tokens: TokenUsage,
    /// Unknown document keys survive load-and-resave
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Session {
    /// New session with a local-time derived id (`YYYYMMDD-HHMMSS`)
    pub fn new(model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Local::now().format("%Y%m%d-%H%M%S").to_string(),
            name: None,
            model: model.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            tokens: TokenUsage::default(),
            extra: JsonMap::new(),
        }
    }
}

/// Filesystem-backed session store. Single-process use; no cross-process
/// locking.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `~/.gmn/sessions`, created on first use
    pub fn open_default() -> Result<Self, SessionError> {
        let home = dirs::home_dir()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory"))?;
        Self::open(home.join(".gmn").join("sessions"))
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755));
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize and write `<id>.json` (and the `<name>.json` alias when
    /// named), bumping `updated_at`
    pub fn save(&self, session: &mut Session) -> Result<(), SessionError> {
        session.updated_at = Utc::now();

        let data = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Parse(e.to_string()))?;

        atomic_write(&self.path_for(&session.id), data.as_bytes())?;

        if let Some(name) = &session.name {
            let alias_path = self.path_for(name);
            // An alias may overwrite a stale alias, but never another
            // session's primary id file
            if self.is_foreign_primary(&alias_path, &session.id, name) {
                tracing::warn!(name = %name, "alias name collides with an existing session id, skipping alias file");
            } else {
                atomic_write(&alias_path, data.as_bytes())?;
            }
        }

        Ok(())
    }

    /// Load by id or name: exact filename first, then unique prefix match
    pub fn load(&self, id_or_name: &str) -> Result<Session, SessionError> {
        let exact = self.path_for(id_or_name);
        if exact.is_file() {
            return self.decode_file(&exact);
        }

        let mut matches: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .is_some_and(|stem| stem.starts_with(id_or_name))
            })
            .collect();

        match matches.len() {
            0 => Err(SessionError::NotFound(id_or_name.to_string())),
            1 => self.decode_file(&matches.remove(0)),
            _ => Err(SessionError::Ambiguous(id_or_name.to_string())),
        }
    }

    /// Most recently updated session
    pub fn load_latest(&self) -> Result<Session, SessionError> {
        let sessions = self.list()?;
        let latest = sessions.into_iter().next().ok_or(SessionError::Empty)?;
        Ok(latest)
    }

    /// All sessions, alias duplicates collapsed, newest first. Malformed
    /// files are skipped.
    pub fn list(&self) -> Result<Vec<Session>, SessionError> {
        let mut sessions = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match self.decode_file(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping malformed session file"),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut seen = std::collections::HashSet::new();
        sessions.retain(|session| seen.insert(session.id.clone()));
        Ok(sessions)
    }

    pub fn delete(&self, id_or_name: &str) -> Result<(), SessionError> {
        let session = self.load(id_or_name)?;

        let primary = self.path_for(&session.id);
        match std::fs::remove_file(&primary) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(name) = &session.name {
            let _ = std::fs::remove_file(self.path_for(name));
        }
        Ok(())
    }

    pub fn rename(&self, id_or_name: &str, new_name: &str) -> Result<Session, SessionError> {
        let mut session = self.load(id_or_name)?;

        if let Some(old_name) = &session.name {
            let _ = std::fs::remove_file(self.path_for(old_name));
        }

        session.name = Some(new_name.to_string());
        self.save(&mut session)?;
        Ok(session)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// True when `path` is the primary id file of some other session whose
    /// id happens to equal our alias name
    fn is_foreign_primary(&self, path: &Path, own_id: &str, name: &str) -> bool {
        if !path.is_file() {
            return false;
        }
        match self.decode_file(path) {
            Ok(existing) => existing.id == name && existing.id != own_id,
            Err(_) => false,
        }
    }

    fn decode_file(&self, path: &Path) -> Result<Session, SessionError> {
        let data = std::fs::read_to_string(path)?;
        decode_session(&data)
    }
}

/// Decode a session document, dropping parts with unrecognized
/// discriminants (logged) instead of failing the whole load
fn decode_session(data: &str) -> Result<Session, SessionError> {
    let mut value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| SessionError::Parse(e.to_string()))?;

    if let Some(messages) = value.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for message in messages {
            if let Some(parts) = message.get_mut("parts").and_then(|p| p.as_array_mut()) {
                parts.retain(|part| {
                    let known = part.as_object().is_some_and(|obj| {
                        obj.contains_key("text")
                            || obj.contains_key("function_call")
                            || obj.contains_key("function_response")
                    });
                    if !known {
                        tracing::warn!("ignoring part with unrecognized discriminant");
                    }
                    known
                });
            }
        }
    }

    serde_json::from_value(value).map_err(|e| SessionError::Parse(e.to_string()))
}

/// Crash-safe write: temp file in the same directory, then rename
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_file_name(format!(
        ".{}.tmp.{}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ));

    {
        let mut opts = std::fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o644);
        }

        let mut file = opts.open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)
}
