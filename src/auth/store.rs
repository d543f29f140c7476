use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::AuthError;
use super::token::AccessToken;

/// Storage abstraction for a persisted access token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<AccessToken>, AuthError>;
    fn save(&self, token: &AccessToken) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Plain-text token file holding exactly the token string.
///
/// # Example
/// ```no_run
/// use brokerlink::auth::{AccessToken, FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new(".kite_access_token");
/// store.save(&AccessToken::new("abc123"))?;
/// # Ok::<(), brokerlink::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exact bytes currently on disk, `None` when the file is absent.
    pub fn snapshot(&self) -> Result<Option<Vec<u8>>, AuthError> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(persistence_error(&self.path, err)),
        }
    }

    /// Put back what [`snapshot`](Self::snapshot) returned.
    pub fn restore(&self, snapshot: Option<Vec<u8>>) -> Result<(), AuthError> {
        match snapshot {
            Some(data) => atomic_write(&self.path, &data, Some(0o600))
                .map_err(|err| persistence_error(&self.path, err)),
            None => self.clear(),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<AccessToken>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(AccessToken::new(trimmed)))
    }

    fn save(&self, token: &AccessToken) -> Result<(), AuthError> {
        atomic_write(&self.path, token.expose().as_bytes(), Some(0o600))
            .map_err(|err| persistence_error(&self.path, err))
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(persistence_error(&self.path, err)),
        }
    }
}

/// Line-oriented `KEY=value` file such as `.env`.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the `key=` line if present, else append one. Every other line
    /// is kept byte for byte.
    pub fn upsert(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.prepare_upsert(key, value)?.commit()
    }

    /// Read the file and render the upserted contents without writing.
    pub fn prepare_upsert(&self, key: &str, value: &str) -> Result<PendingEnvWrite, AuthError> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(persistence_error(&self.path, err)),
        };
        Ok(PendingEnvWrite {
            path: self.path.clone(),
            contents: upsert_env_line(&existing, key, value),
            mode: existing_mode(&self.path),
        })
    }
}

/// Rendered env file contents awaiting [`commit`](Self::commit).
#[derive(Debug)]
pub struct PendingEnvWrite {
    path: PathBuf,
    contents: String,
    mode: Option<u32>,
}

impl PendingEnvWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(self) -> Result<(), AuthError> {
        atomic_write(&self.path, self.contents.as_bytes(), self.mode)
            .map_err(|err| persistence_error(&self.path, err))
    }
}

/// Pure form of [`EnvFile::upsert`].
///
/// Only the first line starting with `key=` is replaced, keeping its line
/// ending. When appending, a file that ended with a newline (or was empty)
/// still ends with one, and a file that did not still does not.
pub fn upsert_env_line(contents: &str, key: &str, value: &str) -> String {
    let prefix = format!("{key}=");
    let new_line = format!("{key}={value}");
    let mut out = String::with_capacity(contents.len() + new_line.len() + 1);
    let mut replaced = false;

    for line in contents.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        if !replaced && body.starts_with(&prefix) {
            out.push_str(&new_line);
            out.push_str(&line[body.len()..]);
            replaced = true;
        } else {
            out.push_str(line);
        }
    }

    if !replaced {
        let terminated = contents.is_empty() || contents.ends_with('\n');
        if !terminated {
            out.push('\n');
        }
        out.push_str(&new_line);
        if terminated {
            out.push('\n');
        }
    }
    out
}

fn persistence_error(path: &Path, err: std::io::Error) -> AuthError {
    AuthError::Persistence {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(unix)]
fn existing_mode(path: &Path) -> Option<u32> {
    fs::metadata(path)
        .ok()
        .map(|meta| meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn existing_mode(_path: &Path) -> Option<u32> {
    None
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written token.
fn atomic_write(path: &Path, data: &[u8], mode: Option<u32>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode.unwrap_or(0o644));

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    #[cfg(unix)]
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
