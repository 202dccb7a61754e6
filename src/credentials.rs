use std::path::Path;

use crate::error::{Error, Result};

pub const API_KEY_FILE: &str = "apikey";
pub const TOKEN_FILE: &str = "jwt";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub access_token: String,
}

pub fn save_api_key(dir: &Path, api_key: &str) -> Result<()> {
    write_secret(&dir.join(API_KEY_FILE), api_key)
}

pub fn save_token(dir: &Path, token: &str) -> Result<()> {
    write_secret(&dir.join(TOKEN_FILE), token)
}

/// Loads the stored API key, falling back to the stored JWT.
pub fn load(dir: &Path) -> Result<Credentials> {
    if let Some(api_key) = read_secret(&dir.join(API_KEY_FILE)) {
        return Ok(Credentials {
            api_key,
            access_token: String::new(),
        });
    }
    if let Some(access_token) = read_secret(&dir.join(TOKEN_FILE)) {
        return Ok(Credentials {
            api_key: String::new(),
            access_token,
        });
    }
    Err(Error::NoCredentials)
}

fn read_secret(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o777 != 0o600 {
            log::debug!("fixing permissions of {}", path.display());
            restrict_mode(path);
        }
    }
    #[cfg(not(unix))]
    let _ = meta;

    let secret = std::fs::read_to_string(path).ok()?;
    let secret = secret.trim();
    (!secret.is_empty()).then(|| secret.to_string())
}

/// Sets the file mode to 0600. A failure is logged and the secret is still
/// read.
#[cfg(unix)]
fn restrict_mode(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("failed to fix permissions of {}: {e}", path.display());
            false
        }
    }
}

fn write_secret(path: &Path, secret: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, secret.trim())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
