//! Session cookie injection for authenticated sources.
//!
//! The token is handed to the fetcher through a Netscape cookie jar written
//! with owner-only permissions, never on the command line.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

/// A session credential bound to the domain it authenticates.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub domain: String,
    pub cookie_name: String,
    pub token: SecretString,
}

impl SessionAuth {
    fn jar_contents(&self) -> String {
        let domain = self.domain.trim_start_matches('.');
        format!(
            "# Netscape HTTP Cookie File\n.{}\tTRUE\t/\tTRUE\t0\t{}\t{}\n",
            domain,
            self.cookie_name,
            self.token.expose_secret()
        )
    }
}

/// RAII guard for the cookie jar file.
///
/// Deletes the jar when dropped, so the session token does not outlive the
/// fetch even if it fails.
#[derive(Debug)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    /// Writes a jar for `auth` into `dir`.
    pub fn write(dir: &Path, auth: &SessionAuth) -> std::io::Result<Self> {
        let path = dir.join(format!(".cookies-{}.txt", uuid::Uuid::new_v4().simple()));
        let contents = auth.jar_contents();

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&path)?;
            std::io::Write::write_all(&mut file, contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&path, contents.as_bytes())?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CookieJar {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to clean up cookie jar: {}", e);
            }
        }
    }
}
