//! Logo resolution.
//!
//! A logo ref is either a site path (`/logo.png`, resolved under the public
//! root) or an `http://` / `https://` URL fetched with a short timeout. Every
//! failure (missing file, bad path, network error, undecodable image) is
//! logged and turns into "no logo"; the card is still rendered.

use image::RgbaImage;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

pub trait LogoSource: Send + Sync {
    /// Decoded logo, or `None` when it cannot be used.
    fn load(&self, logo_ref: &str) -> Option<RgbaImage>;
}

pub struct LogoLoader {
    public_root: PathBuf,
    timeout: Duration,
    client: OnceLock<Option<reqwest::blocking::Client>>,
}

impl LogoLoader {
    pub fn new(public_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            public_root: public_root.into(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Filesystem path for a site-relative ref. `None` if the ref tries to
    /// leave the public root.
    pub fn local_path(&self, logo_ref: &str) -> Option<PathBuf> {
        let relative = Path::new(logo_ref.trim().trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return None;
        }
        Some(self.public_root.join(relative))
    }

    fn client(&self) -> Option<&reqwest::blocking::Client> {
        self.client
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| warn!(error = %e, "HTTP client unavailable, remote logos disabled"))
                    .ok()
            })
            .as_ref()
    }

    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let client = self.client()?;
        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| warn!(logo = url, error = %e, "Logo fetch failed, skipping logo"))
            .ok()?;
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| warn!(logo = url, error = %e, "Logo fetch failed, skipping logo"))
            .ok()
    }

    fn read_local(&self, logo_ref: &str) -> Option<Vec<u8>> {
        let Some(path) = self.local_path(logo_ref) else {
            warn!(logo = logo_ref, "Logo path outside public root, skipping logo");
            return None;
        };
        std::fs::read(&path)
            .map_err(|e| {
                warn!(logo = %path.display(), error = %e, "Logo not found, skipping logo")
            })
            .ok()
    }
}

fn is_remote(logo_ref: &str) -> bool {
    let lower = logo_ref.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl LogoSource for LogoLoader {
    fn load(&self, logo_ref: &str) -> Option<RgbaImage> {
        if logo_ref.trim().is_empty() {
            return None;
        }
        let bytes = if is_remote(logo_ref) {
            self.fetch(logo_ref.trim())?
        } else {
            self.read_local(logo_ref)?
        };
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| warn!(logo = logo_ref, error = %e, "Logo could not be decoded, skipping logo"))
            .ok()
    }
}
