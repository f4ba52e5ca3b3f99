//! On-disk cart state for the terminal client.
//!
//! The cart file holds exactly what a browser keeps in local storage: the
//! JSON array of lines. The applied coupon code and the selected shipping
//! option live in a sidecar file next to it, since a browser session keeps
//! those in memory only.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use colando_core::cart::CartStorage;
use colando_core::shipping::ShippingOption;

/// Default cart file when `COLANDO_CART_FILE` is not set.
pub const DEFAULT_CART_FILE: &str = ".colando-cart.json";

/// A cart slot backed by a file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar holding session state.
    pub fn session_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".session");
        self.path.with_file_name(name)
    }

    /// Load the sidecar; a missing file is an empty session.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read or parsed.
    pub fn load_session(&self) -> io::Result<CartSession> {
        match read_optional(&self.session_path())? {
            Some(raw) => serde_json::from_str(&raw).map_err(io::Error::other),
            None => Ok(CartSession::default()),
        }
    }

    /// Write the sidecar, or remove it when the session is empty.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save_session(&self, session: &CartSession) -> io::Result<()> {
        let path = self.session_path();
        if session.is_empty() {
            return match fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }
        let raw = serde_json::to_string_pretty(session).map_err(io::Error::other)?;
        write_atomic(&path, &raw)
    }
}

impl CartStorage for FileStorage {
    fn load(&self) -> io::Result<Option<String>> {
        read_optional(&self.path)
    }

    fn save(&mut self, value: &str) -> io::Result<()> {
        write_atomic(&self.path, value)
    }
}

/// Coupon and shipping choice carried between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingOption>,
}

impl CartSession {
    pub const fn is_empty(&self) -> bool {
        self.coupon_code.is_none() && self.postal_code.is_none() && self.shipping.is_none()
    }
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use colando_core::ProductId;
    use colando_core::cart::{CartProduct, CartStore};

    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("colando-cli-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn product() -> CartProduct {
        CartProduct {
            id: ProductId::new(4),
            name: "Adesivo Gato".into(),
            image: "https://cdn.test/4.png".into(),
            price: "9.90".parse().unwrap(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_cart() {
        let dir = TempDir::new();
        let store = CartStore::load(FileStorage::new(dir.0.join("cart.json"))).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_cart_survives_reload() {
        let dir = TempDir::new();
        let path = dir.0.join("cart.json");

        let mut store = CartStore::load(FileStorage::new(&path)).unwrap();
        store.add_to_cart(&product(), None).unwrap();
        store.add_to_cart(&product(), None).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('['));

        let store = CartStore::load(FileStorage::new(&path)).unwrap();
        assert_eq!(store.cart_count(), 2);
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn test_session_sidecar() {
        let dir = TempDir::new();
        let storage = FileStorage::new(dir.0.join("cart.json"));
        assert_eq!(storage.session_path(), dir.0.join("cart.json.session"));
        assert_eq!(storage.load_session().unwrap(), CartSession::default());

        let session = CartSession {
            coupon_code: Some("BEMVINDO10".into()),
            ..CartSession::default()
        };
        storage.save_session(&session).unwrap();
        assert_eq!(storage.load_session().unwrap(), session);

        storage.save_session(&CartSession::default()).unwrap();
        assert!(!storage.session_path().exists());
    }
}
