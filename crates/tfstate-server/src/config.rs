use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tfstate_backend::{
    Backend, BackendOptions, ChainedMetadata, MetadataHook, NoMetadata, StaticMetadata,
    TerraformSummary,
};
use tfstate_crypto::{FileKeyProvider, StateCipher, StaticKey};
use tfstate_store::{BlobStore, FsBlobStore, InMemoryBlobStore, KeyLayout};
use tfstate_types::Metadata;

use crate::auth::{BasicAuthResolver, QueryRefResolver, RefResolver, StaticCredentials};
use crate::error::{ServerError, ServerResult};

/// Environment variable holding the encryption key material.
pub const ENV_KEY: &str = "TFSTATE_KEY";
/// Environment variable overriding the listen address.
pub const ENV_BIND: &str = "TFSTATE_BIND";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest request body accepted, in bytes. Terraform states get big.
    pub max_body_bytes: usize,
    pub storage: StorageConfig,
    pub keys: KeyLayout,
    pub encryption: EncryptionConfig,
    pub auth: AuthConfig,
    pub metadata: MetadataConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_body_bytes: 64 * 1024 * 1024,
            storage: StorageConfig::default(),
            keys: KeyLayout::default(),
            encryption: EncryptionConfig::default(),
            auth: AuthConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Lost on restart. Tests and demos only.
    Memory,
    Filesystem { root: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from("tfstate-data"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Key material. Takes precedence over `key_file`.
    pub key: Option<String>,
    /// File holding the key material, re-read on every operation.
    pub key_file: Option<PathBuf>,
    /// Encrypt states on write unless the request says otherwise.
    pub encrypt_states: bool,
    /// Honour `?encrypt=false` on state writes.
    pub allow_plaintext_override: bool,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key: None,
            key_file: None,
            encrypt_states: true,
            allow_plaintext_override: false,
        }
    }
}

impl EncryptionConfig {
    pub fn has_key_source(&self) -> bool {
        self.key.as_deref().is_some_and(|k| !k.is_empty()) || self.key_file.is_some()
    }

    /// `None` when no key source is configured.
    pub fn cipher(&self) -> Option<StateCipher> {
        if let Some(key) = self.key.as_deref().filter(|k| !k.is_empty()) {
            return Some(StateCipher::new(Arc::new(StaticKey::new(key))));
        }
        self.key_file
            .as_ref()
            .map(|path| StateCipher::new(Arc::new(FileKeyProvider::new(path))))
    }
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .field("encrypt_states", &self.encrypt_states)
            .field("allow_plaintext_override", &self.allow_plaintext_override)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AuthConfig {
    /// Ref taken verbatim from `?ref=`.
    #[default]
    Query,
    /// HTTP basic auth against a static user table.
    Basic {
        users: BTreeMap<String, UserConfig>,
        #[serde(default)]
        allow_list: Vec<String>,
    },
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub password: String,
    /// Namespace for this user's states. Defaults to the username.
    #[serde(default)]
    pub subject: Option<String>,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Fixed tags attached to every stored state.
    pub tags: Metadata,
    /// Record version, serial, lineage and resource count from the state.
    pub terraform_summary: bool,
}

impl MetadataConfig {
    pub fn hook(&self) -> Arc<dyn MetadataHook> {
        let mut chain = ChainedMetadata::new();
        if !self.tags.is_empty() {
            chain = chain.with(Arc::new(StaticMetadata(self.tags.clone())));
        }
        if self.terraform_summary {
            chain = chain.with(Arc::new(TerraformSummary));
        }
        if chain.is_empty() {
            Arc::new(NoMetadata)
        } else {
            Arc::new(chain)
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file. Missing sections take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply [`ENV_KEY`] and [`ENV_BIND`] from the process environment.
    pub fn apply_env(&mut self) -> ServerResult<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ServerResult<()> {
        if let Some(key) = lookup(ENV_KEY).filter(|k| !k.is_empty()) {
            self.encryption.key = Some(key);
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|b| !b.is_empty()) {
            self.bind_addr = bind
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_BIND}={bind}: {e}")))?;
        }
        Ok(())
    }

    /// Refuse configurations that would fail on first use.
    pub fn validate(&self) -> ServerResult<()> {
        if self.encryption.encrypt_states && !self.encryption.has_key_source() {
            return Err(ServerError::Config(format!(
                "state encryption is enabled but no key is configured \
                 (set encryption.key, encryption.key_file or {ENV_KEY})"
            )));
        }
        if let AuthConfig::Basic { users, allow_list } = &self.auth {
            if users.is_empty() {
                return Err(ServerError::Config("basic auth requires at least one user".into()));
            }
            if let Some(unknown) = allow_list.iter().find(|u| !users.contains_key(*u)) {
                return Err(ServerError::Config(format!(
                    "allow_list names unknown user {unknown}"
                )));
            }
        }
        self.keys
            .validate()
            .map_err(|e| ServerError::Config(format!("keys: {e}")))?;
        if self.max_body_bytes == 0 {
            return Err(ServerError::Config("max_body_bytes must be positive".into()));
        }
        Ok(())
    }

    pub fn build_store(&self) -> Arc<dyn BlobStore> {
        match &self.storage {
            StorageConfig::Memory => Arc::new(InMemoryBlobStore::new()),
            StorageConfig::Filesystem { root } => Arc::new(FsBlobStore::new(root)),
        }
    }

    pub fn build_backend(&self) -> Backend {
        Backend::new(
            self.build_store(),
            BackendOptions {
                layout: self.keys.clone(),
                cipher: self.encryption.cipher(),
                metadata: self.metadata.hook(),
                ..Default::default()
            },
        )
    }

    pub fn build_resolver(&self) -> Arc<dyn RefResolver> {
        match &self.auth {
            AuthConfig::Query => Arc::new(QueryRefResolver),
            AuthConfig::Basic { users, allow_list } => {
                let credentials = users.iter().fold(StaticCredentials::new(), |acc, (name, user)| {
                    let subject = user.subject.clone().unwrap_or_else(|| name.clone());
                    acc.with_user(name, &user.password, subject)
                });
                Arc::new(
                    BasicAuthResolver::new(Arc::new(credentials))
                        .with_allow_list(allow_list.iter().cloned()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(c.encryption.encrypt_states);
        assert!(!c.encryption.allow_plaintext_override);
        assert!(matches!(c.auth, AuthConfig::Query));
        assert_eq!(c.keys, KeyLayout::default());
    }

    #[test]
    fn default_fails_closed_without_key() {
        let err = ServerConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("no key"));
    }

    #[test]
    fn plaintext_config_needs_no_key() {
        let mut c = ServerConfig::default();
        c.encryption.encrypt_states = false;
        c.validate().unwrap();
        assert!(c.encryption.cipher().is_none());
    }

    #[test]
    fn parse_full_toml() {
        let c = ServerConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:9000"

            [storage]
            backend = "filesystem"
            root = "/var/lib/tfstate"

            [keys]
            state_root = "states"

            [encryption]
            key_file = "/etc/tfstate/key"
            allow_plaintext_override = true

            [auth]
            mode = "basic"
            allow_list = ["alice"]

            [auth.users.alice]
            password = "s3cret"
            subject = "uuid-alice"

            [metadata]
            terraform_summary = true
            tags = { team = "platform" }
            "#,
        )
        .unwrap();

        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(
            c.storage,
            StorageConfig::Filesystem { root: "/var/lib/tfstate".into() }
        );
        assert_eq!(c.keys.state_root, "states");
        assert_eq!(c.keys.lock_root, "tfstate/lock");
        assert!(c.encryption.encrypt_states);
        assert!(c.encryption.allow_plaintext_override);
        assert!(c.metadata.terraform_summary);
        assert_eq!(c.metadata.tags["team"], "platform");
        match &c.auth {
            AuthConfig::Basic { users, allow_list } => {
                assert_eq!(users["alice"].subject.as_deref(), Some("uuid-alice"));
                assert_eq!(allow_list, &vec!["alice".to_string()]);
            }
            other => panic!("unexpected auth {other:?}"),
        }
        c.validate().unwrap();
    }

    #[test]
    fn memory_storage_toml() {
        let c = ServerConfig::from_toml("[storage]\nbackend = \"memory\"\n").unwrap();
        assert_eq!(c.storage, StorageConfig::Memory);
    }

    #[test]
    fn invalid_toml_is_error() {
        assert!(matches!(
            ServerConfig::from_toml("bind_addr = 12"),
            Err(ServerError::ConfigParse(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let mut c = ServerConfig::default();
        c.apply_env_from(|name| match name {
            ENV_KEY => Some("from-env".into()),
            ENV_BIND => Some("0.0.0.0:7000".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(c.encryption.key.as_deref(), Some("from-env"));
        assert_eq!(c.bind_addr.port(), 7000);
        c.validate().unwrap();
    }

    #[test]
    fn bad_env_bind_is_error() {
        let mut c = ServerConfig::default();
        let err = c
            .apply_env_from(|name| (name == ENV_BIND).then(|| "nope".to_string()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn basic_auth_validation() {
        let mut c = ServerConfig::default();
        c.encryption.key = Some("k".into());
        c.auth = AuthConfig::Basic {
            users: BTreeMap::new(),
            allow_list: vec![],
        };
        assert!(c.validate().is_err());

        let mut users = BTreeMap::new();
        users.insert(
            "alice".to_string(),
            UserConfig { password: "pw".into(), subject: None },
        );
        c.auth = AuthConfig::Basic {
            users,
            allow_list: vec!["mallory".into()],
        };
        assert!(c.validate().unwrap_err().to_string().contains("mallory"));
    }

    #[test]
    fn overlapping_key_roots_are_rejected() {
        let mut c = ServerConfig::from_toml(
            r#"
            [encryption]
            key = "k"

            [keys]
            version_root = "tfstate/store/v"
            "#,
        )
        .unwrap();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"), "{err}");

        c.keys.version_root = "tfstate/history".into();
        c.validate().unwrap();
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut c = ServerConfig::default();
        c.encryption.key = Some("topsecret".into());
        let mut users = BTreeMap::new();
        users.insert(
            "alice".to_string(),
            UserConfig { password: "hunter2".into(), subject: None },
        );
        c.auth = AuthConfig::Basic { users, allow_list: vec![] };
        let shown = format!("{c:?}");
        assert!(!shown.contains("topsecret"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn builds_backend_with_cipher() {
        let mut c = ServerConfig::default();
        c.storage = StorageConfig::Memory;
        c.encryption.key = Some("k".into());
        assert!(c.build_backend().has_cipher());
    }
}
