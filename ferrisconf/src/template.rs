//! XML template store.
//!
//! Templates live on disk under a root directory with one subfolder per
//! feature area. File names follow `{vendor}-{model}_{action}_{feature}.xml`,
//! for example `Cisco-IOS-XE-native_edit-config_configure-ipsec.xml`.
//! Each file is parsed once and shared as an immutable tree; builders work
//! on deep copies.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::error::{Result, TemplateError};
use crate::xml::Element;

/// Subfolders scanned below the template root.
pub const TEMPLATE_FOLDERS: [&str; 5] = ["interfaces", "routing", "system", "security", "vlan"];

/// Kind of payload a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    EditConfig,
    Dispatch,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::EditConfig => "edit-config",
            Action::Dispatch => "dispatch",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "get" => Some(Action::Get),
            "edit-config" => Some(Action::EditConfig),
            "dispatch" => Some(Action::Dispatch),
            _ => None,
        }
    }
}

/// Lookup key of a template: model family, action and feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub family: String,
    pub action: Action,
    pub feature: String,
}

impl TemplateKey {
    pub fn new(family: impl Into<String>, action: Action, feature: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            action,
            feature: feature.into(),
        }
    }

    /// Parse a file stem such as `openconfig-system_get_hostname`.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let mut parts = stem.splitn(3, '_');
        let family = parts.next().filter(|s| !s.is_empty())?;
        let action = Action::parse(parts.next()?)?;
        let feature = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(family, action, feature))
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.family, self.action.as_str(), self.feature)
    }
}

/// A loaded, shared template tree.
#[derive(Debug, Clone)]
pub struct TemplateHandle {
    key: TemplateKey,
    tree: Arc<Element>,
}

impl TemplateHandle {
    pub fn key(&self) -> &TemplateKey {
        &self.key
    }

    /// Read-only view of the shared tree.
    pub fn tree(&self) -> &Element {
        &self.tree
    }
}

/// Indexed, lazily parsed template files.
#[derive(Debug)]
pub struct TemplateStore {
    root: PathBuf,
    index: HashMap<TemplateKey, PathBuf>,
    cache: RwLock<HashMap<TemplateKey, Arc<Element>>>,
}

impl TemplateStore {
    /// Index every template below `root`. Missing subfolders are skipped.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut index = HashMap::new();

        for folder in TEMPLATE_FOLDERS {
            let dir = root.join(folder);
            if !dir.is_dir() {
                debug!("Template folder {} not present", dir.display());
                continue;
            }
            let entries = std::fs::read_dir(&dir).map_err(|source| TemplateError::Io {
                path: dir.clone(),
                source,
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|source| TemplateError::Io {
                        path: dir.clone(),
                        source,
                    })?
                    .path();
                if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match TemplateKey::from_file_stem(stem) {
                    Some(key) => {
                        if let Some(previous) = index.insert(key.clone(), path.clone()) {
                            warn!(
                                "Template {} defined twice ({} and {}), using the latter",
                                key,
                                previous.display(),
                                path.display()
                            );
                        }
                    }
                    None => warn!("Ignoring template with unrecognized name {}", path.display()),
                }
            }
        }

        debug!("Indexed {} templates under {}", index.len(), root.display());
        Ok(Self {
            root,
            index,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every indexed key.
    pub fn keys(&self) -> impl Iterator<Item = &TemplateKey> {
        self.index.keys()
    }

    pub fn contains(&self, key: &TemplateKey) -> bool {
        self.index.contains_key(key)
    }

    /// Load (and cache) a template.
    pub fn load(&self, key: &TemplateKey) -> Result<TemplateHandle> {
        if let Some(tree) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(TemplateHandle {
                key: key.clone(),
                tree: Arc::clone(tree),
            });
        }

        let path = self.index.get(key).ok_or_else(|| TemplateError::NotFound {
            key: key.to_string(),
        })?;
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        let tree = Arc::new(Element::parse(&source).map_err(|e| TemplateError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?);
        debug!("Loaded template {}", key);

        let tree = Arc::clone(
            self.cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.clone())
                .or_insert(tree),
        );
        Ok(TemplateHandle {
            key: key.clone(),
            tree,
        })
    }

    /// Deep copy of a loaded template, free to mutate.
    pub fn clone_template(&self, handle: &TemplateHandle) -> Element {
        handle.tree.as_ref().clone()
    }

    /// `load` followed by `clone_template`.
    pub fn instantiate(&self, key: &TemplateKey) -> Result<Element> {
        let handle = self.load(key)?;
        Ok(self.clone_template(&handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("system")).unwrap();
        std::fs::write(
            dir.path()
                .join("system/Cisco-IOS-XE-native_edit-config_set-hostname.xml"),
            r#"<native xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-native"><hostname/></native>"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("system/openconfig-system_get_hostname.xml"),
            "<system><config>",
        )
        .unwrap();
        std::fs::write(dir.path().join("system/README.txt"), "not a template").unwrap();
        dir
    }

    #[test]
    fn test_key_from_file_stem() {
        let key = TemplateKey::from_file_stem("junos-rpc_dispatch_rollback_pending_changes").unwrap();
        assert_eq!(key.family, "junos-rpc");
        assert_eq!(key.action, Action::Dispatch);
        assert_eq!(key.feature, "rollback_pending_changes");
        assert_eq!(key.to_string(), "junos-rpc_dispatch_rollback_pending_changes");

        assert!(TemplateKey::from_file_stem("no-action").is_none());
        assert!(TemplateKey::from_file_stem("x_bogus_y").is_none());
    }

    #[test]
    fn test_load_and_clone_are_independent() {
        let dir = fixture();
        let store = TemplateStore::open(dir.path()).unwrap();
        let key = TemplateKey::new("Cisco-IOS-XE-native", Action::EditConfig, "set-hostname");

        let handle = store.load(&key).unwrap();
        let mut copy = store.clone_template(&handle);
        copy.find_mut("*:hostname").unwrap().set_text("R1");

        let again = store.load(&key).unwrap();
        assert_eq!(again.tree().find_text("*:hostname"), None);
        assert!(Arc::ptr_eq(&handle.tree, &again.tree));
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = fixture();
        let store = TemplateStore::open(dir.path()).unwrap();

        let missing = TemplateKey::new("junos-rpc", Action::Dispatch, "nothing");
        assert_eq!(store.load(&missing).unwrap_err().kind(), ErrorKind::TemplateNotFound);

        let broken = TemplateKey::new("openconfig-system", Action::Get, "hostname");
        let err = store.load(&broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateParse);
        assert!(err.to_string().contains("openconfig-system_get_hostname.xml"));
    }

    #[test]
    fn test_bundled_templates_all_parse() {
        let store = TemplateStore::open(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")).unwrap();
        assert!(store.keys().count() >= 20);
        let keys: Vec<TemplateKey> = store.keys().cloned().collect();
        for key in keys {
            store.load(&key).unwrap_or_else(|e| panic!("{}: {}", key, e));
        }
    }
}
