//! `!secret` resolution for YAML configuration files.
//!
//! A value tagged `!secret name` is replaced by `name` from a `secrets.yaml`
//! next to the configuration file. When the configuration lives inside the
//! user's home directory the parent directories are searched too, up to and
//! including home.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// File name searched for secrets.
pub const SECRETS_FILE_NAME: &str = "secrets.yaml";

const SECRET_TAG: &str = "secret";

/// Load `path` and replace every `!secret` reference.
///
/// An empty file yields an empty mapping.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, a secret is not
/// defined, or `secrets.yaml` itself uses `!secret`.
pub fn load_resolved(path: &Path) -> Result<Value> {
    let path = absolute(path)?;
    let document = read_yaml(&path)?;

    let is_secrets_file = path.file_name().is_some_and(|n| n == SECRETS_FILE_NAME);
    if is_secrets_file && contains_secret_tag(&document) {
        return Err(Error::config(format!(
            "{}: secrets cannot be loaded from within a secrets file",
            path.display()
        )));
    }

    let start = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
    let mut store = SecretStore::new(start, dirs::home_dir());
    store.resolve(document)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| Error::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

fn contains_secret_tag(value: &Value) -> bool {
    match value {
        Value::Tagged(tagged) => tagged.tag == SECRET_TAG || contains_secret_tag(&tagged.value),
        Value::Mapping(map) => map.values().any(contains_secret_tag),
        Value::Sequence(seq) => seq.iter().any(contains_secret_tag),
        _ => false,
    }
}

/// Looks secrets up, caching each `secrets.yaml` it reads.
#[derive(Debug)]
struct SecretStore {
    start: PathBuf,
    home: Option<PathBuf>,
    cache: HashMap<PathBuf, Mapping>,
}

impl SecretStore {
    fn new(start: PathBuf, home: Option<PathBuf>) -> Self {
        Self {
            start,
            home,
            cache: HashMap::new(),
        }
    }

    fn resolve(&mut self, value: Value) -> Result<Value> {
        match value {
            Value::Tagged(tagged) if tagged.tag == SECRET_TAG => {
                let name = match tagged.value {
                    Value::String(name) => name,
                    other => {
                        return Err(Error::config(format!(
                            "!secret expects a name, found {other:?}"
                        )))
                    }
                };
                self.lookup(&name)
            }
            Value::Tagged(mut tagged) => {
                tagged.value = self.resolve(tagged.value)?;
                Ok(Value::Tagged(tagged))
            }
            Value::Mapping(map) => {
                let mut resolved = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key, self.resolve(value)?);
                }
                Ok(Value::Mapping(resolved))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.resolve(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn lookup(&mut self, name: &str) -> Result<Value> {
        let walk = self
            .home
            .as_ref()
            .is_some_and(|home| self.start.starts_with(home));

        let mut dir = self.start.clone();
        loop {
            if let Some(value) = self.secrets_in(&dir)?.get(name) {
                debug!("Secret '{name}' found in {}", dir.display());
                return Ok(value.clone());
            }
            let at_home = self.home.as_ref().is_some_and(|home| *home == dir);
            if !walk || at_home || !dir.pop() {
                break;
            }
        }
        Err(Error::SecretMissing {
            name: name.to_string(),
        })
    }

    fn secrets_in(&mut self, dir: &Path) -> Result<&Mapping> {
        if !self.cache.contains_key(dir) {
            let path = dir.join(SECRETS_FILE_NAME);
            let secrets = if path.is_file() {
                match read_yaml(&path)? {
                    Value::Mapping(map) => {
                        if map.values().any(contains_secret_tag) {
                            return Err(Error::config(format!(
                                "{}: secrets cannot be loaded from within a secrets file",
                                path.display()
                            )));
                        }
                        map
                    }
                    _ => {
                        return Err(Error::config(format!(
                            "{}: expected a mapping of secrets",
                            path.display()
                        )))
                    }
                }
            } else {
                Mapping::new()
            };
            self.cache.insert(dir.to_path_buf(), secrets);
        }
        self.cache
            .get(dir)
            .ok_or_else(|| Error::config("secrets cache miss"))
    }
}
