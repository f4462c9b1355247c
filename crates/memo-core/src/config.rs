use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

/// Keys the app understands; anything else found in a memorc or an
/// override is kept but flagged.
const KNOWN_KEYS: [&str; 4] = ["data.location", "list.key", "color", "default.command"];

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
}

impl Config {
    /// Built-in defaults: data under `~/.memo`, the whole list as one blob
    /// under the `todolist` key, color on, bare `memo` shows the list.
    pub fn defaults() -> Self {
        let mut map = HashMap::new();
        map.insert("data.location".to_string(), "~/.memo".to_string());
        map.insert("list.key".to_string(), "todolist".to_string());
        map.insert("color".to_string(), "on".to_string());
        map.insert("default.command".to_string(), "list".to_string());
        Self { map }
    }

    #[tracing::instrument(skip(memorc_override))]
    pub fn load(memorc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::defaults();

        match resolve_memorc_path(memorc_override)? {
            Some(path) => {
                info!(memorc = %path.display(), "loading memorc");
                cfg.load_file(&path)?;
            }
            None => debug!("no memorc found; using defaults"),
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            debug!(key = %key, value = %value, "applying override");
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    /// Effective configuration, sorted for display.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    fn set(&mut self, key: String, value: String) {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "unknown config key");
        }
        self.map.insert(key, value);
    }

    /// Plain `key = value` lines; `#` starts a comment.
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        for (line_num, raw_line) in text.lines().enumerate() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;
            trace!(key = %k.trim(), "loaded config key");
            self.set(k.trim().to_string(), v.trim().to_string());
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match override_dir {
        Some(path) => path.to_path_buf(),
        None => {
            let location = cfg
                .get("data.location")
                .unwrap_or_else(|| "~/.memo".to_string());
            expand_tilde(Path::new(&location))?
        }
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn resolve_memorc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(env_path) = std::env::var("MEMORC") {
        // /dev/null disables memorc loading entirely
        if env_path == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(env_path)));
    }

    let candidate = dirs::home_dir()
        .ok_or_else(|| anyhow!("cannot determine home directory"))?
        .join(".memorc");
    Ok(candidate.exists().then_some(candidate))
}

fn expand_tilde(path: &Path) -> anyhow::Result<PathBuf> {
    match path.to_string_lossy().strip_prefix("~/") {
        Some(rest) => {
            let home =
                dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(path.to_path_buf()),
    }
}
