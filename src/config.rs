use std::path::PathBuf;

pub(crate) const DEFAULT_PROMPT: &str = "COMMAND->";
pub(crate) const DEFAULT_HUP_LOG: &str = "hup.txt";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    /// Text printed before every command line.
    pub(crate) prompt: String,
    /// File that receives a line for every SIGHUP.
    pub(crate) hup_log: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            hup_log: PathBuf::from(DEFAULT_HUP_LOG),
        }
    }
}

impl Config {
    /// Read `JCSH_PROMPT` and `JCSH_HUP_LOG`, falling back to the defaults.
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(prompt) = lookup("JCSH_PROMPT") {
            config.prompt = prompt;
        }
        if let Some(path) = lookup("JCSH_HUP_LOG").filter(|p| !p.is_empty()) {
            config.hup_log = PathBuf::from(path);
        }
        config
    }
}
