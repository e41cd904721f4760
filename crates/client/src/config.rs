//! Client configuration from the environment.
//!
//! | Variable          | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `VIZDIFF_TOKEN`   | project write token                       |
//! | `VIZDIFF_PROJECT` | project slug, e.g. `acme/web`             |
//! | `VIZDIFF_BRANCH`  | branch recorded on the build              |
//! | `VIZDIFF_API_URL` | API root, defaults to [`DEFAULT_API_URL`] |
//! | `VIZDIFF_ENABLE`  | `0` disables uploads entirely             |

pub const DEFAULT_API_URL: &str = "https://api.vizdiff.io/api/v1";

pub const ENV_TOKEN: &str = "VIZDIFF_TOKEN";
pub const ENV_PROJECT: &str = "VIZDIFF_PROJECT";
pub const ENV_BRANCH: &str = "VIZDIFF_BRANCH";
pub const ENV_API_URL: &str = "VIZDIFF_API_URL";
pub const ENV_ENABLE: &str = "VIZDIFF_ENABLE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub token: Option<String>,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub api_url: String,
    pub enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            project: None,
            branch: None,
            api_url: DEFAULT_API_URL.to_string(),
            enabled: true,
        }
    }
}

impl ClientConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            token: var(ENV_TOKEN),
            project: var(ENV_PROJECT),
            branch: var(ENV_BRANCH),
            api_url: var(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            enabled: var(ENV_ENABLE).is_none_or(|v| v.trim() != "0"),
        }
    }

    /// The token, if uploads are enabled and a token is set.
    pub fn active_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|_| self.enabled)
    }
}
