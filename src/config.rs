use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::model::{DEFAULT_TIME_FORMAT, NamespaceScope, Page};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 4_000;
const MIN_REQUEST_TIMEOUT_MS: u64 = 250;

/// Effective settings after merging the config file with CLI flags.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    pub start_page: Page,
    pub request_timeout: Duration,
    pub time_format: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct KedeckConfigFile {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    all_namespaces: bool,
    #[serde(default, alias = "page")]
    start_page: Option<String>,
    #[serde(default, alias = "timeout_ms")]
    request_timeout_ms: Option<u64>,
    #[serde(default)]
    time_format: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: None,
            namespace: None,
            all_namespaces: false,
            start_page: Page::Rules,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let mut settings = match discover_config_path() {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_yaml(&raw, Some(path.display().to_string()))
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.apply_cli(args);
        Ok(settings)
    }

    pub fn from_yaml(raw: &str, source: Option<String>) -> Result<Self> {
        let parsed: KedeckConfigFile = if raw.trim().is_empty() {
            KedeckConfigFile::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        let defaults = Self::default();

        let start_page = match parsed.start_page.as_deref() {
            Some(token) => {
                Page::from_token(token).with_context(|| format!("unknown start_page '{token}'"))?
            }
            None => defaults.start_page,
        };

        let time_format = parsed.time_format.unwrap_or(defaults.time_format);
        if StrftimeItems::new(&time_format).any(|item| matches!(item, Item::Error)) {
            anyhow::bail!("invalid time_format '{time_format}'");
        }

        Ok(Self {
            source,
            namespace: parsed
                .namespace
                .map(|namespace| namespace.trim().to_string())
                .filter(|namespace| !namespace.is_empty()),
            all_namespaces: parsed.all_namespaces,
            start_page,
            request_timeout: parsed
                .request_timeout_ms
                .map(timeout_from_millis)
                .unwrap_or(defaults.request_timeout),
            time_format,
        })
    }

    pub fn apply_cli(&mut self, args: &CliArgs) {
        if args.all_namespaces {
            self.all_namespaces = true;
        }
        if let Some(namespace) = &args.namespace {
            self.namespace = Some(namespace.clone());
        }
        if let Some(page) = args.page {
            self.start_page = page;
        }
        if let Some(timeout_ms) = args.request_timeout_ms {
            self.request_timeout = timeout_from_millis(timeout_ms);
        }
    }

    /// An explicit `--namespace` wins over a config-file `all_namespaces`,
    /// while `--all-namespaces` wins over everything.
    pub fn namespace_scope(&self, args: &CliArgs, kube_default: &str) -> NamespaceScope {
        if args.all_namespaces {
            return NamespaceScope::All;
        }
        if let Some(namespace) = &args.namespace {
            return NamespaceScope::Named(namespace.clone());
        }
        if self.all_namespaces {
            return NamespaceScope::All;
        }
        NamespaceScope::Named(
            self.namespace
                .clone()
                .unwrap_or_else(|| kube_default.to_string()),
        )
    }
}

fn timeout_from_millis(millis: u64) -> Duration {
    Duration::from_millis(millis.max(MIN_REQUEST_TIMEOUT_MS))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KEDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kedeck.yaml"),
        PathBuf::from("kedeck.yml"),
        PathBuf::from(".kedeck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kedeck/config.yaml"),
            PathBuf::from(&home).join(".config/kedeck/config.yml"),
            PathBuf::from(&home).join(".kedeck.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use crate::cli::CliArgs;
    use crate::model::{NamespaceScope, Page};
    use clap::Parser;
    use std::time::Duration;

    fn args(raw: &[&str]) -> CliArgs {
        let mut argv = vec!["kedeck"];
        argv.extend_from_slice(raw);
        CliArgs::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::from_yaml("", None).expect("parses");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_values_are_parsed() {
        let raw = "namespace: edge\nstart_page: crb\nrequest_timeout_ms: 9000\ntime_format: \"%d/%m %H:%M\"\n";
        let settings = Settings::from_yaml(raw, Some("kedeck.yaml".into())).expect("parses");
        assert_eq!(settings.namespace.as_deref(), Some("edge"));
        assert_eq!(settings.start_page, Page::ClusterRoleBindings);
        assert_eq!(settings.request_timeout, Duration::from_millis(9_000));
        assert_eq!(settings.time_format, "%d/%m %H:%M");
        assert_eq!(settings.source.as_deref(), Some("kedeck.yaml"));
    }

    #[test]
    fn unknown_start_page_is_an_error() {
        assert!(Settings::from_yaml("start_page: pods\n", None).is_err());
    }

    #[test]
    fn broken_time_format_is_an_error() {
        assert!(Settings::from_yaml("time_format: \"%Q\"\n", None).is_err());
    }

    #[test]
    fn tiny_timeouts_are_raised_to_floor() {
        let settings = Settings::from_yaml("request_timeout_ms: 1\n", None).expect("parses");
        assert_eq!(settings.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn scope_precedence_prefers_cli_flags() {
        let settings = Settings::from_yaml("namespace: from-file\nall_namespaces: true\n", None)
            .expect("parses");

        assert_eq!(
            settings.namespace_scope(&args(&["-A", "-n", "x"]), "default"),
            NamespaceScope::All
        );
        assert_eq!(
            settings.namespace_scope(&args(&["-n", "x"]), "default"),
            NamespaceScope::Named("x".into())
        );
        assert_eq!(
            settings.namespace_scope(&args(&[]), "default"),
            NamespaceScope::All
        );

        let named = Settings::from_yaml("namespace: from-file\n", None).expect("parses");
        assert_eq!(
            named.namespace_scope(&args(&[]), "default"),
            NamespaceScope::Named("from-file".into())
        );
        assert_eq!(
            Settings::default().namespace_scope(&args(&[]), "kube-default"),
            NamespaceScope::Named("kube-default".into())
        );
    }

    #[test]
    fn cli_overrides_file_page_and_timeout() {
        let mut settings = Settings::from_yaml("start_page: crb\n", None).expect("parses");
        settings.apply_cli(&args(&["--page", "rules", "--request-timeout-ms", "1500"]));
        assert_eq!(settings.start_page, Page::Rules);
        assert_eq!(settings.request_timeout, Duration::from_millis(1_500));
    }
}
