use clap::Parser;
use std::path::PathBuf;

use crate::model::Page;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kedeck",
    version,
    about = "A terminal console for KubeEdge rules and cluster role bindings."
)]
pub struct CliArgs {
    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Start with all namespaces selected
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// kubeconfig context to connect with instead of the current one
    #[arg(long)]
    pub context: Option<String>,

    /// Page shown at startup (rules, crb)
    #[arg(long, value_parser = parse_page)]
    pub page: Option<Page>,

    /// Timeout applied to each API request, in milliseconds
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append tracing output to this file instead of discarding it
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn parse_page(raw: &str) -> Result<Page, String> {
    Page::from_token(raw).ok_or_else(|| format!("unknown page '{raw}' (expected rules or crb)"))
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use crate::model::Page;
    use clap::Parser;

    #[test]
    fn defaults_leave_overrides_unset() {
        let args = CliArgs::try_parse_from(["kedeck"]).expect("parses");
        assert!(!args.all_namespaces);
        assert_eq!(args.namespace, None);
        assert_eq!(args.page, None);
        assert_eq!(args.log_filter, "info");
    }

    #[test]
    fn page_flag_accepts_aliases() {
        let args = CliArgs::try_parse_from(["kedeck", "--page", "clusterrolebindings", "-A"])
            .expect("parses");
        assert_eq!(args.page, Some(Page::ClusterRoleBindings));
        assert!(args.all_namespaces);
    }

    #[test]
    fn unknown_page_is_rejected() {
        assert!(CliArgs::try_parse_from(["kedeck", "--page", "pods"]).is_err());
    }
}
