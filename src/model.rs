use chrono::{DateTime, Local, Utc};
use std::fmt::{Display, Formatter};

pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Page {
    Rules,
    ClusterRoleBindings,
}

impl Page {
    pub const ALL: [Self; 2] = [Self::Rules, Self::ClusterRoleBindings];

    pub fn title(self) -> &'static str {
        match self {
            Self::Rules => "Rule",
            Self::ClusterRoleBindings => "Clusterrolebinding",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "rule" | "rules" | "ru" => Some(Self::Rules),
            "crb"
            | "clusterrolebinding"
            | "clusterrolebindings"
            | "cluster-role-binding"
            | "cluster-role-bindings" => Some(Self::ClusterRoleBindings),
            _ => None,
        }
    }

    pub fn short_token(self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::ClusterRoleBindings => "crb",
        }
    }

    pub fn headers(self) -> Vec<String> {
        let headers: &[&str] = match self {
            Self::Rules => &[
                "Name",
                "Namespace",
                "Source",
                "SourceResource",
                "Target",
                "TargetResource",
                "Creation time",
            ],
            Self::ClusterRoleBindings => &["Name", "RoleRef", "Creation time"],
        };
        headers.iter().map(|header| header.to_string()).collect()
    }

    pub fn namespaced(self) -> bool {
        matches!(self, Self::Rules)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NamespaceScope {
    All,
    Named(String),
}

impl NamespaceScope {
    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Named(namespace) => namespace.clone(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(namespace) => Some(namespace),
        }
    }

    pub fn filter_choices(&self, discovered: Vec<String>) -> Vec<NamespaceChoice> {
        match self {
            Self::All => std::iter::once(NamespaceChoice::All)
                .chain(discovered.into_iter().map(NamespaceChoice::Named))
                .collect(),
            Self::Named(namespace) => vec![NamespaceChoice::Named(namespace.clone())],
        }
    }
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
        }
    }
}

/// One selectable value of the namespace filter. `All` is the marker that
/// lets every item through regardless of its namespace.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum NamespaceChoice {
    All,
    Named(String),
}

impl NamespaceChoice {
    pub fn label(&self) -> &str {
        match self {
            Self::All => "All namespaces",
            Self::Named(namespace) => namespace,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MutationOutcome {
    Succeeded,
    /// The server answered but without the success marker; the message is
    /// shown as-is.
    Rejected(String),
    Failed(String),
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct RuleRow {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub source: String,
    pub source_resource: String,
    pub target: String,
    pub target_resource: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct BindingRow {
    pub name: String,
    pub uid: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub role_ref: String,
}

pub trait DisplayRow {
    fn name(&self) -> &str;
    fn namespace(&self) -> Option<&str>;
    fn cells(&self, time_format: &str) -> Vec<String>;
}

impl DisplayRow for RuleRow {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn cells(&self, time_format: &str) -> Vec<String> {
        vec![
            self.name.clone(),
            self.namespace.clone(),
            self.source.clone(),
            self.source_resource.clone(),
            self.target.clone(),
            self.target_resource.clone(),
            format_timestamp(self.creation_timestamp, time_format),
        ]
    }
}

impl DisplayRow for BindingRow {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        None
    }

    fn cells(&self, time_format: &str) -> Vec<String> {
        vec![
            self.name.clone(),
            self.role_ref.clone(),
            format_timestamp(self.creation_timestamp, time_format),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct TableData<R> {
    pub rows: Vec<R>,
    pub selected: usize,
    pub last_refreshed: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl<R> Default for TableData<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            selected: 0,
            last_refreshed: None,
            error: None,
        }
    }
}

impl<R: DisplayRow> TableData<R> {
    pub fn set_rows(&mut self, rows: Vec<R>, refreshed_at: DateTime<Local>) {
        let previous = self
            .selected_row()
            .map(|row| (row.namespace().map(str::to_string), row.name().to_string()));
        self.rows = rows;
        self.last_refreshed = Some(refreshed_at);
        self.error = None;

        let retained = previous.and_then(|(namespace, name)| {
            self.rows
                .iter()
                .position(|row| row.name() == name && row.namespace() == namespace.as_deref())
        });
        let clamped = self.selected.min(self.rows.len().saturating_sub(1));
        self.selected = retained.unwrap_or(clamped);
    }

    pub fn set_error(&mut self, error: impl Into<String>, refreshed_at: DateTime<Local>) {
        self.rows.clear();
        self.error = Some(error.into());
        self.last_refreshed = Some(refreshed_at);
        self.selected = 0;
    }

    pub fn selected_row(&self) -> Option<&R> {
        self.rows.get(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.rows.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    pub fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>, time_format: &str) -> String {
    timestamp
        .map(|ts| ts.with_timezone(&Local).format(time_format).to_string())
        .unwrap_or_else(|| "-".to_string())
}
