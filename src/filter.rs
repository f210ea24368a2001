//! Client-side narrowing of a fetched collection and its projection into rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Resource;

use crate::crd::Rule;
use crate::model::{BindingRow, NamespaceChoice, RuleRow};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Builds a range from the two search inputs. Both blank means no range.
    pub fn parse(start: &str, end: &str) -> Result<Option<Self>> {
        let (start, end) = (start.trim(), end.trim());
        match (start.is_empty(), end.is_empty()) {
            (true, true) => Ok(None),
            (false, false) => Ok(Some(Self::new(
                parse_instant(start, false).context("invalid start time")?,
                parse_instant(end, true).context("invalid end time")?,
            ))),
            _ => anyhow::bail!("both start and end time are required for a time range"),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FilterCriteria {
    pub namespaces: Vec<NamespaceChoice>,
    pub name: Option<String>,
    pub created: Option<TimeRange>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty() && self.name_query().is_none() && self.created.is_none()
    }

    fn name_query(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn matches<K: Resource>(&self, item: &K) -> bool {
        let meta = item.meta();

        let namespace_match = self.namespaces.is_empty()
            || self.namespaces.iter().any(|choice| match choice {
                NamespaceChoice::All => true,
                NamespaceChoice::Named(namespace) => {
                    meta.namespace.as_deref() == Some(namespace.as_str())
                }
            });

        let name_match = self.name_query().is_none_or(|query| {
            meta.name
                .as_deref()
                .is_some_and(|name| name.contains(query))
        });

        let created_match = self.created.is_none_or(|range| {
            creation_instant(meta.creation_timestamp.as_ref())
                .is_some_and(|instant| range.contains(instant))
        });

        namespace_match && name_match && created_match
    }
}

pub fn apply<K: Resource>(items: Vec<K>, criteria: &FilterCriteria) -> Vec<K> {
    if criteria.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| criteria.matches(item))
        .collect()
}

pub fn project_rules(items: Vec<Rule>, criteria: &FilterCriteria) -> Vec<RuleRow> {
    apply(items, criteria)
        .into_iter()
        .map(|rule| RuleRow {
            source_resource: rule.spec.source_path().to_string(),
            target_resource: rule.spec.target_path().to_string(),
            creation_timestamp: creation_instant(rule.metadata.creation_timestamp.as_ref()),
            name: rule.metadata.name.unwrap_or_default(),
            namespace: rule.metadata.namespace.unwrap_or_default(),
            uid: rule.metadata.uid.unwrap_or_default(),
            source: rule.spec.source,
            target: rule.spec.target,
        })
        .collect()
}

pub fn project_bindings(
    items: Vec<ClusterRoleBinding>,
    criteria: &FilterCriteria,
) -> Vec<BindingRow> {
    apply(items, criteria)
        .into_iter()
        .map(|binding| BindingRow {
            role_ref: serde_json::to_string(&binding.role_ref)
                .unwrap_or_else(|error| format!("unrenderable roleRef: {error}")),
            creation_timestamp: creation_instant(binding.metadata.creation_timestamp.as_ref()),
            name: binding.metadata.name.unwrap_or_default(),
            uid: binding.metadata.uid.unwrap_or_default(),
        })
        .collect()
}

pub fn creation_instant(time: Option<&Time>) -> Option<DateTime<Utc>> {
    let ts = time?.0;
    let nanos = u32::try_from(ts.subsec_nanosecond()).unwrap_or(0);
    DateTime::from_timestamp(ts.as_second(), nanos)
}

/// Accepts RFC 3339, local `YYYY-MM-DD HH:MM[:SS]` and local `YYYY-MM-DD`.
/// A bare date resolves to the start of the day, or its last second when
/// `end_of_day` is set.
pub fn parse_instant(input: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        naive
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        naive
    } else if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        }
        .context("invalid time of day")?;
        date.and_time(time)
    } else {
        anyhow::bail!("'{input}' is not YYYY-MM-DD HH:MM[:SS], YYYY-MM-DD or RFC 3339");
    };

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .with_context(|| format!("'{input}' does not exist in the local time zone"))
}
