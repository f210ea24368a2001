use anyhow::Result;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

use crate::crd::{DESCRIPTION_LABEL, Rule, RuleSpec};
use crate::model::Page;

pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";
pub const SUBJECT_KINDS: [&str; 3] = ["User", "Group", "ServiceAccount"];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldId {
    Name,
    Namespace,
    Description,
    Source,
    SourceResource,
    Target,
    TargetResource,
    Role,
    SubjectKind,
    SubjectName,
    SubjectNamespace,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FormField {
    pub id: FieldId,
    pub label: &'static str,
    pub value: String,
    /// Non-empty turns the field into a selector cycling through these.
    pub options: Vec<String>,
    pub required: bool,
}

impl FormField {
    fn text(id: FieldId, label: &'static str, required: bool) -> Self {
        Self {
            id,
            label,
            value: String::new(),
            options: Vec::new(),
            required,
        }
    }

    fn select(id: FieldId, label: &'static str, options: Vec<String>, preferred: &str) -> Self {
        let value = options
            .iter()
            .find(|option| option.as_str() == preferred)
            .or_else(|| options.first())
            .cloned()
            .unwrap_or_default();
        Self {
            id,
            label,
            value,
            options,
            required: true,
        }
    }

    pub fn is_select(&self) -> bool {
        !self.options.is_empty()
    }

    fn cycle(&mut self, delta: isize) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len() as isize;
        let current = self
            .options
            .iter()
            .position(|option| option == &self.value)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.value = self.options[next].clone();
    }
}

/// Modal add form. Lives only while the modal is open; cancelling or a
/// successful submission drops it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FormState {
    pub page: Page,
    pub fields: Vec<FormField>,
    pub focused: usize,
    pub error: Option<String>,
}

impl FormState {
    pub fn rule(namespaces: Vec<String>, preferred_namespace: &str, endpoints: Vec<String>) -> Self {
        let namespace = if namespaces.is_empty() {
            let mut field = FormField::text(FieldId::Namespace, "Namespace", true);
            field.value = preferred_namespace.to_string();
            field
        } else {
            FormField::select(FieldId::Namespace, "Namespace", namespaces, preferred_namespace)
        };
        let endpoint_field = |id: FieldId, label: &'static str| {
            if endpoints.is_empty() {
                FormField::text(id, label, true)
            } else {
                FormField::select(id, label, endpoints.clone(), "")
            }
        };

        Self {
            page: Page::Rules,
            fields: vec![
                FormField::text(FieldId::Name, "Name", true),
                namespace,
                FormField::text(FieldId::Description, "Description", false),
                endpoint_field(FieldId::Source, "Source"),
                FormField::text(FieldId::SourceResource, "SourceResource", true),
                endpoint_field(FieldId::Target, "Target"),
                FormField::text(FieldId::TargetResource, "TargetResource", true),
            ],
            focused: 0,
            error: None,
        }
    }

    pub fn binding() -> Self {
        let kinds = SUBJECT_KINDS.iter().map(|kind| kind.to_string()).collect();
        Self {
            page: Page::ClusterRoleBindings,
            fields: vec![
                FormField::text(FieldId::Name, "Name", true),
                FormField::text(FieldId::Role, "ClusterRole", true),
                FormField::select(FieldId::SubjectKind, "Subject kind", kinds, "User"),
                FormField::text(FieldId::SubjectName, "Subject name", true),
                FormField::text(FieldId::SubjectNamespace, "Subject namespace", false),
            ],
            focused: 0,
            error: None,
        }
    }

    pub fn title(&self) -> String {
        format!("Add {}", self.page.title())
    }

    pub fn value(&self, id: FieldId) -> &str {
        self.fields
            .iter()
            .find(|field| field.id == id)
            .map(|field| field.value.trim())
            .unwrap_or("")
    }

    pub fn focused_field(&self) -> Option<&FormField> {
        self.fields.get(self.focused)
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn cycle_option(&mut self, delta: isize) {
        if let Some(field) = self.fields.get_mut(self.focused) {
            field.cycle(delta);
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focused)
            && !field.is_select()
        {
            field.value.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focused)
            && !field.is_select()
        {
            field.value.pop();
        }
    }

    fn validate(&self) -> Result<()> {
        let missing = self
            .fields
            .iter()
            .filter(|field| field.required && field.value.trim().is_empty())
            .map(|field| field.label)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            anyhow::bail!("required: {}", missing.join(", "));
        }
        if self.page == Page::ClusterRoleBindings
            && self.value(FieldId::SubjectKind) == "ServiceAccount"
            && self.value(FieldId::SubjectNamespace).is_empty()
        {
            anyhow::bail!("required: Subject namespace (ServiceAccount subjects are namespaced)");
        }
        Ok(())
    }

    pub fn build_rule(&self) -> Result<(String, Rule)> {
        self.validate()?;
        let namespace = self.value(FieldId::Namespace).to_string();
        let mut rule = Rule::new(
            self.value(FieldId::Name),
            RuleSpec::routed(
                self.value(FieldId::Source),
                self.value(FieldId::SourceResource),
                self.value(FieldId::Target),
                self.value(FieldId::TargetResource),
            ),
        );
        rule.metadata.namespace = Some(namespace.clone());
        let description = self.value(FieldId::Description);
        if !description.is_empty() {
            rule.metadata.labels = Some(BTreeMap::from([(
                DESCRIPTION_LABEL.to_string(),
                description.to_string(),
            )]));
        }
        Ok((namespace, rule))
    }

    pub fn build_binding(&self) -> Result<ClusterRoleBinding> {
        self.validate()?;
        let kind = self.value(FieldId::SubjectKind).to_string();
        let service_account = kind == "ServiceAccount";
        let subject = Subject {
            api_group: (!service_account).then(|| RBAC_GROUP.to_string()),
            namespace: service_account.then(|| self.value(FieldId::SubjectNamespace).to_string()),
            name: self.value(FieldId::SubjectName).to_string(),
            kind,
        };

        Ok(ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(self.value(FieldId::Name).to_string()),
                ..ObjectMeta::default()
            },
            role_ref: RoleRef {
                api_group: RBAC_GROUP.to_string(),
                kind: "ClusterRole".to_string(),
                name: self.value(FieldId::Role).to_string(),
            },
            subjects: Some(vec![subject]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldId, FormState, RBAC_GROUP};

    fn fill(form: &mut FormState, id: FieldId, value: &str) {
        let index = form
            .fields
            .iter()
            .position(|field| field.id == id)
            .expect("field exists");
        form.focused = index;
        for c in value.chars() {
            form.push_char(c);
        }
    }

    fn filled_rule_form() -> FormState {
        let mut form = FormState::rule(
            vec!["default".into(), "edge".into()],
            "edge",
            vec!["my-rest".into(), "my-eventbus".into()],
        );
        fill(&mut form, FieldId::Name, "rest-to-bus");
        fill(&mut form, FieldId::Description, "demo");
        fill(&mut form, FieldId::SourceResource, "/a");
        fill(&mut form, FieldId::TargetResource, "topic");
        form.focused = 5;
        form.cycle_option(1);
        form
    }

    #[test]
    fn rule_manifest_carries_full_shape() {
        let form = filled_rule_form();
        let (namespace, rule) = form.build_rule().expect("valid form");
        assert_eq!(namespace, "edge");

        let value = serde_json::to_value(&rule).expect("serializable");
        assert_eq!(value["apiVersion"], "rules.kubeedge.io/v1");
        assert_eq!(value["kind"], "Rule");
        assert_eq!(value["metadata"]["name"], "rest-to-bus");
        assert_eq!(value["metadata"]["namespace"], "edge");
        assert_eq!(value["metadata"]["labels"]["description"], "demo");
        assert_eq!(value["spec"]["source"], "my-rest");
        assert_eq!(value["spec"]["sourceResource"]["path"], "/a");
        assert_eq!(value["spec"]["target"], "my-eventbus");
        assert_eq!(value["spec"]["targetResource"]["path"], "topic");
    }

    #[test]
    fn missing_required_rule_fields_are_reported() {
        let form = FormState::rule(Vec::new(), "", Vec::new());
        let error = form.build_rule().expect_err("empty form must fail");
        let message = error.to_string();
        assert!(message.contains("Name"));
        assert!(message.contains("Namespace"));
        assert!(!message.contains("Description"));
    }

    #[test]
    fn select_fields_ignore_typing_and_cycle_with_wraparound() {
        let mut form = FormState::rule(vec!["a".into(), "b".into()], "a", Vec::new());
        form.focused = 1;
        form.push_char('x');
        assert_eq!(form.value(FieldId::Namespace), "a");
        form.cycle_option(-1);
        assert_eq!(form.value(FieldId::Namespace), "b");
        form.cycle_option(1);
        assert_eq!(form.value(FieldId::Namespace), "a");
    }

    #[test]
    fn rule_form_prefers_scope_namespace() {
        let form = FormState::rule(vec!["a".into(), "b".into()], "b", Vec::new());
        assert_eq!(form.value(FieldId::Namespace), "b");
    }

    #[test]
    fn user_binding_gets_rbac_api_group() {
        let mut form = FormState::binding();
        fill(&mut form, FieldId::Name, "edge-admins");
        fill(&mut form, FieldId::Role, "cluster-admin");
        fill(&mut form, FieldId::SubjectName, "alice");
        let binding = form.build_binding().expect("valid form");

        assert_eq!(binding.metadata.name.as_deref(), Some("edge-admins"));
        assert_eq!(binding.role_ref.kind, "ClusterRole");
        assert_eq!(binding.role_ref.name, "cluster-admin");
        let subjects = binding.subjects.unwrap_or_default();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].kind, "User");
        assert_eq!(subjects[0].api_group.as_deref(), Some(RBAC_GROUP));
        assert_eq!(subjects[0].namespace, None);
    }

    #[test]
    fn service_account_binding_requires_namespace() {
        let mut form = FormState::binding();
        fill(&mut form, FieldId::Name, "edge-sa");
        fill(&mut form, FieldId::Role, "view");
        fill(&mut form, FieldId::SubjectName, "cloudcore");
        form.focused = 2;
        form.cycle_option(2);
        assert_eq!(form.value(FieldId::SubjectKind), "ServiceAccount");
        assert!(form.build_binding().is_err());

        fill(&mut form, FieldId::SubjectNamespace, "kubeedge");
        let binding = form.build_binding().expect("valid form");
        let subjects = binding.subjects.unwrap_or_default();
        assert_eq!(subjects[0].namespace.as_deref(), Some("kubeedge"));
        assert_eq!(subjects[0].api_group, None);
    }

    #[test]
    fn focus_wraps_in_both_directions() {
        let mut form = FormState::binding();
        form.focus_prev();
        assert_eq!(form.focused, form.fields.len() - 1);
        form.focus_next();
        assert_eq!(form.focused, 0);
    }
}
