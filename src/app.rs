use crate::crd::Rule;
use crate::filter::{FilterCriteria, TimeRange};
use crate::forms::FormState;
use crate::input::Action;
use crate::model::{
    BindingRow, DEFAULT_TIME_FORMAT, MutationOutcome, NamespaceChoice, NamespaceScope, Page,
    RuleRow, TableData,
};
use chrono::Local;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;

pub const ADDED: &str = "Added successfully";
pub const ADD_FAILED: &str = "Failed, please try again!";
pub const DELETED: &str = "Successfully deleted, about to refresh";
pub const DELETE_FAILED: &str = "Deletion failed, please try again";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Command,
    Search,
    Form,
    Yaml,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    None,
    Reload {
        page: Page,
    },
    ResolveScope,
    CreateRule {
        namespace: String,
        rule: Box<Rule>,
    },
    CreateBinding {
        binding: Box<ClusterRoleBinding>,
    },
    DeleteRule {
        namespace: String,
        name: String,
    },
    DeleteBinding {
        name: String,
    },
    LoadYaml {
        page: Page,
        namespace: Option<String>,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SearchField {
    Namespaces,
    Name,
    Start,
    End,
}

impl SearchField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Namespaces => "Namespace",
            Self::Name => "Name",
            Self::Start => "Created from",
            Self::End => "Created to",
        }
    }
}

/// Search inputs for one page plus the criteria last applied from them.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SearchState {
    pub choices: Vec<NamespaceChoice>,
    pub selected: Vec<NamespaceChoice>,
    pub cursor: usize,
    pub name: String,
    pub start: String,
    pub end: String,
    pub focus: usize,
    pub criteria: FilterCriteria,
}

impl SearchState {
    fn fields(page: Page) -> &'static [SearchField] {
        match page {
            Page::Rules => &[
                SearchField::Namespaces,
                SearchField::Name,
                SearchField::Start,
                SearchField::End,
            ],
            Page::ClusterRoleBindings => {
                &[SearchField::Name, SearchField::Start, SearchField::End]
            }
        }
    }

    fn focused_field(&self, page: Page) -> SearchField {
        let fields = Self::fields(page);
        fields[self.focus % fields.len()]
    }

    pub fn is_selected(&self, choice: &NamespaceChoice) -> bool {
        self.selected.contains(choice)
    }

    fn reset(&mut self) {
        let choices = std::mem::take(&mut self.choices);
        *self = Self {
            choices,
            ..Self::default()
        };
    }

    fn toggle_cursor_choice(&mut self) {
        let Some(choice) = self.choices.get(self.cursor).cloned() else {
            return;
        };
        if let Some(index) = self.selected.iter().position(|item| item == &choice) {
            self.selected.remove(index);
        } else {
            self.selected.push(choice);
            let order = &self.choices;
            self.selected.sort_by_key(|item| {
                order.iter().position(|candidate| candidate == item).unwrap_or(usize::MAX)
            });
        }
    }

    fn input_mut(&mut self, field: SearchField) -> Option<&mut String> {
        match field {
            SearchField::Namespaces => None,
            SearchField::Name => Some(&mut self.name),
            SearchField::Start => Some(&mut self.start),
            SearchField::End => Some(&mut self.end),
        }
    }

    fn build_criteria(&self) -> anyhow::Result<FilterCriteria> {
        let name = self.name.trim();
        Ok(FilterCriteria {
            namespaces: self.selected.clone(),
            name: (!name.is_empty()).then(|| name.to_string()),
            created: TimeRange::parse(&self.start, &self.end)?,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct YamlView {
    pub page: Page,
    pub title: String,
    pub content: String,
    pub scroll: u16,
}

pub struct App {
    running: bool,
    mode: InputMode,
    page: Page,
    namespace_scope: NamespaceScope,
    default_namespace: String,
    rules: TableData<RuleRow>,
    bindings: TableData<BindingRow>,
    rule_search: SearchState,
    binding_search: SearchState,
    namespace_options: Vec<String>,
    rule_endpoints: Vec<String>,
    form: Option<FormState>,
    yaml: Option<YamlView>,
    input: String,
    status: String,
    show_help: bool,
    pending_confirmation: Option<PendingConfirmation>,
    cluster: String,
    context: String,
    user: String,
    time_format: String,
    table_page_size: usize,
    yaml_view_height: u16,
}

impl App {
    pub fn new(
        cluster: String,
        context: String,
        namespace_scope: NamespaceScope,
        page: Page,
    ) -> Self {
        let default_namespace = namespace_scope
            .namespace()
            .unwrap_or("default")
            .to_string();
        let rule_search = SearchState {
            choices: namespace_scope.filter_choices(Vec::new()),
            ..SearchState::default()
        };

        Self {
            running: true,
            mode: InputMode::Normal,
            page,
            namespace_scope,
            default_namespace,
            rules: TableData::default(),
            bindings: TableData::default(),
            rule_search,
            binding_search: SearchState::default(),
            namespace_options: Vec::new(),
            rule_endpoints: Vec::new(),
            form: None,
            yaml: None,
            input: String::new(),
            status: "Ready".to_string(),
            show_help: false,
            pending_confirmation: None,
            cluster,
            context,
            user: "-".to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            table_page_size: 10,
            yaml_view_height: 10,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn namespace_scope(&self) -> &NamespaceScope {
        &self.namespace_scope
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn set_user(&mut self, user: String) {
        self.user = user;
    }

    pub fn set_default_namespace(&mut self, namespace: String) {
        self.default_namespace = namespace;
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn set_time_format(&mut self, time_format: String) {
        self.time_format = time_format;
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn rules(&self) -> &TableData<RuleRow> {
        &self.rules
    }

    pub fn bindings(&self) -> &TableData<BindingRow> {
        &self.bindings
    }

    pub fn search(&self, page: Page) -> &SearchState {
        match page {
            Page::Rules => &self.rule_search,
            Page::ClusterRoleBindings => &self.binding_search,
        }
    }

    fn search_mut(&mut self, page: Page) -> &mut SearchState {
        match page {
            Page::Rules => &mut self.rule_search,
            Page::ClusterRoleBindings => &mut self.binding_search,
        }
    }

    pub fn search_fields(&self) -> &'static [SearchField] {
        SearchState::fields(self.page)
    }

    pub fn focused_search_field(&self) -> SearchField {
        self.search(self.page).focused_field(self.page)
    }

    pub fn criteria(&self, page: Page) -> &FilterCriteria {
        &self.search(page).criteria
    }

    pub fn form(&self) -> Option<&FormState> {
        self.form.as_ref()
    }

    pub fn yaml(&self) -> Option<&YamlView> {
        self.yaml.as_ref()
    }

    pub fn pending_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn set_table_viewport(&mut self, rows: usize) {
        self.table_page_size = rows.max(1);
    }

    pub fn set_yaml_viewport(&mut self, height: u16) {
        self.yaml_view_height = height.max(1);
        if let Some(view) = self.yaml.as_mut() {
            view.scroll = view.scroll.min(yaml_max_scroll(&view.content, height));
        }
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::ConfirmYes => {
                    self.status = format!("Confirmed: {}", pending.prompt);
                    return pending.command;
                }
                Action::ConfirmNo | Action::CancelInput => {
                    self.status = "Deletion cancelled".to_string();
                    return AppCommand::None;
                }
                _ => {
                    self.pending_confirmation = Some(pending);
                    self.status =
                        "Pending confirmation: press y to confirm or n to cancel".to_string();
                    return AppCommand::None;
                }
            }
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
            if matches!(action, Action::CancelInput) {
                return AppCommand::None;
            }
        }

        match self.mode {
            InputMode::Normal => self.apply_normal_action(action),
            InputMode::Command => self.apply_command_action(action),
            InputMode::Search => self.apply_search_action(action),
            InputMode::Form => self.apply_form_action(action),
            InputMode::Yaml => self.apply_yaml_action(action),
        }
    }

    fn apply_normal_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::NextPage => self.switch_page_by_offset(1),
            Action::PrevPage => self.switch_page_by_offset(-1),
            Action::SwitchPage(index) => match Page::ALL.get(usize::from(index).saturating_sub(1)) {
                Some(page) if index > 0 => self.switch_page(*page),
                _ => AppCommand::None,
            },
            Action::Down => {
                self.move_selection(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_selection(-1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_selection(self.table_page_size as isize);
                AppCommand::None
            }
            Action::PageUp => {
                self.move_selection(-(self.table_page_size as isize));
                AppCommand::None
            }
            Action::Top => {
                match self.page {
                    Page::Rules => self.rules.selected = 0,
                    Page::ClusterRoleBindings => self.bindings.selected = 0,
                }
                AppCommand::None
            }
            Action::Bottom => {
                match self.page {
                    Page::Rules => self.rules.select_last(),
                    Page::ClusterRoleBindings => self.bindings.select_last(),
                }
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::StartCommand => {
                self.mode = InputMode::Command;
                self.input.clear();
                AppCommand::None
            }
            Action::StartSearch => {
                self.mode = InputMode::Search;
                self.status = "Search: Tab moves, Space toggles a namespace, Enter applies".into();
                AppCommand::None
            }
            Action::ResetSearch => self.reset_search(self.page),
            Action::OpenAddForm => {
                self.open_add_form();
                AppCommand::None
            }
            Action::ShowYaml => self.request_yaml(),
            Action::RequestDelete => {
                self.prepare_delete_confirmation();
                AppCommand::None
            }
            Action::Refresh => {
                self.status = format!("Reloading {}", self.page.title());
                AppCommand::Reload { page: self.page }
            }
            _ => AppCommand::None,
        }
    }

    fn apply_command_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                AppCommand::None
            }
            Action::InputChar(c) => {
                self.input.push(c);
                AppCommand::None
            }
            Action::SubmitInput => {
                let raw = std::mem::take(&mut self.input);
                self.mode = InputMode::Normal;
                self.execute_command_line(&raw)
            }
            _ => AppCommand::None,
        }
    }

    fn apply_search_action(&mut self, action: Action) -> AppCommand {
        let page = self.page;
        let field = self.search(page).focused_field(page);
        let field_count = SearchState::fields(page).len();
        match action {
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.status = "Search closed".to_string();
                AppCommand::None
            }
            Action::NextField => {
                let search = self.search_mut(page);
                search.focus = (search.focus + 1) % field_count;
                AppCommand::None
            }
            Action::PrevField => {
                let search = self.search_mut(page);
                search.focus = (search.focus + field_count - 1) % field_count;
                AppCommand::None
            }
            Action::NextOption | Action::PrevOption if field == SearchField::Namespaces => {
                let search = self.search_mut(page);
                let len = search.choices.len();
                if len > 0 {
                    let step = if action == Action::NextOption { 1 } else { len - 1 };
                    search.cursor = (search.cursor + step) % len;
                }
                AppCommand::None
            }
            Action::InputChar(' ') if field == SearchField::Namespaces => {
                self.search_mut(page).toggle_cursor_choice();
                AppCommand::None
            }
            Action::InputChar(c) => {
                if let Some(value) = self.search_mut(page).input_mut(field) {
                    value.push(c);
                }
                AppCommand::None
            }
            Action::Backspace => {
                if let Some(value) = self.search_mut(page).input_mut(field) {
                    value.pop();
                }
                AppCommand::None
            }
            Action::SubmitInput => self.submit_search(page),
            _ => AppCommand::None,
        }
    }

    fn apply_form_action(&mut self, action: Action) -> AppCommand {
        let Some(form) = self.form.as_mut() else {
            self.mode = InputMode::Normal;
            return AppCommand::None;
        };
        match action {
            Action::CancelInput => {
                self.form = None;
                self.mode = InputMode::Normal;
                self.status = "Add cancelled".to_string();
                AppCommand::None
            }
            Action::NextField => {
                form.focus_next();
                AppCommand::None
            }
            Action::PrevField => {
                form.focus_prev();
                AppCommand::None
            }
            Action::NextOption => {
                form.cycle_option(1);
                AppCommand::None
            }
            Action::PrevOption => {
                form.cycle_option(-1);
                AppCommand::None
            }
            Action::InputChar(c) => {
                form.push_char(c);
                AppCommand::None
            }
            Action::Backspace => {
                form.pop_char();
                AppCommand::None
            }
            Action::SubmitInput => self.submit_form(),
            _ => AppCommand::None,
        }
    }

    fn apply_yaml_action(&mut self, action: Action) -> AppCommand {
        let height = self.yaml_view_height;
        let Some(view) = self.yaml.as_mut() else {
            self.mode = InputMode::Normal;
            return AppCommand::None;
        };
        let max_scroll = yaml_max_scroll(&view.content, height);
        match action {
            Action::Down => view.scroll = view.scroll.saturating_add(1).min(max_scroll),
            Action::Up => view.scroll = view.scroll.saturating_sub(1),
            Action::PageDown => view.scroll = view.scroll.saturating_add(height).min(max_scroll),
            Action::PageUp => view.scroll = view.scroll.saturating_sub(height),
            Action::Top => view.scroll = 0,
            Action::Bottom => view.scroll = max_scroll,
            Action::CancelInput => {
                self.yaml = None;
                self.mode = InputMode::Normal;
            }
            Action::SubmitInput => {
                let page = view.page;
                self.yaml = None;
                self.mode = InputMode::Normal;
                self.status = format!("Reloading {}", page.title());
                return AppCommand::Reload { page };
            }
            _ => {}
        }
        AppCommand::None
    }

    fn execute_command_line(&mut self, raw: &str) -> AppCommand {
        let trimmed = raw.trim().trim_start_matches(':').trim();
        if trimmed.is_empty() {
            return AppCommand::None;
        }
        let mut parts = trimmed.split_whitespace();
        let head = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        match (head.as_str(), arg) {
            ("q" | "quit" | "exit", _) => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            ("reload" | "refresh" | "r", _) => {
                self.status = format!("Reloading {}", self.page.title());
                AppCommand::Reload { page: self.page }
            }
            ("ns" | "namespace", Some(namespace)) => {
                let scope = if namespace.eq_ignore_ascii_case("all") || namespace == "*" {
                    NamespaceScope::All
                } else {
                    NamespaceScope::Named(namespace.to_string())
                };
                self.change_scope(scope)
            }
            ("ns" | "namespace", None) => {
                self.status = format!("Namespace scope: {}", self.namespace_scope);
                AppCommand::None
            }
            (token, None) => match Page::from_token(token) {
                Some(page) => self.switch_page(page),
                None => {
                    self.status = format!("Unknown command: {trimmed}");
                    AppCommand::None
                }
            },
            _ => {
                self.status = format!("Unknown command: {trimmed}");
                AppCommand::None
            }
        }
    }

    fn change_scope(&mut self, scope: NamespaceScope) -> AppCommand {
        if let Some(namespace) = scope.namespace() {
            self.default_namespace = namespace.to_string();
        }
        self.namespace_scope = scope;
        self.namespace_options.clear();
        self.rule_endpoints.clear();
        self.rule_search.choices = self.namespace_scope.filter_choices(Vec::new());
        self.rule_search.reset();
        self.status = format!("Namespace scope: {}", self.namespace_scope);
        AppCommand::ResolveScope
    }

    fn switch_page_by_offset(&mut self, offset: isize) -> AppCommand {
        let len = Page::ALL.len() as isize;
        let current = Page::ALL
            .iter()
            .position(|page| *page == self.page)
            .unwrap_or(0) as isize;
        let next = (current + offset).rem_euclid(len) as usize;
        self.switch_page(Page::ALL[next])
    }

    fn switch_page(&mut self, page: Page) -> AppCommand {
        self.page = page;
        self.status = format!("{} manager", page.title());
        AppCommand::Reload { page }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.page {
            Page::Rules => self.rules.move_selection(delta),
            Page::ClusterRoleBindings => self.bindings.move_selection(delta),
        }
    }

    fn submit_search(&mut self, page: Page) -> AppCommand {
        match self.search(page).build_criteria() {
            Ok(criteria) => {
                let active = !criteria.is_empty();
                self.search_mut(page).criteria = criteria;
                self.mode = InputMode::Normal;
                self.status = if active {
                    "Search applied".to_string()
                } else {
                    "Search cleared".to_string()
                };
                AppCommand::Reload { page }
            }
            Err(error) => {
                self.set_status(format!("Invalid search: {error:#}"));
                AppCommand::None
            }
        }
    }

    fn reset_search(&mut self, page: Page) -> AppCommand {
        self.search_mut(page).reset();
        if self.mode == InputMode::Search {
            self.mode = InputMode::Normal;
        }
        self.status = "Search reset".to_string();
        AppCommand::Reload { page }
    }

    fn open_add_form(&mut self) {
        let form = match self.page {
            Page::Rules => {
                let namespaces = match &self.namespace_scope {
                    NamespaceScope::All => self.namespace_options.clone(),
                    NamespaceScope::Named(namespace) => vec![namespace.clone()],
                };
                FormState::rule(
                    namespaces,
                    &self.default_namespace,
                    self.rule_endpoints.clone(),
                )
            }
            Page::ClusterRoleBindings => FormState::binding(),
        };
        self.status = form.title();
        self.form = Some(form);
        self.mode = InputMode::Form;
    }

    fn submit_form(&mut self) -> AppCommand {
        let Some(form) = self.form.as_mut() else {
            return AppCommand::None;
        };
        let built = match form.page {
            Page::Rules => form
                .build_rule()
                .map(|(namespace, rule)| AppCommand::CreateRule {
                    namespace,
                    rule: Box::new(rule),
                }),
            Page::ClusterRoleBindings => {
                form.build_binding()
                    .map(|binding| AppCommand::CreateBinding {
                        binding: Box::new(binding),
                    })
            }
        };
        match built {
            Ok(command) => {
                form.error = None;
                self.status = format!("Submitting {}", form.page.title());
                command
            }
            Err(error) => {
                let message = error.to_string();
                form.error = Some(message.clone());
                self.set_status(message);
                AppCommand::None
            }
        }
    }

    fn request_yaml(&mut self) -> AppCommand {
        let command = match self.page {
            Page::Rules => self.rules.selected_row().map(|row| AppCommand::LoadYaml {
                page: Page::Rules,
                namespace: Some(row.namespace.clone()),
                name: row.name.clone(),
            }),
            Page::ClusterRoleBindings => {
                self.bindings
                    .selected_row()
                    .map(|row| AppCommand::LoadYaml {
                        page: Page::ClusterRoleBindings,
                        namespace: None,
                        name: row.name.clone(),
                    })
            }
        };
        match command {
            Some(command) => {
                self.status = "Loading YAML".to_string();
                command
            }
            None => {
                self.status = "No selected row".to_string();
                AppCommand::None
            }
        }
    }

    fn prepare_delete_confirmation(&mut self) {
        let pending = match self.page {
            Page::Rules => self.rules.selected_row().map(|row| PendingConfirmation {
                prompt: format!("Delete {} {}/{}", Page::Rules.title(), row.namespace, row.name),
                command: AppCommand::DeleteRule {
                    namespace: row.namespace.clone(),
                    name: row.name.clone(),
                },
            }),
            Page::ClusterRoleBindings => {
                self.bindings
                    .selected_row()
                    .map(|row| PendingConfirmation {
                        prompt: format!(
                            "Delete {} {}",
                            Page::ClusterRoleBindings.title(),
                            row.name
                        ),
                        command: AppCommand::DeleteBinding {
                            name: row.name.clone(),
                        },
                    })
            }
        };
        match pending {
            Some(pending) => {
                self.status = format!("{}? [y/n]", pending.prompt);
                self.pending_confirmation = Some(pending);
            }
            None => self.status = "No selected row".to_string(),
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn set_rule_rows(&mut self, rows: Vec<RuleRow>) {
        self.rules.set_rows(rows, Local::now());
    }

    pub fn set_binding_rows(&mut self, rows: Vec<BindingRow>) {
        self.bindings.set_rows(rows, Local::now());
    }

    pub fn set_page_error(&mut self, page: Page, error: String) {
        self.set_status(format!(
            "{} load failed: {}",
            page.title(),
            summarize_error_line(&error)
        ));
        match page {
            Page::Rules => self.rules.set_error(error, Local::now()),
            Page::ClusterRoleBindings => self.bindings.set_error(error, Local::now()),
        }
    }

    /// Installs the namespaces discovered for the current scope and resets
    /// the rule search so stale selections cannot survive a scope change.
    pub fn set_namespace_options(&mut self, namespaces: Vec<String>) {
        self.namespace_options = match &self.namespace_scope {
            NamespaceScope::All => namespaces.clone(),
            NamespaceScope::Named(namespace) => vec![namespace.clone()],
        };
        self.rule_search.choices = self.namespace_scope.filter_choices(namespaces);
        self.rule_search.reset();
    }

    pub fn set_rule_endpoints(&mut self, endpoints: Vec<String>) {
        self.rule_endpoints = endpoints;
    }

    pub fn finish_create(&mut self, page: Page, outcome: MutationOutcome) -> AppCommand {
        match outcome {
            MutationOutcome::Succeeded => {
                self.form = None;
                self.mode = InputMode::Normal;
                self.status = ADDED.to_string();
                AppCommand::Reload { page }
            }
            MutationOutcome::Rejected(message) => {
                if let Some(form) = self.form.as_mut() {
                    form.error = Some(message.clone());
                }
                self.set_status(message);
                AppCommand::None
            }
            MutationOutcome::Failed(_) => {
                if let Some(form) = self.form.as_mut() {
                    form.error = Some(ADD_FAILED.to_string());
                }
                self.status = ADD_FAILED.to_string();
                AppCommand::None
            }
        }
    }

    pub fn finish_delete(&mut self, page: Page, outcome: MutationOutcome) -> AppCommand {
        match outcome {
            MutationOutcome::Succeeded => {
                self.status = DELETED.to_string();
                AppCommand::Reload { page }
            }
            MutationOutcome::Rejected(message) => {
                self.set_status(message);
                AppCommand::None
            }
            MutationOutcome::Failed(_) => {
                self.status = DELETE_FAILED.to_string();
                AppCommand::None
            }
        }
    }

    pub fn open_yaml(&mut self, page: Page, title: String, content: String) {
        self.status = format!("Viewing {title}");
        self.yaml = Some(YamlView {
            page,
            title,
            content,
            scroll: 0,
        });
        self.mode = InputMode::Yaml;
    }
}

fn yaml_max_scroll(content: &str, height: u16) -> u16 {
    let lines = u16::try_from(content.lines().count()).unwrap_or(u16::MAX);
    lines.saturating_sub(height)
}

fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{ADD_FAILED, ADDED, App, AppCommand, DELETE_FAILED, DELETED, InputMode, SearchField};
    use crate::forms::FieldId;
    use crate::input::Action;
    use crate::model::{BindingRow, MutationOutcome, NamespaceChoice, NamespaceScope, Page, RuleRow};

    fn app() -> App {
        App::new(
            "cluster".to_string(),
            "context".to_string(),
            NamespaceScope::Named("default".to_string()),
            Page::Rules,
        )
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.apply_action(Action::InputChar(c));
        }
    }

    fn rule_row(namespace: &str, name: &str) -> RuleRow {
        RuleRow {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..RuleRow::default()
        }
    }

    fn fill_rule_form(app: &mut App) {
        let values = [
            (FieldId::Name, "r1"),
            (FieldId::Source, "rest-ep"),
            (FieldId::SourceResource, "/a"),
            (FieldId::Target, "bus-ep"),
            (FieldId::TargetResource, "/b"),
        ];
        app.apply_action(Action::OpenAddForm);
        for (id, value) in values {
            while app.form().and_then(|form| form.focused_field()).map(|field| field.id) != Some(id)
            {
                app.apply_action(Action::NextField);
            }
            type_text(app, value);
        }
    }

    #[test]
    fn create_success_closes_form_and_reloads() {
        let mut app = app();
        fill_rule_form(&mut app);

        let command = app.apply_action(Action::SubmitInput);
        let AppCommand::CreateRule { namespace, rule } = command else {
            panic!("expected create command, got {command:?}");
        };
        assert_eq!(namespace, "default");
        assert_eq!(rule.spec.source, "rest-ep");

        let follow_up = app.finish_create(Page::Rules, MutationOutcome::Succeeded);
        assert_eq!(follow_up, AppCommand::Reload { page: Page::Rules });
        assert!(app.form().is_none());
        assert_eq!(app.mode(), InputMode::Normal);
        assert_eq!(app.status(), ADDED);
    }

    #[test]
    fn create_rejection_keeps_form_open_with_server_message() {
        let mut app = app();
        fill_rule_form(&mut app);
        app.apply_action(Action::SubmitInput);

        let follow_up = app.finish_create(
            Page::Rules,
            MutationOutcome::Rejected("rules.rules.kubeedge.io \"r1\" already exists".into()),
        );
        assert_eq!(follow_up, AppCommand::None);
        assert_eq!(app.mode(), InputMode::Form);
        assert_eq!(
            app.form().and_then(|form| form.error.as_deref()),
            Some("rules.rules.kubeedge.io \"r1\" already exists")
        );
    }

    #[test]
    fn create_transport_failure_shows_generic_message() {
        let mut app = app();
        fill_rule_form(&mut app);
        app.apply_action(Action::SubmitInput);

        let follow_up =
            app.finish_create(Page::Rules, MutationOutcome::Failed("connection refused".into()));
        assert_eq!(follow_up, AppCommand::None);
        assert_eq!(app.status(), ADD_FAILED);
        assert!(app.form().is_some());
    }

    #[test]
    fn invalid_form_sends_nothing() {
        let mut app = app();
        app.apply_action(Action::OpenAddForm);
        let command = app.apply_action(Action::SubmitInput);
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.mode(), InputMode::Form);
        assert!(app.form().and_then(|form| form.error.as_ref()).is_some());
    }

    #[test]
    fn delete_declined_sends_nothing() {
        let mut app = app();
        app.set_rule_rows(vec![rule_row("default", "r1")]);

        assert_eq!(app.apply_action(Action::RequestDelete), AppCommand::None);
        assert!(app.pending_prompt().is_some());
        assert_eq!(app.apply_action(Action::ConfirmNo), AppCommand::None);
        assert!(app.pending_prompt().is_none());
    }

    #[test]
    fn delete_confirmed_targets_selected_rule() {
        let mut app = app();
        app.set_rule_rows(vec![rule_row("default", "r1"), rule_row("default", "r2")]);
        app.apply_action(Action::Down);
        app.apply_action(Action::RequestDelete);

        assert_eq!(
            app.apply_action(Action::ConfirmYes),
            AppCommand::DeleteRule {
                namespace: "default".into(),
                name: "r2".into()
            }
        );
    }

    #[test]
    fn pending_confirmation_swallows_other_keys() {
        let mut app = app();
        app.set_rule_rows(vec![rule_row("default", "r1")]);
        app.apply_action(Action::RequestDelete);
        assert_eq!(app.apply_action(Action::Refresh), AppCommand::None);
        assert!(app.pending_prompt().is_some());
    }

    #[test]
    fn delete_outcomes_control_reload() {
        let mut app = app();
        assert_eq!(
            app.finish_delete(Page::Rules, MutationOutcome::Succeeded),
            AppCommand::Reload { page: Page::Rules }
        );
        assert_eq!(app.status(), DELETED);

        assert_eq!(
            app.finish_delete(Page::Rules, MutationOutcome::Rejected("forbidden".into())),
            AppCommand::None
        );
        assert_eq!(app.status(), "forbidden");

        assert_eq!(
            app.finish_delete(Page::Rules, MutationOutcome::Failed("timeout".into())),
            AppCommand::None
        );
        assert_eq!(app.status(), DELETE_FAILED);
    }

    #[test]
    fn delete_binding_uses_name_only() {
        let mut app = app();
        app.apply_action(Action::SwitchPage(2));
        app.set_binding_rows(vec![BindingRow {
            name: "crb1".into(),
            ..BindingRow::default()
        }]);
        app.apply_action(Action::RequestDelete);
        assert_eq!(
            app.apply_action(Action::ConfirmYes),
            AppCommand::DeleteBinding {
                name: "crb1".into()
            }
        );
    }

    #[test]
    fn yaml_submit_reloads_and_escape_only_closes() {
        let mut app = app();
        app.open_yaml(Page::Rules, "Rule default/r1".into(), "kind: Rule\n".into());
        assert_eq!(app.mode(), InputMode::Yaml);
        assert_eq!(
            app.apply_action(Action::SubmitInput),
            AppCommand::Reload { page: Page::Rules }
        );
        assert!(app.yaml().is_none());

        app.open_yaml(Page::Rules, "Rule default/r1".into(), "kind: Rule\n".into());
        assert_eq!(app.apply_action(Action::CancelInput), AppCommand::None);
        assert!(app.yaml().is_none());
        assert_eq!(app.mode(), InputMode::Normal);
    }

    #[test]
    fn show_yaml_requests_selected_rule() {
        let mut app = app();
        app.set_rule_rows(vec![rule_row("edge", "r9")]);
        assert_eq!(
            app.apply_action(Action::ShowYaml),
            AppCommand::LoadYaml {
                page: Page::Rules,
                namespace: Some("edge".into()),
                name: "r9".into()
            }
        );
    }

    #[test]
    fn ns_command_changes_scope_and_resets_search() {
        let mut app = app();
        app.apply_action(Action::StartSearch);
        app.apply_action(Action::NextField);
        type_text(&mut app, "abc");
        app.apply_action(Action::SubmitInput);
        assert_eq!(app.criteria(Page::Rules).name.as_deref(), Some("abc"));

        app.apply_action(Action::StartCommand);
        type_text(&mut app, "ns all");
        assert_eq!(app.apply_action(Action::SubmitInput), AppCommand::ResolveScope);
        assert_eq!(app.namespace_scope(), &NamespaceScope::All);
        assert!(app.criteria(Page::Rules).is_empty());
        assert!(app.search(Page::Rules).name.is_empty());
    }

    #[test]
    fn namespace_options_offer_all_marker_for_all_scope() {
        let mut app = App::new(
            "cluster".into(),
            "context".into(),
            NamespaceScope::All,
            Page::Rules,
        );
        app.set_namespace_options(vec!["ns1".into(), "ns2".into()]);
        assert_eq!(
            app.search(Page::Rules).choices,
            vec![
                NamespaceChoice::All,
                NamespaceChoice::Named("ns1".into()),
                NamespaceChoice::Named("ns2".into()),
            ]
        );
    }

    #[test]
    fn search_toggles_namespace_choices_and_applies_criteria() {
        let mut app = App::new(
            "cluster".into(),
            "context".into(),
            NamespaceScope::All,
            Page::Rules,
        );
        app.set_namespace_options(vec!["ns1".into(), "ns2".into()]);
        app.apply_action(Action::StartSearch);
        assert_eq!(app.focused_search_field(), SearchField::Namespaces);
        app.apply_action(Action::NextOption);
        app.apply_action(Action::InputChar(' '));

        assert_eq!(
            app.apply_action(Action::SubmitInput),
            AppCommand::Reload { page: Page::Rules }
        );
        assert_eq!(
            app.criteria(Page::Rules).namespaces,
            vec![NamespaceChoice::Named("ns1".into())]
        );
    }

    #[test]
    fn invalid_search_range_keeps_search_open() {
        let mut app = app();
        app.apply_action(Action::StartSearch);
        app.apply_action(Action::NextField);
        app.apply_action(Action::NextField);
        type_text(&mut app, "2024-01-01");
        assert_eq!(app.apply_action(Action::SubmitInput), AppCommand::None);
        assert_eq!(app.mode(), InputMode::Search);
        assert!(app.status().starts_with("Invalid search"));
    }

    #[test]
    fn reset_search_clears_and_reloads() {
        let mut app = app();
        app.apply_action(Action::StartSearch);
        app.apply_action(Action::NextField);
        type_text(&mut app, "r");
        app.apply_action(Action::SubmitInput);

        assert_eq!(
            app.apply_action(Action::ResetSearch),
            AppCommand::Reload { page: Page::Rules }
        );
        assert!(app.criteria(Page::Rules).is_empty());
    }

    #[test]
    fn page_command_and_keys_switch_pages() {
        let mut app = app();
        app.apply_action(Action::StartCommand);
        type_text(&mut app, "crb");
        assert_eq!(
            app.apply_action(Action::SubmitInput),
            AppCommand::Reload {
                page: Page::ClusterRoleBindings
            }
        );
        assert_eq!(app.page(), Page::ClusterRoleBindings);
        assert_eq!(
            app.apply_action(Action::NextPage),
            AppCommand::Reload { page: Page::Rules }
        );
    }

    #[test]
    fn quit_command_stops_app() {
        let mut app = app();
        app.apply_action(Action::StartCommand);
        type_text(&mut app, "q");
        app.apply_action(Action::SubmitInput);
        assert!(!app.running());
    }

    #[test]
    fn page_error_replaces_rows() {
        let mut app = app();
        app.set_rule_rows(vec![rule_row("default", "r1")]);
        app.set_page_error(Page::Rules, "failed to list rules\ncaused by: 403".into());
        assert!(app.rules().rows.is_empty());
        assert!(app.rules().error.is_some());
        assert_eq!(app.status(), "Rule load failed: failed to list rules");
    }
}
