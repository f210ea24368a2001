use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, InputMode, SearchField};
use crate::model::{DisplayRow, Page, TableData};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);
const PL_E: Color = Color::Rgb(88, 28, 135);
const SELECTED_BG: Color = Color::Rgb(24, 36, 58);

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(search_bar_height(app.page())),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_search_bar(frame, root[1], app);
    render_body(frame, root[2], app);
    render_footer(frame, root[3], app);

    if app.form().is_some() {
        render_form_modal(frame, app);
    }
    if app.yaml().is_some() {
        render_yaml_modal(frame, app);
    }
    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let left_line = build_left_header_line(app);
    let right_line = build_right_header_line(app);
    let right_width = spans_width(&right_line.spans) as u16;
    if area.width < 42 || right_width == 0 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right_line).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn build_left_header_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " KEDECK ", Color::Black, ACCENT, PL_A);
    push_powerline_segment(
        &mut spans,
        format!(" 󰀄 {} ", compact_text(app.user(), 14)),
        Color::White,
        PL_A,
        PL_B,
    );
    push_powerline_segment(
        &mut spans,
        format!(
            " 󰠳 {} ",
            compact_text(&display_cluster_endpoint(app.cluster()), 26)
        ),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" 󱃾 {} ", compact_text(app.context(), 14)),
        Color::White,
        PL_C,
        PL_D,
    );
    let scope = if app.page().namespaced() {
        app.namespace_scope().label()
    } else {
        "cluster".to_string()
    };
    push_powerline_segment(
        &mut spans,
        format!(" 󰉖 {} ", compact_text(&scope, 12)),
        Color::White,
        PL_D,
        PL_E,
    );
    push_powerline_segment(
        &mut spans,
        format!(" {} {} ", page_icon(app.page()), app.page().short_token()),
        Color::White,
        PL_E,
        BG,
    );
    Line::from(spans)
}

fn build_right_header_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    let mut next_bg = BG;
    for (index, page) in Page::ALL.iter().enumerate() {
        let active = *page == app.page();
        let bg = if active {
            Color::Rgb(59, 130, 246)
        } else {
            Color::Rgb(30, 41, 59)
        };
        let fg = if active { Color::Black } else { Color::White };
        push_powerline_segment_rtl(
            &mut spans,
            format!(" {} {} ", index + 1, page.short_token()),
            fg,
            bg,
            next_bg,
        );
        next_bg = bg;
    }
    spans.push(Span::styled(" ", Style::default().bg(next_bg)));
    Line::from(spans)
}

fn search_bar_height(page: Page) -> u16 {
    if page.namespaced() { 4 } else { 3 }
}

fn render_search_bar(frame: &mut Frame, area: Rect, app: &App) {
    let page = app.page();
    let search = app.search(page);
    let editing = app.mode() == InputMode::Search;
    let focused = app.focused_search_field();
    let field_style = |field: SearchField| {
        if editing && field == focused {
            Style::default()
                .fg(Color::Black)
                .bg(WARN)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        }
    };

    let mut lines = Vec::new();
    if page.namespaced() {
        let mut spans = vec![Span::styled(
            format!("{}: ", SearchField::Namespaces.label()),
            field_style(SearchField::Namespaces),
        )];
        for (index, choice) in search.choices.iter().enumerate() {
            let mark = if search.is_selected(choice) { "[x]" } else { "[ ]" };
            let style = if editing
                && focused == SearchField::Namespaces
                && index == search.cursor
            {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Rgb(94, 234, 212))
            } else if search.is_selected(choice) {
                Style::default().fg(ACCENT)
            } else {
                Style::default().fg(Color::White)
            };
            spans.push(Span::styled(format!("{mark} {}", choice.label()), style));
            spans.push(Span::raw("  "));
        }
        lines.push(Line::from(spans));
    }

    let mut inputs = Vec::new();
    for field in app
        .search_fields()
        .iter()
        .copied()
        .filter(|field| *field != SearchField::Namespaces)
    {
        let value = match field {
            SearchField::Name => &search.name,
            SearchField::Start => &search.start,
            SearchField::End => &search.end,
            SearchField::Namespaces => continue,
        };
        inputs.push(Span::styled(format!("{}: ", field.label()), field_style(field)));
        let shown = if value.is_empty() && !(editing && field == focused) {
            "-".to_string()
        } else if editing && field == focused {
            format!("{value}▏")
        } else {
            value.clone()
        };
        inputs.push(Span::styled(shown, Style::default().fg(Color::White)));
        inputs.push(Span::raw("   "));
    }
    lines.push(Line::from(inputs));

    let title = if search.criteria.is_empty() {
        "Search".to_string()
    } else {
        "Search (active)".to_string()
    };
    let panel = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(if editing {
                Style::default().fg(WARN)
            } else {
                Style::default().fg(MUTED)
            })
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(panel, area);
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App) {
    app.set_table_viewport(table_rows_visible(area));
    let focused = app.mode() == InputMode::Normal;
    let time_format = app.time_format().to_string();
    match app.page() {
        Page::Rules => render_table(frame, area, Page::Rules, app.rules(), &time_format, focused),
        Page::ClusterRoleBindings => render_table(
            frame,
            area,
            Page::ClusterRoleBindings,
            app.bindings(),
            &time_format,
            focused,
        ),
    }
}

fn render_table<R: DisplayRow>(
    frame: &mut Frame,
    area: Rect,
    page: Page,
    table: &TableData<R>,
    time_format: &str,
    focused: bool,
) {
    if let Some(error) = &table.error {
        let panel = Paragraph::new(Text::from(error.clone()))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(format!("{} Error", page.title()))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ERROR))
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(ERROR));
        frame.render_widget(panel, area);
        return;
    }

    let headers = page.headers();
    let header_row = Row::new(headers.iter().map(|header| {
        Cell::from(header.clone()).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = table.rows.iter().map(|row| {
        Row::new(
            row.cells(time_format)
                .into_iter()
                .map(|column| Cell::from(column).style(Style::default().fg(Color::White))),
        )
    });

    let refreshed = table
        .last_refreshed
        .map(|at| format!("  {}", at.format("%H:%M:%S")))
        .unwrap_or_default();
    let block = Block::default()
        .title(format!("{} ({}){refreshed}", page.title(), table.rows.len()))
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        })
        .style(Style::default().bg(PANEL));

    let widget = Table::new(rows, column_constraints(page))
        .header(header_row)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(Style::default().bg(SELECTED_BG).add_modifier(Modifier::BOLD))
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select((!table.rows.is_empty()).then_some(table.selected));
    frame.render_stateful_widget(widget, area, &mut state);
}

fn render_form_modal(frame: &mut Frame, app: &App) {
    let Some(form) = app.form() else {
        return;
    };
    let area = centered_rect(64, 64, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    for (index, field) in form.fields.iter().enumerate() {
        let focused = index == form.focused;
        let marker = if field.required { "*" } else { " " };
        let label_style = if focused {
            Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        let value = if field.is_select() {
            format!("‹ {} ›", field.value)
        } else if focused {
            format!("{}▏", field.value)
        } else {
            field.value.clone()
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {marker}{:<18}", field.label), label_style),
            Span::raw(" "),
            Span::styled(value, Style::default().fg(Color::White)),
        ]));
    }
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            format!(" 󰅚 {error}"),
            Style::default().fg(ERROR),
        )));
    }
    lines.push(Line::from(Span::styled(
        " Tab/↑/↓ field  ←/→ option  Enter submit  Esc cancel",
        Style::default().fg(MUTED),
    )));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(form.title())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        );
    frame.render_widget(modal, area);
}

fn render_yaml_modal(frame: &mut Frame, app: &mut App) {
    let area = centered_rect(86, 84, frame.area());
    app.set_yaml_viewport(area.height.saturating_sub(2));
    let Some(view) = app.yaml() else {
        return;
    };
    frame.render_widget(Clear, area);

    let modal = Paragraph::new(highlight_yaml_text(&view.content))
        .scroll((view.scroll, 0))
        .block(
            Block::default()
                .title(format!("{}  (Enter reload, Esc close)", view.title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        );
    frame.render_widget(modal, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();

    if app.mode() == InputMode::Command {
        push_powerline_segment(&mut spans, " 󰘳 cmd ", Color::Black, ACCENT, PL_B);
        push_powerline_segment(
            &mut spans,
            format!(" :{} ", app.input()),
            Color::White,
            PL_B,
            BG,
        );
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let pending = app.pending_prompt();
    let status_text = pending
        .map(|prompt| format!("{prompt}? (y/n)"))
        .unwrap_or_else(|| app.status().to_string());
    let (status_fg, status_bg) = if pending.is_some() {
        (Color::Black, WARN)
    } else {
        (Color::White, PL_B)
    };
    let (mode_label, mode_fg, mode_bg) = match app.mode() {
        InputMode::Normal => (" 󰘳 nrm ", Color::White, PL_A),
        InputMode::Search => (" 󰈲 srch ", Color::Black, WARN),
        InputMode::Form => (" 󰐕 add ", Color::Black, ACCENT),
        InputMode::Yaml => (" 󰈙 yaml ", Color::Black, Color::Rgb(125, 211, 252)),
        InputMode::Command => (" 󰘳 cmd ", Color::Black, ACCENT),
    };
    push_powerline_segment(&mut spans, mode_label, mode_fg, mode_bg, status_bg);
    push_powerline_segment(
        &mut spans,
        format!(
            " {} {} ",
            footer_status_icon(&status_text),
            compact_text(&status_text, area.width.saturating_sub(14).max(24) as usize)
        ),
        status_fg,
        status_bg,
        BG,
    );

    let hints = if pending.is_some() {
        String::new()
    } else {
        footer_hints(app.mode()).to_string()
    };
    let left_width = spans_width(&spans) as u16;
    let right_width = hints.chars().count() as u16;
    if hints.is_empty() || left_width.saturating_add(right_width) >= area.width {
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(hints, Style::default().fg(MUTED)))
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn footer_hints(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => "a add  / search  m yaml  ^d delete  ? help ",
        InputMode::Search => "Tab field  Space toggle  Enter apply  Esc close ",
        InputMode::Form => "Enter submit  Esc cancel ",
        InputMode::Yaml => "j/k scroll  Enter reload  Esc close ",
        InputMode::Command => "",
    }
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = [
        "failed",
        "error",
        "invalid",
        "required",
        "timed out",
        "refused",
        "forbidden",
        "denied",
        "already exists",
    ]
    .iter()
    .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(72, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "kedeck help  mode:{}  scope:{}  page:{}",
            help_mode_label(app.mode()),
            app.namespace_scope(),
            app.page().title()
        )),
        Line::from(""),
    ];
    for line in help_lines(app.page()) {
        lines.push(Line::from(line));
    }

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

fn help_lines(page: Page) -> Vec<String> {
    let mut lines = vec![
        "Move: j/k ↑/↓  PgUp/PgDn  g/G top/bottom".to_string(),
        "Pages: ←/→ or 1/2  :rules  :crb".to_string(),
        "Search: / edit  x reset  Tab field  Space toggle namespace  Enter apply".to_string(),
        "Ranges: YYYY-MM-DD, YYYY-MM-DD HH:MM:SS (local) or RFC 3339".to_string(),
        "Mutate: a add  Ctrl-d/Delete delete (y/n)".to_string(),
        "View: m or Enter YAML  r/F5 reload".to_string(),
        "Commands: :ns <name|all>  :reload  :q".to_string(),
    ];
    match page {
        Page::Rules => lines.push(
            "Rule: source/target are rule endpoints; resources are path values".to_string(),
        ),
        Page::ClusterRoleBindings => lines.push(
            "Clusterrolebinding: ServiceAccount subjects need a namespace".to_string(),
        ),
    }
    lines
}

fn help_mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => "normal",
        InputMode::Command => "command",
        InputMode::Search => "search",
        InputMode::Form => "form",
        InputMode::Yaml => "yaml",
    }
}

fn page_icon(page: Page) -> &'static str {
    match page {
        Page::Rules => "󰑪",
        Page::ClusterRoleBindings => "󰒃",
    }
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    Text::from(input.lines().map(highlight_yaml_line).collect::<Vec<_>>())
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    let (indent, trimmed) = line.split_at(indent_len);

    let mut spans = vec![Span::raw(indent.to_string())];
    if trimmed.is_empty() {
        return Line::from(spans);
    }
    if trimmed.starts_with('#') {
        spans.push(Span::styled(trimmed.to_string(), Style::default().fg(MUTED)));
        return Line::from(spans);
    }
    let content = match trimmed.strip_prefix("- ") {
        Some(rest) => {
            spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
            rest
        }
        None => trimmed,
    };

    match split_yaml_key_value(content) {
        Some((key, value)) => {
            spans.push(Span::styled(
                key.to_string(),
                Style::default().fg(Color::Rgb(103, 232, 249)),
            ));
            spans.push(Span::styled(":", Style::default().fg(MUTED)));
            let value = value.trim();
            if !value.is_empty() {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    value.to_string(),
                    Style::default().fg(yaml_value_color(value)),
                ));
            }
        }
        None => spans.push(Span::styled(
            content.to_string(),
            Style::default().fg(Color::White),
        )),
    }
    Line::from(spans)
}

fn split_yaml_key_value(content: &str) -> Option<(&str, &str)> {
    let (key, value) = content.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() || key.contains(' ') || !(value.is_empty() || value.starts_with(' ')) {
        return None;
    }
    Some((key, value))
}

fn yaml_value_color(value: &str) -> Color {
    if value.starts_with('"') || value.starts_with('\'') {
        Color::Rgb(125, 211, 252)
    } else if matches!(value, "true" | "false" | "null" | "~") {
        WARN
    } else if value.parse::<f64>().is_ok() {
        Color::Rgb(251, 146, 60)
    } else if value.starts_with('{') || value.starts_with('[') {
        MUTED
    } else {
        Color::Rgb(147, 197, 253)
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn table_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn column_constraints(page: Page) -> Vec<Constraint> {
    match page {
        Page::Rules => vec![
            Constraint::Percentage(16),
            Constraint::Percentage(12),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(16),
        ],
        Page::ClusterRoleBindings => vec![
            Constraint::Percentage(28),
            Constraint::Percentage(52),
            Constraint::Percentage(20),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::{column_constraints, compact_text, display_cluster_endpoint, split_yaml_key_value};
    use crate::model::Page;

    #[test]
    fn compact_text_truncates_with_ellipsis() {
        assert_eq!(compact_text("kubeedge", 4), "kub…");
        assert_eq!(compact_text("edge", 4), "edge");
    }

    #[test]
    fn cluster_endpoint_drops_scheme() {
        assert_eq!(
            display_cluster_endpoint("https://10.0.0.1:6443/"),
            "10.0.0.1:6443"
        );
    }

    #[test]
    fn yaml_split_ignores_urls_and_sentences() {
        assert_eq!(
            split_yaml_key_value("name: r1"),
            Some(("name", " r1"))
        );
        assert_eq!(split_yaml_key_value("https://example"), None);
        assert_eq!(split_yaml_key_value("not a key: value"), None);
    }

    #[test]
    fn constraints_cover_every_header() {
        for page in Page::ALL {
            assert_eq!(column_constraints(page).len(), page.headers().len());
        }
    }
}
