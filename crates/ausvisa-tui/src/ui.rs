use ausvisa_core::{ChatRole, UserStatus};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row,
        Table, Wrap,
    },
};
use crate::app::{App, InputMode, LoginField, NoticeKind, Screen};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Login => render_login_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Users => render_users_screen(app, frame, body_area),
        Screen::Graph => render_graph_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Popups
    if app.confirm_delete.is_some() {
        render_delete_confirmation(app, frame, area);
    }
    if app.notice.is_some() {
        render_notice(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let who = match app.auth.user() {
        Some(user) => format!(" {} ({}) ", user.username, user.role),
        None => " not signed in ".to_string(),
    };

    let title = Line::from(vec![
        Span::styled(" AusVisa Advisor ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(who, Style::default().fg(Color::White)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Login => " LOGIN ",
        Screen::Chat => " CHAT ",
        Screen::Users => " USERS ",
        Screen::Graph => " GRAPH ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &str, label: &str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    let pairs: &[(&str, &str)] = match (app.screen, app.input_mode) {
        (Screen::Login, _) => &[("Tab", "field"), ("Enter", "sign in"), ("Esc", "quit")],
        (_, _) if app.confirm_delete.is_some() => &[("y", "delete"), ("n", "cancel")],
        (Screen::Chat, InputMode::Editing) => &[("Enter", "send"), ("Esc", "stop typing")],
        (Screen::Chat, InputMode::Normal) => &[
            ("i", "type"),
            ("j/k", "scroll"),
            ("n", "new chat"),
            ("u", "users"),
            ("g", "graph"),
            ("o", "logout"),
            ("q", "quit"),
        ],
        (Screen::Users, InputMode::Editing) => &[("Enter", "done"), ("Esc", "done")],
        (Screen::Users, InputMode::Normal) => &[
            ("j/k", "nav"),
            ("/", "search"),
            ("f", "status"),
            ("t", "activate"),
            ("r", "role"),
            ("d", "delete"),
            ("R", "reload"),
            ("c", "chat"),
            ("g", "graph"),
            ("q", "quit"),
        ],
        (Screen::Graph, _) => &[
            ("j/k", "nav"),
            ("Space", "toggle"),
            ("a", "all"),
            ("x", "none"),
            ("R", "refresh"),
            ("c", "chat"),
            ("u", "users"),
            ("q", "quit"),
        ],
    };
    for &(key, label) in pairs {
        hints.extend(hint(key, label));
    }

    let mut spans = vec![Span::styled(mode_text, mode_style.bold())];
    spans.push(Span::raw(" "));
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_login_screen(app: &App, frame: &mut Frame, area: Rect) {
    let width = 50.min(area.width.saturating_sub(4));
    let height = 11;
    let form_area = Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height.min(area.height),
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Sign in ");
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let [email_area, password_area, error_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    let field_block = |title: &'static str, active: bool| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if active { Color::Yellow } else { Color::DarkGray }))
            .title(title)
    };

    let email_active = app.login_field == LoginField::Email;
    frame.render_widget(
        Paragraph::new(app.login_email.as_str())
            .style(Style::default().fg(Color::Cyan))
            .block(field_block(" Email ", email_active)),
        email_area,
    );

    let masked = "*".repeat(app.login_password.chars().count());
    frame.render_widget(
        Paragraph::new(masked)
            .style(Style::default().fg(Color::Cyan))
            .block(field_block(" Password ", !email_active)),
        password_area,
    );

    if app.login_pending {
        let dots = ".".repeat(app.animation_frame as usize + 1);
        frame.render_widget(
            Paragraph::new(format!("Signing in{}", dots)).style(Style::default().fg(Color::Yellow)),
            error_area,
        );
    } else if let Some(error) = app.auth.error() {
        frame.render_widget(
            Paragraph::new(error)
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true }),
            error_area,
        );
    }

    // Cursor at the end of the active field
    let (field_area, len) = if email_active {
        (email_area, app.login_email.chars().count())
    } else {
        (password_area, app.login_password.chars().count())
    };
    let max_x = field_area.width.saturating_sub(2);
    frame.set_cursor_position((
        field_area.x + 1 + (len as u16).min(max_x),
        field_area.y + 1,
    ));
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Ask about visas, study and settlement in Australia ");

    let streaming_id = app.conversation.streaming_id();
    let mut lines: Vec<Line> = Vec::new();
    for msg in app.conversation.messages() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(msg.content.clone()));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "AusVisa:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                if msg.content.is_empty() && streaming_id == Some(msg.id) {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(if app.conversation.is_streaming() {
            " Answering... "
        } else {
            " Your question (i to type) "
        });

    // Horizontal scrolling keeps the cursor visible
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn status_color(status: UserStatus) -> Color {
    match status {
        UserStatus::Active => Color::Green,
        UserStatus::Pending => Color::Yellow,
        UserStatus::Suspended => Color::Red,
    }
}

fn render_users_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [cards_area, filter_area, table_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    // Stat cards
    let stats = app.user_stats.unwrap_or_default();
    let cards = [
        ("Total", stats.total_users, Color::Cyan),
        ("Active", stats.active_users, Color::Green),
        ("Pending", stats.pending_users, Color::Yellow),
        ("Suspended", stats.suspended_users, Color::Red),
    ];
    let card_areas = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(cards_area);
    for ((title, value, color), card_area) in cards.iter().zip(card_areas.iter()) {
        let card = Paragraph::new(Span::styled(value.to_string(), Style::default().fg(*color).bold()))
            .centered()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(format!(" {} ", title)),
            );
        frame.render_widget(card, *card_area);
    }

    // Search and status filter
    let editing = app.input_mode == InputMode::Editing;
    let filter_line = Line::from(vec![
        Span::styled("Search: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.user_filter.keyword.clone(), Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.user_filter.status.label(), Style::default().fg(Color::Magenta).bold()),
    ]);
    frame.render_widget(
        Paragraph::new(filter_line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
                .title(" Filter (/ search, f status) "),
        ),
        filter_area,
    );
    if editing {
        let x = filter_area.x + 1 + 8 + app.user_filter.keyword.chars().count() as u16;
        frame.set_cursor_position((x.min(filter_area.right().saturating_sub(2)), filter_area.y + 1));
    }

    // Users table
    let visible = app.visible_users();
    let title = if app.users_loading {
        " Users (loading...) ".to_string()
    } else {
        format!(" Users ({} of {}) ", visible.len(), app.users.len())
    };

    let rows: Vec<Row> = visible
        .iter()
        .map(|user| {
            let status = UserStatus::of(user);
            Row::new(vec![
                Cell::from(user.id.to_string()),
                Cell::from(user.username.clone()),
                Cell::from(user.email.clone()),
                Cell::from(user.role.clone()),
                Cell::from(Span::styled(status.to_string(), Style::default().fg(status_color(status)))),
                Cell::from(user.session_count.to_string()),
                Cell::from(user.last_login.clone().unwrap_or_else(|| "never".to_string())),
            ])
        })
        .collect();

    let header = Row::new(vec!["ID", "Username", "Email", "Role", "Status", "Sessions", "Last login"])
        .style(Style::default().fg(Color::Yellow).bold());

    let widths = [
        Constraint::Length(5),
        Constraint::Percentage(18),
        Constraint::Percentage(28),
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(table, table_area, &mut app.users_state);
}

fn render_graph_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [labels_area, chart_area] = Layout::horizontal([
        Constraint::Length(30),
        Constraint::Min(0),
    ])
    .areas(area);

    let items: Vec<ListItem> = app
        .graph
        .as_ref()
        .map(|graph| {
            graph
                .node_counts
                .iter()
                .map(|c| {
                    let mark = if app.labels.is_selected(&c.label) { "[x]" } else { "[ ]" };
                    ListItem::new(format!("{} {} ({})", mark, c.label, c.count))
                })
                .collect()
        })
        .unwrap_or_default();

    let labels = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Node labels "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(labels, labels_area, &mut app.label_state);

    let [totals_area, bars_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(chart_area);

    let (nodes, links) = app
        .graph
        .as_ref()
        .map(|g| (g.total_nodes(), g.total_relationships()))
        .unwrap_or((0, 0));
    let totals = Line::from(vec![
        Span::styled("Nodes: ", Style::default().fg(Color::DarkGray)),
        Span::styled(nodes.to_string(), Style::default().fg(Color::Cyan).bold()),
        Span::raw("   "),
        Span::styled("Links: ", Style::default().fg(Color::DarkGray)),
        Span::styled(links.to_string(), Style::default().fg(Color::Magenta).bold()),
    ]);
    frame.render_widget(
        Paragraph::new(totals).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(if app.graph_loading { " Knowledge graph (loading...) " } else { " Knowledge graph " }),
        ),
        totals_area,
    );

    let chart_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Nodes per label ");

    let selected = app
        .graph
        .as_ref()
        .map(|g| app.labels.apply(g))
        .unwrap_or_default();

    if selected.is_empty() {
        let empty = Paragraph::new("No labels selected. Press Space to pick labels, a for all.")
            .style(Style::default().fg(Color::DarkGray))
            .block(chart_block);
        frame.render_widget(empty, bars_area);
        return;
    }

    let bars: Vec<Bar> = selected
        .iter()
        .map(|c| {
            Bar::default()
                .value(c.count)
                .label(Line::from(c.label.clone()))
                .style(Style::default().fg(Color::Cyan))
                .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        })
        .collect();

    // Fit the bars to the available width
    let inner_width = bars_area.width.saturating_sub(2) as usize;
    let bar_width = (inner_width / bars.len().max(1)).saturating_sub(1).clamp(3, 14) as u16;

    let chart = BarChart::default()
        .block(chart_block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1);
    frame.render_widget(chart, bars_area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    Rect::new(
        (area.width.saturating_sub(width)) / 2,
        (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn render_delete_confirmation(app: &App, frame: &mut Frame, area: Rect) {
    let Some(user) = &app.confirm_delete else {
        return;
    };
    let popup_area = centered_popup(area, 50, 5);
    frame.render_widget(Clear, popup_area);

    let text = Text::from(vec![
        Line::from(format!("Delete {} <{}>?", user.username, user.email)),
        Line::from(Span::styled(
            "This cannot be undone. y to delete, n to cancel.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    let popup = Paragraph::new(text).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Delete user "),
    );
    frame.render_widget(popup, popup_area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let color = match notice.kind {
        NoticeKind::Success => Color::Green,
        NoticeKind::Error => Color::Red,
    };

    // Bottom right, above the footer
    let width = (notice.text.chars().count() as u16 + 4).clamp(20, 60).min(area.width);
    let height = 3;
    let popup_area = Rect::new(
        area.right().saturating_sub(width),
        area.bottom().saturating_sub(height + 1),
        width,
        height.min(area.height),
    );

    frame.render_widget(Clear, popup_area);
    frame.render_widget(
        Paragraph::new(notice.text.as_str())
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color))),
        popup_area,
    );
}
