use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use placement_core::models::{FeatureModule, HealthStatus};
use placement_core::widget::WidgetStatus;

use crate::app::{App, AppState, LoginFocus, PendingAction};

use super::styles;

/// Draw the whole screen from the current state.
///
/// What is visible depends only on the session state: the login form when
/// anonymous, the modules and logout control when authenticated.
pub fn render(frame: &mut Frame, app: &App) {
    if app.is_authenticated() {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Length(3), // Module tabs
                Constraint::Min(8),    // Main content
                Constraint::Length(2), // Status bar
            ])
            .split(frame.area());

        render_title_bar(frame, app, chunks[0]);
        render_modules(frame, app, chunks[1]);
        render_module_content(frame, app, chunks[2]);
        render_status_bar(frame, app, chunks[3]);
    } else {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Min(8),    // Login form
                Constraint::Length(2), // Status bar
            ])
            .split(frame.area());

        render_title_bar(frame, app, chunks[0]);
        render_login_form(frame, app, chunks[1]);
        render_status_bar(frame, app, chunks[2]);
    }

    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Adaptive Placement Agent";

    let mut right = if app.is_authenticated() {
        vec![
            Span::styled(
                format!("Logged in as {}", app.session.session().display_name()),
                styles::success_style(),
            ),
            Span::raw("  "),
            Span::styled("[l]ogout", styles::help_key_style()),
        ]
    } else {
        vec![Span::styled("Not logged in", styles::error_style())]
    };
    right.push(Span::styled("  [?] Help", styles::muted_style()));

    let right_len: usize = right.iter().map(|s| s.content.chars().count()).sum();
    let padding = (area.width as usize).saturating_sub(title.len() + right_len + 2);

    let mut spans = vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(padding)),
    ];
    spans.extend(right);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_modules(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, module) in FeatureModule::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, module.title());
        spans.push(Span::styled(
            label,
            styles::module_tab_style(*module, *module == app.current_module),
        ));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_module_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_module {
        FeatureModule::Chat => render_chat_module(frame, app, area),
        module => render_web_module(frame, app, module, area),
    }
}

/// Modules whose content lives in the web frontend
fn render_web_module(frame: &mut Frame, app: &App, module: FeatureModule, area: Rect) {
    let base_url = app.session.api().base_url();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!(" {}", module.title()), styles::title_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Open in browser: ", styles::muted_style()),
            Span::styled(module.page_url(base_url), styles::list_item_style()),
        ]),
        Line::from(vec![
            Span::styled(" API:             ", styles::muted_style()),
            Span::styled(
                format!("{}{}", base_url, module.api_prefix()),
                styles::list_item_style(),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_chat_module(frame: &mut Frame, app: &App, area: Rect) {
    if app.fallback_chat_open {
        render_chat(frame, app, area);
        return;
    }

    let lines = match app.widget_status {
        WidgetStatus::Loading => vec![
            Line::from(""),
            Line::from(Span::styled(" Loading assistant widget…", styles::muted_style())),
        ],
        WidgetStatus::Loaded => vec![
            Line::from(""),
            Line::from(Span::styled(" Assistant widget is available", styles::success_style())),
            Line::from(Span::styled(
                format!(" {}", app.config.widget_url().unwrap_or_default()),
                styles::list_item_style(),
            )),
        ],
        WidgetStatus::FallbackOffered => vec![
            Line::from(""),
            Line::from(Span::styled(
                " The assistant widget did not load.",
                styles::highlight_style(),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(" Press ", styles::muted_style()),
                Span::styled("[f]", styles::help_key_style()),
                Span::styled(" to open the simple chat", styles::muted_style()),
            ]),
        ],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false))
        .title(" Chat ");

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_chat(frame: &mut Frame, app: &App, area: Rect) {
    let error_height = if app.chat_error.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(error_height),
        ])
        .split(area);

    // History
    let mut lines = Vec::new();
    for entry in &app.chat_history {
        lines.push(Line::from(vec![
            Span::styled("You: ", styles::highlight_style()),
            Span::raw(entry.prompt.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Assistant: ", styles::success_style()),
            Span::styled(entry.reply.clone(), styles::list_item_style()),
        ]));
        lines.push(Line::from(""));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask the assistant anything. Press [i] to type.",
            styles::muted_style(),
        )));
    }

    let visible = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    let history = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_style(false))
                .title(" Simple chat "),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(history, chunks[0]);

    // Prompt input
    let composing = app.state == AppState::Composing;
    let generating = app.pending == Some(PendingAction::Generate);
    let (title, input_style) = if generating {
        (" Generating… ", styles::disabled_style())
    } else if composing {
        (" Prompt - Enter to send, Esc to stop ", styles::list_item_style())
    } else {
        (" Prompt - [i] to type ", styles::muted_style())
    };
    let cursor = if composing && !generating { "▌" } else { "" };

    let input = Paragraph::new(Line::from(Span::styled(
        format!("{}{}", app.chat_input, cursor),
        input_style,
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(styles::border_style(composing))
            .title(title),
    );
    frame.render_widget(input, chunks[1]);

    if let Some(ref error) = app.chat_error {
        let line = Line::from(Span::styled(format!(" {}", error), styles::error_style()));
        frame.render_widget(Paragraph::new(line), chunks[2]);
    }
}

fn render_login_form(frame: &mut Frame, app: &App, area: Rect) {
    let height = if app.login_error.is_some() { 12 } else { 10 };
    let form_area = centered_rect_fixed(46, height, area);

    frame.render_widget(Clear, form_area);

    let logging_in = app.pending == Some(PendingAction::Login);
    let mut lines = vec![];

    lines.push(Line::from(Span::styled(
        "       Adaptive Placement Agent",
        styles::title_style(),
    )));
    lines.push(Line::from(Span::styled(
        "       Please log in to continue",
        styles::muted_style(),
    )));
    lines.push(Line::from(""));

    // Username field
    let username_focused = app.login_focus == LoginFocus::Username && !logging_in;
    let username_style = if username_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let username_display = format!("{:<16}", app.login_username);
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(format!("{}{}", username_display, cursor), username_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Password field
    let password_focused = app.login_focus == LoginFocus::Password && !logging_in;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked: String = "*".repeat(app.login_password.chars().count().min(16));
    let password_display = format!("{:<16}", password_masked);
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{}{}", password_display, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Login button, disabled while the request is in flight
    lines.push(Line::from(""));
    if logging_in {
        lines.push(Line::from(vec![
            Span::raw("            ["),
            Span::styled(" Logging in… ", styles::disabled_style()),
            Span::raw("]"),
        ]));
    } else if app.login_focus == LoginFocus::Button {
        lines.push(Line::from(vec![
            Span::raw("            ["),
            Span::styled(" ▶ Login ◀ ", styles::selected_style()),
            Span::raw("]"),
        ]));
    } else {
        lines.push(Line::from(vec![
            Span::raw("            ["),
            Span::styled("   Login   ", styles::list_item_style()),
            Span::raw("]"),
        ]));
    }

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, form_area);
}

fn health_text(app: &App) -> String {
    let mut text = match app.health {
        Some((status, checked_at)) => format!(
            "Backend: {} (checked {})",
            status.label(),
            checked_at.with_timezone(&Local).format("%H:%M:%S")
        ),
        None => "Backend: checking…".to_string(),
    };

    if let Some(ref info) = app.server_info {
        if !info.gemini_configured && matches!(app.health, Some((HealthStatus::Online, _))) {
            text.push_str(" - generation not configured");
        }
    }
    text
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = if app.is_authenticated() {
        "[1-6] modules | [l]ogout | [q]uit"
    } else {
        "[Tab] next field | [Esc] quit"
    };

    // Health stays visible next to any transient message
    let mut left = Vec::new();
    if let Some(ref msg) = app.status_message {
        left.push(Span::styled(format!(" {} ", msg), styles::status_message_style()));
        left.push(Span::styled("|", styles::muted_style()));
    }
    left.push(Span::styled(
        format!(" {} ", health_text(app)),
        styles::health_style(app.health.map(|(status, _)| status)),
    ));
    let right_text = format!(" {} ", shortcuts);

    let left_len: usize = left.iter().map(|s| s.content.chars().count()).sum();
    let padding_len = (area.width as usize)
        .saturating_sub(left_len)
        .saturating_sub(right_text.len());

    left.push(Span::raw(" ".repeat(padding_len)));
    left.push(Span::styled(right_text, styles::muted_style()));

    let paragraph = Paragraph::new(Line::from(left)).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(key, styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 18, frame.area());

    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Adaptive Placement Agent", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("  1-6       ", "Switch module"),
        help_line("  ←/→       ", "Previous/next module"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("  f         ", "Open simple chat (when offered)"),
        help_line("  i         ", "Type a prompt in the simple chat"),
        help_line("  l         ", "Log out"),
        help_line("  q         ", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
