use ratatui::style::{Color, Modifier, Style};

use placement_core::models::{FeatureModule, HealthStatus};

// Color palette
pub const BRAND: Color = Color::Rgb(64, 128, 192);
pub const ONLINE: Color = Color::Rgb(96, 176, 112);
pub const ATTENTION: Color = Color::Rgb(208, 168, 72);
pub const OFFLINE: Color = Color::Rgb(200, 72, 72);
pub const MUTED: Color = Color::Rgb(128, 128, 136);
pub const SELECTION_BG: Color = Color::Rgb(44, 48, 68);
pub const STATUS_BG: Color = Color::Rgb(30, 32, 42);

/// Accent for each assessment module's tab
fn module_accent(module: FeatureModule) -> Color {
    match module {
        FeatureModule::Chat => BRAND,
        FeatureModule::Speaking => Color::Rgb(200, 120, 176),
        FeatureModule::Listening => Color::Rgb(96, 168, 200),
        FeatureModule::Reading => Color::Rgb(120, 184, 96),
        FeatureModule::Writing => Color::Rgb(216, 144, 80),
        FeatureModule::Vocabulary => Color::Rgb(160, 136, 216),
    }
}

// Styles
pub fn title_style() -> Style {
    Style::default().fg(BRAND).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(SELECTION_BG)
        .add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ATTENTION)
}

pub fn success_style() -> Style {
    Style::default().fg(ONLINE)
}

pub fn error_style() -> Style {
    Style::default().fg(OFFLINE)
}

/// Control that cannot be used right now (request in flight)
pub fn disabled_style() -> Style {
    Style::default().fg(MUTED).add_modifier(Modifier::DIM)
}

/// Module tabs keep their accent; the current one is bold and underlined
pub fn module_tab_style(module: FeatureModule, selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(module_accent(module))
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default().fg(MUTED)
    }
}

/// Backend status in the status bar; unknown until the first poll lands
pub fn health_style(status: Option<HealthStatus>) -> Style {
    match status {
        Some(HealthStatus::Online) => Style::default().fg(ONLINE),
        Some(HealthStatus::Unreachable) => Style::default().fg(OFFLINE).add_modifier(Modifier::BOLD),
        None => muted_style(),
    }
}

pub fn status_message_style() -> Style {
    Style::default().fg(ATTENTION)
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(BRAND)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(STATUS_BG).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default()
        .fg(ATTENTION)
        .add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}
