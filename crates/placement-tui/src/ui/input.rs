//! Keyboard input handling for the TUI.
//!
//! Handlers only change local UI state or queue a `PendingAction`; the main
//! loop spawns queued network work and never waits on it.

use crossterm::event::{KeyCode, KeyEvent};

use placement_core::models::FeatureModule;

use crate::app::{
    can_add_password_char, can_add_prompt_char, can_add_username_char, App, AppState,
    LoginFocus, PendingAction,
};

/// Handle keyboard input. Returns true if the app should quit.
///
/// A request in flight only disables the control that started it: the login
/// form while logging in, the prompt box while generating.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    if !app.is_authenticated() {
        return handle_login_input(app, key);
    }

    if matches!(app.state, AppState::Composing) {
        handle_compose_input(app, key);
        return false;
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char('l') => {
            app.logout();
        }
        KeyCode::Char('f') => {
            if !app.open_fallback_chat() {
                app.status_message = Some("Simple chat is only offered if the widget fails to load".to_string());
            }
        }
        KeyCode::Char('i') | KeyCode::Enter => {
            if app.chat_available() {
                app.state = AppState::Composing;
                app.status_message = None;
            }
        }
        KeyCode::Char(c @ '1'..='6') => {
            let index = c as usize - '1' as usize;
            if let Some(module) = FeatureModule::from_index(index) {
                app.current_module = module;
            }
        }
        KeyCode::Left => {
            app.current_module = app.current_module.prev();
        }
        KeyCode::Right | KeyCode::Tab => {
            app.current_module = app.current_module.next();
        }
        _ => {}
    }
    false
}

fn handle_compose_input(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.state = AppState::Normal;
        return;
    }
    if app.is_busy() {
        return;
    }

    match key.code {
        KeyCode::Enter => {
            if !app.chat_input.trim().is_empty() {
                app.queue(PendingAction::Generate);
            }
        }
        KeyCode::Backspace => {
            app.chat_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_prompt_char(app.chat_input.chars().count(), c) {
                app.chat_input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Esc {
        // Quit if on login screen
        app.state = AppState::Quitting;
        return true;
    }
    if app.is_busy() {
        return false;
    }

    match key.code {
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => {
                app.login_focus = LoginFocus::Password;
            }
            LoginFocus::Password | LoginFocus::Button => {
                app.login_focus = LoginFocus::Button;
                app.queue(PendingAction::Login);
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crossterm::event::KeyModifiers;
    use placement_core::auth::TOKEN_KEY;
    use placement_core::widget::WidgetStatus;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            handle_input(app, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_login_form_typing_and_submit() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        type_str(&mut app, "bob");
        handle_input(&mut app, key(KeyCode::Tab));
        type_str(&mut app, "secret");
        handle_input(&mut app, key(KeyCode::Enter));

        assert_eq!(app.login_username, "bob");
        assert_eq!(app.login_password, "secret");
        assert_eq!(app.pending, Some(PendingAction::Login));
    }

    #[test]
    fn test_input_ignored_while_busy() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        app.queue(PendingAction::Login);
        type_str(&mut app, "x");
        handle_input(&mut app, key(KeyCode::Enter));
        assert!(app.login_username.is_empty());
        assert_eq!(app.pending, Some(PendingAction::Login));
    }

    #[test]
    fn test_navigation_allowed_while_generating() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        app.widget_status = WidgetStatus::FallbackOffered;
        app.open_fallback_chat();
        app.state = AppState::Composing;
        app.chat_input = "hi".into();
        app.queue(PendingAction::Generate);

        // Prompt box is disabled
        type_str(&mut app, "x");
        assert_eq!(app.chat_input, "hi");

        handle_input(&mut app, key(KeyCode::Esc));
        assert_eq!(app.state, AppState::Normal);
        handle_input(&mut app, key(KeyCode::Char('3')));
        assert_eq!(app.current_module, FeatureModule::Listening);
        handle_input(&mut app, key(KeyCode::Char('?')));
        assert_eq!(app.state, AppState::ShowingHelp);
    }

    #[test]
    fn test_escape_quits_during_login() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        app.queue(PendingAction::Login);
        assert!(handle_input(&mut app, key(KeyCode::Esc)));
    }

    #[test]
    fn test_login_focus_cycles() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        assert_eq!(app.login_focus, LoginFocus::Username);
        handle_input(&mut app, key(KeyCode::Down));
        assert_eq!(app.login_focus, LoginFocus::Password);
        handle_input(&mut app, key(KeyCode::Down));
        assert_eq!(app.login_focus, LoginFocus::Button);
        handle_input(&mut app, key(KeyCode::Down));
        assert_eq!(app.login_focus, LoginFocus::Username);
        handle_input(&mut app, key(KeyCode::Up));
        assert_eq!(app.login_focus, LoginFocus::Button);
    }

    #[test]
    fn test_escape_on_login_quits() {
        let mut app = test_app("http://127.0.0.1:9", None, None);
        assert!(handle_input(&mut app, key(KeyCode::Esc)));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn test_logout_key_clears_session() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), Some("alice"));
        handle_input(&mut app, key(KeyCode::Char('l')));
        assert!(!app.is_authenticated());
        assert!(app.session.store().get(TOKEN_KEY).is_none());
    }

    #[test]
    fn test_module_switching() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        handle_input(&mut app, key(KeyCode::Char('4')));
        assert_eq!(app.current_module, FeatureModule::Reading);
        handle_input(&mut app, key(KeyCode::Right));
        assert_eq!(app.current_module, FeatureModule::Writing);
        handle_input(&mut app, key(KeyCode::Left));
        handle_input(&mut app, key(KeyCode::Left));
        assert_eq!(app.current_module, FeatureModule::Listening);
    }

    #[test]
    fn test_compose_and_send_prompt() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        app.widget_status = WidgetStatus::FallbackOffered;
        handle_input(&mut app, key(KeyCode::Char('f')));
        handle_input(&mut app, key(KeyCode::Char('i')));
        assert_eq!(app.state, AppState::Composing);

        // Digits and 'l' are text while composing
        type_str(&mut app, "l1 ok");
        assert_eq!(app.chat_input, "l1 ok");
        assert!(app.is_authenticated());

        handle_input(&mut app, key(KeyCode::Enter));
        assert_eq!(app.pending, Some(PendingAction::Generate));
    }

    #[test]
    fn test_compose_unavailable_without_fallback() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        handle_input(&mut app, key(KeyCode::Char('i')));
        assert_eq!(app.state, AppState::Normal);
    }

    #[test]
    fn test_quit_confirmation() {
        let mut app = test_app("http://127.0.0.1:9", Some("abc"), None);
        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))));
        assert_eq!(app.state, AppState::Normal);
        handle_input(&mut app, key(KeyCode::Char('q')));
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))));
    }
}
