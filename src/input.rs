use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextPage,
    PrevPage,
    SwitchPage(u8),
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    ToggleHelp,
    StartCommand,
    StartSearch,
    ResetSearch,
    OpenAddForm,
    ShowYaml,
    RequestDelete,
    Refresh,
    ConfirmYes,
    ConfirmNo,
    NextField,
    PrevField,
    NextOption,
    PrevOption,
    SubmitInput,
    CancelInput,
    Backspace,
    InputChar(char),
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Command => map_command_mode_key(key),
        InputMode::Search | InputMode::Form => map_field_mode_key(key),
        InputMode::Yaml => map_yaml_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('d') if ctrl => Some(Action::RequestDelete),
        KeyCode::Char('c') if ctrl => Some(Action::Quit),
        _ if ctrl => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('1') => Some(Action::SwitchPage(1)),
        KeyCode::Char('2') => Some(Action::SwitchPage(2)),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::Left => Some(Action::PrevPage),
        KeyCode::Right => Some(Action::NextPage),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('/') => Some(Action::StartSearch),
        KeyCode::Char('x') => Some(Action::ResetSearch),
        KeyCode::Char(':') => Some(Action::StartCommand),
        KeyCode::Char('a') => Some(Action::OpenAddForm),
        KeyCode::Char('m') | KeyCode::Enter => Some(Action::ShowYaml),
        KeyCode::Delete => Some(Action::RequestDelete),
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmYes),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::ConfirmNo),
        KeyCode::Esc => Some(Action::CancelInput),
        _ => None,
    }
}

fn map_command_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

/// Search bar and add form share one layout of focusable fields. Space is
/// delivered as a character; the app decides whether it toggles a choice.
fn map_field_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(Action::PrevField),
        KeyCode::Right => Some(Action::NextOption),
        KeyCode::Left => Some(Action::PrevOption),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

fn map_yaml_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn normal_mode_maps_quit() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('q'))),
            Some(Action::Quit)
        );
    }

    #[test]
    fn normal_mode_maps_page_switches() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('2'))),
            Some(Action::SwitchPage(2))
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Right)),
            Some(Action::NextPage)
        );
    }

    #[test]
    fn ctrl_d_and_delete_request_deletion() {
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(
            map_key(InputMode::Normal, ctrl_d),
            Some(Action::RequestDelete)
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Delete)),
            Some(Action::RequestDelete)
        );
    }

    #[test]
    fn plain_d_does_nothing() {
        assert_eq!(map_key(InputMode::Normal, key(KeyCode::Char('d'))), None);
    }

    #[test]
    fn normal_mode_maps_uppercase_confirmation_keys() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('Y'))),
            Some(Action::ConfirmYes)
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('N'))),
            Some(Action::ConfirmNo)
        );
    }

    #[test]
    fn form_mode_types_letters_that_are_hotkeys_elsewhere() {
        assert_eq!(
            map_key(InputMode::Form, key(KeyCode::Char('q'))),
            Some(Action::InputChar('q'))
        );
        assert_eq!(
            map_key(InputMode::Search, key(KeyCode::Char(' '))),
            Some(Action::InputChar(' '))
        );
    }

    #[test]
    fn form_mode_moves_between_fields() {
        assert_eq!(
            map_key(InputMode::Form, key(KeyCode::Tab)),
            Some(Action::NextField)
        );
        assert_eq!(
            map_key(InputMode::Form, key(KeyCode::BackTab)),
            Some(Action::PrevField)
        );
        assert_eq!(
            map_key(InputMode::Form, key(KeyCode::Left)),
            Some(Action::PrevOption)
        );
    }

    #[test]
    fn input_mode_rejects_ctrl_c() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Command, ctrl_c), None);
        assert_eq!(map_key(InputMode::Search, ctrl_c), None);
    }

    #[test]
    fn yaml_mode_distinguishes_submit_from_close() {
        assert_eq!(
            map_key(InputMode::Yaml, key(KeyCode::Enter)),
            Some(Action::SubmitInput)
        );
        assert_eq!(
            map_key(InputMode::Yaml, key(KeyCode::Esc)),
            Some(Action::CancelInput)
        );
        assert_eq!(
            map_key(InputMode::Yaml, key(KeyCode::Char('j'))),
            Some(Action::Down)
        );
    }
}
