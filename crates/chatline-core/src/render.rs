//! Render models for transcript messages.

use crate::saved::SavedSet;
use chatline_protocol::{Author, Message, MessageView, Role, SaveState};

/// Build the view for a transcript message.
///
/// Assistant content carries a save affordance whose initial state
/// reflects membership in `saved`; user content never does.
pub fn render_message(role: Role, content: &str, saved: &SavedSet) -> MessageView {
    let save = match role {
        Role::User => None,
        Role::Assistant if saved.contains(content) => Some(SaveState::Saved),
        Role::Assistant => Some(SaveState::Unsaved),
    };
    MessageView {
        author: Author::from(role),
        content: content.to_string(),
        save,
    }
}

/// Render a whole transcript in order.
pub fn render_transcript(messages: &[Message], saved: &SavedSet) -> Vec<MessageView> {
    messages
        .iter()
        .map(|message| render_message(message.role, &message.content, saved))
        .collect()
}

/// Empty assistant view shown while a reply streams in.
pub fn render_placeholder() -> MessageView {
    MessageView {
        author: Author::Assistant,
        content: String::new(),
        save: None,
    }
}

/// Client notice view; never saveable.
pub fn render_notice(text: &str) -> MessageView {
    MessageView {
        author: Author::Notice,
        content: text.to_string(),
        save: None,
    }
}

/// Activate the save action on `view`.
///
/// Records the exact content in `saved` and flips the view to saved.
/// Returns true when the view changed; saved views and views without a
/// save affordance are left alone.
pub fn activate_save(view: &mut MessageView, saved: &mut SavedSet) -> bool {
    if view.save != Some(SaveState::Unsaved) {
        return false;
    }
    saved.insert(view.content.clone());
    view.save = Some(SaveState::Saved);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn assistant_views_reflect_saved_membership() {
        let mut saved = SavedSet::default();
        saved.insert("kept");

        let view = render_message(Role::Assistant, "kept", &saved);
        assert_eq!(view.save, Some(SaveState::Saved));
        let view = render_message(Role::Assistant, "other", &saved);
        assert_eq!(view.save, Some(SaveState::Unsaved));
        let view = render_message(Role::User, "kept", &saved);
        assert_eq!(view.author, Author::User);
        assert_eq!(view.save, None);
    }

    #[test]
    fn save_activation_is_one_shot_and_local() {
        let mut saved = SavedSet::default();
        let mut first = render_message(Role::Assistant, "same", &saved);
        let mut second = render_message(Role::Assistant, "same", &saved);

        assert!(activate_save(&mut first, &mut saved));
        assert!(!activate_save(&mut first, &mut saved));
        assert_eq!(first.save, Some(SaveState::Saved));
        assert_eq!(second.save, Some(SaveState::Unsaved));
        assert_eq!(saved.len(), 1);

        assert!(activate_save(&mut second, &mut saved));
        assert_eq!(saved.len(), 1);
    }

    #[test]
    fn notices_and_placeholders_cannot_be_saved() {
        let mut saved = SavedSet::default();
        let mut notice = render_notice("Sorry");
        let mut placeholder = render_placeholder();
        assert!(!activate_save(&mut notice, &mut saved));
        assert!(!activate_save(&mut placeholder, &mut saved));
        assert!(saved.is_empty());
    }
}
