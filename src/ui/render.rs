use crate::common::ChatEvent;

/// Text shown on the console for one event.
pub fn render(event: &ChatEvent) -> String {
    match event {
        ChatEvent::ChatCreated { chat } => format!("* created chat `{chat}`"),
        ChatEvent::ChatJoined { chat } => format!("* joined chat `{chat}`"),
        ChatEvent::MemberJoined { chat, member } => format!("* {member} joined `{chat}`"),
        ChatEvent::MemberLeft { chat, member } => format!("* {member} left `{chat}`"),
        ChatEvent::MessageReceived { chat, message } => format!(
            "[{}] #{chat} <{}> {}",
            message.date.format("%H:%M:%S"),
            message.sender,
            message.content
        ),
        ChatEvent::Users { chat, members } => {
            let mut lines = vec![format!("Members of `{chat}`:")];
            lines.extend(members.iter().map(|member| match member.slot {
                Some(slot) => format!(
                    "  {} ({}:{}, slot {slot})",
                    member.name, member.address, member.port
                ),
                None => format!("  {} ({}:{})", member.name, member.address, member.port),
            }));
            lines.join("\n")
        }
        ChatEvent::Chats(chats) if chats.is_empty() => "No chats yet".to_string(),
        ChatEvent::Chats(chats) => chats
            .iter()
            .map(|chat| {
                format!(
                    "{} {} ({} members, {} messages)",
                    if chat.current { "*" } else { " " },
                    chat.name,
                    chat.members,
                    chat.messages
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        ChatEvent::Left { chat } => format!("* left `{chat}`"),
        ChatEvent::Info(text) => text.clone(),
        ChatEvent::Error(text) => format!("error: {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChatSummary, Message, NodeInfos};

    #[test]
    fn test_render_message() {
        let message = Message::new("alice", "hello");
        let line = render(&ChatEvent::MessageReceived {
            chat: "room".into(),
            message,
        });
        assert!(line.ends_with("#room <alice> hello"));
    }

    #[test]
    fn test_render_users_shows_slots() {
        let members = vec![
            NodeInfos::new("127.0.0.1", 9001, "alice"),
            NodeInfos::new("127.0.0.1", 9002, "bob").with_slot(1),
        ];
        let text = render(&ChatEvent::Users {
            chat: "room".into(),
            members,
        });
        assert_eq!(
            text,
            "Members of `room`:\n  alice (127.0.0.1:9001)\n  bob (127.0.0.1:9002, slot 1)"
        );
    }

    #[test]
    fn test_render_chats_marks_current() {
        let text = render(&ChatEvent::Chats(vec![ChatSummary {
            name: "room".into(),
            members: 2,
            messages: 0,
            current: true,
        }]));
        assert_eq!(text, "* room (2 members, 0 messages)");
        assert_eq!(render(&ChatEvent::Chats(Vec::new())), "No chats yet");
    }
}
