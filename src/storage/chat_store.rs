use uuid::Uuid;

use super::chat::Chat;

/// In-memory list of every chat this node takes part in.
#[derive(Debug, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|existing| existing.id == chat.id) {
            Some(existing) => *existing = chat,
            None => self.chats.push(chat),
        }
    }

    pub fn find_by_id(&self, id: &Uuid) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == *id)
    }

    pub fn find_by_id_mut(&mut self, id: &Uuid) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.id == *id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.name == name)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.name == name)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Chat> {
        let index = self.chats.iter().position(|chat| chat.id == *id)?;
        Some(self.chats.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chat> {
        self.chats.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name_and_id() {
        let mut store = ChatStore::new();
        let room = Chat::new("room");
        let id = room.id;
        store.insert(room);
        store.insert(Chat::new("other"));

        assert_eq!(store.find_by_name("room").map(|chat| chat.id), Some(id));
        assert_eq!(
            store.find_by_id(&id).map(|chat| chat.name.as_str()),
            Some("room")
        );
        assert!(store.find_by_name("missing").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_same_id_replaces() {
        let mut store = ChatStore::new();
        let id = Uuid::new_v4();
        store.insert(Chat::with_id(id, "old"));
        store.insert(Chat::with_id(id, "new"));

        assert_eq!(store.len(), 1);
        assert!(store.find_by_name("new").is_some());
        assert!(store.remove(&id).is_some());
        assert!(store.is_empty());
    }
}
