use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::common::commands::HELP;
use crate::common::{ChatEvent, ChatSummary, Command, Message, NodeInfos, Slot};
use crate::network::RegistryHandle;
use crate::protocol::codec::{self, MAX_FIELD_LEN};
use crate::protocol::{Operation, Payload, Typology};
use crate::storage::{Chat, ChatStore};

/// Single writer of all chat state.
///
/// Remote operations (already stamped with the slot they arrived on) and
/// local commands are applied one at a time; every follow-up operation for
/// other peers goes back out through the registry.
pub struct Orchestrator {
    local: NodeInfos,
    chats: ChatStore,
    current: Option<Uuid>,
    registry: RegistryHandle,
    events: mpsc::UnboundedSender<ChatEvent>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        local: NodeInfos,
        registry: RegistryHandle,
        events: mpsc::UnboundedSender<ChatEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            local,
            chats: ChatStore::new(),
            current: None,
            registry,
            events,
            shutdown,
        }
    }

    pub fn chats(&self) -> &ChatStore {
        &self.chats
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        self.current.and_then(|id| self.chats.find_by_id(&id))
    }

    /// Runs until shutdown. Anything still queued at that point is dropped.
    pub async fn run(
        mut self,
        mut remote: mpsc::Receiver<Operation>,
        mut local: mpsc::Receiver<Command>,
    ) {
        log::info!("Orchestrator started for {} ({})", self.local.name, self.local.id);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(operation) = remote.recv() => self.apply(operation),
                Some(command) = local.recv() => self.execute(command),
            }
        }
        log::info!("Orchestrator stopped");
    }

    /// Applies one operation received from a peer.
    pub fn apply(&mut self, operation: Operation) {
        match operation.typology {
            Typology::CreateChat => self.apply_snapshot(operation),
            Typology::JoinChatByName => self.apply_join(operation),
            Typology::AddNode => self.apply_add_node(operation),
            Typology::AddMessage => self.apply_add_message(operation),
            Typology::LeaveChat => self.apply_leave(operation),
            Typology::Quit => self.apply_quit(operation.slot),
            Typology::ListUsers | Typology::ListChatsCommand => {
                log::debug!(
                    "Ignoring {} from slot {}",
                    operation.typology,
                    operation.slot
                );
            }
        }
    }

    /// Runs one command typed by the local user.
    pub fn execute(&mut self, command: Command) {
        if let Some(typology) = command.typology() {
            log::debug!("Executing local {typology}");
        }
        match command {
            Command::CreateChat { name } => self.create_chat(name),
            Command::Join {
                address,
                port,
                chat,
            } => self.join(address, port, chat),
            Command::Message { text } => self.send_message(text),
            Command::Leave => self.leave(),
            Command::ListUsers => self.list_users(),
            Command::ListChats => self.list_chats(),
            Command::Quit => {
                log::info!("Quit requested");
                self.shutdown.cancel();
            }
            Command::Help => self.emit(ChatEvent::Info(HELP.to_string())),
        }
    }

    fn create_chat(&mut self, name: String) {
        if name.len() > MAX_FIELD_LEN {
            self.emit(ChatEvent::Error(format!(
                "Chat names are limited to {MAX_FIELD_LEN} bytes"
            )));
            return;
        }
        if self.chats.find_by_name(&name).is_some() {
            self.emit(ChatEvent::Error(format!("Chat `{name}` already exists")));
            return;
        }

        let mut chat = Chat::new(name.clone());
        chat.add_or_update_node(self.local.clone());
        log::info!("Created chat `{name}` ({})", chat.id);
        self.current = Some(chat.id);
        self.chats.insert(chat);
        self.emit(ChatEvent::ChatCreated { chat: name });
    }

    fn join(&mut self, address: String, port: u16, chat: String) {
        let request = Operation::join_chat_by_name(&chat, self.local.clone());
        if let Err(err) = codec::encode(&request) {
            self.emit(ChatEvent::Error(format!("Cannot join `{chat}`: {err}")));
            return;
        }
        log::info!("Joining `{chat}` through {address}:{port}");
        self.emit(ChatEvent::Info(format!(
            "Connecting to {address}:{port} to join `{chat}`..."
        )));
        self.registry.dial(address, port, Some(request));
    }

    fn send_message(&mut self, text: String) {
        let Some(chat) = self.current.and_then(|id| self.chats.find_by_id_mut(&id)) else {
            let _ = self
                .events
                .send(ChatEvent::Error("Not in a chat; /create or /join one first".into()));
            return;
        };

        let message = Message::new(self.local.name.clone(), text);
        let operation = Operation::add_message(chat.id, message.clone());
        if let Err(err) = codec::encode(&operation) {
            let _ = self
                .events
                .send(ChatEvent::Error(format!("Message not sent: {err}")));
            return;
        }

        chat.add_message_if_absent(message.clone());
        let chat_name = chat.name.clone();
        let slots = chat.slots(&self.local.id);
        for slot in slots {
            self.registry.send(operation.to_slot(slot));
        }
        self.emit(ChatEvent::MessageReceived {
            chat: chat_name,
            message,
        });
    }

    fn leave(&mut self) {
        let Some(id) = self.current.take() else {
            self.emit(ChatEvent::Error("Not in a chat".into()));
            return;
        };
        let Some(chat) = self.chats.remove(&id) else {
            return;
        };

        let operation = Operation::leave_chat(chat.id, self.local.clone());
        for slot in chat.slots(&self.local.id) {
            self.registry.send(operation.to_slot(slot));
        }
        log::info!("Left chat `{}`", chat.name);
        self.emit(ChatEvent::Left { chat: chat.name });
    }

    fn list_users(&self) {
        match self.current_chat() {
            Some(chat) => self.emit(ChatEvent::Users {
                chat: chat.name.clone(),
                members: chat.members().to_vec(),
            }),
            None => self.emit(ChatEvent::Error("Not in a chat".into())),
        }
    }

    fn list_chats(&self) {
        let summaries = self
            .chats
            .iter()
            .map(|chat| ChatSummary {
                name: chat.name.clone(),
                members: chat.members().len(),
                messages: chat.messages().len(),
                current: self.current == Some(chat.id),
            })
            .collect();
        self.emit(ChatEvent::Chats(summaries));
    }

    /// Chat a remote operation refers to by id.
    fn resolve_id(&self, operation: &Operation) -> Option<Uuid> {
        let resolved = Uuid::parse_str(&operation.targeted_chat)
            .ok()
            .filter(|id| self.chats.find_by_id(id).is_some());
        if resolved.is_none() {
            log::warn!(
                "Dropping {} from slot {}: unknown chat `{}`",
                operation.typology,
                operation.slot,
                operation.targeted_chat
            );
        }
        resolved
    }

    fn apply_snapshot(&mut self, operation: Operation) {
        let Payload::ChatId(id) = operation.payload else {
            log::warn!(
                "Dropping CreateChat without chat id from slot {}",
                operation.slot
            );
            return;
        };

        if let Some(other) = self
            .chats
            .find_by_name(&operation.targeted_chat)
            .filter(|chat| chat.id != id)
        {
            log::warn!(
                "Dropping snapshot of `{}` ({id}) from slot {}: name already used by {}",
                operation.targeted_chat,
                operation.slot,
                other.id
            );
            self.emit(ChatEvent::Error(format!(
                "Cannot join `{}`: a different chat with that name already exists",
                operation.targeted_chat
            )));
            return;
        }

        if self.chats.find_by_id(&id).is_none() {
            let mut chat = Chat::with_id(id, operation.targeted_chat.clone());
            chat.add_or_update_node(self.local.clone());
            self.chats.insert(chat);
            log::info!("Joined chat `{}` ({id})", operation.targeted_chat);
        }
        self.current = Some(id);
        self.emit(ChatEvent::ChatJoined {
            chat: operation.targeted_chat,
        });
    }

    fn apply_join(&mut self, operation: Operation) {
        let slot = operation.slot;
        let Some(joiner) = operation.node().cloned() else {
            log::warn!("Dropping JoinChatByName without node from slot {slot}");
            return;
        };
        let Some(chat) = self.chats.find_by_name_mut(&operation.targeted_chat) else {
            log::warn!(
                "Dropping join from {} on slot {slot}: unknown chat `{}`",
                joiner.name,
                operation.targeted_chat
            );
            return;
        };

        let joiner = joiner.with_slot(slot);
        chat.add_or_update_node(joiner.clone());
        let chat_id = chat.id;
        let chat_name = chat.name.clone();

        // Snapshot for the newcomer: the room, its members, its history.
        let mut outgoing = vec![Operation::create_chat_snapshot(chat_id, &chat_name).to_slot(slot)];
        outgoing.extend(
            chat.members()
                .iter()
                .filter(|member| member.id != joiner.id)
                .map(|member| Operation::add_node(chat_id, member.clone()).to_slot(slot)),
        );
        outgoing.extend(
            chat.messages()
                .iter()
                .map(|message| Operation::add_message(chat_id, message.clone()).to_slot(slot)),
        );

        // Everyone else hears about the newcomer.
        let announce = Operation::add_node(chat_id, joiner.clone());
        outgoing.extend(
            chat.slots(&joiner.id)
                .into_iter()
                .map(|member_slot| announce.to_slot(member_slot)),
        );

        log::info!(
            "{} joined `{chat_name}` on slot {slot}; sending {} operations",
            joiner.name,
            outgoing.len()
        );
        for operation in outgoing {
            self.registry.send(operation);
        }
        self.current = Some(chat_id);
        self.emit(ChatEvent::MemberJoined {
            chat: chat_name,
            member: joiner.name,
        });
    }

    fn apply_add_node(&mut self, operation: Operation) {
        let Some(chat_id) = self.resolve_id(&operation) else {
            return;
        };
        let Some(node) = operation.node().cloned() else {
            return;
        };
        if node.id == self.local.id {
            return;
        }
        let Some(chat) = self.chats.find_by_id_mut(&chat_id) else {
            return;
        };

        let is_new = chat.member(&node.id).is_none();
        let name = node.name.clone();
        chat.add_or_update_node(node.with_slot(operation.slot));
        if is_new {
            let chat = chat.name.clone();
            self.emit(ChatEvent::MemberJoined { chat, member: name });
        }
    }

    fn apply_add_message(&mut self, operation: Operation) {
        let Some(chat_id) = self.resolve_id(&operation) else {
            return;
        };
        let Some(message) = operation.message().cloned() else {
            return;
        };
        let Some(chat) = self.chats.find_by_id_mut(&chat_id) else {
            return;
        };

        if !chat.add_message_if_absent(message.clone()) {
            log::debug!("Message {} already known", message.id);
            return;
        }

        let chat_name = chat.name.clone();
        let targets = flood_targets(chat, &self.local.id, operation.slot);
        for slot in targets {
            self.registry.send(operation.to_slot(slot));
        }
        self.emit(ChatEvent::MessageReceived {
            chat: chat_name,
            message,
        });
    }

    fn apply_leave(&mut self, operation: Operation) {
        let Some(chat_id) = self.resolve_id(&operation) else {
            return;
        };
        let Some(node) = operation.node() else {
            return;
        };
        if node.id == self.local.id {
            return;
        }
        let Some(chat) = self.chats.find_by_id_mut(&chat_id) else {
            return;
        };
        let Some(removed) = chat.remove_node(&node.id) else {
            return;
        };

        let chat_name = chat.name.clone();
        let targets = flood_targets(chat, &self.local.id, operation.slot);
        for slot in targets {
            self.registry.send(operation.to_slot(slot));
        }
        self.emit(ChatEvent::MemberLeft {
            chat: chat_name,
            member: removed.name,
        });
    }

    fn apply_quit(&mut self, slot: Slot) {
        let mut departed = Vec::new();
        for chat in self.chats.iter_mut() {
            for member in chat.remove_node_by_slot(slot) {
                departed.push((chat.name.clone(), member.name));
            }
        }
        log::info!("Slot {slot} closed; {} memberships dropped", departed.len());
        for (chat, member) in departed {
            self.emit(ChatEvent::MemberLeft { chat, member });
        }
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }
}

/// Every member slot except the one the operation came in on.
fn flood_targets(chat: &Chat, local_id: &Uuid, origin: Slot) -> Vec<Slot> {
    chat.slots(local_id)
        .into_iter()
        .filter(|slot| *slot != origin)
        .collect()
}
