use crate::domain::message::Message;

/// Events pushed to a user's live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    NewMessage(Message),
}

impl UserEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "newMessage",
        }
    }
}

/// What happened to a single fanout attempt. Never surfaced to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Offline,
    Dropped,
}

impl Delivery {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Offline => "offline",
            Self::Dropped => "dropped",
        }
    }
}
