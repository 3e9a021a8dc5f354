//! Default status and label transitions.
//!
//! Received direct messages land in the inbox, broadcasts under their own
//! label, both unread. Outgoing messages move from drafts to the outbox when
//! queued and to sent once acknowledged.
//!
//! The processor only needs [`DefaultLabeler::new`]. `with_labels` is for
//! embedders whose label store uses its own names.

use bitpost_core::{Label, LabelKind, Plaintext, PlaintextType, Status};

use crate::ports::Labeler;

pub struct DefaultLabeler {
    labels: Vec<Label>,
}

impl Default for DefaultLabeler {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultLabeler {
    pub fn new() -> Self {
        Self {
            labels: vec![
                Label::new("Inbox", LabelKind::Inbox),
                Label::new("Broadcasts", LabelKind::Broadcast),
                Label::new("Drafts", LabelKind::Drafts),
                Label::new("Outbox", LabelKind::Outbox),
                Label::new("Sent", LabelKind::Sent),
                Label::new("Unread", LabelKind::Unread),
                Label::new("Trash", LabelKind::Trash),
            ],
        }
    }

    /// Use custom label names. Kinds without a label here are never applied.
    pub fn with_labels(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    fn add(&self, message: &mut Plaintext, kind: LabelKind) {
        if message.has_label(kind) {
            return;
        }
        if let Some(label) = self.labels.iter().find(|l| l.kind == kind) {
            message.labels.push(label.clone());
        }
    }

    fn remove(message: &mut Plaintext, kind: LabelKind) {
        message.labels.retain(|l| l.kind != kind);
    }
}

impl Labeler for DefaultLabeler {
    fn set_labels(&self, mut message: Plaintext) -> Plaintext {
        message.status = Status::Received;
        message.labels.clear();
        match message.kind {
            PlaintextType::Msg => self.add(&mut message, LabelKind::Inbox),
            PlaintextType::Broadcast => self.add(&mut message, LabelKind::Broadcast),
        }
        self.add(&mut message, LabelKind::Unread);
        message
    }

    fn mark_as_sending(&self, mut message: Plaintext) -> Plaintext {
        let recipient_key_missing = message.to.as_ref().is_some_and(|to| to.pubkey.is_none());
        message.status = if recipient_key_missing {
            Status::PubkeyRequested
        } else {
            Status::Sending
        };
        Self::remove(&mut message, LabelKind::Drafts);
        self.add(&mut message, LabelKind::Outbox);
        message
    }

    fn mark_as_acknowledged(&self, mut message: Plaintext) -> Plaintext {
        message.status = Status::SentAcknowledged;
        Self::remove(&mut message, LabelKind::Outbox);
        self.add(&mut message, LabelKind::Sent);
        message
    }
}
