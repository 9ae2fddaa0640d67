// src/models/subscription.rs

use crate::{models::id::ObjectId, store::Document};

/// A (subscriber, channel) pair. Its existence in 'subscriptions' is the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub subscriber: ObjectId,
    pub channel: ObjectId,
}

impl Subscription {
    pub fn pair_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("subscriber".to_string(), self.subscriber.into());
        doc.insert("channel".to_string(), self.channel.into());
        doc
    }
}
