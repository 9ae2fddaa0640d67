// src/models/like.rs

use crate::{
    models::id::ObjectId,
    store::{
        Document,
        collections::{COMMENTS, TWEETS, VIDEOS},
    },
};

/// What a like points at. Exactly one target per like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Video(ObjectId),
    Comment(ObjectId),
    Tweet(ObjectId),
}

impl LikeTarget {
    /// Field name holding the target reference in a stored like.
    pub fn field(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "video",
            LikeTarget::Comment(_) => "comment",
            LikeTarget::Tweet(_) => "tweet",
        }
    }

    /// Collection the target lives in.
    pub fn collection(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => VIDEOS,
            LikeTarget::Comment(_) => COMMENTS,
            LikeTarget::Tweet(_) => TWEETS,
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "Video",
            LikeTarget::Comment(_) => "Comment",
            LikeTarget::Tweet(_) => "Tweet",
        }
    }
}

/// A (target, liker) pair. Its existence in the 'likes' collection is the liked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Like {
    pub target: LikeTarget,
    pub liked_by: ObjectId,
}

impl Like {
    pub fn new(target: LikeTarget, liked_by: ObjectId) -> Self {
        Self { target, liked_by }
    }

    /// The stored identity of this like, used as the toggle key.
    pub fn pair_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(self.target.field().to_string(), self.target.id().into());
        doc.insert("likedBy".to_string(), self.liked_by.into());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn pair_document_names_exactly_one_target() {
        let video = ObjectId::new();
        let user = ObjectId::new();
        let doc = Like::new(LikeTarget::Video(video), user).pair_document();

        assert_eq!(doc.len(), 2);
        assert_eq!(doc["video"], Value::from(video));
        assert_eq!(doc["likedBy"], Value::from(user));
    }

    #[test]
    fn targets_map_to_their_collections() {
        let id = ObjectId::new();
        assert_eq!(LikeTarget::Video(id).collection(), "videos");
        assert_eq!(LikeTarget::Comment(id).field(), "comment");
        assert_eq!(LikeTarget::Tweet(id).id(), id);
    }
}
