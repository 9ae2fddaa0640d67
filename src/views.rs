// src/views.rs

//! Aggregation pipelines for every read view.
//!
//! Joined users are always narrowed to a summary projection so account fields such as the
//! password hash, email or watch history never leave the store.

use serde_json::Value;

use crate::{
    models::id::ObjectId,
    store::{
        collections::{LIKES, SUBSCRIPTIONS, USERS, VIDEOS},
        pipeline::{Expr, Lookup, Pipeline, Projection, SortOrder, Stage},
        query::Filter,
    },
};

/// Filters accepted by the public video listing.
#[derive(Debug, Clone, Default)]
pub struct VideoListFilter {
    pub query: Option<String>,
    pub owner: Option<ObjectId>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

fn newest_first() -> Stage {
    Stage::Sort(vec![("createdAt".to_string(), SortOrder::Desc)])
}

/// `username` + `avatar`, optionally with `fullName`.
fn user_summary(with_full_name: bool) -> Projection {
    let p = Projection::new().include_all(["username", "avatar"]);
    if with_full_name { p.include("fullName") } else { p }
}

/// Joins a user by `local_field` into `as_field` and collapses the array to one object.
/// A missing user leaves the field absent and keeps the row.
fn join_user_collapsed(local_field: &str, as_field: &str, summary: Projection) -> [Stage; 2] {
    [
        Stage::Lookup(
            Lookup::new(USERS, local_field, "_id", as_field)
                .with_pipeline(vec![Stage::Project(summary)]),
        ),
        Stage::AddFields(vec![(as_field.to_string(), Expr::First(as_field.to_string()))]),
    ]
}

pub fn video_listing(filter: &VideoListFilter) -> Pipeline {
    let mut pipeline = Vec::new();

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        pipeline.push(Stage::Search {
            query: query.to_string(),
            paths: vec!["title".to_string(), "description".to_string()],
        });
    }

    if let Some(owner) = filter.owner {
        pipeline.push(Stage::Match(Filter::eq("owner", owner)));
    }

    pipeline.push(Stage::Match(Filter::eq("isPublished", true)));

    match (filter.sort_by.as_deref(), filter.sort_order) {
        (Some(field), Some(order)) if !field.trim().is_empty() => {
            pipeline.push(Stage::Sort(vec![(field.trim().to_string(), order)]));
        }
        _ => pipeline.push(newest_first()),
    }

    pipeline.extend(join_user_collapsed("owner", "ownerDetails", user_summary(false)));
    pipeline
}

/// Single video with like and subscription aggregates as seen by `principal`.
pub fn video_detail(video: &ObjectId, principal: &ObjectId) -> Pipeline {
    let principal = Value::from(*principal);

    let owner_pipeline = vec![
        Stage::Lookup(Lookup::new(SUBSCRIPTIONS, "_id", "channel", "subscribers")),
        Stage::AddFields(vec![
            ("subscribersCount".to_string(), Expr::Size("subscribers".to_string())),
            (
                "isSubscribed".to_string(),
                Expr::Contains {
                    value: principal.clone(),
                    path: "subscribers.subscriber".to_string(),
                },
            ),
        ]),
        Stage::Project(
            user_summary(false).include_all(["subscribersCount", "isSubscribed"]),
        ),
    ];

    vec![
        Stage::Match(Filter::id(video)),
        Stage::Lookup(Lookup::new(LIKES, "_id", "video", "likes")),
        Stage::Lookup(
            Lookup::new(USERS, "owner", "_id", "owner").with_pipeline(owner_pipeline),
        ),
        Stage::AddFields(vec![
            ("likesCount".to_string(), Expr::Size("likes".to_string())),
            ("owner".to_string(), Expr::First("owner".to_string())),
            (
                "isLiked".to_string(),
                Expr::Contains {
                    value: principal,
                    path: "likes.likedBy".to_string(),
                },
            ),
        ]),
        Stage::Project(Projection::new().include_all([
            "videoFile",
            "thumbnail",
            "title",
            "description",
            "views",
            "createdAt",
            "duration",
            "isPublished",
            "owner",
            "likesCount",
            "isLiked",
        ])),
    ]
}

/// Comments on a video, newest first. Comments whose author no longer exists are dropped.
pub fn video_comments(video: &ObjectId) -> Pipeline {
    vec![
        Stage::Match(Filter::eq("video", *video)),
        Stage::Lookup(Lookup::new(USERS, "owner", "_id", "owner")),
        Stage::Unwind("owner".to_string()),
        Stage::Project(
            Projection::new()
                .include_all(["content", "createdAt", "updatedAt"])
                .nested("owner", user_summary(false)),
        ),
        newest_first(),
    ]
}

/// Users subscribed to `channel`, most recent first.
pub fn channel_subscribers(channel: &ObjectId) -> Pipeline {
    let mut pipeline = vec![Stage::Match(Filter::eq("channel", *channel))];
    pipeline.extend(join_user_collapsed("subscriber", "subscriber", user_summary(true)));
    pipeline.push(newest_first());
    pipeline
}

/// Channels `subscriber` follows, most recent first.
pub fn subscribed_channels(subscriber: &ObjectId) -> Pipeline {
    let mut pipeline = vec![Stage::Match(Filter::eq("subscriber", *subscriber))];
    pipeline.extend(join_user_collapsed("channel", "subscribedChannel", user_summary(true)));
    pipeline.push(newest_first());
    pipeline
}

/// Videos liked by `principal`, most recent like first.
///
/// Likes on comments or tweets, and likes whose video was deleted, find no video and are
/// dropped by the unwind.
pub fn liked_videos(principal: &ObjectId) -> Pipeline {
    let video_pipeline = vec![
        Stage::Lookup(Lookup::new(USERS, "owner", "_id", "ownerDetails")),
        Stage::Unwind("ownerDetails".to_string()),
    ];

    let owner = Projection::new()
        .without_id()
        .computed("_id", Expr::Field("likedVideo.ownerDetails._id".to_string()))
        .computed("username", Expr::Field("likedVideo.ownerDetails.username".to_string()))
        .computed("fullName", Expr::Field("likedVideo.ownerDetails.fullName".to_string()))
        .computed("avatar", Expr::Field("likedVideo.ownerDetails.avatar".to_string()));

    vec![
        Stage::Match(Filter::eq("likedBy", *principal)),
        newest_first(),
        Stage::Lookup(
            Lookup::new(VIDEOS, "video", "_id", "likedVideo").with_pipeline(video_pipeline),
        ),
        Stage::Unwind("likedVideo".to_string()),
        Stage::Project(
            Projection::new().without_id().nested(
                "likedVideo",
                Projection::new()
                    .include_all([
                        "videoFile",
                        "thumbnail",
                        "title",
                        "description",
                        "duration",
                        "views",
                    ])
                    .nested("owner", owner),
            ),
        ),
    ]
}

/// Videos in a user's watch history with their owners' summaries.
pub fn watch_history(user: &ObjectId) -> Pipeline {
    let mut video_pipeline = join_user_collapsed("owner", "owner", user_summary(true)).to_vec();
    video_pipeline.push(Stage::Project(Projection::new().include_all([
        "videoFile",
        "thumbnail",
        "title",
        "description",
        "duration",
        "views",
        "owner",
        "createdAt",
    ])));

    vec![
        Stage::Match(Filter::id(user)),
        Stage::Lookup(
            Lookup::new(VIDEOS, "watchHistory", "_id", "watchHistory")
                .with_pipeline(video_pipeline),
        ),
        Stage::Project(Projection::new().without_id().include("watchHistory")),
    ]
}
