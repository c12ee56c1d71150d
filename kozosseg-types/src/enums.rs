use serde::{Deserialize, Serialize};

/// State of a friendship row. The numeric codes are what the database stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Accepted,
    Pending,
    Rejected,
}

impl FriendStatus {
    pub fn code(&self) -> i64 {
        match self {
            FriendStatus::Accepted => 1,
            FriendStatus::Pending => 3,
            FriendStatus::Rejected => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(FriendStatus::Accepted),
            3 => Some(FriendStatus::Pending),
            4 => Some(FriendStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    FriendRequest,
    FriendRequestAccepted,
    FriendRequestRejected,
    Birthday,
    NewPost,
    NewMessage,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::FriendRequest => "friend_request",
            NotificationType::FriendRequestAccepted => "friend_request_accepted",
            NotificationType::FriendRequestRejected => "friend_request_rejected",
            NotificationType::Birthday => "birthday",
            NotificationType::NewPost => "new_post",
            NotificationType::NewMessage => "new_message",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "friend_request" => Some(NotificationType::FriendRequest),
            "friend_request_accepted" => Some(NotificationType::FriendRequestAccepted),
            "friend_request_rejected" => Some(NotificationType::FriendRequestRejected),
            "birthday" => Some(NotificationType::Birthday),
            "new_post" => Some(NotificationType::NewPost),
            "new_message" => Some(NotificationType::NewMessage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(ContentType::Image),
            "video" => Some(ContentType::Video),
            _ => None,
        }
    }

    /// Classify an upload by its MIME type (`image/jpeg`, `video/mp4`, ...)
    pub fn from_mime(mime: &str) -> Option<Self> {
        let major = mime.split('/').next()?.trim().to_ascii_lowercase();
        match major.as_str() {
            "image" => Some(ContentType::Image),
            "video" => Some(ContentType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// How a profile viewer relates to the profile owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationStatus {
    #[serde(rename = "self")]
    Self_,
    #[serde(rename = "friend")]
    Friend,
    #[serde(rename = "nonfriend")]
    NonFriend,
}

impl RelationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationStatus::Self_ => "self",
            RelationStatus::Friend => "friend",
            RelationStatus::NonFriend => "nonfriend",
        }
    }
}
