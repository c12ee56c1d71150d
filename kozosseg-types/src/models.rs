use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    ContentType, FriendStatus, MessageStatus, NotificationType, ReactionKind, RelationStatus,
};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// Account data that is safe to hand out (no password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub secondary_email: Option<String>,
    pub is_activated: bool,
    #[serde(default)]
    pub last_online: Option<DateTime<Utc>>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// Public profile of a user. Shares its id with the owning `User`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personal {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub is_male: bool,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub place_of_residence: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl Personal {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub user_id: i64,
    #[serde(default)]
    pub next_reminder: Option<DateTime<Utc>>,
}

/// Personal profile together with its account and settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub personal: Personal,
    pub user: User,
    pub settings: Option<Settings>,
}

/// Friendship row. `user_id` is the party that received the request,
/// `friend_id` the party that sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub friendship_id: i64,
    pub user_id: i64,
    pub friend_id: i64,
    pub status: FriendStatus,
    #[serde(default)]
    pub friendship_since: Option<DateTime<Utc>>,
}

impl Friend {
    /// The other party of the friendship as seen from `user_id`
    pub fn other_party(&self, user_id: i64) -> i64 {
        if self.user_id == user_id {
            self.friend_id
        } else {
            self.user_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub receiver_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub notification_type: NotificationType,
    pub is_new: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// A fresh, unsaved notification (id 0 until inserted)
    pub fn new(
        receiver_id: i64,
        sender_id: i64,
        notification_type: NotificationType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            receiver_id,
            sender_id,
            content: content.into(),
            notification_type,
            is_new: true,
            created_at: Utc::now(),
        }
    }
}

/// Notification enriched with who sent it, as shown in the notification list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationWithAvatar {
    #[serde(flatten)]
    pub notification: Notification,
    pub sender_name: String,
    #[serde(default)]
    pub sender_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatContent {
    pub message_id: i64,
    pub chat_room_id: i64,
    pub author_id: i64,
    pub message: String,
    #[serde(with = "datetime_format")]
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    #[serde(with = "datetime_format")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contents: Vec<ChatContent>,
}

impl ChatRoom {
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// The participant that is not `user_id`
    pub fn partner_of(&self, user_id: i64) -> i64 {
        if self.sender_id == user_id {
            self.receiver_id
        } else {
            self.sender_id
        }
    }
}

/// A chat room listed together with the other participant's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoomSummary {
    pub room: ChatRoom,
    pub partner: Personal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    /// Profile the post was written on
    pub source_id: i64,
    pub author_id: i64,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    pub id: i64,
    pub post_id: i64,
    pub file_name: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Post as it appears in a profile feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub post_id: i64,
    pub source_id: i64,
    pub author_id: i64,
    pub full_name: String,
    #[serde(default)]
    pub author_avatar: Option<String>,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
    pub comments: Vec<Comment>,
    pub media: Vec<MediaContent>,
}

/// One page of a larger result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPage<T> {
    pub data: Vec<T>,
    pub total_pages: usize,
    pub current_page: usize,
}

/// Event pushed to connected clients over the realtime stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    Notification(NotificationWithAvatar),
    ChatMessage(ChatContent),
}

impl PushEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            PushEvent::Notification(_) => "notification",
            PushEvent::ChatMessage(_) => "chat_message",
        }
    }
}

// Request/Response types for API
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_male: bool,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub place_of_residence: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub personal: Option<Personal>,
    pub session_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// File sent inline as base64
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdatePersonalRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_residence: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequest {
    pub receiver_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestAnswer {
    pub requester_id: i64,
    pub status: FriendStatus,
    #[serde(default)]
    pub notification_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelationResponse {
    pub user_id: i64,
    pub viewer_id: i64,
    pub relation: RelationStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub source_id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Option<FileUpload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionRequest {
    pub kind: ReactionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewCommentRequest {
    pub post_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
