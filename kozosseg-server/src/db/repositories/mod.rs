mod user_repository;
mod personal_repository;
mod friend_repository;
mod notification_repository;
mod chat_repository;
mod post_repository;
mod comment_repository;

pub use user_repository::UserRepository;
pub use personal_repository::PersonalRepository;
pub use friend_repository::FriendRepository;
pub use notification_repository::NotificationRepository;
pub use chat_repository::ChatRepository;
pub use post_repository::PostRepository;
pub use comment_repository::CommentRepository;
