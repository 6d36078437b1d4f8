pub mod forum;
pub mod message;
pub mod user;

pub use forum::{PostRecord, ReplyRecord};
pub use message::{AttachmentRecord, MessageRecord};
pub use user::UserRecord;
