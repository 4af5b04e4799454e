pub mod badges;
pub mod chat;

pub use badges::{AchievementGranter, BadgesClient};
pub use chat::{ChatClient, ChatDirectory};
