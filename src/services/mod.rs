// All service modules
pub mod achievement_policy;
pub mod deck;
pub mod flip_engine;
pub mod game_service;
pub mod notification_service;

// Re-export for convenience
pub use game_service::GameService;
pub use notification_service::NotificationService;
