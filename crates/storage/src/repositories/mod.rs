pub mod bots_repo;
pub mod users_repo;

pub use bots_repo::{BotConfigUpdate, BotsRepository};
pub use users_repo::UsersRepository;
