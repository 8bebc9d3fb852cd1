use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use eyre::Result;

use crate::config::Config;
use crate::follow_repo::FollowRepository;
use crate::pbest_repo::PersonalBestRepository;
use crate::post_repo::PostRepository;
use crate::reminder_repo::{PushTokenRepository, ReminderRepository};
use crate::user_repo::UserRepository;
use crate::workout_repo::WorkoutRepository;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub struct ServiceState {
    pub db_pool: DbPool,
}

impl ServiceState {
    pub fn new(config: &Config) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
        let db_pool = Pool::builder()
            .max_size(config.db_pool_size)
            .build(manager)?;
        Ok(Self { db_pool })
    }
}

/// Every store the routes and the reminder worker need.
pub trait Repositories:
    UserRepository
    + FollowRepository
    + PostRepository
    + WorkoutRepository
    + PersonalBestRepository
    + PushTokenRepository
    + ReminderRepository
    + Send
    + Sync
    + 'static
{
}

impl<T> Repositories for T where
    T: UserRepository
        + FollowRepository
        + PostRepository
        + WorkoutRepository
        + PersonalBestRepository
        + PushTokenRepository
        + ReminderRepository
        + Send
        + Sync
        + 'static
{
}
