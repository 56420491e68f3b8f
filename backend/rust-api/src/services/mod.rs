use crate::config::Config;
use mongodb::{Client as MongoClient, Database};

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    /// Kept alongside the database handle: multi-document economy mutations
    /// need client sessions for transactions.
    pub mongo_client: MongoClient,
}

impl AppState {
    pub fn new(config: Config, mongo_client: MongoClient) -> Self {
        let mongo = mongo_client.database(&config.mongo_database);

        Self {
            config,
            mongo,
            mongo_client,
        }
    }
}

pub mod admin_seed;
pub mod admin_service;
pub mod auth_service;
pub mod chat_service;
pub mod course_service;
pub mod economy_service;
pub mod progress_service;
pub mod uploads;
pub mod user_service;
