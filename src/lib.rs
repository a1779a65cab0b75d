use std::sync::{Arc, Mutex};

pub mod app;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod media_key;
pub mod poller;
pub mod response;
pub mod streamelements;
pub mod twitch;

pub use error::Error;

pub type Shared<T> = Arc<T>;
pub type Locked<T> = Mutex<T>;
