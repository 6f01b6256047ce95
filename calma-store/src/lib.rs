pub mod app_config;
pub mod events;
pub mod hold_journal;

pub use app_config::Config;
pub use events::EventBus;
pub use hold_journal::FileHoldJournal;
