mod mail;
mod schedule;
mod services;
mod site;

pub use mail::MailConfig;
pub use schedule::{parse_offset, CronSchedule, ScheduleConfig};
pub use services::ServicesConfig;
pub use site::SiteConfig;

use kit::{Config, FrameworkError};

/// Register all application configs
///
/// Framework configs (app, server, database, workflow) are registered by
/// `Config::init`; this adds the directory-specific ones.
pub fn register_all() -> Result<(), FrameworkError> {
    Config::register(SiteConfig::from_env());
    Config::register(MailConfig::from_env());
    Config::register(ServicesConfig::from_env());
    Config::register(ScheduleConfig::from_env()?);
    Ok(())
}
