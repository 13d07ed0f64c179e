pub mod balance;
pub mod distribute;
pub mod fill;
pub mod generate;
pub mod settings;
pub mod spoiler_log;
