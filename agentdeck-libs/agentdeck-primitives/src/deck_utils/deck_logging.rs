use chrono::Local;
use colored::*;

#[derive(PartialEq)]
pub enum DeckLogOption {
    Provider,
    Agents,
    Storage,
    Auth,
    Node,
    Tests,
}

#[derive(PartialEq)]
pub enum DeckLogLevel {
    Error,
    Info,
    Debug,
}

impl DeckLogLevel {
    fn to_log_level(&self) -> log::Level {
        match self {
            DeckLogLevel::Error => log::Level::Error,
            DeckLogLevel::Info => log::Level::Info,
            DeckLogLevel::Debug => log::Level::Debug,
        }
    }
}

fn active_log_options() -> Vec<DeckLogOption> {
    let mut active_options = Vec::new();
    if std::env::var("LOG_PROVIDER").is_ok() {
        active_options.push(DeckLogOption::Provider);
    }
    if std::env::var("LOG_AGENTS").is_ok() {
        active_options.push(DeckLogOption::Agents);
    }
    if std::env::var("LOG_STORAGE").is_ok() {
        active_options.push(DeckLogOption::Storage);
    }
    if std::env::var("LOG_AUTH").is_ok() {
        active_options.push(DeckLogOption::Auth);
    }
    if std::env::var("LOG_NODE").is_ok() {
        active_options.push(DeckLogOption::Node);
    }
    if std::env::var("LOG_TESTS").is_ok() {
        active_options.push(DeckLogOption::Tests);
    }

    active_options
}

pub fn deck_log(option: DeckLogOption, level: DeckLogLevel, message: &str) {
    let active_options = active_log_options();
    if active_options.contains(&option) {
        let time = Local::now().format("%Y-%m-%d %H:%M:%S");
        let message_with_time = format!("{} | {}", time, message);
        match level.to_log_level() {
            log::Level::Error => eprintln!("{}", message_with_time.red()),
            log::Level::Info => println!("{}", message_with_time.yellow()),
            log::Level::Debug => println!("{}", message_with_time),
            _ => {}
        }
    }
}
