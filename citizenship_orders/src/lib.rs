pub mod config;
pub mod envelope;
pub mod known_records;
pub mod notifier;
pub mod pdf_reader;
pub mod records;
pub mod run;
pub mod web_page_reader;
