//! CLI command handlers.

mod attachments;
mod records;

pub use attachments::run_attachments_command;
pub use records::run_records_command;
