pub mod audit_log;
pub mod auth;
pub mod categories;
pub mod customers;
pub mod forms;
pub mod health;
pub mod message_templates;
pub mod subcategories;
pub mod users;
