//! AmoCRM Form Submission Library
//!
//! Pushes leads and contacts captured by web forms into AmoCRM through its
//! remote API: resolves (or creates) the matching contact record, reconciles
//! the contact's multi-value email/phone fields, then creates a lead linked
//! to that contact.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `crm_client`: CRM capability trait and the AmoCRM HTTP client.
//! - `errors`: Error handling types.
//! - `field_catalog`: Custom-field id cache and enum label lookup.
//! - `models`: Core data models.
//! - `submitter`: Lead/contact submission workflow.

pub mod config;
pub mod crm_client;
pub mod errors;
pub mod field_catalog;
pub mod models;
pub mod submitter;
