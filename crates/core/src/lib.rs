//! Compass Core: student records, role-scoped access, messaging, documents,
//! and Odoo CRM webhook ingestion.

pub mod access;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod http;
pub mod messaging;
pub mod models;
pub mod odoo;
pub mod staff;
pub mod students;
