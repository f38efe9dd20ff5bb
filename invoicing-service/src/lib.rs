//! Invoicing Service - invoices, line items and a payment ledger.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
