//! # Agrotoken server
//! This module hosts the HTTP surface of the settlement service. It is responsible for:
//! Listening for incoming payment webhook requests from the payment gateway.
//! Verifying webhook signatures before any parsing takes place.
//! Feeding verified events into the settlement ledger and fanning out state changes to realtime subscribers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: The webhook route for receiving payment events from the gateway.
//! * `/ws`: The websocket endpoint for realtime order, crop and price updates.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod mint_worker;
pub mod price_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;
pub mod ws;
