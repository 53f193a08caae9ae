//! Arena EBS - Extension backend for the weapon-ball stream minigame.
//!
//! This crate provides the backend the stream extension talks to. It is
//! responsible for:
//! - Verifying the extension's signed bearer tokens
//! - Keeping a small per-user profile (weapon ball and dungeon stats)
//! - Forwarding dungeon joins and reward redeems to the alert server
//!
//! # Architecture
//!
//! The service is a thin relay between the extension (client) and the alert
//! server (which renders alerts and runs the dungeon). Profiles live in
//! memory behind the [`store::UserStore`] trait and do not survive restarts.

pub mod alerts;
pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod spawn;
pub mod store;
pub mod types;
