//! Core of the Tanysu anonymous-pairing relay bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the
//! [`messaging::port::MessagingPort`] trait, implemented in the adapter crate.

pub mod callbacks;
pub mod config;
pub mod deletion;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod pairing;
pub mod profile;
pub mod registration;
pub mod relay;
pub mod service;
pub mod utils;

pub use errors::{Error, Result};
