//! API Routes
//!
//! Route handlers organized by functionality.

pub mod builder;
pub mod campaigns;
pub mod export;
pub mod health;
pub mod sales;
pub mod screens;
pub mod sellers;
