//! # Crate Digger
//!
//! Identify vinyl pressings from photos with a multimodal model, keep the
//! accepted identifications in a local collection, and export everything
//! (plus your Discogs collection) as a ZIP snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  Photos  │──▶│ Identification   │──▶│  Collection  │
//! │          │   │ Agent (Gemini)   │   │  (JSON file) │
//! └──────────┘   └───────┬──────────┘   └──────┬───────┘
//!                        │ clarification       │
//!                        ▼ loop                ▼
//!                   ┌─────────┐   ┌─────────┐  ┌──────────┐
//!                   │   CLI   │   │ Discogs │─▶│  Export  │──▶ .zip
//!                   │ (digger)│   │  client │  │ pipeline │
//!                   └─────────┘   └─────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! digger identify front.jpg back.jpg   # answer the agent's questions
//! digger collection list
//! digger export                        # ./exports/vinyl-collection-YYYY-MM-DD.zip
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | Identification state machine and reasoning backends |
//! | [`archive`] | Stored ZIP encoder |
//! | [`catalog`] | Discogs API client |
//! | [`catalog_cmd`] | `digger discogs` commands |
//! | [`collection`] | Collection stores |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed errors |
//! | [`export`] | Export pipeline |
//! | [`hosting`] | Photo hosting |
//! | [`identify`] | Interactive identification command |
//! | [`images`] | Photo inputs |
//! | [`models`] | Core data types |
//! | [`progress`] | Export progress reporting |

pub mod agent;
pub mod archive;
pub mod catalog;
pub mod catalog_cmd;
pub mod collection;
pub mod config;
pub mod error;
pub mod export;
pub mod hosting;
pub mod identify;
pub mod images;
pub mod models;
pub mod progress;
