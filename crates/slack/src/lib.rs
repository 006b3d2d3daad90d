//! Slack Integration - help-desk bot interface
//!
//! This crate provides the Slack-facing surface for helpdevil:
//! - **Slash Commands** (`commands`) - `/helpdevil add|list|button|help`
//! - **Replies** (`replies`) - attachment-style messages with action buttons
//! - **Callbacks** (`callbacks`) - button clicks routed back to articles,
//!   including the single-question conversational edit flow
//! - **Conversation** (`conversation`) - the injected ask/answer capability
//! - **Connections** (`connections`) - one realtime session per team
//! - **Events** (`events`) - envelope dispatch to the handlers above
//! - **Socket** (`socket`) - realtime transport loop with reconnection
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → Handlers → TeamStore
//!                     ↓
//!             Reply attachments ← Response
//! ```
//!
//! The callback router is the interesting part: it correlates an opaque
//! `callback_id` back to a `(team, article)` pair, and for edits it drives
//! one question/answer turn through the conversation engine before
//! persisting, re-resolving the article by id when the answer arrives.

pub mod callbacks;
pub mod commands;
pub mod connections;
pub mod conversation;
pub mod events;
pub mod replies;
pub mod socket;
