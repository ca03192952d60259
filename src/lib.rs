//! Rondo: tool-calling round loop for Responses-style generative APIs.
//!
//! A [`session::Session`] issues a round, folds the transport's events into a
//! finalized [`types::Response`], runs registered tool handlers for the calls
//! it contains and feeds their outputs into the next round, until no call is
//! left unanswered. Streaming and non-streaming transports go through the same
//! canonical event model.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rondo::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> rondo::error::Result<()> {
//! let config = RondoConfig::load(None)?;
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let registry = ToolRegistry::new().with(FnTool::function(
//!     "add_two_ints",
//!     "Add two integers",
//!     ToolParameters::object()
//!         .integer("a", "First operand", true)
//!         .integer("b", "Second operand", true)
//!         .build(),
//!     |args| async move { Ok(json!({"result": args.get_i64("a")? + args.get_i64("b")?})) },
//! ))?;
//! let mut session = Session::new(transport, registry, config.session_config()?, "Add 2 and 3")?;
//! let outcome = session.run().await?;
//! println!("{}", outcome.response.aggregate_text());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod prelude;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transport;
pub mod types;
pub mod util;
