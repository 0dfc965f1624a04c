//! # html2pdf-mcp
//!
//! Converts HTML documents to PDF with a headless Chrome instance and exposes
//! the conversion as the `convert_html_to_pdf` tool of a Model Context
//! Protocol server speaking JSON-RPC over stdio.
//!
//! ## Features
//!
//! - **Single shared browser**: launched lazily on first use, reused across
//!   requests and relaunched after its connection drops
//! - **Isolated pages**: every conversion gets a page of its own, closed on
//!   success and failure alike
//! - **File or inline input**: render a file on disk or a markup string
//! - **Print options**: paper format, orientation, scale, margins in
//!   px/in/cm/mm, header and footer templates
//! - **Network idle waiting**: optionally hold printing until the page stops
//!   fetching resources
//! - **Deadlines**: one timeout bounds each conversion from page creation to
//!   the written file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use html2pdf_mcp::{Config, ConversionRequest, PdfConverter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let converter = PdfConverter::new(Config::default());
//!
//!     let request = ConversionRequest::from_path("report.html");
//!     let result = converter.convert(&request).await;
//!     if let Some(path) = result.output_path() {
//!         println!("PDF written to {}", path.display());
//!     }
//!
//!     converter.cleanup().await;
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ### MCP server (default)
//! ```bash
//! html2pdf-mcp serve
//! ```
//!
//! ### One-off conversion
//! ```bash
//! html2pdf-mcp convert --input report.html --output report.pdf --format Letter
//! ```

/// Configuration and browser launch settings
pub mod config;

/// Error types and error classification
pub mod error;

/// Tool arguments, print parameters and conversion results
pub mod request;

/// Browser engine abstraction used by the pipeline
pub mod engine;

/// Chrome implementation of the engine traits
pub mod chrome;

/// Lifecycle of the shared browser process
pub mod browser_manager;

/// The conversion pipeline
pub mod converter;

/// MCP server and tool response formatting
pub mod tool;

/// Command-line interface implementation
pub mod cli;

/// Performance metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;


pub use browser_manager::*;
pub use chrome::*;
pub use cli::*;
pub use config::*;
pub use converter::*;
pub use engine::*;
pub use error::*;
pub use metrics::*;
pub use request::*;
pub use tool::*;
pub use utils::*;
