//! Conditional mock handler for HTTP clients.
//!
//! Requests whose URL matches a registered rule are answered with a mocked
//! response; everything else is forwarded to a real HTTP transport.
//!
//! ```no_run
//! use conditional_mock::{ClientConfig, Handler, RequestOptions, ResponseTemplate};
//!
//! # async fn run() -> Result<(), conditional_mock::ClientError> {
//! let (client, handler) = Handler::initialize_with_client(None, ClientConfig::default());
//! handler
//!     .add_response("https://example.com", ResponseTemplate::new(200).with_body("mocked"))
//!     .add_response(r"~httpbin\.org~i", ResponseTemplate::new(204));
//!
//! let response = client.get("https://example.com", RequestOptions::new()).await?;
//! assert_eq!(response.body().as_ref(), b"mocked");
//! # Ok(())
//! # }
//! ```

// ===== Rule matching and resolution =====
pub mod handler;
pub mod matcher;

// ===== Delivery =====
pub mod delivery;
pub mod transport;

// ===== Client and configuration =====
pub mod client;
pub mod definitions;

pub mod error;
pub mod metrics;
pub mod request;

pub use client::{Client, ClientConfig};
pub use definitions::{MockDefinitions, ResponseEntry};
pub use delivery::{Delay, Hook, RequestOptions, Sink, TransferStats};
pub use error::{ClientError, ConfigError, MockedError, RequestHead, TransferError};
pub use handler::{Handler, ResponseSource, ResponseTemplate};
pub use matcher::{is_pattern, matches, PatternError, UrlPattern};
pub use request::RequestUrl;
pub use transport::{HttpTransport, ResponseFuture, Transport};
