//! Parley chat client core
//!
//! Connection lifecycle, framed transport and the command/event boundary
//! that front ends drive. Encryption is delegated to `parley-crypto`; the
//! wire format lives in `parley-proto`.
//!
//! # Example
//!
//! ```no_run
//! use parley_client::{ChatSession, ClientConfig, SessionCommand};
//! use parley_crypto::StrategyKind;
//!
//! # async fn run() -> parley_client::Result<()> {
//! let session = ChatSession::new(ClientConfig::default(), "alice", StrategyKind::None)?;
//! let (handle, mut events) = session.connect().await?;
//!
//! handle
//!     .submit(SessionCommand::Send {
//!         text: "hello".into(),
//!         recipient: String::new(),
//!         encrypt: false,
//!     })
//!     .await;
//!
//! while let Some(event) = events.recv().await {
//!     if event.is_closed() {
//!         break;
//!     }
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{Result, SessionError};
pub use event::{ENCRYPTED_MARKER, SessionCommand, SessionEvent};
pub use session::{ChatSession, SessionEvents, SessionHandle, SessionState};
pub use transport::{FrameReader, FrameWriter, FramedTransport, TransportError};
