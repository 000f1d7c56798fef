//! Source resolution: turning an opaque source reference into a readable local file.
//!
//! A [`SourceReference`] is whatever the presentation layer handed over: a bare
//! path, a `file://` URL, or a `content://<authority>/<id>` reference that has
//! to be looked up in a [`ContentIndex`]. [`MediaSourceResolver`] validates the
//! result on the blocking pool and races the wait against a cancellation token.
//!
//! # Example
//!
//! ```ignore
//! use squeezer_core::source::{MediaSourceResolver, SourceReference, SourceResolver};
//! use tokio_util::sync::CancellationToken;
//!
//! let resolver = MediaSourceResolver::new().with_index(media_store);
//! let input = resolver
//!     .resolve(&SourceReference::new("content://media/42"), &CancellationToken::new())
//!     .await?;
//! println!("{} ({} bytes)", input.path.display(), input.size_bytes);
//! ```

mod error;
mod resolver;
mod traits;
mod types;

pub use error::ResolutionError;
pub use resolver::MediaSourceResolver;
pub use traits::{ContentIndex, SourceResolver};
pub use types::{ResolvedInput, SourceKind, SourceReference};
