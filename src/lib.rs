//! # site_publisher
//!
//! Versioned HTML publishing over an eventually-consistent object store.
//!
//! ## Overview
//!
//! Each publish stores the document as an immutable snapshot under
//! `{sites|drafts}/{site}/index-{suffix}.html` and then overwrites the site's
//! pointer at the fixed path `{sites|drafts}/{site}/latest.json`. Readers probe
//! that fixed path first and fall back to listing the pointer prefix when it
//! is missing, so a lagging or historical pointer still resolves. No database
//! and no transactions: the pointer is last-writer-wins and old snapshots are
//! kept forever, which makes a failed pointer write degrade to "still serving
//! the previous version".
//!
//! Requests for `{site}.{base-domain}` are routed to the site's read endpoint
//! by [`HostRewriteLayer`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use site_publisher::{FsStorage, Mode, PublishRequest, PublisherBuilder, ServerConfig, SiteServer};
//!
//! # async fn example() -> site_publisher::Result<()> {
//! let publisher = PublisherBuilder::new(FsStorage::new("/tmp/sites"))
//!     .base_domain("example.com")
//!     .public_base_url("https://publish.example.com")
//!     .build()?;
//!
//! let html = "<!doctype html><html><body>Hello</body></html>";
//! let receipt = publisher.publish(&PublishRequest::new("acme", Mode::Publish, html)).await?;
//! assert_eq!(receipt.published_url, "https://acme.example.com");
//!
//! SiteServer::new(ServerConfig::default(), publisher).serve().await.ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `s3` | **yes** | Enables [`S3Storage`] and re-exports from `aws-sdk-s3` / `aws-config`. |
//! | `rustls-tls` | no | Use `rustls` instead of the platform TLS for the AWS SDK. |

pub mod config;
pub mod content;
pub mod error;
pub mod mode;
pub mod pointer;
pub mod publisher;
pub mod resolver;
pub mod routing;
pub mod server;
pub mod slug;
pub mod snapshot;
pub mod storage;

pub use config::{PublisherBuilder, SiteConfig};
pub use content::{ContentServer, ServedPage};
pub use error::{PublishError, Result};
pub use mode::Mode;
pub use pointer::{Pointer, PointerManager, PointerRef};
pub use publisher::{PublishReceipt, PublishRequest, Publisher};
pub use resolver::{PointerResolver, PointerSource, Resolution};
pub use routing::{Route, SiteRouter};
pub use server::{HostRewriteLayer, ServerConfig, SiteServer, build_app};
pub use slug::Slug;
pub use snapshot::{SnapshotRef, SnapshotWriter};
#[cfg(feature = "s3")]
pub use storage::{Credentials, Region, S3Client, S3Config, S3ConfigBuilder, S3Storage};
pub use storage::{FsStorage, MemoryStorage, ObjectMeta, ObjectStore, PutOptions, StoredObject};
