//! Source archiving and digests for cloudstep.
//!
//! # Deploy pipeline
//!
//! ```text
//! cloudstep appengine deploy / functions deploy
//!   1. Validate   ── manifest + flags → DeployRequest (no network)
//!   2. Archive    ── walk source dir → temp .zip        (this crate)
//!   3. Stage      ── bucket upload or signed-URL PUT
//!   4. Submit     ── create or update on the control plane
//!   5. Poll       ── long-running operation until done
//!   6. Promote    ── optional traffic split (App Engine)
//! ```
//!
//! # Archive layout
//!
//! - Every regular file and directory under the root, root excluded
//! - Names relative to the root, `/`-separated on every platform
//! - Directories are stored entries ending in `/`, files are deflated
//! - Symlinks, sockets and devices are skipped, never followed
//! - Walk order, no sorting; timestamps fixed at the zip epoch

pub mod archive;
pub mod digest;

pub use archive::{
    ArchiveError, ArchiveSummary, TempArchive, archive_dir, archive_to_file, archive_to_temp,
};
pub use digest::{DigestError, sha256_file, sha256_reader};
