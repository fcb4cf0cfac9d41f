//! Self-dispatching installer generation and reading.
//!
//! The installer is modelled in three layers:
//!
//! - [`InstallerSpec`]: a pure value with everything baked into the
//!   script except the archive bytes, plus the dispatch table.
//! - [`ExtractionPolicy`]: the install-time rename and exclude rules,
//!   chosen for the installing host's architecture.
//! - [`render_installer`] and [`Artifact`]: the bash serialisation and
//!   its native Rust reader.

pub mod policy;
pub mod reader;
pub mod render;
pub mod spec;

pub use policy::{ExcludeRule, ExtractionPolicy, RenameRule};
pub use reader::{Artifact, InstallOptions, InstallReport};
pub use render::render_installer;
pub use spec::{InstallerCommand, InstallerSpec};

/// Line that precedes the base64 payload.
pub const PAYLOAD_MARKER: &str = "__GOMODPACK_PAYLOAD__";
/// Line that terminates the base64 payload.
pub const END_MARKER: &str = "__GOMODPACK_END__";
/// Heredoc delimiter around the embedded module list.
pub const MODULES_DELIMITER: &str = "__GOMODPACK_MODULES__";
