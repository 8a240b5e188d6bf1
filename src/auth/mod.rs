//! Authentication and credential resolution.
//!
//! Sessions are opaque tokens owned by the external control panel: every
//! operation that needs a username re-resolves the token through
//! [`control_panel::ControlPanelClient`]. Resolved credential bundles are the
//! only authenticated state this gateway caches, handled by
//! [`resolver::CredentialResolver`] with [`archive`] unpacking the remote
//! zip bundle on a cache miss.

pub mod archive;
pub mod control_panel;
pub mod resolver;

pub use control_panel::ControlPanelClient;
pub use resolver::CredentialResolver;
