/// Router Module Index
///
/// Organizes the gateway's own endpoints. Everything else falls through to the page server
/// via `handlers::forward_page`, guarded by the access middleware.

/// Routes accessible to everyone, owned by the gateway itself.
pub mod public;

/// Backend proxy routes under `/api/proxy`. The access middleware never redirects these.
pub mod proxy;
