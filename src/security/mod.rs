//! Security checks for user-supplied URLs.
//!
//! `url_policy` validates URLs as they are saved; `resolve` re-checks the
//! resolved addresses right before an outbound connection.

pub mod resolve;
pub mod url_policy;

pub use resolve::{ensure_public_ip, is_private_or_reserved, resolve_public_addrs};
pub use url_policy::{
    UrlPolicy, UrlPolicyConfig, validate_calendly_url, validate_video_embed_url,
    validate_webhook_url,
};
