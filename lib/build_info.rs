/// Build metadata used by CLI output and log context.
///
/// `VERSION_WITH_COMMIT` is intentionally the single source of truth for what
/// we report as the running build identity.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT_HASH: &str = env!("PAKSYNC_GIT_COMMIT_HASH");
pub const VERSION_WITH_COMMIT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+",
    env!("PAKSYNC_GIT_COMMIT_HASH")
);

/// Returns a short git hash suitable for log context.
///
/// `"unknown"` is preserved when git metadata is unavailable at build time.
pub fn short_commit_hash() -> &'static str {
    if GIT_COMMIT_HASH == "unknown" {
        return GIT_COMMIT_HASH;
    }

    let short_len = 12usize.min(GIT_COMMIT_HASH.len());
    &GIT_COMMIT_HASH[..short_len]
}
