use uuid::Uuid;

pub const JOB_PREFIX: &str = "job_";
pub const ASSET_PREFIX: &str = "ast_";

/// Random identifier: `prefix` followed by 16 lowercase hex characters.
pub fn rid(prefix: &str) -> String {
    let uuid = Uuid::new_v4();
    format!("{prefix}{}", hex::encode(&uuid.as_bytes()[..8]))
}
