use semver::Version;

/// placeholder vergen writes when the build had no git metadata to read.
const IDEMPOTENT_SHA: &str = "VERGEN_IDEMPOTENT_OUTPUT";

pub fn get_version() -> String {
    let semver = env!("CARGO_PKG_VERSION").parse::<Version>();

    match semver {
        Ok(semver) => format_version(&semver, env!("VERGEN_GIT_SHA")),
        Err(_) => {
            tracing::warn!(
                "couldn't parse a semver out of Cargo.toml? defaulting to 0.0.0-unknown."
            );
            String::from("0.0.0-unknown")
        }
    }
}

fn format_version(semver: &Version, sha: &str) -> String {
    if sha == IDEMPOTENT_SHA || sha.is_empty() {
        semver.to_string()
    } else {
        format!("{} [{}]", semver, &sha[..sha.len().min(7)])
    }
}

pub fn get_rust_version() -> String {
    rustc_version_runtime::version().to_string()
}
