use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Reported as the runtime version in every error report.
    let version = rustc_version::version()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=ERROR_REPORT_RUSTC_VERSION={}", version);
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
