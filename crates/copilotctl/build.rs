// Build script for copilotctl - embeds version at compile time

fn main() {
    // Release pipelines may override the version via the environment
    let version =
        std::env::var("COPILOT_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=COPILOT_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=COPILOT_VERSION");
}
