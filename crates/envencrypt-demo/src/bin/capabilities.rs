//! Report which backends this build carries and exercise the gating
//!
//! Run with: cargo run -p envencrypt-demo --bin envencrypt-capabilities

use envencrypt_core::{available_modules, encryption, require_module, vault, Capability};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("envencrypt-core {}", envencrypt_core::version());

    let modules = available_modules();
    println!("Available modules: {:?}", modules.to_map());

    for capability in Capability::ALL {
        let available = modules.is_available(capability);
        match (require_module(capability.name()), available) {
            (Ok(()), true) => println!("✓ require_module('{}') passed", capability),
            (Err(e), false) => println!("✓ require_module('{}') failed as expected: {}", capability, e),
            (Ok(()), false) => println!("✗ require_module('{}') should have failed", capability),
            (Err(e), true) => println!("✗ require_module('{}') failed unexpectedly: {}", capability, e),
        }
    }

    match require_module("nonexistent") {
        Ok(()) => println!("✗ require_module('nonexistent') should have failed"),
        Err(e) => println!("✓ require_module('nonexistent') failed: {}", e),
    }

    for capability in Capability::ALL {
        if !modules.is_available(capability) {
            println!("  {}: {}", capability, unavailable_reason(capability));
        }
    }
}

/// Why a backend is missing: the OS lacks the facility, or the build left it out
fn unavailable_reason(capability: Capability) -> &'static str {
    match capability {
        Capability::Encryption if !encryption::is_supported() => {
            "this OS has no native data-protection facility (DPAPI is Windows only)"
        }
        Capability::Vault if !vault::is_supported() => "this OS has no native credential vault",
        Capability::Encryption => "built without the `encryption` feature of envencrypt-core",
        Capability::Vault => "built without the `vault` feature of envencrypt-core",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_blames_os_before_features() {
        let reason = unavailable_reason(Capability::Encryption);
        if cfg!(windows) {
            assert!(reason.contains("feature"));
        } else {
            assert!(reason.contains("this OS"));
            assert!(!reason.contains("feature"));
        }
    }

    #[test]
    fn test_reason_for_vault_on_supported_os() {
        if vault::is_supported() {
            assert!(unavailable_reason(Capability::Vault).contains("`vault` feature"));
        }
    }
}
