//! Round-trip both backends through the process-wide registry
//!
//! Run with: cargo run -p envencrypt-demo --bin envencrypt-roundtrip

use envencrypt_core::{Capability, Registry};

fn check_encryption(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    let data = b"Hello, DPAPI!";
    let entropy = b"test_entropy";

    let blob = registry.protect(data, Some(&entropy[..]), false, "")?;
    println!("Encryption: {} bytes -> {} byte blob", data.len(), blob.len());

    let decrypted = registry.unprotect(blob.as_bytes(), Some(&entropy[..]))?;
    if decrypted.data() != data {
        return Err("encryption round-trip mismatch".into());
    }

    let blob = registry.encrypt_with_backend(data, "Test encryption")?;
    let (_, description) = registry.decrypt_with_backend(blob.as_bytes())?;
    println!("Encryption: description round-trip '{}'", description);
    Ok(())
}

fn check_vault(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    registry.set_password("test_service", "test_user", "secret123")?;
    if registry.get_password("test_service", "test_user")?.as_deref() != Some("secret123") {
        return Err("vault get/set mismatch".into());
    }

    if !registry.delete_password("test_service", "test_user")? {
        return Err("delete should report an existing record".into());
    }
    if registry.get_password("test_service", "test_user")?.is_some() {
        return Err("record should be gone after delete".into());
    }

    registry.set_password("service1", "user1", "pass1")?;
    registry.set_password("service2", "user2", "pass2")?;
    println!("Vault: services {:?}", registry.list_services()?);

    registry.delete_password("service1", "user1")?;
    registry.delete_password("service2", "user2")?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let registry = Registry::global();
    let modules = registry.available_modules();

    if modules.is_available(Capability::Encryption) {
        match check_encryption(registry) {
            Ok(()) => println!("✓ Encryption backend working"),
            Err(e) => println!("✗ Encryption backend failed: {}", e),
        }
    } else {
        println!("⚠ Encryption backend not available in this build");
    }

    if modules.is_available(Capability::Vault) {
        match check_vault(registry) {
            Ok(()) => println!("✓ Vault backend working"),
            Err(e) => println!("✗ Vault backend failed: {}", e),
        }
    } else {
        println!("⚠ Vault backend not available in this build");
    }
}
