//! Machine name validation.

use crate::error::{Error, Result};
use crate::machine::config::VmType;

/// Longest accepted machine name. Keeps derived socket and image paths under
/// macOS path limits.
pub const MAX_MACHINE_NAME_LEN: usize = 30;

/// Check a machine name before anything is created for it.
///
/// A valid name starts with an ASCII letter or digit, continues with letters,
/// digits, `-` or `_`, is at most [`MAX_MACHINE_NAME_LEN`] characters long, and
/// is not the name of a virtualization type.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "name must not be empty"));
    }

    if name.len() > MAX_MACHINE_NAME_LEN {
        return Err(Error::invalid_name(
            name,
            format!("must be {} characters or less", MAX_MACHINE_NAME_LEN),
        ));
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::invalid_name(
            name,
            "must start with a letter or digit",
        ));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        return Err(Error::invalid_name(
            name,
            format!("character {:?} is not allowed", bad),
        ));
    }

    if VmType::parse(name).is_some() {
        return Err(Error::invalid_name(
            name,
            "names of virtualization types are reserved",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["macadam", "dev-1", "a", "my_vm", "0vm", &"a".repeat(30)] {
            assert!(validate_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        let long = "a".repeat(31);
        let cases = [
            "",
            long.as_str(),
            "-leading",
            "_leading",
            "has/slash",
            "../etc",
            "has space",
            "dotted.name",
            "caf\u{e9}",
        ];
        for name in cases {
            let err = validate_name(name).unwrap_err();
            assert!(
                matches!(err, Error::InvalidName { .. }),
                "{:?} should be rejected, got {:?}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_reserved_vm_type_names() {
        for t in VmType::ALL {
            assert!(validate_name(t.name()).is_err(), "{} is reserved", t);
        }
        assert!(validate_name("QEMU").is_err());
        assert!(validate_name("qemu-dev").is_ok());
    }
}
