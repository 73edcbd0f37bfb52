//! Small helpers layered on top of [`super::CborReader`] for the common
//! "check the shape, then proceed" pattern used throughout the codec.

use crate::error::{Result, TxForgeError};

use super::CborReader;

/// Reads an array header and requires its declared length to equal `n`.
/// Fails on indefinite-length arrays, since every structure this is used
/// for has a protocol-fixed field count.
pub fn validate_array_of_n_elements(name: &'static str, reader: &mut CborReader, n: u64) -> Result<()> {
    let len = reader.read_start_array()?;
    if len < 0 {
        return Err(TxForgeError::InvalidCborArraySize {
            expected: n as i64,
            found: -1,
        });
    }
    if len as u64 != n {
        return Err(TxForgeError::InvalidArgument {
            name,
            reason: format!("expected array of {n} elements, found {len}"),
        });
    }
    Ok(())
}

/// Ensures no extra items remain in the open array before closing it.
pub fn validate_end_array(name: &'static str, reader: &mut CborReader) -> Result<()> {
    reader.read_end_array().map_err(|e| match e {
        TxForgeError::InvalidCborArraySize { expected, found } => TxForgeError::InvalidArgument {
            name,
            reason: format!("array expected {expected} elements, found {found}"),
        },
        other => other,
    })
}

/// Ensures no extra entries remain in the open map before closing it.
pub fn validate_end_map(name: &'static str, reader: &mut CborReader) -> Result<()> {
    reader.read_end_map().map_err(|e| match e {
        TxForgeError::InvalidCborMapSize { expected, found } => TxForgeError::InvalidArgument {
            name,
            reason: format!("map expected {expected} pairs, found {found}"),
        },
        other => other,
    })
}

/// Reads a uint and fails unless it equals `expected`, reporting `field`
/// in the error for diagnostics.
pub fn validate_enum_value(
    name: &'static str,
    field: &'static str,
    reader: &mut CborReader,
    expected: u64,
) -> Result<u64> {
    let found = reader.read_uint()?;
    if found != expected {
        return Err(TxForgeError::InvalidArgument {
            name,
            reason: format!("field `{field}` expected {expected}, found {found}"),
        });
    }
    Ok(found)
}

/// Reads a uint and bounds-checks it against `[min, max]` inclusive.
pub fn validate_uint_in_range(
    name: &'static str,
    field: &'static str,
    reader: &mut CborReader,
    min: u64,
    max: u64,
) -> Result<u64> {
    let found = reader.read_uint()?;
    if found < min || found > max {
        return Err(TxForgeError::InvalidArgument {
            name,
            reason: format!("field `{field}` = {found} outside range [{min}, {max}]"),
        });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_of_n_elements_checks_length() {
        let bytes = [0x82, 0x01, 0x02];
        let mut r = CborReader::new(&bytes);
        assert!(validate_array_of_n_elements("Test", &mut r, 2).is_ok());

        let mut r = CborReader::new(&bytes);
        assert!(validate_array_of_n_elements("Test", &mut r, 3).is_err());
    }

    #[test]
    fn enum_value_checks_equality() {
        let bytes = [0x01];
        let mut r = CborReader::new(&bytes);
        assert_eq!(validate_enum_value("Test", "kind", &mut r, 1).unwrap(), 1);

        let mut r = CborReader::new(&bytes);
        assert!(validate_enum_value("Test", "kind", &mut r, 2).is_err());
    }

    #[test]
    fn uint_range_checks_bounds() {
        let bytes = [0x05];
        let mut r = CborReader::new(&bytes);
        assert_eq!(
            validate_uint_in_range("Test", "n", &mut r, 0, 10).unwrap(),
            5
        );

        let mut r = CborReader::new(&bytes);
        assert!(validate_uint_in_range("Test", "n", &mut r, 6, 10).is_err());
    }
}
