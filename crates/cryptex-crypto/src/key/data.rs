//! Key-data encoding used by import and export.
//!
//! Symmetric keys travel as their raw bytes. Asymmetric keys travel as a fixed
//! sequence of big-endian integers, each prefixed by a `u16` big-endian
//! length:
//!
//! | type            | components          |
//! |-----------------|---------------------|
//! | RSA public      | n, e                |
//! | RSA private     | n, e, d, p, q       |
//! | DH public       | p, g, gx            |
//! | DH private      | p, g, x             |
//! | secp256r1 public| qx, qy              |
//! | secp256r1 private| d                  |

use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// Encode big-endian components with `u16` length prefixes.
///
/// Components longer than `u16::MAX` bytes cannot be represented and are
/// rejected.
pub fn encode(components: &[&[u8]]) -> Result<Zeroizing<Vec<u8>>> {
    let total: usize = components.iter().map(|c| 2 + c.len()).sum();
    let mut out = Zeroizing::new(Vec::with_capacity(total));
    for component in components {
        let len = u16::try_from(component.len())
            .map_err(|_| CryptoError::invalid("key component too long"))?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(component);
    }
    Ok(out)
}

/// Decode exactly `count` components, rejecting trailing bytes.
pub fn decode(data: &[u8], count: usize) -> Result<Vec<Zeroizing<Vec<u8>>>> {
    let mut rest = data;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let Some((len, tail)) = rest.split_first_chunk::<2>() else {
            return Err(CryptoError::invalid("truncated key component length"));
        };
        let len = usize::from(u16::from_be_bytes(*len));
        if tail.len() < len {
            return Err(CryptoError::invalid("truncated key component"));
        }
        let (component, tail) = tail.split_at(len);
        if component.is_empty() {
            return Err(CryptoError::invalid("empty key component"));
        }
        out.push(Zeroizing::new(component.to_vec()));
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(CryptoError::invalid("trailing bytes after key components"));
    }
    Ok(out)
}

/// RSA public key data.
pub fn rsa_public(n: &[u8], e: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    encode(&[n, e])
}

/// RSA private key data.
pub fn rsa_private(n: &[u8], e: &[u8], d: &[u8], p: &[u8], q: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    encode(&[n, e, d, p, q])
}

/// DH public key data.
pub fn dh_public(p: &[u8], g: &[u8], gx: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    encode(&[p, g, gx])
}

/// DH private key data.
pub fn dh_private(p: &[u8], g: &[u8], x: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    encode(&[p, g, x])
}

/// secp256r1 public key data (affine coordinates).
pub fn secp256r1_public(qx: &[u8], qy: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    encode(&[qx, qy])
}

/// secp256r1 private key data (scalar).
pub fn secp256r1_private(d: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    encode(&[d])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_decode_in_order() {
        let data = encode(&[b"\x01\x02", b"\x03"]).unwrap_or_else(|_| unreachable!());
        assert_eq!(data.as_slice(), &[0, 2, 1, 2, 0, 1, 3]);
        let parts = decode(&data, 2).unwrap_or_else(|_| unreachable!());
        assert_eq!(parts[0].as_slice(), &[1, 2]);
        assert_eq!(parts[1].as_slice(), &[3]);
    }

    #[test]
    fn wrong_shapes_are_invalid() {
        let data = encode(&[b"\x01", b"\x02"]).unwrap_or_else(|_| unreachable!());
        assert!(matches!(decode(&data, 1), Err(CryptoError::InvalidParameter { .. })));
        assert!(matches!(decode(&data, 3), Err(CryptoError::InvalidParameter { .. })));
        assert!(matches!(decode(&data[..3], 2), Err(CryptoError::InvalidParameter { .. })));
        assert!(matches!(decode(&[0, 0], 1), Err(CryptoError::InvalidParameter { .. })));
    }
}
