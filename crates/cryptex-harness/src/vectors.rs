//! Known-answer vectors, with the key material already in import encoding.

use cryptex_crypto::key::data;

use crate::Violation;

/// Message digested by the digest vectors.
pub const DIGEST_INPUT: &[u8] = b"0123456789";
/// SHA-256 of [`DIGEST_INPUT`].
pub const SHA256_DIGEST: &str = "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882";
/// MD5 of [`DIGEST_INPUT`].
pub const MD5_DIGEST: &str = "781e5e245d69b566979b86e28d23f2c7";

/// FIPS-197 AES-128 key.
pub const AES128_KEY: &str = "000102030405060708090a0b0c0d0e0f";
/// FIPS-197 plaintext block.
pub const AES128_PLAIN: &str = "00112233445566778899aabbccddeeff";
/// FIPS-197 ciphertext block.
pub const AES128_CIPHER: &str = "69c4e0d86a7b0430d8cdb78070b4c55a";

/// Message signed by the RSA vector (with no digest applied).
pub const RSA_MESSAGE: &[u8] = b"test";
/// PKCS#1 v1.5 signature of [`RSA_MESSAGE`] under the 1024-bit test key.
pub const RSA_SIGNATURE: &str = "89722664538b1ef1e32647aacbe09d43d73aebfb880400a3d439d8a6ea53d325abc29a024347807acc15220d258b9333821d3655f1c1e696692ab2181b84079b67690a6b755f2475125603949dd5096902e7d476cee931bd0b33da742b17d2665cff0565d2f078e8c39b9cb52e69af3f6c6a034dca5c585408426ba2763d4454";

const RSA_N: &str = "9222a21b0161ffc3ddc04f8e91f1cc1fdc0d2a0866af0dd905e8e7d652a038620a018dd13d43406dfcf7c0a21c87a541fedecb73285bbed04b9e3e59af2f59922288f30092668dfc899944383ce41142d2a095ccf1a897e3719dc1be886826422fe0105e3ef6b2ab0aa0e787bda470df04ce676c48d3d3c02db23fb30d9cb0a1";
const RSA_E: &str = "010001";
const RSA_D: &str = "35e74c80459c4e69832c62ac262d58ac0fd15345d20a94430f29000b5063052934a3aa1a1a4cea4127e4834bc8d64820f5d05c9f57adafcec975cf6de96ebfccd5b1c7905acbd5e8a05b39aa9aa63ce5f5cae0496390b53bb09c36da6659149776cb280e0fa83ca76281db1acb8dd1b7c7ec25bb4bdb8007f73ca5f1611a7499";
const RSA_P: &str = "dd351994cbe04543b81f32fbfed1512ac0a2db9380dec05490d5e2bdd317fb9aa5eb11334973c8a712698058b40158ab873821890bc50a0610546220fabd88a3";
const RSA_Q: &str = "a91ec26b180b232a5162120551e8e766cf33d1dbb35027de1cfef1b81cc8294b0da5752b2c8319f874e8ea375548e5c6bc78749dbb17177663b829e18ce3e1eb";

const DH_P: &str = "12df4d7689dff4c99d9ae57d07";
const DH_G: &str = "001e32158a35e34d7b619657d6";
const DH_X: &str = "1146bc69af6c32cafad146bc69";
const DH_PEER: &str = "004183a86f35710e4e69b164a4";
/// DH shared secret between the private vector key and the peer.
pub const DH_SHARED: &str = "0a01a3919f2ba369dc5b11de2c";
/// Size of the DH vector group in bits.
pub const DH_BITS: u32 = 101;

const EC_D: &str = "c6ef9c5d78ae012a011164acb397ce2088685d8f06bf9be0b283ab46476bee53";
const EC_PEER_X: &str = "dad0b65394221cf9b051e1feca5787d098dfe637fc90b9ef945d0c3772581180";
const EC_PEER_Y: &str = "5271a0461cdb8252d61f1c456fa3e59ab1f45b33accf5f58389e0577b8990bb3";
/// ECDH shared secret (x coordinate) between the private vector key and the peer.
pub const EC_SHARED: &str = "d6840f6b42f6edafd13116e0e12565202fef8e9ece7dce03812464d04b9442de";

/// Decode a hex vector.
pub fn bytes(hex: &str) -> Result<Vec<u8>, Violation> {
    hex::decode(hex).map_err(|err| Violation::new("vectors", format!("bad hex: {err}")))
}

fn encoded(components: &[&str]) -> Result<Vec<u8>, Violation> {
    let decoded = components.iter().map(|c| bytes(c)).collect::<Result<Vec<_>, _>>()?;
    let parts: Vec<&[u8]> = decoded.iter().map(Vec::as_slice).collect();
    data::encode(&parts)
        .map(|encoded| encoded.to_vec())
        .map_err(|err| Violation::new("vectors", format!("encode: {err}")))
}

/// 1024-bit RSA private key.
pub fn rsa_private() -> Result<Vec<u8>, Violation> {
    encoded(&[RSA_N, RSA_E, RSA_D, RSA_P, RSA_Q])
}

/// Public half of [`rsa_private`].
pub fn rsa_public() -> Result<Vec<u8>, Violation> {
    encoded(&[RSA_N, RSA_E])
}

/// DH private key in the 101-bit test group.
pub fn dh_private() -> Result<Vec<u8>, Violation> {
    encoded(&[DH_P, DH_G, DH_X])
}

/// DH peer public key in the same group.
pub fn dh_peer() -> Result<Vec<u8>, Violation> {
    encoded(&[DH_P, DH_G, DH_PEER])
}

/// secp256r1 private key.
pub fn ec_private() -> Result<Vec<u8>, Violation> {
    encoded(&[EC_D])
}

/// secp256r1 peer public key.
pub fn ec_peer() -> Result<Vec<u8>, Violation> {
    encoded(&[EC_PEER_X, EC_PEER_Y])
}
