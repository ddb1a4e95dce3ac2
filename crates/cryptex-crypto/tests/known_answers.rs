//! Known-answer tests for the asymmetric sessions.
//!
//! Keys are imported through the key-data codec, so these also pin the
//! encoded component layout.

use cryptex_crypto::{AgreementSession, Drbg, Key, SignatureSession, key::data};
use cryptex_proto::{AgreementAlgorithm, DigestAlgorithm, KeyFlags, KeyType, SignatureAlgorithm};

const RSA_N: &str = "9222a21b0161ffc3ddc04f8e91f1cc1fdc0d2a0866af0dd905e8e7d652a038620a018dd13d43406dfcf7c0a21c87a541fedecb73285bbed04b9e3e59af2f59922288f30092668dfc899944383ce41142d2a095ccf1a897e3719dc1be886826422fe0105e3ef6b2ab0aa0e787bda470df04ce676c48d3d3c02db23fb30d9cb0a1";
const RSA_E: &str = "010001";
const RSA_D: &str = "35e74c80459c4e69832c62ac262d58ac0fd15345d20a94430f29000b5063052934a3aa1a1a4cea4127e4834bc8d64820f5d05c9f57adafcec975cf6de96ebfccd5b1c7905acbd5e8a05b39aa9aa63ce5f5cae0496390b53bb09c36da6659149776cb280e0fa83ca76281db1acb8dd1b7c7ec25bb4bdb8007f73ca5f1611a7499";
const RSA_P: &str = "dd351994cbe04543b81f32fbfed1512ac0a2db9380dec05490d5e2bdd317fb9aa5eb11334973c8a712698058b40158ab873821890bc50a0610546220fabd88a3";
const RSA_Q: &str = "a91ec26b180b232a5162120551e8e766cf33d1dbb35027de1cfef1b81cc8294b0da5752b2c8319f874e8ea375548e5c6bc78749dbb17177663b829e18ce3e1eb";
const RSA_SIG_TEST: &str = "89722664538b1ef1e32647aacbe09d43d73aebfb880400a3d439d8a6ea53d325abc29a024347807acc15220d258b9333821d3655f1c1e696692ab2181b84079b67690a6b755f2475125603949dd5096902e7d476cee931bd0b33da742b17d2665cff0565d2f078e8c39b9cb52e69af3f6c6a034dca5c585408426ba2763d4454";

const DH_P: &str = "12df4d7689dff4c99d9ae57d07";
const DH_G: &str = "001e32158a35e34d7b619657d6";
const DH_X: &str = "1146bc69af6c32cafad146bc69";
const DH_PEER: &str = "004183a86f35710e4e69b164a4";
const DH_SHARED: &str = "0a01a3919f2ba369dc5b11de2c";

const EC_D: &str = "c6ef9c5d78ae012a011164acb397ce2088685d8f06bf9be0b283ab46476bee53";
const EC_PEER_X: &str = "dad0b65394221cf9b051e1feca5787d098dfe637fc90b9ef945d0c3772581180";
const EC_PEER_Y: &str = "5271a0461cdb8252d61f1c456fa3e59ab1f45b33accf5f58389e0577b8990bb3";
const EC_SHARED: &str = "d6840f6b42f6edafd13116e0e12565202fef8e9ece7dce03812464d04b9442de";

fn h(s: &str) -> Vec<u8> {
    hex::decode(s).expect("valid hex")
}

fn imported(key_type: KeyType, bits: u32, encoded: &[u8]) -> Key {
    let mut key = Key::init(key_type, KeyFlags::EXPORTABLE_RAW, bits).expect("supported size");
    key.import(encoded).expect("valid key data");
    key
}

#[test]
fn rsa_pkcs1_signature_vector() {
    let prv_data =
        data::rsa_private(&h(RSA_N), &h(RSA_E), &h(RSA_D), &h(RSA_P), &h(RSA_Q)).expect("encode");
    let pub_data = data::rsa_public(&h(RSA_N), &h(RSA_E)).expect("encode");
    let prv = imported(KeyType::RsaPrv, 1024, &prv_data);
    let publ = imported(KeyType::RsaPub, 1024, &pub_data);

    let mut signer =
        SignatureSession::init(SignatureAlgorithm::RsaPkcs1, Some(&prv), None).expect("init");
    let mut sig = [0u8; 128];
    let len = signer
        .sign(DigestAlgorithm::None, b"test", &mut sig, &mut Drbg::from_seed([0; 32]))
        .expect("sign");
    assert_eq!(len, 128);
    assert_eq!(hex::encode(sig), RSA_SIG_TEST);

    let mut verifier =
        SignatureSession::init(SignatureAlgorithm::RsaPkcs1, None, Some(&publ)).expect("init");
    assert!(verifier.verify(DigestAlgorithm::None, b"test", &sig).is_ok());

    for i in [0, 64, 127] {
        let mut tampered = sig;
        tampered[i] ^= 0x01;
        assert!(verifier.verify(DigestAlgorithm::None, b"test", &tampered).is_err());
    }
}

#[test]
fn rsa_export_matches_import() {
    let prv_data =
        data::rsa_private(&h(RSA_N), &h(RSA_E), &h(RSA_D), &h(RSA_P), &h(RSA_Q)).expect("encode");
    let prv = imported(KeyType::RsaPrv, 1024, &prv_data);
    let mut out = vec![0u8; prv.export_len().expect("exportable")];
    let len = prv.export(&mut out).expect("export");
    assert_eq!(&out[..len], prv_data.as_slice());
}

#[test]
fn rsa_modulus_must_fill_slot() {
    let pub_data = data::rsa_public(&h(RSA_N), &h(RSA_E)).expect("encode");
    let mut slot = Key::init(KeyType::RsaPub, KeyFlags::NONE, 2048).expect("supported size");
    assert!(slot.import(&pub_data).is_err());
}

#[test]
fn dh_shared_secret_vector() {
    let prv_data = data::dh_private(&h(DH_P), &h(DH_G), &h(DH_X)).expect("encode");
    let peer_data = data::dh_public(&h(DH_P), &h(DH_G), &h(DH_PEER)).expect("encode");
    let prv = imported(KeyType::DhPrv, 101, &prv_data);
    let peer = imported(KeyType::DhPub, 101, &peer_data);

    let session = AgreementSession::init(AgreementAlgorithm::Dh, &prv).expect("init");
    let mut shared = [0u8; 13];
    assert_eq!(session.compute_shared(&peer, &mut shared).expect("agree"), 13);
    assert_eq!(hex::encode(shared), DH_SHARED);
}

#[test]
fn ecdh_shared_secret_vector() {
    let prv_data = data::secp256r1_private(&h(EC_D)).expect("encode");
    let peer_data = data::secp256r1_public(&h(EC_PEER_X), &h(EC_PEER_Y)).expect("encode");
    let prv = imported(KeyType::Secp256r1Prv, 256, &prv_data);
    let peer = imported(KeyType::Secp256r1Pub, 256, &peer_data);

    let session = AgreementSession::init(AgreementAlgorithm::Ecdh, &prv).expect("init");
    let mut shared = [0u8; 64];
    assert_eq!(session.compute_shared(&peer, &mut shared).expect("agree"), 32);
    assert_eq!(hex::encode(&shared[..32]), EC_SHARED);
    assert_eq!(&shared[32..], &[0u8; 32]);
}
