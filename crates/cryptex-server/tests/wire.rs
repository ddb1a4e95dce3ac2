//! Wire-level behavior of the server: raw call headers in, reply codes out.
//!
//! These cases cannot be expressed through the typed facade (unknown ids,
//! unknown flag bits, malformed headers), so they build requests by hand.

use std::sync::Arc;

use cryptex_client::RpcClient;
use cryptex_core::{CryptoApi, KeyStoreApi};
use cryptex_crypto::Crypto;
use cryptex_keystore::{DirFileStore, KeyStore, KeyStoreConfig, MemoryFileStore};
use cryptex_proto::{
    CallHeader, Channel, DigestAlgorithm, ErrorCode, Handle, KeyFlags, KeyType, Opcode, ReplyHeader,
};
use cryptex_server::{CryptoServer, LocalChannel, ServerConfig, selftest};

fn server() -> Arc<CryptoServer> {
    let store = KeyStore::new(
        Box::new(MemoryFileStore::new()),
        &[7u8; 32],
        KeyStoreConfig::default(),
        Crypto::with_seed(11),
    )
    .expect("store opens");
    Arc::new(CryptoServer::new(ServerConfig::default(), Crypto::with_seed(12), Some(store)))
}

fn call(channel: &mut LocalChannel, request: CallHeader) -> ReplyHeader {
    channel.call(&request).expect("delivered")
}

#[test]
fn unknown_key_type_is_not_supported() {
    let server = server();
    let mut channel = server.open_channel();
    let reply = call(&mut channel, CallHeader::new(Opcode::KeyInit).with_arg(0, 99).with_arg(2, 128));
    assert_eq!(reply.code(), ErrorCode::NotSupported);
    assert!(reply.handle().is_null());
}

#[test]
fn unknown_flag_bits_are_invalid() {
    let server = server();
    let mut channel = server.open_channel();
    let request = CallHeader::new(Opcode::KeyInit)
        .with_arg(0, KeyType::Aes.id())
        .with_arg(1, 0x8000_0000)
        .with_arg(2, 128);
    assert_eq!(call(&mut channel, request).code(), ErrorCode::InvalidParameter);
}

#[test]
fn unknown_algorithm_is_not_supported() {
    let server = server();
    let mut channel = server.open_channel();
    let reply = call(&mut channel, CallHeader::new(Opcode::DigestInit).with_arg(0, 0xdead));
    assert_eq!(reply.code(), ErrorCode::NotSupported);
    assert_eq!(server.handle_count(), 0);
}

#[test]
fn malformed_headers_are_rejected() {
    let server = server();
    let channel = server.open_channel();
    let dataport = channel.dataport();

    let mut bad_magic = CallHeader::new(Opcode::DigestInit).to_bytes();
    bad_magic[0] ^= 0xff;
    let reply = server.handle_bytes(channel.owner(), dataport, &bad_magic);
    assert_eq!(ReplyHeader::from_bytes(&reply).expect("parses").code(), ErrorCode::InvalidParameter);

    let mut bad_version = CallHeader::new(Opcode::DigestInit).to_bytes();
    bad_version[4] = 0x7f;
    let reply = server.handle_bytes(channel.owner(), dataport, &bad_version);
    assert_eq!(ReplyHeader::from_bytes(&reply).expect("parses").code(), ErrorCode::InvalidParameter);

    let mut unknown = CallHeader::new(Opcode::DigestInit).to_bytes();
    unknown[6..8].copy_from_slice(&0x0fffu16.to_be_bytes());
    let reply = server.handle_bytes(channel.owner(), dataport, &unknown);
    assert_eq!(ReplyHeader::from_bytes(&reply).expect("parses").code(), ErrorCode::NotSupported);
}

#[test]
fn input_lengths_beyond_dataport_are_invalid() {
    let server = server();
    let mut channel = server.open_channel();
    let digest = call(&mut channel, CallHeader::new(Opcode::DigestInit).with_arg(0, DigestAlgorithm::Sha256.id()))
        .handle();
    let request = CallHeader::new(Opcode::DigestUpdate).with_handle(0, digest).with_arg(0, u32::MAX);
    assert_eq!(call(&mut channel, request).code(), ErrorCode::InvalidParameter);
}

#[test]
fn non_utf8_names_are_invalid() {
    let server = server();
    let mut channel = server.open_channel();
    channel.dataport().write(0, &[0xff, 0xfe]).expect("fits");
    let request = CallHeader::new(Opcode::KeyStoreExists).with_arg(0, 2);
    assert_eq!(call(&mut channel, request).code(), ErrorCode::InvalidParameter);
}

#[test]
fn failed_calls_leave_dataport_untouched() {
    let server = server();
    let mut channel = server.open_channel();
    let key = call(
        &mut channel,
        CallHeader::new(Opcode::KeyInit)
            .with_arg(0, KeyType::Aes.id())
            .with_arg(1, KeyFlags::NONE.bits())
            .with_arg(2, 128),
    )
    .handle();
    assert_eq!(call(&mut channel, CallHeader::new(Opcode::KeyGenerate).with_handle(0, key)).code(), ErrorCode::Success);

    channel.dataport().write(0, &[0xaa; 16]).expect("fits");
    let reply = call(&mut channel, CallHeader::new(Opcode::KeyExport).with_handle(0, key).with_arg(0, 16));
    assert_eq!(reply.code(), ErrorCode::AccessDenied);
    assert_eq!(reply.length(0), 0);
    assert_eq!(channel.dataport().read(0, 16).expect("fits"), vec![0xaa; 16]);
}

#[test]
fn stale_handle_after_close() {
    let server = server();
    let mut channel = server.open_channel();
    let init = CallHeader::new(Opcode::DigestInit).with_arg(0, DigestAlgorithm::Md5.id());
    let first = call(&mut channel, init).handle();
    assert_eq!(call(&mut channel, CallHeader::new(Opcode::DigestClose).with_handle(0, first)).code(), ErrorCode::Success);

    // The slot is reused under a new generation.
    let second = call(&mut channel, init).handle();
    assert_eq!(first.index(), second.index());
    assert_ne!(first, second);

    let stale = CallHeader::new(Opcode::DigestClose).with_handle(0, first);
    assert_eq!(call(&mut channel, stale).code(), ErrorCode::InvalidHandle);
    let null = CallHeader::new(Opcode::DigestClose).with_handle(0, Handle::NULL);
    assert_eq!(call(&mut channel, null).code(), ErrorCode::InvalidHandle);
}

#[test]
fn handle_table_exhaustion_is_insufficient_space() {
    let mut config = ServerConfig::default();
    config.vault.max_handles = 2;
    let server = Arc::new(CryptoServer::new(config, Crypto::with_seed(5), None));
    let mut client = RpcClient::new(server.open_channel());

    let a = client.digest_init(DigestAlgorithm::Sha256).expect("first");
    client.digest_init(DigestAlgorithm::Sha256).expect("second");
    assert_eq!(client.digest_init(DigestAlgorithm::Sha256), Err(ErrorCode::InsufficientSpace));

    client.digest_close(a).expect("close");
    client.digest_init(DigestAlgorithm::Sha256).expect("slot freed");
}

#[test]
fn key_store_calls_need_a_store() {
    let server = Arc::new(CryptoServer::new(ServerConfig::default(), Crypto::with_seed(5), None));
    let mut client = RpcClient::new(server.open_channel());
    assert_eq!(client.key_exists("anything"), Err(ErrorCode::NotSupported));
}

#[test]
fn concurrent_channels_are_isolated() {
    let server = server();
    let workers: Vec<_> = (0..4u8)
        .map(|worker| {
            let server = Arc::clone(&server);
            std::thread::spawn(move || {
                let mut client = RpcClient::new(server.open_channel());
                for round in 0..25u8 {
                    let digest = client.digest_init(DigestAlgorithm::Sha256).expect("init");
                    client.digest_update(digest, &[worker, round]).expect("update");
                    let mut out = [0u8; 32];
                    assert_eq!(client.digest_finalize(digest, &[], &mut out), Ok(32));
                    client.digest_close(digest).expect("close");
                }
                // Left open on purpose; the channel drop releases it.
                client.digest_init(DigestAlgorithm::Md5).expect("init");
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker finished");
    }
    assert_eq!(server.handle_count(), 0);
}

#[test]
fn self_test_passes_over_channel() {
    let server = server();
    let mut client = RpcClient::new(server.open_channel());
    selftest::run(&mut client, true).expect("self-test passes");
    drop(client);
    assert_eq!(server.handle_count(), 0);
}

#[test]
fn entries_survive_a_restart_on_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let open = |seed| {
        let files = DirFileStore::new(dir.path()).expect("dir store");
        let store = KeyStore::new(Box::new(files), &[9u8; 32], KeyStoreConfig::default(), Crypto::with_seed(seed))
            .expect("store opens");
        Arc::new(CryptoServer::new(ServerConfig::default(), Crypto::with_seed(seed), Some(store)))
    };

    let flags = KeyFlags::IS_ALGO_CIPHER | KeyFlags::EXPORTABLE_RAW;
    let mut exported = [0u8; 32];
    {
        let server = open(1);
        let mut client = RpcClient::new(server.open_channel());
        let key = client.generate_key("persist", KeyType::Aes, flags, 256).expect("generate");
        assert_eq!(client.key_export(key, None, &mut exported), Ok(32));
    }

    let server = open(2);
    let mut client = RpcClient::new(server.open_channel());
    assert_eq!(client.key_exists("persist"), Ok(true));
    assert_eq!(client.get_key_size_bytes("persist"), Ok(32));
    let key = client.get_key("persist").expect("get");
    let mut reloaded = [0u8; 32];
    assert_eq!(client.key_export(key, None, &mut reloaded), Ok(32));
    assert_eq!(exported, reloaded);
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(256))]

    #[test]
    fn arbitrary_bytes_always_get_a_reply(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..96)) {
        let server = Arc::new(CryptoServer::new(ServerConfig::default(), Crypto::with_seed(3), None));
        let channel = server.open_channel();
        let reply = server.handle_bytes(channel.owner(), channel.dataport(), &bytes);
        let reply = ReplyHeader::from_bytes(&reply).expect("reply always parses");
        if CallHeader::from_bytes(&bytes).is_err() {
            proptest::prop_assert_ne!(reply.code(), ErrorCode::Success);
        }
    }
}
