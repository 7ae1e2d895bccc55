//! End-to-end replication scenarios: a producer appends locally, a
//! consumer pulls via want/packet frames exchanged by hand (no transport
//! involved — that's `tinyssb-io`'s job).

use tempfile::tempdir;
use tinyssb_codec::{signer::Ed25519Signer, PacketType};
use tinyssb_feed::{packet, Want};
use tinyssb_replicate::{want::build_packet_want, FeedManager};

#[test]
fn single_plain_packet_replicates_producer_to_consumer() {
    let producer_dir = tempdir().unwrap();
    let producer =
        FeedManager::open(producer_dir.path().join("_feeds"), producer_dir.path().join("_blobs"))
            .unwrap();
    let fid = producer.generate_keypair();
    producer.create_feed(fid, producer.key_for(&fid), None).unwrap();

    let seed = producer.key_for(&fid).unwrap();
    let signer = Ed25519Signer::from_seed(&seed);
    let mut producer_feed = producer.store().open(&fid).unwrap();
    producer_feed.append_payload(&signer, PacketType::Plain48, b"hi").unwrap();

    let consumer_dir = tempdir().unwrap();
    let consumer =
        FeedManager::open(consumer_dir.path().join("_feeds"), consumer_dir.path().join("_blobs"))
            .unwrap();
    consumer.create_feed(fid, None, None).unwrap();

    let consumer_feed = consumer.store().open(&fid).unwrap();
    let Want::NextPacket { seq, fid: want_fid } = consumer_feed.get_want().unwrap() else {
        panic!("expected a packet want")
    };
    assert_eq!(seq, 1);
    assert_eq!(want_fid, fid);

    let want_bytes = build_packet_want(packet::want_dmx(&fid), fid, seq);
    assert_eq!(want_bytes.len(), 43);

    let response = producer.handle_want(&want_bytes).unwrap().expect("producer has packet 1");
    consumer.handle_packet(fid, &response).unwrap();

    let payload = consumer.store().open(&fid).unwrap().get_payload(1).unwrap();
    let mut expected = vec![0u8; 48];
    expected[..2].copy_from_slice(b"hi");
    assert_eq!(payload, expected);
}

#[test]
fn child_creation_replicates_and_auto_creates_locally() {
    let producer_dir = tempdir().unwrap();
    let producer =
        FeedManager::open(producer_dir.path().join("_feeds"), producer_dir.path().join("_blobs"))
            .unwrap();
    let parent_fid = producer.generate_keypair();
    producer.create_feed(parent_fid, producer.key_for(&parent_fid), None).unwrap();
    let child_fid = producer.generate_keypair();
    producer
        .create_child_feed(parent_fid, child_fid, producer.key_for(&child_fid).unwrap())
        .unwrap();

    let consumer_dir = tempdir().unwrap();
    let consumer =
        FeedManager::open(consumer_dir.path().join("_feeds"), consumer_dir.path().join("_blobs"))
            .unwrap();
    consumer.create_feed(parent_fid, None, None).unwrap();

    // Pull the parent's MKCHILD packet (seq 1).
    let want_bytes = build_packet_want(packet::want_dmx(&parent_fid), parent_fid, 1);
    let response = producer.handle_want(&want_bytes).unwrap().unwrap();
    consumer.handle_packet(parent_fid, &response).unwrap();

    // The consumer should now know about the child feed too.
    let child = consumer.store().open(&child_fid).expect("child auto-created");
    assert_eq!(child.parent(), Some(parent_fid));
}

#[test]
fn ischild_payload_carries_the_parents_declaring_packet_hash() {
    let dir = tempdir().unwrap();
    let manager = FeedManager::open(dir.path().join("_feeds"), dir.path().join("_blobs")).unwrap();
    let parent_fid = manager.generate_keypair();
    manager.create_feed(parent_fid, manager.key_for(&parent_fid), None).unwrap();
    let child_fid = manager.generate_keypair();
    manager.create_child_feed(parent_fid, child_fid, manager.key_for(&child_fid).unwrap()).unwrap();

    let parent = manager.store().open(&parent_fid).unwrap();
    let declaring_wire = parent.get_wire(1).unwrap();
    let expected_hash = tinyssb_codec::hash::digest(&[&declaring_wire.to_bytes()]);

    let child = manager.store().open(&child_fid).unwrap();
    let ischild_payload = child.get_payload(1).unwrap();
    assert_eq!(&ischild_payload[32..36], &parent.header().front_seq().to_be_bytes());
    assert_eq!(&ischild_payload[36..48], &expected_hash[..12]);
}
