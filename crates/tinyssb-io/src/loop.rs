//! The RX/TX/want-fill thread loop that drives a [`FeedManager`] from a
//! [`Transport`].
//!
//! Three threads, none sharing state beyond `Arc<FeedManager>` (whose own
//! `dmx_lock`/`callback_lock` are never held at once, per its own
//! documentation) and the outbound queue:
//!
//! - RX: blocks on `transport.recv_timeout`, classifies each datagram via
//!   [`FeedManager::consult_dmx`], and dispatches to `handle_want`,
//!   `handle_packet`, or `handle_blob`.
//! - TX: drains the outbound queue and calls `transport.send`.
//! - want-fill: every tick, broadcasts a want-request for every feed this
//!   node doesn't hold the signing key for.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tinyssb_feed::{packet, BlobFrame, Want};
use tinyssb_replicate::{want, DmxEntry, FeedManager};

use crate::transport::{Transport, MAX_DATAGRAM_SIZE};

/// How long the RX thread blocks waiting for a datagram before checking the
/// stop flag again.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A running RX/TX/want-fill loop. Dropping this without calling
/// [`Self::shutdown`] leaves the threads running; callers should always
/// shut down explicitly.
pub struct IoLoop {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl IoLoop {
    /// Spawn the RX, TX, and want-fill threads for `manager` over
    /// `transport`, polling for new wants every `want_interval`.
    pub fn spawn<T: Transport + 'static>(
        transport: Arc<T>,
        manager: Arc<FeedManager>,
        want_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>();

        let rx_handle = {
            let transport = Arc::clone(&transport);
            let manager = Arc::clone(&manager);
            let stop = Arc::clone(&stop);
            let outbound_tx = outbound_tx.clone();
            thread::spawn(move || rx_loop(&*transport, &manager, &outbound_tx, &stop))
        };

        let tx_handle = {
            let transport = Arc::clone(&transport);
            let stop = Arc::clone(&stop);
            thread::spawn(move || tx_loop(&*transport, outbound_rx, &stop))
        };

        let want_fill_handle = {
            let manager = Arc::clone(&manager);
            let stop = Arc::clone(&stop);
            thread::spawn(move || want_fill_loop(&manager, &outbound_tx, want_interval, &stop))
        };

        Self { stop, handles: vec![rx_handle, tx_handle, want_fill_handle] }
    }

    /// Signal all three threads to stop and wait for them to exit.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn rx_loop<T: Transport + ?Sized>(
    transport: &T,
    manager: &FeedManager,
    outbound: &mpsc::Sender<Vec<u8>>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        match transport.recv_timeout(RECV_POLL_INTERVAL) {
            Ok(Some(datagram)) => dispatch(manager, outbound, &datagram),
            Ok(None) => {},
            Err(err) => tracing::warn!(%err, "transport receive failed"),
        }
    }
}

fn dispatch(manager: &FeedManager, outbound: &mpsc::Sender<Vec<u8>>, datagram: &[u8]) {
    if datagram.len() != MAX_DATAGRAM_SIZE {
        match manager.handle_want(datagram) {
            Ok(Some(response)) => {
                let _ = outbound.send(response.to_vec());
            },
            Ok(None) => {},
            Err(err) => tracing::debug!(%err, "dropping malformed want"),
        }
        return;
    }

    if let Some(DmxEntry::NextPacket { fid }) = manager.consult_dmx(&datagram[8..15]) {
        let mut frame = [0u8; MAX_DATAGRAM_SIZE];
        frame.copy_from_slice(datagram);
        if let Err(err) = manager.handle_packet(fid, &frame) {
            tracing::debug!(%err, "dropping packet");
        }
        return;
    }

    let Ok(blob) = BlobFrame::from_bytes(datagram) else { return };
    if let Some(DmxEntry::Blob { fid }) = manager.consult_dmx(&blob.pointer()) {
        let mut frame = [0u8; MAX_DATAGRAM_SIZE];
        frame.copy_from_slice(datagram);
        if let Err(err) = manager.handle_blob(fid, &frame) {
            tracing::debug!(%err, "dropping blob frame");
        }
    }
}

fn tx_loop<T: Transport + ?Sized>(transport: &T, outbound: mpsc::Receiver<Vec<u8>>, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match outbound.recv_timeout(RECV_POLL_INTERVAL) {
            Ok(datagram) => {
                if let Err(err) = transport.send(&datagram) {
                    tracing::warn!(%err, "transport send failed");
                }
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {},
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn want_fill_loop(manager: &FeedManager, outbound: &mpsc::Sender<Vec<u8>>, interval: Duration, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        if let Err(err) = want_fill_tick(manager, outbound) {
            tracing::warn!(%err, "want-fill tick failed");
        }
        thread::sleep(interval.min(RECV_POLL_INTERVAL));
        if interval > RECV_POLL_INTERVAL {
            // Coarser ticks than the stop-flag poll interval: keep sleeping
            // in small steps so shutdown stays responsive.
            let mut remaining = interval - RECV_POLL_INTERVAL;
            while remaining > Duration::ZERO && !stop.load(Ordering::SeqCst) {
                let step = remaining.min(RECV_POLL_INTERVAL);
                thread::sleep(step);
                remaining -= step;
            }
        }
    }
}

fn want_fill_tick(manager: &FeedManager, outbound: &mpsc::Sender<Vec<u8>>) -> Result<(), tinyssb_feed::FeedError> {
    for fid in manager.store().list_fids()? {
        if manager.has_key(&fid) {
            continue;
        }
        let feed = manager.store().open(&fid)?;
        let datagram = match feed.get_want()? {
            Want::NextPacket { fid, seq } => want::build_packet_want(packet::want_dmx(&fid), fid, seq),
            Want::Blob { fid, seq, ptr } => want::build_blob_want(packet::want_dmx(&fid), fid, seq, ptr),
        };
        let _ = outbound.send(datagram);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;
    use tinyssb_codec::{signer::Ed25519Signer, PacketType};

    use super::*;
    use crate::transport::ChannelTransport;

    #[test]
    fn producer_serves_consumer_over_the_loop() {
        let producer_dir = tempdir().unwrap();
        let producer = Arc::new(
            FeedManager::open(producer_dir.path().join("_feeds"), producer_dir.path().join("_blobs")).unwrap(),
        );
        let fid = producer.generate_keypair();
        producer.create_feed(fid, producer.key_for(&fid), None).unwrap();
        let seed = producer.key_for(&fid).unwrap();
        let signer = Ed25519Signer::from_seed(&seed);
        {
            let mut feed = producer.store().open(&fid).unwrap();
            feed.append_payload(&signer, PacketType::Plain48, b"hi").unwrap();
        }

        let consumer_dir = tempdir().unwrap();
        let consumer = Arc::new(
            FeedManager::open(consumer_dir.path().join("_feeds"), consumer_dir.path().join("_blobs")).unwrap(),
        );
        consumer.create_feed(fid, None, None).unwrap();

        let (producer_transport, consumer_transport) = ChannelTransport::pair();
        let producer_loop = IoLoop::spawn(Arc::new(producer_transport), Arc::clone(&producer), Duration::from_millis(20));
        let consumer_loop = IoLoop::spawn(Arc::new(consumer_transport), Arc::clone(&consumer), Duration::from_millis(20));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            if consumer.store().open(&fid).unwrap().len() == 1 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "consumer never received the packet");
            thread::sleep(Duration::from_millis(10));
        }

        producer_loop.shutdown();
        consumer_loop.shutdown();

        let payload = consumer.store().open(&fid).unwrap().get_payload(1).unwrap();
        let mut expected = vec![0u8; 48];
        expected[..2].copy_from_slice(b"hi");
        assert_eq!(payload, expected);
    }
}
