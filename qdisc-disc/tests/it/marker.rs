use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use qdisc_common::inv_sqrt_scale;
use qdisc_disc::{CongestionMarker, MarkerOptions, QueueDisc, QueueLimit};
use qdisc_packet::{Ecn, Ipv4Header, Packet};
use qdisc_sim::Simulator;

const INTERVAL: Duration = Duration::from_micros(200);
const TARGET: Duration = Duration::from_micros(10);

fn packet(ecn: Ecn) -> Packet {
    Packet::with_ipv4(Ipv4Header { ecn, ..Default::default() }, Bytes::from_static(&[0; 100]))
}

fn us(micros: u64) -> Duration {
    Duration::from_micros(micros)
}

fn marker(sim: &Arc<Simulator>, options: MarkerOptions) -> CongestionMarker {
    let mut marker = CongestionMarker::new(sim.clone(), options);
    marker.check_config().unwrap();
    marker.initialize_params();
    marker
}

/// Builds a standing queue of 50 packets, then enqueues and dequeues one packet every
/// microsecond so that the sojourn time settles at 50µs. Returns the times at which
/// packets left the queue marked.
fn standing_queue(sim: &Arc<Simulator>, marker: &mut CongestionMarker, until: u64) -> Vec<u64> {
    for _ in 0..50 {
        marker.enqueue(packet(Ecn::Ect1)).unwrap();
    }

    let mut marks = Vec::new();
    for t in 1..=until {
        sim.advance(us(1));
        marker.enqueue(packet(Ecn::Ect1)).unwrap();

        let packet = marker.dequeue().unwrap();
        if packet.ecn() == Some(Ecn::Ce) {
            marks.push(t);
        }
    }

    marks
}

#[test]
fn admits_up_to_capacity_in_order() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let mut marker = marker(
        &sim,
        MarkerOptions::default()
            .limit(QueueLimit::packets(250))
            .instant_marking_threshold(us(40)),
    );

    let packets: Vec<_> = (0..251).map(|_| packet(Ecn::Ect1)).collect();
    let uids: Vec<_> = packets.iter().map(Packet::uid).collect();

    let rejected = packets.into_iter().filter_map(|p| marker.enqueue(p).err()).count();
    assert_eq!(rejected, 1);
    assert_eq!(marker.len(), 250);
    assert_eq!(marker.stats().dropped(), 1);

    let drained: Vec<_> = std::iter::from_fn(|| marker.dequeue()).map(|p| p.uid()).collect();
    assert_eq!(drained, uids[..250]);
    // Zero service time, so nothing was marked
    assert_eq!(marker.stats().marked(), 0);
}

#[test]
fn persistent_marks_back_off() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let mut marker = marker(&sim, MarkerOptions::default());

    let marks = standing_queue(&sim, &mut marker, 1_400);

    // The sojourn time reaches the target at t = 10µs
    assert_eq!(marks[0], 10 + INTERVAL.as_micros() as u64);
    assert_eq!(marker.stats().instant_marks(), 0);
    assert_eq!(marker.stats().persistent_marks(), marks.len());

    let gaps: Vec<_> = marks.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.len() >= 12, "too few marks: {marks:?}");

    for (k, gap) in gaps.iter().take(12).enumerate() {
        let expected = inv_sqrt_scale(INTERVAL, k as u32 + 1);
        let gap = us(*gap);
        // Dequeues happen on whole microseconds, so a mark may be up to 1µs late
        assert!(gap >= expected && gap < expected + us(1), "gap {k}: {gap:?} vs {expected:?}");
    }

    assert!(gaps.windows(2).take(11).all(|w| w[1] < w[0]), "gaps: {gaps:?}");
    assert_eq!(marker.marking_state().mark_count() as usize, marks.len());
}

#[test]
fn deactivates_when_sojourn_drops() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let mut marker = marker(&sim, MarkerOptions::default());

    standing_queue(&sim, &mut marker, 300);
    assert!(marker.marking_state().marking());

    while marker.dequeue().is_some() {}

    // A packet that goes straight through
    marker.enqueue(packet(Ecn::Ect1)).unwrap();
    assert_eq!(marker.dequeue().unwrap().ecn(), Some(Ecn::Ect1));

    let state = marker.marking_state();
    assert!(!state.marking());
    assert_eq!(state.first_above_time(), None);
}

#[test]
fn never_drops_unmarkable_packets() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let mut marker = marker(
        &sim,
        MarkerOptions::default()
            .instant_marking_threshold(us(5))
            .persistent_marking_target(us(1))
            .persistent_marking_interval(us(10)),
    );

    marker.enqueue(packet(Ecn::NotEct)).unwrap();
    marker.enqueue(packet(Ecn::Ect0)).unwrap();
    marker.enqueue(Packet::new(Bytes::from_static(b"raw"))).unwrap();

    sim.advance(us(20));
    assert_eq!(marker.dequeue().unwrap().ecn(), Some(Ecn::NotEct));

    // Both conditions hold for this one
    sim.advance(us(10));
    assert_eq!(marker.dequeue().unwrap().ecn(), Some(Ecn::Ect0));
    assert_eq!(marker.stats().persistent_marks(), 1);

    assert_eq!(marker.dequeue().unwrap().ecn(), None);

    let stats = marker.stats();
    assert_eq!(stats.instant_marks(), 3);
    assert_eq!(stats.mark_failures(), 3);
    assert_eq!(stats.marked(), 0);
    assert_eq!(stats.dropped(), 0);
    assert_eq!(stats.dequeued(), 3);
}
