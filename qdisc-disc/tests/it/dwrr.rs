use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use qdisc_disc::{
    build, CongestionMarker, Context, DwrrConfig, Fifo, MarkerOptions, QdiscConfig, QueueDisc,
    QueueLimit, WeightedScheduler,
};
use qdisc_packet::{ClassId, DscpClassifier, Ecn, Ipv4Header, Packet};
use qdisc_sim::Simulator;
use rand::Rng;

/// Classifies by the first payload byte.
fn first_byte(packet: &Packet) -> Option<ClassId> {
    packet.payload().first().map(|b| ClassId::from(*b))
}

fn packet(class: u8, size: usize) -> Packet {
    let mut payload = vec![0; size];
    payload[0] = class;
    Packet::new(Bytes::from(payload))
}

fn fifo_scheduler(quanta: &[u32]) -> WeightedScheduler {
    let mut dwrr = WeightedScheduler::new(Arc::new(first_byte));
    for (id, quantum) in quanta.iter().enumerate() {
        let child = Box::new(Fifo::new(QueueLimit::unbounded()));
        dwrr.add_class(id as ClassId, *quantum, child).unwrap();
    }
    dwrr.check_config().unwrap();
    dwrr.initialize_params();
    dwrr
}

#[test]
fn bytes_served_follow_quanta() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut dwrr = fifo_scheduler(&[3000, 1500]);
    let mut rng = rand::thread_rng();

    for _ in 0..5_000 {
        dwrr.enqueue(packet(0, rng.gen_range(64..=1500))).unwrap();
        dwrr.enqueue(packet(1, rng.gen_range(64..=1500))).unwrap();
    }

    let mut served = [0usize; 2];
    while dwrr.active_classes().count() == 2 {
        let packet = dwrr.dequeue().unwrap();
        served[packet.payload()[0] as usize] += packet.len();
    }

    let ratio = served[0] as f64 / served[1] as f64;
    tracing::info!(?served, ratio, "served bytes");
    assert!((1.95..=2.05).contains(&ratio), "ratio {ratio}");
}

#[test]
fn small_quantum_is_not_starved() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut dwrr = fifo_scheduler(&[1500, 1]);

    for _ in 0..2_000 {
        dwrr.enqueue(packet(0, 1500)).unwrap();
    }
    dwrr.enqueue(packet(1, 1500)).unwrap();

    // Class 1 gains one byte of credit per round and class 0 sends one packet per round
    let position = std::iter::from_fn(|| dwrr.dequeue())
        .position(|p| p.payload()[0] == 1)
        .expect("class 1 starved");

    assert!(position <= 1_500, "class 1 served after {position} packets");
    assert_eq!(dwrr.len(), 2_000 - position);
}

#[test]
fn len_tracks_children() {
    let mut dwrr = fifo_scheduler(&[1500, 1500, 1500]);

    dwrr.enqueue(packet(0, 100)).unwrap();
    dwrr.enqueue(packet(2, 200)).unwrap();
    dwrr.enqueue(packet(2, 300)).unwrap();

    assert_eq!(dwrr.len(), 3);
    assert_eq!(dwrr.byte_len(), 600);
    assert_eq!(dwrr.child(2).map(|c| c.len()), Some(2));
    assert_eq!(dwrr.active_classes().collect::<Vec<_>>(), vec![0, 2]);

    while dwrr.dequeue().is_some() {}
    assert!(dwrr.is_empty());
    assert_eq!(dwrr.stats().bytes_dequeued(), 600);
}

#[test]
fn marks_through_marker_children() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let ctx = Context::new(sim.clone(), Arc::new(DscpClassifier::new(3)));
    let marker = QdiscConfig::Marker(MarkerOptions::default());
    let config = QdiscConfig::Dwrr(
        DwrrConfig::default()
            .class(0, 3000, marker.clone())
            .class(1, 1500, marker.clone())
            .class(2, 1500, marker),
    );
    let mut qdisc = build(&config, &ctx).unwrap();

    for dscp in [0, 8, 16] {
        for _ in 0..10 {
            let header = Ipv4Header { dscp, ecn: Ecn::Ect1, ..Default::default() };
            qdisc.enqueue(Packet::with_ipv4(header, Bytes::from_static(&[0; 1000]))).unwrap();
        }
    }

    // Everything has been queued longer than the instantaneous threshold
    sim.advance(Duration::from_micros(200));

    let drained: Vec<_> = std::iter::from_fn(|| qdisc.dequeue()).collect();
    assert_eq!(drained.len(), 30);
    assert!(drained.iter().all(|p| p.ecn() == Some(Ecn::Ce)));
    assert_eq!(qdisc.stats().dequeued(), 30);
}

#[test]
fn marker_child_keeps_its_own_state() {
    let sim = Arc::new(Simulator::new());
    let mut dwrr = WeightedScheduler::new(Arc::new(first_byte));
    let marker = CongestionMarker::new(sim.clone(), MarkerOptions::default());
    dwrr.add_class(0, 1500, Box::new(marker)).unwrap();
    dwrr.add_class(1, 1500, Box::<Fifo>::default()).unwrap();
    dwrr.check_config().unwrap();
    dwrr.initialize_params();

    dwrr.enqueue(packet(0, 100)).unwrap();
    dwrr.enqueue(packet(1, 100)).unwrap();
    sim.advance(Duration::from_micros(500));

    while dwrr.dequeue().is_some() {}

    assert_eq!(dwrr.child(0).map(|c| c.stats().instant_marks()), Some(1));
    assert_eq!(dwrr.child(1).map(|c| c.stats().instant_marks()), Some(0));
    // Unmarkable, since the packet carries no IP header
    assert_eq!(dwrr.child(0).map(|c| c.stats().mark_failures()), Some(1));
}
