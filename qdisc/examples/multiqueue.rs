//! Three flows share a 1 Gbit/s link through a deficit round robin scheduler with an ECN
//! marker per class. Class 0 gets twice the quantum of the other two.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use qdisc::{
    build, Context, DscpClassifier, DwrrConfig, Ecn, Ipv4Header, MarkerOptions, Packet,
    QdiscConfig, Simulator,
};

/// Time to serialize a full-sized frame at 1 Gbit/s.
const TX_TIME: Duration = Duration::from_micros(12);
const PAYLOAD: usize = 1480;

fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let ctx = Context::new(sim.clone(), Arc::new(DscpClassifier::new(3)));

    let marker = QdiscConfig::Marker(
        MarkerOptions::default()
            .instant_marking_threshold(Duration::from_micros(150))
            .persistent_marking_target(Duration::from_micros(10))
            .persistent_marking_interval(Duration::from_micros(200)),
    );
    let config = QdiscConfig::Dwrr(
        DwrrConfig::default()
            .class(0, 3000, marker.clone())
            .class(1, 1500, marker.clone())
            .class(2, 1500, marker),
    );
    let mut qdisc = build(&config, &ctx).unwrap();

    let mut sent = [0usize; 3];
    let mut marked = [0usize; 3];
    let mut dropped = 0;

    // Every flow offers a frame per transmission slot, so the link is 3x oversubscribed
    for _ in 0..10_000 {
        for dscp in [0u8, 8, 16] {
            let header = Ipv4Header { dscp, ecn: Ecn::Ect1, ..Default::default() };
            let packet = Packet::with_ipv4(header, Bytes::from(vec![0; PAYLOAD]));
            if qdisc.enqueue(packet).is_err() {
                dropped += 1;
            }
        }

        sim.advance(TX_TIME);

        if let Some(packet) = qdisc.dequeue() {
            let class = packet.ipv4().map_or(0, |h| usize::from(h.dscp >> 3));
            sent[class] += 1;
            if packet.ecn() == Some(Ecn::Ce) {
                marked[class] += 1;
            }
        }
    }

    for class in 0..3 {
        println!("class {class}: sent {} packets, {} marked", sent[class], marked[class]);
    }
    println!("dropped {dropped} packets, {} still queued", qdisc.len());
}
