use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use qdisc_common::{Clock, Scheduler};
use qdisc_disc::{DelayEmulator, QueueDisc, QueueLimit};
use qdisc_packet::{ClassId, Packet};
use qdisc_sim::{Simulator, TokioScheduler};

fn first_byte(packet: &Packet) -> Option<ClassId> {
    packet.payload().first().map(|b| ClassId::from(*b))
}

fn packet(class: u8) -> Packet {
    Packet::new(Bytes::from(vec![class; 64]))
}

fn emulator(scheduler: Arc<dyn Scheduler>, delays: &[Duration]) -> DelayEmulator {
    let mut emulator =
        DelayEmulator::new(scheduler, Arc::new(first_byte), QueueLimit::default());
    for (id, delay) in delays.iter().enumerate() {
        emulator.add_class(id as ClassId, *delay, QueueLimit::default()).unwrap();
    }
    emulator.check_config().unwrap();
    emulator.initialize_params();
    emulator
}

fn us(micros: u64) -> Duration {
    Duration::from_micros(micros)
}

#[test]
fn shorter_delay_overtakes() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let mut emulator = emulator(sim.clone(), &[us(20), us(1)]);

    let p1 = packet(0);
    let p2 = packet(1);
    let (uid1, uid2) = (p1.uid(), p2.uid());

    emulator.enqueue(p1).unwrap();
    emulator.enqueue(p2).unwrap();
    assert_eq!(sim.run(), 2);

    assert_eq!(emulator.dequeue().map(|p| p.uid()), Some(uid2));
    assert_eq!(emulator.dequeue().map(|p| p.uid()), Some(uid1));
    assert_eq!(sim.now(), us(20));
}

#[test]
fn classes_interleave_by_delay() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Arc::new(Simulator::new());
    let mut emulator = emulator(sim.clone(), &[us(10), us(3)]);

    let mut uids = Vec::new();
    for _ in 0..2 {
        for class in [0, 1] {
            let packet = packet(class);
            uids.push(packet.uid());
            emulator.enqueue(packet).unwrap();
        }
        sim.advance(us(5));
    }
    sim.run();

    // Due at a0 = 10, b0 = 3, a1 = 15, b1 = 8
    let expected = vec![uids[1], uids[3], uids[0], uids[2]];
    let drained: Vec<_> = std::iter::from_fn(|| emulator.dequeue()).map(|p| p.uid()).collect();
    assert_eq!(drained, expected);
    assert_eq!(emulator.stats().fetched(), 4);
}

#[test]
fn per_class_order_is_preserved() {
    let sim = Arc::new(Simulator::new());
    let mut emulator = emulator(sim.clone(), &[us(7)]);

    let uids: Vec<_> = (0..100)
        .map(|_| {
            let packet = packet(0);
            let uid = packet.uid();
            emulator.enqueue(packet).unwrap();
            sim.advance(us(1));
            uid
        })
        .collect();

    sim.run();
    let drained: Vec<_> = std::iter::from_fn(|| emulator.dequeue()).map(|p| p.uid()).collect();
    assert_eq!(drained, uids);
}

#[tokio::test(start_paused = true)]
async fn delays_in_real_time() {
    let _ = tracing_subscriber::fmt::try_init();

    let scheduler = Arc::new(TokioScheduler::try_current().unwrap());
    let mut emulator =
        emulator(scheduler, &[Duration::from_millis(10), Duration::from_millis(1)]);

    emulator.enqueue(packet(0)).unwrap();
    emulator.enqueue(packet(1)).unwrap();
    assert!(emulator.peek().is_none());

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(emulator.output_len(), 1);
    assert_eq!(emulator.dequeue().map(|p| p.payload()[0]), Some(1));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(emulator.dequeue().map(|p| p.payload()[0]), Some(0));
    assert!(emulator.is_empty());
}
