use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use qdisc::{ClassId, DelayEmulator, Packet, QdiscError, QueueDisc, QueueLimit, TokioScheduler};

#[tokio::main]
async fn main() -> Result<(), QdiscError> {
    let _ = tracing_subscriber::fmt::try_init();

    let scheduler = Arc::new(TokioScheduler::try_current().unwrap());
    // Packets are classified by their first byte
    let classify = |packet: &Packet| packet.payload().first().map(|b| ClassId::from(*b));

    let mut emulator = DelayEmulator::new(scheduler, Arc::new(classify), QueueLimit::default());
    emulator.add_class(0, Duration::from_millis(50), QueueLimit::default())?;
    emulator.add_class(1, Duration::from_millis(10), QueueLimit::default())?;
    emulator.check_config()?;
    emulator.initialize_params();

    emulator.enqueue(Packet::new(Bytes::from_static(b"\x00slow")))?;
    emulator.enqueue(Packet::new(Bytes::from_static(b"\x01fast")))?;

    let mut interval = tokio::time::interval(Duration::from_millis(5));
    let mut received = 0;
    while received < 2 {
        interval.tick().await;

        while let Some(packet) = emulator.dequeue() {
            received += 1;
            println!("Received {:?}", packet.payload());
        }
    }

    Ok(())
}
