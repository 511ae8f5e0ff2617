//! Segmented transfer between two endpoints over an in-memory bus.

use std::thread;

use can_tp::{Endpoint, Session, StandardId, StdClock, TpConfig};
use can_tp_mock::bus_pair;

fn main() {
    let (port_a, port_b) = bus_pair();
    let mut sender = Endpoint::new(port_a, StdClock::new(), TpConfig::default());
    let mut receiver = Endpoint::new(port_b, StdClock::new(), TpConfig::default());

    let req_id = StandardId::new(0x7E0).unwrap();
    let resp_id = StandardId::new(0x7E8).unwrap();

    let tx_thread = thread::spawn(move || {
        let message = b"segmented transfer across an in-memory CAN bus";
        let mut buf = [0u8; 64];
        buf[..message.len()].copy_from_slice(message);
        let mut session = Session::new(req_id, resp_id, &mut buf);
        session.set_length(message.len());
        sender.send(&mut session).expect("send failed");
    });

    let mut buf = [0u8; 64];
    let mut session = Session::new(resp_id, req_id, &mut buf);
    receiver.receive(&mut session).expect("receive failed");
    println!(
        "received {} bytes: {}",
        session.length(),
        String::from_utf8_lossy(session.payload())
    );

    tx_thread.join().unwrap();
}
