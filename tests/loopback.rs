//! End-to-end session tests against a fake console on the loopback interface.
//!
//! The fake console learns the client address from the heartbeat it receives
//! and answers with encrypted packets, the same way the real console does.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gt7_telemetry::protocol::{HEARTBEAT_PAYLOAD, MAGIC, layout};
use gt7_telemetry::{SessionConfig, SessionManager, TelemetryError, UpdateRate, cipher};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn config_for(console: SocketAddr, read_timeout_ms: u64) -> SessionConfig {
    SessionConfig {
        host: console.ip().to_string(),
        send_port: console.port(),
        receive_port: 0,
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        read_timeout_ms,
        ..SessionConfig::default()
    }
}

/// Encrypted datagram carrying an id, speed in m/s and the gear byte.
fn console_packet(packet_id: u32, speed_ms: f32, gears: u8) -> Vec<u8> {
    let mut plain = vec![0u8; layout::PACKET_LEN];
    plain[layout::MAGIC..layout::MAGIC + 4].copy_from_slice(&MAGIC.to_le_bytes());
    plain[layout::PACKET_ID..layout::PACKET_ID + 4].copy_from_slice(&packet_id.to_le_bytes());
    plain[layout::SPEED..layout::SPEED + 4].copy_from_slice(&speed_ms.to_le_bytes());
    plain[layout::GEARS] = gears;
    cipher::encrypt(&plain, packet_id ^ 0x5A5A_0F0F)
}

async fn expect_heartbeat(console: &UdpSocket) -> SocketAddr {
    let mut buf = [0u8; 64];
    let (len, client) = timeout(WAIT, console.recv_from(&mut buf))
        .await
        .expect("heartbeat within timeout")
        .expect("console recv");
    assert_eq!(&buf[..len], HEARTBEAT_PAYLOAD);
    client
}

#[tokio::test]
async fn streams_decoded_snapshots_from_console() {
    let _ = tracing_subscriber::fmt::try_init();

    let console = UdpSocket::bind("127.0.0.1:0").await.expect("bind console");
    let config = config_for(console.local_addr().expect("console addr"), 5_000);
    let manager = Arc::new(SessionManager::new(config).expect("valid config"));
    let mut snapshots = manager.subscribe(UpdateRate::Native);
    let session = Arc::clone(&manager).spawn();

    let client = expect_heartbeat(&console).await;

    for (id, speed) in [(1u32, 10.0f32), (2, 20.0), (2, 99.0), (3, 30.0)] {
        console.send_to(&console_packet(id, speed, 0x43), client).await.expect("send packet");
    }
    // Noise on the telemetry port is ignored
    console.send_to(&[0xFFu8; 300], client).await.expect("send noise");

    let mut seen = Vec::new();
    while let Some(snapshot) = timeout(WAIT, snapshots.next()).await.expect("snapshot in time") {
        seen.push(snapshot.packet_id);
        if snapshot.packet_id == 3 {
            assert!((snapshot.speed_kph - 108.0).abs() < 1e-3);
            assert_eq!(snapshot.current_gear, 3);
            assert_eq!(snapshot.suggested_gear, 4);
            break;
        }
    }
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "ids not increasing: {seen:?}");

    let summary = manager.session_summary();
    assert_eq!(summary.packets_accepted, 3);
    assert_eq!(manager.last_snapshot().packet_id, 3);
    assert!(manager.last_received_at().is_some());

    manager.stop();
    timeout(WAIT, session).await.expect("stops in time").expect("task").expect("clean stop");
    assert!(timeout(WAIT, snapshots.next()).await.expect("stream ends").is_none());
}

#[tokio::test]
async fn silence_triggers_another_heartbeat() {
    let console = UdpSocket::bind("127.0.0.1:0").await.expect("bind console");
    let config = config_for(console.local_addr().expect("console addr"), 150);
    let manager = Arc::new(SessionManager::new(config).expect("valid config"));
    let session = Arc::clone(&manager).spawn();

    let first = expect_heartbeat(&console).await;
    let second = expect_heartbeat(&console).await;
    assert_eq!(first, second, "heartbeats come from the bound socket");
    assert!(manager.is_running());

    manager.stop();
    timeout(WAIT, session).await.expect("stops in time").expect("task").expect("clean stop");
}

#[tokio::test]
async fn restart_binds_a_new_socket() {
    let console = UdpSocket::bind("127.0.0.1:0").await.expect("bind console");
    let config = config_for(console.local_addr().expect("console addr"), 5_000);
    let manager = Arc::new(SessionManager::new(config).expect("valid config"));
    let session = Arc::clone(&manager).spawn();

    let client = expect_heartbeat(&console).await;
    console.send_to(&console_packet(50, 1.0, 0), client).await.expect("send");

    manager.restart();
    let rebound = expect_heartbeat(&console).await;

    // The filter starts over, so a lower id is accepted on the new socket
    console.send_to(&console_packet(4, 2.0, 0), rebound).await.expect("send");
    timeout(WAIT, async {
        while manager.last_snapshot().packet_id != 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("packet on new socket accepted");

    manager.stop();
    timeout(WAIT, session).await.expect("stops in time").expect("task").expect("clean stop");
}

#[tokio::test]
async fn taken_receive_port_fails_start() {
    let console = UdpSocket::bind("127.0.0.1:0").await.expect("bind console");
    let squatter = UdpSocket::bind("127.0.0.1:0").await.expect("bind squatter");

    let config = SessionConfig {
        receive_port: squatter.local_addr().expect("squatter addr").port(),
        ..config_for(console.local_addr().expect("console addr"), 1_000)
    };
    let manager = SessionManager::new(config).expect("valid config");

    let err = timeout(WAIT, manager.start()).await.expect("fails fast").expect_err("bind fails");
    assert!(matches!(err, TelemetryError::Bind { .. }), "unexpected error: {err}");
    assert!(!manager.is_running());
}
