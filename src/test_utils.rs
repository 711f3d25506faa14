//! Test utilities shared by unit tests, integration tests and benches
//!
//! - [`PacketBuilder`] writes plaintext packets field by field at the pinned
//!   layout offsets, magic included.
//! - [`ScriptedEndpoint`] replaces the UDP transport with a per-link script
//!   of datagrams, timeouts and errors, and records every call the session
//!   loop makes.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::cipher;
use crate::protocol::{HEARTBEAT_PORT, MAGIC, TELEMETRY_PORT, layout};
use crate::transport::{Endpoint, Link};
use crate::{Result, TelemetryError};

/// Builds plaintext telemetry packets.
///
/// Every packet starts out zeroed with a valid magic and exactly
/// [`layout::PACKET_LEN`] bytes.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    bytes: Vec<u8>,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuilder {
    pub fn new() -> Self {
        let mut builder = Self { bytes: vec![0; layout::PACKET_LEN] };
        builder.put(layout::MAGIC, MAGIC.to_le_bytes());
        builder
    }

    fn put<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.bytes[offset..offset + N].copy_from_slice(&bytes);
    }

    fn put_f32(mut self, offset: usize, value: f32) -> Self {
        self.put(offset, value.to_le_bytes());
        self
    }

    fn put_wheels(mut self, offsets: [usize; 4], values: [f32; 4]) -> Self {
        for (offset, value) in offsets.into_iter().zip(values) {
            self.put(offset, value.to_le_bytes());
        }
        self
    }

    pub fn packet_id(mut self, id: u32) -> Self {
        self.put(layout::PACKET_ID, id.to_le_bytes());
        self
    }

    pub fn laps(mut self, current: i16, total: i16) -> Self {
        self.put(layout::CURRENT_LAP, current.to_le_bytes());
        self.put(layout::TOTAL_LAPS, total.to_le_bytes());
        self
    }

    pub fn lap_times(mut self, best_ms: i32, last_ms: i32) -> Self {
        self.put(layout::BEST_LAP, best_ms.to_le_bytes());
        self.put(layout::LAST_LAP, last_ms.to_le_bytes());
        self
    }

    pub fn time_on_track_ms(mut self, ms: u32) -> Self {
        self.put(layout::TIME_ON_TRACK, ms.to_le_bytes());
        self
    }

    pub fn positions(mut self, current: i16, total: i16) -> Self {
        self.put(layout::CURRENT_POSITION, current.to_le_bytes());
        self.put(layout::TOTAL_POSITIONS, total.to_le_bytes());
        self
    }

    pub fn car_id(mut self, id: i32) -> Self {
        self.put(layout::CAR_ID, id.to_le_bytes());
        self
    }

    pub fn rpm(self, rpm: f32) -> Self {
        self.put_f32(layout::RPM, rpm)
    }

    pub fn rev_range(mut self, warning: u16, limiter: u16) -> Self {
        self.put(layout::REV_WARNING, warning.to_le_bytes());
        self.put(layout::REV_LIMITER, limiter.to_le_bytes());
        self
    }

    /// Raw gear byte: current gear in the low nibble, suggested in the high.
    pub fn gear_byte(mut self, gears: u8) -> Self {
        self.put(layout::GEARS, [gears]);
        self
    }

    pub fn gear_ratios(mut self, ratios: [f32; 8]) -> Self {
        for (i, ratio) in ratios.into_iter().enumerate() {
            self.put(layout::GEAR_RATIOS + i * 4, ratio.to_le_bytes());
        }
        self
    }

    pub fn throttle(mut self, raw: u8) -> Self {
        self.put(layout::THROTTLE, [raw]);
        self
    }

    pub fn brake(mut self, raw: u8) -> Self {
        self.put(layout::BRAKE, [raw]);
        self
    }

    /// Boost as sent on the wire, one atmosphere above the decoded value.
    pub fn boost_raw(self, raw: f32) -> Self {
        self.put_f32(layout::BOOST, raw)
    }

    pub fn fuel(self, current: f32, capacity: f32) -> Self {
        self.put_f32(layout::CURRENT_FUEL, current).put_f32(layout::FUEL_CAPACITY, capacity)
    }

    pub fn speed_ms(self, speed: f32) -> Self {
        self.put_f32(layout::SPEED, speed)
    }

    pub fn ride_height_m(self, meters: f32) -> Self {
        self.put_f32(layout::RIDE_HEIGHT, meters)
    }

    pub fn tyre_temps(self, temps: [f32; 4]) -> Self {
        self.put_wheels(layout::TYRE_TEMP, temps)
    }

    pub fn tyre_diameters(self, meters: [f32; 4]) -> Self {
        self.put_wheels(layout::TYRE_DIAMETER, meters)
    }

    pub fn wheel_angular_speeds(self, rad_s: [f32; 4]) -> Self {
        self.put_wheels(layout::WHEEL_ANGULAR_SPEED, rad_s)
    }

    pub fn position(self, [x, y, z]: [f32; 3]) -> Self {
        self.put_f32(layout::POSITION_X, x)
            .put_f32(layout::POSITION_Y, y)
            .put_f32(layout::POSITION_Z, z)
    }

    pub fn velocity(self, [x, y, z]: [f32; 3]) -> Self {
        self.put_f32(layout::VELOCITY_X, x)
            .put_f32(layout::VELOCITY_Y, y)
            .put_f32(layout::VELOCITY_Z, z)
    }

    pub fn rotation(self, [pitch, yaw, roll]: [f32; 3]) -> Self {
        self.put_f32(layout::ROTATION_PITCH, pitch)
            .put_f32(layout::ROTATION_YAW, yaw)
            .put_f32(layout::ROTATION_ROLL, roll)
    }

    pub fn angular_velocity(self, [x, y, z]: [f32; 3]) -> Self {
        self.put_f32(layout::ANGULAR_VELOCITY_X, x)
            .put_f32(layout::ANGULAR_VELOCITY_Y, y)
            .put_f32(layout::ANGULAR_VELOCITY_Z, z)
    }

    /// The two flag bytes at 0x8E/0x8F.
    pub fn flags(mut self, bytes: [u8; 2]) -> Self {
        self.put(layout::FLAGS, bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    /// Build and encrypt the way the console does.
    pub fn encrypted(self, seed: u32) -> Vec<u8> {
        cipher::encrypt(&self.bytes, seed)
    }
}

/// Encrypted datagram with the given packet id and an id-derived IV seed.
pub fn datagram(packet_id: u32) -> Vec<u8> {
    PacketBuilder::new().packet_id(packet_id).encrypted(packet_id.wrapping_mul(0x9E37_79B9))
}

/// One scripted outcome of [`Link::recv`].
#[derive(Debug, Clone)]
pub enum Step {
    Datagram(Vec<u8>),
    Timeout,
    Error(io::ErrorKind),
}

/// Calls the session loop made against a [`ScriptedEndpoint`].
///
/// `link` counts opened links from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Opened { link: usize },
    Heartbeat { link: usize },
    Delivered { link: usize, len: usize },
    TimedOut { link: usize },
    Failed { link: usize },
}

struct Shared {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    events: Mutex<Vec<LinkEvent>>,
    opened: Mutex<usize>,
    fail_open: AtomicBool,
    /// Heartbeat sends still to fail, across all links
    heartbeat_failures: AtomicUsize,
    drained: watch::Sender<usize>,
}

/// In-memory [`Endpoint`] that plays one script per opened link.
///
/// Once a link's script is exhausted its `recv` never completes, which
/// leaves the session loop waiting for stop or restart. Opening more links
/// than scripts were pushed yields links with empty scripts.
#[derive(Clone)]
pub struct ScriptedEndpoint {
    shared: Arc<Shared>,
}

impl Default for ScriptedEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        let (drained, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                scripts: Mutex::new(VecDeque::new()),
                events: Mutex::new(Vec::new()),
                opened: Mutex::new(0),
                fail_open: AtomicBool::new(false),
                heartbeat_failures: AtomicUsize::new(0),
                drained,
            }),
        }
    }

    /// Queue the script for the next link to be opened.
    pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        lock(&self.shared.scripts).push_back(steps.into_iter().collect());
        self
    }

    /// Make every `open` fail as if the receive port were taken.
    pub fn failing_bind(self) -> Self {
        self.shared.fail_open.store(true, Ordering::SeqCst);
        self
    }

    /// Make every heartbeat send fail as if the console refused it.
    pub fn failing_heartbeat(self) -> Self {
        self.failing_heartbeats(usize::MAX)
    }

    /// Make the next `count` heartbeat sends fail, then succeed again.
    pub fn failing_heartbeats(self, count: usize) -> Self {
        self.shared.heartbeat_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        lock(&self.shared.events).clone()
    }

    pub fn heartbeats(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, LinkEvent::Heartbeat { .. })).count()
    }

    pub fn opened(&self) -> usize {
        *lock(&self.shared.opened)
    }

    /// Wait until `count` links have played their whole script.
    pub async fn wait_drained(&self, count: usize) {
        let mut rx = self.shared.drained.subscribe();
        let _ = rx.wait_for(|drained| *drained >= count).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Endpoint for ScriptedEndpoint {
    type Link = ScriptedLink;

    async fn open(&self) -> Result<ScriptedLink> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), TELEMETRY_PORT);
            return Err(TelemetryError::bind_failed(addr, io::ErrorKind::AddrInUse.into()));
        }

        let id = {
            let mut opened = lock(&self.shared.opened);
            *opened += 1;
            *opened - 1
        };
        let steps = lock(&self.shared.scripts).pop_front().unwrap_or_default();
        lock(&self.shared.events).push(LinkEvent::Opened { link: id });

        Ok(ScriptedLink { id, steps: steps.into(), shared: Arc::clone(&self.shared), drained: false })
    }
}

/// Link handed out by [`ScriptedEndpoint`].
pub struct ScriptedLink {
    id: usize,
    steps: VecDeque<Step>,
    shared: Arc<Shared>,
    drained: bool,
}

impl ScriptedLink {
    fn record(&self, event: LinkEvent) {
        lock(&self.shared.events).push(event);
    }
}

#[async_trait]
impl Link for ScriptedLink {
    async fn send_heartbeat(&mut self) -> Result<()> {
        self.record(LinkEvent::Heartbeat { link: self.id });

        let failed = self
            .shared
            .heartbeat_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            let console = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), HEARTBEAT_PORT);
            return Err(TelemetryError::heartbeat_failed(console, io::ErrorKind::ConnectionRefused.into()));
        }
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let Some(step) = self.steps.pop_front() else {
            if !self.drained {
                self.drained = true;
                self.shared.drained.send_modify(|count| *count += 1);
            }
            return std::future::pending().await;
        };

        match step {
            Step::Datagram(bytes) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                self.record(LinkEvent::Delivered { link: self.id, len });
                Ok(Some(len))
            }
            Step::Timeout => {
                self.record(LinkEvent::TimedOut { link: self.id });
                Ok(None)
            }
            Step::Error(kind) => {
                self.record(LinkEvent::Failed { link: self.id });
                Err(TelemetryError::Receive { source: kind.into() })
            }
        }
    }
}
