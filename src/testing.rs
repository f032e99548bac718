//! Test doubles for the supervisor's collaborators.
//!
//! Scripted answers repeat their last value once exhausted, so a script of
//! `[false, false, true]` reads as "absent twice, then present for good".

use chrono::{DateTime, Local, TimeZone};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::clock::Clock;
use crate::exec::{CommandError, CommandExecutor};
use crate::probe::{NetworkProbe, ProcessProbe};
use crate::rpc::{RpcError, RpcResult, Transfer, TransferClient, TransferStatus};

/// Pop the next scripted value, keeping the last one forever.
fn next<T: Clone>(script: &RefCell<VecDeque<T>>) -> Option<T> {
    let mut script = script.borrow_mut();
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

/// Local time from calendar parts.
pub fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .earliest()
        .unwrap()
}

/// Clock that records sleeps and advances its time by them.
pub struct FakeClock {
    now: Cell<DateTime<Local>>,
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            now: Cell::new(now),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    /// Wednesday 2024-01-10 12:00.
    pub fn weekday_noon() -> Self {
        Self::at(local(2024, 1, 10, 12, 0))
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        if let Ok(step) = chrono::Duration::from_std(duration) {
            self.now.set(self.now.get() + step);
        }
    }
}

/// Process table with fixed or scripted liveness per name.
#[derive(Default)]
pub struct FakeProcesses {
    running: HashMap<String, u32>,
    scripts: HashMap<String, RefCell<VecDeque<bool>>>,
    lookups: RefCell<HashMap<String, u32>>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_running(mut self, name: &str, pid: u32) -> Self {
        self.running.insert(name.to_string(), pid);
        self
    }

    pub fn script(mut self, name: &str, alive: &[bool]) -> Self {
        self.scripts
            .insert(name.to_string(), RefCell::new(alive.iter().copied().collect()));
        self
    }

    pub fn lookups(&self, name: &str) -> u32 {
        self.lookups.borrow().get(name).copied().unwrap_or(0)
    }
}

impl ProcessProbe for FakeProcesses {
    fn find(&self, name: &str) -> Option<u32> {
        *self.lookups.borrow_mut().entry(name.to_string()).or_default() += 1;
        if let Some(script) = self.scripts.get(name) {
            return next(script).unwrap_or(false).then_some(100);
        }
        self.running.get(name).copied()
    }
}

/// Network with scripted outbound addresses and port answers.
pub struct ScriptedNetwork {
    outbound: RefCell<VecDeque<Ipv4Addr>>,
    ports: RefCell<VecDeque<bool>>,
    reachable: bool,
    outbound_samples: Cell<u32>,
    port_checks: RefCell<Vec<(String, u16)>>,
    reach_checks: Cell<u32>,
}

impl ScriptedNetwork {
    /// Constant outbound address, closed ports, external host reachable.
    pub fn at(address: Ipv4Addr) -> Self {
        Self {
            outbound: RefCell::new(VecDeque::from([address])),
            ports: RefCell::new(VecDeque::from([false])),
            reachable: true,
            outbound_samples: Cell::new(0),
            port_checks: RefCell::new(Vec::new()),
            reach_checks: Cell::new(0),
        }
    }

    pub fn outbound(self, addresses: &[Ipv4Addr]) -> Self {
        *self.outbound.borrow_mut() = addresses.iter().copied().collect();
        self
    }

    pub fn ports(self, answers: &[bool]) -> Self {
        *self.ports.borrow_mut() = answers.iter().copied().collect();
        self
    }

    pub fn reachable(mut self, reachable: bool) -> Self {
        self.reachable = reachable;
        self
    }

    pub fn outbound_samples(&self) -> u32 {
        self.outbound_samples.get()
    }

    pub fn port_checks(&self) -> Vec<(String, u16)> {
        self.port_checks.borrow().clone()
    }

    pub fn reach_checks(&self) -> u32 {
        self.reach_checks.get()
    }
}

impl NetworkProbe for ScriptedNetwork {
    fn outbound_address(&self) -> Ipv4Addr {
        self.outbound_samples.set(self.outbound_samples.get() + 1);
        next(&self.outbound).unwrap_or(Ipv4Addr::LOCALHOST)
    }

    fn is_port_open(&self, host: &str, port: u16) -> bool {
        self.port_checks.borrow_mut().push((host.to_string(), port));
        next(&self.ports).unwrap_or(false)
    }

    fn can_reach(&self, _host: &str, _port: u16) -> bool {
        self.reach_checks.set(self.reach_checks.get() + 1);
        self.reachable
    }
}

/// Executor that records calls and answers from a script.
pub struct RecordingExecutor {
    results: RefCell<VecDeque<bool>>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl RecordingExecutor {
    pub fn script(results: &[bool]) -> Self {
        Self {
            results: RefCell::new(results.iter().copied().collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::script(&[true])
    }

    pub fn failing() -> Self {
        Self::script(&[false])
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, program: &Path, args: &[String]) -> Result<(), CommandError> {
        self.calls
            .borrow_mut()
            .push((program.display().to_string(), args.to_vec()));
        if next(&self.results).unwrap_or(true) {
            Ok(())
        } else {
            Err(CommandError::ExitError {
                program: program.to_path_buf(),
                status: "exit status: 1".to_string(),
                stderr: "scripted failure".to_string(),
            })
        }
    }
}

/// A transfer with neutral defaults.
pub fn transfer(id: i64, status: TransferStatus) -> Transfer {
    Transfer {
        id,
        is_finished: false,
        status,
        left_until_done: 0,
        completed_at: None,
        upload_ratio: 0.0,
        is_private: false,
        trackers: Vec::new(),
    }
}

/// Daemon client serving a fixed transfer list.
pub struct FakeTransfers {
    transfers: Vec<Transfer>,
    reachable: bool,
    lists: Cell<u32>,
    closes: Cell<u32>,
    started: RefCell<Vec<Vec<i64>>>,
}

impl FakeTransfers {
    pub fn new(transfers: Vec<Transfer>) -> Self {
        Self {
            transfers,
            reachable: true,
            lists: Cell::new(0),
            closes: Cell::new(0),
            started: RefCell::new(Vec::new()),
        }
    }

    /// Every call fails as if the daemon were down.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn lists(&self) -> u32 {
        self.lists.get()
    }

    pub fn closes(&self) -> u32 {
        self.closes.get()
    }

    pub fn started(&self) -> Vec<Vec<i64>> {
        self.started.borrow().clone()
    }

    fn check(&self) -> RpcResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(RpcError::Transport {
                url: "http://127.0.0.1:9091/transmission/rpc".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }
}

impl TransferClient for FakeTransfers {
    fn list_transfers(&self) -> RpcResult<Vec<Transfer>> {
        self.lists.set(self.lists.get() + 1);
        self.check()?;
        Ok(self.transfers.clone())
    }

    fn close_session(&self) -> RpcResult<()> {
        self.closes.set(self.closes.get() + 1);
        self.check()
    }

    fn start_now(&self, ids: &[i64]) -> RpcResult<()> {
        self.check()?;
        self.started.borrow_mut().push(ids.to_vec());
        Ok(())
    }
}
