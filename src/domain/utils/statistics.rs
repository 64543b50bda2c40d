use serde::Serialize;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::Result;

/// Each event is a set of key-value pairs. This enum names every allowed key and thus
/// every column of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatParameter {
    /// Seconds since the collector was started.
    Time,

    /// Why this row was written.
    LogDescription,

    // Enumeration
    Network,
    Algorithm,
    VertexCount,
    EdgeCount,
    SubgraphSize,

    /// Wall clock seconds of the run.
    Runtime,
    SearchTreeNodes,
    SubgraphCount,

    /// Largest gap between two emitted subgraphs, in seconds.
    MaxDelay,
    Termination,

    // Placement
    LatencyFactor,
    ShortestK,
    Heuristic,
    ActiveHypervisors,

    // Requests
    SimulationStep,
    RequestCount,
    AcceptedRequests,
    AcceptanceRatio,
    AvgPrimaryLength,
    AvgBackupLength,
    MaxPrimaryLength,
    MaxBackupLength,
}

impl StatParameter {
    /// Column order of the csv output.
    pub const ALL: [StatParameter; 24] = [
        StatParameter::Time,
        StatParameter::LogDescription,
        StatParameter::Network,
        StatParameter::Algorithm,
        StatParameter::VertexCount,
        StatParameter::EdgeCount,
        StatParameter::SubgraphSize,
        StatParameter::Runtime,
        StatParameter::SearchTreeNodes,
        StatParameter::SubgraphCount,
        StatParameter::MaxDelay,
        StatParameter::Termination,
        StatParameter::LatencyFactor,
        StatParameter::ShortestK,
        StatParameter::Heuristic,
        StatParameter::ActiveHypervisors,
        StatParameter::SimulationStep,
        StatParameter::RequestCount,
        StatParameter::AcceptedRequests,
        StatParameter::AcceptanceRatio,
        StatParameter::AvgPrimaryLength,
        StatParameter::AvgBackupLength,
        StatParameter::MaxPrimaryLength,
        StatParameter::MaxBackupLength,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            StatParameter::Time => "Time",
            StatParameter::LogDescription => "LogDescription",
            StatParameter::Network => "Network",
            StatParameter::Algorithm => "Algorithm",
            StatParameter::VertexCount => "VertexCount",
            StatParameter::EdgeCount => "EdgeCount",
            StatParameter::SubgraphSize => "SubgraphSize",
            StatParameter::Runtime => "Runtime",
            StatParameter::SearchTreeNodes => "SearchTreeNodes",
            StatParameter::SubgraphCount => "SubgraphCount",
            StatParameter::MaxDelay => "MaxDelay",
            StatParameter::Termination => "Termination",
            StatParameter::LatencyFactor => "LatencyFactor",
            StatParameter::ShortestK => "ShortestK",
            StatParameter::Heuristic => "Heuristic",
            StatParameter::ActiveHypervisors => "ActiveHypervisors",
            StatParameter::SimulationStep => "SimulationStep",
            StatParameter::RequestCount => "RequestCount",
            StatParameter::AcceptedRequests => "AcceptedRequests",
            StatParameter::AcceptanceRatio => "AcceptanceRatio",
            StatParameter::AvgPrimaryLength => "AvgPrimaryLength",
            StatParameter::AvgBackupLength => "AvgBackupLength",
            StatParameter::MaxPrimaryLength => "MaxPrimaryLength",
            StatParameter::MaxBackupLength => "MaxBackupLength",
        }
    }

    pub fn headers() -> Vec<&'static str> {
        StatParameter::ALL.iter().map(|p| p.header()).collect()
    }
}

/// Values keep their native type and are only formatted when the row is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Integer(v)
    }
}

impl From<u64> for StatValue {
    fn from(v: u64) -> Self {
        StatValue::Integer(v as i64)
    }
}

impl From<usize> for StatValue {
    fn from(v: usize) -> Self {
        StatValue::Integer(v as i64)
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<bool> for StatValue {
    fn from(v: bool) -> Self {
        StatValue::Bool(v)
    }
}

impl StatValue {
    fn render(&self) -> String {
        match self {
            StatValue::Text(t) => t.clone(),
            StatValue::Integer(i) => i.to_string(),
            StatValue::Float(f) => format!("{:.6}", f),
            StatValue::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticEvent {
    data: HashMap<StatParameter, StatValue>,
}

impl StatisticEvent {
    pub fn new() -> Self {
        Self { data: HashMap::new() }
    }

    pub fn set<V: Into<StatValue>>(&mut self, param: StatParameter, value: V) -> &mut Self {
        self.data.insert(param, value.into());
        self
    }

    pub fn get(&self, param: StatParameter) -> Option<&StatValue> {
        self.data.get(&param)
    }

    /// One csv row in header order; missing values are written as `NA`.
    pub fn to_row(&self) -> Vec<String> {
        StatParameter::ALL.iter().map(|p| self.data.get(p).map(StatValue::render).unwrap_or_else(|| "NA".to_string())).collect()
    }
}

enum StatsMessage {
    Log(StatisticEvent),
    Flush,
    Shutdown,
}

/// Handle used by the enumeration driver and the simulation to record rows.
///
/// Rows are sent over a channel to a writer thread owning the `csv::Writer`, so recording
/// never blocks on file IO. Call [`StatsCollector::shutdown`] to flush and join the writer.
pub struct StatsCollector {
    sender: mpsc::Sender<StatsMessage>,
    start: Instant,
    worker: Option<JoinHandle<u64>>,
}

impl StatsCollector {
    /// Opens `filename` in append mode (stdout when `None`) and starts the writer thread.
    /// The header row is only written when the file is new or empty.
    pub fn init(filename: Option<&Path>) -> Result<Self> {
        let (writer, write_header): (Box<dyn Write + Send>, bool) = match filename {
            Some(path) => {
                let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
                let file: File = OpenOptions::new().create(true).append(true).open(path)?;
                (Box::new(file), is_new)
            }
            None => (Box::new(io::stdout()), true),
        };
        Ok(Self::with_writer(writer, write_header))
    }

    pub(crate) fn with_writer(writer: Box<dyn Write + Send>, write_header: bool) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || Self::worker_loop(rx, writer, write_header));
        StatsCollector { sender: tx, start: Instant::now(), worker: Some(worker) }
    }

    /// Returns the number of failed writes and flushes.
    fn worker_loop(rx: mpsc::Receiver<StatsMessage>, writer: Box<dyn Write + Send>, write_header: bool) -> u64 {
        let mut csv_wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
        let mut failures = 0;

        if write_header {
            if let Err(e) = csv_wtr.write_record(StatParameter::headers()) {
                log::error!("Stats Error: Failed to write headers: {}", e);
                failures += 1;
            }
        }

        for msg in rx {
            match msg {
                StatsMessage::Log(event) => {
                    if let Err(e) = csv_wtr.write_record(event.to_row()) {
                        log::error!("Stats Error: Failed to write record: {}", e);
                        failures += 1;
                    }
                }
                StatsMessage::Flush => {
                    if let Err(e) = csv_wtr.flush() {
                        log::error!("Stats Error: Failed to flush: {}", e);
                        failures += 1;
                    }
                }
                StatsMessage::Shutdown => {
                    if let Err(e) = csv_wtr.flush() {
                        log::error!("Stats Error: Failed to flush on shutdown: {}", e);
                        failures += 1;
                    }
                    break;
                }
            }
        }
        failures
    }

    /// Records an event. `Time` is filled in with the seconds since `init` unless already set.
    pub fn add_event(&self, mut event: StatisticEvent) {
        if event.get(StatParameter::Time).is_none() {
            event.set(StatParameter::Time, self.start.elapsed().as_secs_f64());
        }

        if self.sender.send(StatsMessage::Log(event)).is_err() {
            log::warn!("Statistics writer is gone, event dropped.");
        }
    }

    pub fn flush(&self) {
        if self.sender.send(StatsMessage::Flush).is_err() {
            log::warn!("Statistics writer is gone, flush skipped.");
        }
    }

    /// Flushes pending rows and waits for the writer thread to finish. Returns the number of
    /// rows or flushes the writer failed on.
    pub fn shutdown(mut self) -> u64 {
        if self.sender.send(StatsMessage::Shutdown).is_err() {
            log::warn!("Statistics writer is gone before shutdown.");
        }
        let Some(worker) = self.worker.take() else {
            return 0;
        };
        match worker.join() {
            Ok(0) => 0,
            Ok(failures) => {
                log::warn!("Statistics writer failed {} time(s), the output is incomplete.", failures);
                failures
            }
            Err(_) => {
                log::error!("Statistics writer thread panicked.");
                1
            }
        }
    }
}
