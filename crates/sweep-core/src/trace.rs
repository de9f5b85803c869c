//! Typed views of the traces written by the simulation script.

use std::collections::BTreeSet;

use crate::ident::EntityId;
use crate::table::{parse_table, ParseOpts, Table, TableError};

/// The artifact holding one line per received packet.
pub const PACKETS_TRACE: &str = "packetsTrace.csv";

/// The artifact holding one line per scheduled access period.
pub const SP_TRACE: &str = "spTrace.csv";

/// The artifact holding the simulator's standard error stream.
pub const STDERR: &str = "stderr";

/// The artifact holding the simulator's standard output stream.
pub const STDOUT: &str = "stdout";

const SRC_NODE_ID: &str = "SrcNodeId";
const TX_TIMESTAMP: &str = "TxTimestamp_ns";
const RX_TIMESTAMP: &str = "RxTimestamp_ns";
const PKT_SIZE: &str = "PktSize_B";

/// A received packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet {
    /// The sending entity, as written by the simulator.
    pub src: f64,
    /// Transmission time in nanoseconds.
    pub tx_ns: f64,
    /// Reception time in nanoseconds.
    pub rx_ns: f64,
    /// Packet size in bytes.
    pub size: f64,
}

impl Packet {
    /// End-to-end delay in nanoseconds.
    pub fn delay_ns(&self) -> f64 {
        self.rx_ns - self.tx_ns
    }
}

/// The received-packet trace of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketTrace {
    packets: Vec<Packet>,
}

impl PacketTrace {
    /// Parses the packet trace artifact.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let table = parse_table(text, &ParseOpts::default())?;
        Self::from_table(&table)
    }

    /// Extracts packets from a parsed table. A table without rows yields an empty trace, whatever
    /// its columns.
    pub fn from_table(table: &Table) -> Result<Self, TableError> {
        if table.is_empty() {
            return Ok(Self::default());
        }
        let src = table.numeric(SRC_NODE_ID)?;
        let tx = table.numeric(TX_TIMESTAMP)?;
        let rx = table.numeric(RX_TIMESTAMP)?;
        let size = table.numeric(PKT_SIZE)?;
        let packets = (0..table.len())
            .map(|i| Packet {
                src: src[i],
                tx_ns: tx[i],
                rx_ns: rx[i],
                size: size[i],
            })
            .collect();
        Ok(Self { packets })
    }

    /// The number of packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether no packet was received.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// The packets, in trace order.
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// The packets sent by `entity`.
    pub fn from_entity(&self, entity: EntityId) -> PacketTrace {
        let id = entity.inner() as f64;
        self.filter(|p| p.src == id)
    }

    /// The packets transmitted strictly after `secs` seconds.
    pub fn sent_after(&self, secs: f64) -> PacketTrace {
        self.filter(|p| p.tx_ns / 1e9 > secs)
    }

    /// Total bytes received.
    pub fn total_bytes(&self) -> f64 {
        self.packets.iter().map(|p| p.size).sum()
    }

    /// Per-packet delays in milliseconds, in trace order.
    pub fn delays_ms(&self) -> Vec<f64> {
        self.packets
            .iter()
            .map(|p| p.delay_ns() / 1e9 * 1e3)
            .collect()
    }

    fn filter(&self, f: impl Fn(&Packet) -> bool) -> PacketTrace {
        let packets = self.packets.iter().filter(|&p| f(p)).copied().collect();
        PacketTrace { packets }
    }
}

/// Parses the scheduling trace and returns the stations that were granted a service period,
/// excluding the AP and the contention-period marker.
pub fn scheduled_stations(text: &str) -> Result<BTreeSet<EntityId>, TableError> {
    let table = parse_table(text, &ParseOpts::default())?;
    if table.is_empty() {
        return Ok(BTreeSet::new());
    }
    table
        .numeric(SRC_NODE_ID)?
        .iter()
        .enumerate()
        .map(|(row, &id)| {
            if id < 0.0 || id.fract() != 0.0 {
                return Err(TableError::NotNumeric {
                    column: SRC_NODE_ID.to_owned(),
                    row,
                    value: id.to_string(),
                });
            }
            Ok(EntityId::new(id as usize))
        })
        .filter(|id| !matches!(id, Ok(id) if *id == EntityId::AP || *id == EntityId::CBAP))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn packets_from_csv() -> anyhow::Result<()> {
        let csv = testing::packets_csv(&[(1, 1_000, 2_000, 100), (2, 2_000, 5_000, 200)]);
        let trace = PacketTrace::parse(&csv)?;
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.total_bytes(), 300.0);
        let delays = trace.delays_ms();
        assert!((delays[0] - 1e-3).abs() < 1e-12);
        assert!((delays[1] - 3e-3).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn empty_trace_ignores_columns() -> anyhow::Result<()> {
        assert!(PacketTrace::parse("")?.is_empty());
        assert!(PacketTrace::parse("Foo,Bar\n")?.is_empty());
        Ok(())
    }

    #[test]
    fn missing_column_fails() {
        let csv = "SrcNodeId,TxTimestamp_ns,PktSize_B\n1,1,1\n2,2,2\n";
        assert!(matches!(
            PacketTrace::parse(csv),
            Err(TableError::MissingColumn(c)) if c == RX_TIMESTAMP
        ));
    }

    #[test]
    fn filters() -> anyhow::Result<()> {
        let csv = testing::packets_csv(&[
            (1, 50_000_000, 50_100_000, 10),
            (2, 150_000_000, 150_100_000, 20),
            (1, 250_000_000, 250_100_000, 30),
        ]);
        let trace = PacketTrace::parse(&csv)?;
        assert_eq!(trace.from_entity(EntityId::new(1)).total_bytes(), 40.0);
        assert!(trace.from_entity(EntityId::AP).is_empty());
        assert_eq!(trace.sent_after(0.1).total_bytes(), 50.0);
        Ok(())
    }

    #[test]
    fn scheduled_stations_exclude_reserved_ids() -> anyhow::Result<()> {
        let csv = "SrcNodeId,Timestamp_ns,isStart\n0,0,1\n255,10,1\n3,20,1\n1,30,1\n3,40,0\n";
        let stas = scheduled_stations(csv)?;
        assert_eq!(
            stas.into_iter().collect::<Vec<_>>(),
            vec![EntityId::new(1), EntityId::new(3)]
        );
        assert!(scheduled_stations("")?.is_empty());
        Ok(())
    }
}
