//! Harvest cycle reports and cumulative metrics

use serde::{Deserialize, Serialize};
use trendmark_domain::ClientId;

/// How a client fared in a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ClientStatus {
    /// Matched and primed normally
    Ok,
    /// Skipped this cycle; retried next cycle
    Degraded(String),
}

/// Per-client outcome of one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientReport {
    /// Client
    pub client_id: ClientId,
    /// Outcome
    #[serde(flatten)]
    pub status: ClientStatus,
    /// URLs matched above threshold
    pub matches: usize,
    /// Artifacts created or regenerated
    pub primed: usize,
    /// Matches whose cached artifact was already up to date
    pub unchanged: usize,
    /// Cached keys invalidated because their trend expired unreplaced
    pub invalidated: usize,
    /// Synthesis jobs that failed (incomplete data, validation, timeout)
    pub failed: usize,
}

impl ClientReport {
    /// Empty report for a client
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            status: ClientStatus::Ok,
            matches: 0,
            primed: 0,
            unchanged: 0,
            invalidated: 0,
            failed: 0,
        }
    }

    /// Report for a client skipped this cycle
    pub fn degraded(client_id: ClientId, reason: impl Into<String>) -> Self {
        Self {
            status: ClientStatus::Degraded(reason.into()),
            ..Self::new(client_id)
        }
    }

    /// True if the client was skipped
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ClientStatus::Degraded(_))
    }
}

/// Outcome of one harvest cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle start (seconds since Unix epoch)
    pub started_at: u64,
    /// Active trends considered
    pub active_trends: usize,
    /// Per-client outcomes, sorted by client id
    pub clients: Vec<ClientReport>,
    /// Artifacts dropped past their grace window
    pub purged: usize,
    /// Wall time spent (milliseconds)
    pub duration_ms: u64,
}

impl CycleReport {
    /// Client report by id
    pub fn client(&self, id: &ClientId) -> Option<&ClientReport> {
        self.clients.iter().find(|c| &c.client_id == id)
    }

    /// Total primed artifacts
    pub fn primed(&self) -> usize {
        self.clients.iter().map(|c| c.primed).sum()
    }

    /// Total matches
    pub fn matches(&self) -> usize {
        self.clients.iter().map(|c| c.matches).sum()
    }

    /// Total invalidations
    pub fn invalidated(&self) -> usize {
        self.clients.iter().map(|c| c.invalidated).sum()
    }

    /// Degraded clients
    pub fn degraded(&self) -> Vec<&ClientId> {
        self.clients
            .iter()
            .filter(|c| c.is_degraded())
            .map(|c| &c.client_id)
            .collect()
    }
}

/// Cumulative harvest metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestMetrics {
    /// Completed cycles
    pub cycles: u64,
    /// Cycles aborted (trend store or client directory unavailable)
    pub failed_cycles: u64,
    /// Matches across all cycles
    pub matches: u64,
    /// Artifacts created or regenerated
    pub primed: u64,
    /// Matches whose artifact was already up to date
    pub unchanged: u64,
    /// Invalidated keys
    pub invalidated: u64,
    /// Client-cycles skipped as degraded
    pub degraded_clients: u64,
    /// Failed synthesis jobs
    pub failed_jobs: u64,
    /// Artifacts purged past their grace window
    pub purged: u64,
    /// Start of the last completed cycle
    pub last_cycle_at: Option<u64>,
}

impl HarvestMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed cycle into the totals
    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.purged += report.purged as u64;
        self.last_cycle_at = Some(report.started_at);
        for client in &report.clients {
            self.matches += client.matches as u64;
            self.primed += client.primed as u64;
            self.unchanged += client.unchanged as u64;
            self.invalidated += client.invalidated as u64;
            self.failed_jobs += client.failed as u64;
            if client.is_degraded() {
                self.degraded_clients += 1;
            }
        }
    }

    /// Record an aborted cycle
    pub fn record_failure(&mut self) {
        self.failed_cycles += 1;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let lines = [
            "Harvest Metrics Summary".to_string(),
            "=======================".to_string(),
            format!("Cycles: {} ({} failed)", self.cycles, self.failed_cycles),
            format!("Matches: {}", self.matches),
            format!("Primed: {}", self.primed),
            format!("Unchanged: {}", self.unchanged),
            format!("Invalidated: {}", self.invalidated),
            format!("Purged: {}", self.purged),
            format!("Degraded client-cycles: {}", self.degraded_clients),
            format!("Failed jobs: {}", self.failed_jobs),
        ];
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle() {
        let mut ok = ClientReport::new(ClientId::new("a"));
        ok.matches = 3;
        ok.primed = 2;
        ok.unchanged = 1;
        let report = CycleReport {
            started_at: 42,
            active_trends: 5,
            clients: vec![ok, ClientReport::degraded(ClientId::new("b"), "backend down")],
            purged: 1,
            duration_ms: 7,
        };

        let mut metrics = HarvestMetrics::new();
        metrics.record_cycle(&report);
        assert_eq!(metrics.cycles, 1);
        assert_eq!(metrics.primed, 2);
        assert_eq!(metrics.degraded_clients, 1);
        assert_eq!(metrics.last_cycle_at, Some(42));
        assert_eq!(report.degraded(), vec![&ClientId::new("b")]);
        assert!(metrics.summary().contains("Primed: 2"));
    }

    #[test]
    fn test_client_report_serializes_status() {
        let report = ClientReport::degraded(ClientId::new("b"), "backend down");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "backend down");
        assert_eq!(json["client_id"], "b");
    }
}
