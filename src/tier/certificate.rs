use std::fmt::{self, Write};

use crate::tier::tier_model::{ComplianceTier, KernelFootprint};

/// Footprint, tier and guarantees of one compiled kernel.
/// * Building one has no effect on the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ComplianceCertificate {
    pub kernel_name: String,
    pub footprint: KernelFootprint,
    pub tier: ComplianceTier,
    pub guaranteed_latency_ns: f64,
    pub guaranteed_throughput_ops_sec: f64,
    /// `YYYY-MM-DD HH:MM:SS`, local time.
    pub timestamp: String,
}

impl ComplianceCertificate {
    pub fn new(kernel_name: impl Into<String>, footprint: KernelFootprint, tier: ComplianceTier) -> Self {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self::with_timestamp(kernel_name, footprint, tier, timestamp)
    }

    pub fn with_timestamp(
        kernel_name: impl Into<String>,
        footprint: KernelFootprint,
        tier: ComplianceTier,
        timestamp: String,
    ) -> Self {
        let spec = tier.spec();
        Self {
            kernel_name: kernel_name.into(),
            footprint,
            tier,
            guaranteed_latency_ns: spec.max_latency_ns,
            guaranteed_throughput_ops_sec: spec.min_throughput_ops_sec,
            timestamp,
        }
    }

    pub fn throughput_mops(&self) -> f64 {
        self.guaranteed_throughput_ops_sec / 1e6
    }

    /// Text form with `prefix` in front of every line.
    pub fn render_with_prefix(&self, prefix: &str) -> String {
        let mut out = String::new();
        let mut line = |text: String| {
            let _ = writeln!(out, "{prefix}{text}");
        };
        line("7T Compliance Certificate".into());
        line(format!("Kernel: {}", self.kernel_name));
        line(format!("Footprint: {:.2} KB", self.footprint.total_kb));
        for (name, kb) in self.footprint.slabs() {
            line(format!("  {name}: {kb:.2} KB"));
        }
        line(format!("Tier: {}", self.tier));
        line(format!("Guaranteed latency: {:.0} ns", self.guaranteed_latency_ns));
        line(format!("Guaranteed throughput: {:.0} M ops/sec", self.throughput_mops()));
        line(format!("Timestamp: {}", self.timestamp));
        out
    }

    pub fn render(&self) -> String {
        self.render_with_prefix("")
    }
}

impl fmt::Display for ComplianceCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
