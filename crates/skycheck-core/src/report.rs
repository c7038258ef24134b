//! Crossing categorization and the human-readable summary.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{AirspaceType, Crossing};

/// Report buckets, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Tma,
    Ras,
    ControlZone,
    Restricted,
    Prohibited,
    Danger,
    ClassA,
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::Tma,
        Bucket::Ras,
        Bucket::ControlZone,
        Bucket::Restricted,
        Bucket::Prohibited,
        Bucket::Danger,
        Bucket::ClassA,
        Bucket::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Tma => "TMAs",
            Bucket::Ras => "RAS",
            Bucket::ControlZone => "Control Zones",
            Bucket::Restricted => "Restricted",
            Bucket::Prohibited => "Prohibited",
            Bucket::Danger => "Danger",
            Bucket::ClassA => "Class A",
            Bucket::Other => "Other",
        }
    }

    /// Classify a crossing. Class A wins over the type tag so IFR-only
    /// volumes stand out regardless of their published type.
    pub fn for_crossing(crossing: &Crossing) -> Self {
        if crossing.airspace_class == Some('A') {
            return Bucket::ClassA;
        }
        match crossing.airspace_type {
            AirspaceType::Tma => Bucket::Tma,
            AirspaceType::Ras => Bucket::Ras,
            AirspaceType::Ctr => Bucket::ControlZone,
            AirspaceType::Restricted => Bucket::Restricted,
            AirspaceType::Prohibited => Bucket::Prohibited,
            AirspaceType::Danger | AirspaceType::DOther => Bucket::Danger,
            AirspaceType::Cta | AirspaceType::Other => Bucket::Other,
        }
    }
}

/// Crossings grouped into buckets, preserving the query ordering inside
/// each bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossingReport {
    pub buckets: Vec<(Bucket, Vec<Crossing>)>,
    pub total: usize,
    pub critical: usize,
}

impl CrossingReport {
    pub fn categorize(crossings: &[Crossing]) -> Self {
        let mut buckets: Vec<(Bucket, Vec<Crossing>)> =
            Bucket::ALL.iter().map(|b| (*b, Vec::new())).collect();
        for crossing in crossings {
            let bucket = Bucket::for_crossing(crossing);
            if let Some(entry) = buckets.iter_mut().find(|(b, _)| *b == bucket) {
                entry.1.push(crossing.clone());
            }
        }
        buckets.retain(|(_, list)| !list.is_empty());

        Self {
            total: crossings.len(),
            critical: crossings.iter().filter(|c| c.critical).count(),
            buckets,
        }
    }

    /// Render the formatted summary the CLI prints.
    pub fn to_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Airspace crossings: {}", self.total);
        if self.critical > 0 {
            let _ = writeln!(
                out,
                "CRITICAL: {} prohibited/restricted/Class-A volume(s) on the corridor",
                self.critical
            );
        }
        for (bucket, crossings) in &self.buckets {
            let _ = writeln!(out, "\n{} ({}):", bucket.label(), crossings.len());
            for c in crossings {
                let band = match (c.min_alt_ft, c.max_alt_ft) {
                    (Some(lo), Some(hi)) => format!("{:.0}-{:.0} ft", lo, hi),
                    (Some(lo), None) => format!("{:.0} ft-UNL", lo),
                    (None, Some(hi)) => format!("GND-{:.0} ft", hi),
                    (None, None) => "unpublished".to_string(),
                };
                let _ = writeln!(
                    out,
                    "  - {} ({}) {} class {} | {} | at {:.1} km",
                    c.name,
                    c.code_id,
                    c.airspace_type.as_str(),
                    c.airspace_class.map(String::from).unwrap_or_else(|| "-".into()),
                    band,
                    c.distance_km,
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossing(code: &str, airspace_type: AirspaceType, class: Option<char>) -> Crossing {
        Crossing {
            airspace_id: 1,
            code_id: code.into(),
            name: code.into(),
            airspace_type,
            airspace_class: class,
            min_alt_ft: Some(0.0),
            max_alt_ft: Some(2000.0),
            distance_km: 0.0,
            entry_alt_ft: 1000.0,
            exit_alt_ft: 1000.0,
            critical: matches!(
                airspace_type,
                AirspaceType::Prohibited | AirspaceType::Restricted
            ) || class == Some('A'),
        }
    }

    #[test]
    fn class_a_wins_over_type() {
        let c = crossing("LFTMA1", AirspaceType::Tma, Some('A'));
        assert_eq!(Bucket::for_crossing(&c), Bucket::ClassA);
    }

    #[test]
    fn buckets_follow_type_tags() {
        assert_eq!(
            Bucket::for_crossing(&crossing("LFR35", AirspaceType::Restricted, None)),
            Bucket::Restricted
        );
        assert_eq!(
            Bucket::for_crossing(&crossing("LFCTR", AirspaceType::Ctr, Some('D'))),
            Bucket::ControlZone
        );
    }

    #[test]
    fn report_counts_criticals() {
        let report = CrossingReport::categorize(&[
            crossing("LFP23", AirspaceType::Prohibited, None),
            crossing("LFTMA", AirspaceType::Tma, Some('E')),
        ]);
        assert_eq!(report.total, 2);
        assert_eq!(report.critical, 1);

        let summary = report.to_summary();
        assert!(summary.contains("CRITICAL"));
        assert!(summary.contains("Prohibited (1)"));
    }
}
