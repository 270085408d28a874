// Severity banding of the Omission Severity Score.
//
// A score of exactly 0 is the "no disclosure document" sentinel and maps to
// `NotAvailable`, which sits outside the ordinal ranking of the real bands.
use serde::{Serialize, Serializer};
use std::fmt;

/// Inclusive upper bounds of the first five bands; anything above is `Estrema`.
pub const BAND_UPPER_BOUNDS: [f64; 5] = [31.0, 62.0, 93.0, 124.0, 155.0];

/// Upper end of the OSS scale.
pub const MAX_OSS: f64 = 185.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    NotAvailable,
    Trasparente,
    Bassa,
    Moderata,
    Grave,
    Critica,
    Estrema,
}

impl Severity {
    /// All bands in display order, `NotAvailable` first.
    pub const ALL: [Severity; 7] = [
        Severity::NotAvailable,
        Severity::Trasparente,
        Severity::Bassa,
        Severity::Moderata,
        Severity::Grave,
        Severity::Critica,
        Severity::Estrema,
    ];

    pub fn from_score(score: f64) -> Self {
        if score == 0.0 {
            return Severity::NotAvailable;
        }
        const BANDS: [Severity; 5] = [
            Severity::Trasparente,
            Severity::Bassa,
            Severity::Moderata,
            Severity::Grave,
            Severity::Critica,
        ];
        BAND_UPPER_BOUNDS
            .iter()
            .zip(BANDS)
            .find(|(bound, _)| score <= **bound)
            .map(|(_, band)| band)
            .unwrap_or(Severity::Estrema)
    }

    /// Ordinal rank of a real band (1 = least severe); `None` for `NotAvailable`.
    pub fn rank(self) -> Option<u8> {
        match self {
            Severity::NotAvailable => None,
            Severity::Trasparente => Some(1),
            Severity::Bassa => Some(2),
            Severity::Moderata => Some(3),
            Severity::Grave => Some(4),
            Severity::Critica => Some(5),
            Severity::Estrema => Some(6),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::NotAvailable => "N/A",
            Severity::Trasparente => "Trasparente",
            Severity::Bassa => "Bassa",
            Severity::Moderata => "Moderata",
            Severity::Grave => "Grave",
            Severity::Critica => "Critica",
            Severity::Estrema => "Estrema",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Severity::ALL
            .into_iter()
            .find(|sev| sev.label().eq_ignore_ascii_case(s))
    }

    /// Chart color used by the dashboard for this band.
    pub fn color(self) -> &'static str {
        match self {
            Severity::NotAvailable => "#95a5a6",
            Severity::Trasparente => "#27ae60",
            Severity::Bassa => "#2980b9",
            Severity::Moderata => "#f1c40f",
            Severity::Grave => "#e67e22",
            Severity::Critica => "#e74c3c",
            Severity::Estrema => "#6c3483",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Severity::NotAvailable => "No disclosure document available.",
            Severity::Trasparente => "Minimal omissions. The company communicates almost everything.",
            Severity::Bassa => "Low omission level. Few gaps.",
            Severity::Moderata => "Moderate. Several important KPIs are missing.",
            Severity::Grave => "Severe. Significant omissions including essential KPIs.",
            Severity::Critica => "Critical. Fundamental and structural KPIs are missing.",
            Severity::Estrema => "Extreme. The company omits almost all critical areas.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub rank: Option<u8>,
    pub color: &'static str,
    pub description: &'static str,
}

/// Band-to-color mapping handed to the dashboard.
pub fn legend() -> Vec<LegendEntry> {
    Severity::ALL
        .into_iter()
        .map(|s| LegendEntry {
            label: s.label(),
            rank: s.rank(),
            color: s.color(),
            description: s.description(),
        })
        .collect()
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
