//! Fixed dashboard panel layout.
//!
//! The layout is static data: each panel names the series it draws and
//! which of them it cannot do without. [`resolve_panels`] binds the layout to
//! the current window and skips any panel whose inputs are missing, leaving
//! the rest of the dashboard intact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::derive::{DerivedSeries, NetFlow};
use crate::error::Diagnostic;
use crate::table::SeriesTable;

const SOURCE: &str = "charts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    UsRates,
    CreditInflation,
    Commodities,
    KoreanEquities,
    AiTech,
    Comparison,
}

impl Section {
    pub fn title(&self) -> &'static str {
        match self {
            Self::UsRates => "US rates",
            Self::CreditInflation => "Credit & inflation expectations",
            Self::Commodities => "Commodities & inflation proxies",
            Self::KoreanEquities => "Korean equities (KOSPI & KOSDAQ)",
            Self::AiTech => "AI & tech infrastructure",
            Self::Comparison => "Z-score comparison",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Line,
    /// Line filled down to zero.
    Area,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Primary,
    Secondary,
}

/// Where a panel series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRef {
    Price(&'static str),
    Volume(&'static str),
    /// The 10Y - 3M spread.
    Spread,
    FlowDaily(&'static str),
    FlowCumulative(&'static str),
    /// Every normalized column.
    ZScores,
}

#[derive(Debug, Clone, Copy)]
pub struct PanelEntry {
    pub source: SeriesRef,
    pub mark: Mark,
    pub axis: Axis,
    /// The panel is skipped when a required series is missing.
    pub required: bool,
}

const fn entry(source: SeriesRef, mark: Mark, axis: Axis, required: bool) -> PanelEntry {
    PanelEntry {
        source,
        mark,
        axis,
        required,
    }
}

const fn line(name: &'static str) -> PanelEntry {
    entry(SeriesRef::Price(name), Mark::Line, Axis::Primary, false)
}

const fn line_required(name: &'static str) -> PanelEntry {
    entry(SeriesRef::Price(name), Mark::Line, Axis::Primary, true)
}

/// A panel definition.
#[derive(Debug, Clone, Copy)]
pub struct PanelSpec {
    pub id: &'static str,
    pub section: Section,
    pub title: &'static str,
    pub unit: &'static str,
    pub entries: &'static [PanelEntry],
    /// Draw a horizontal rule at zero.
    pub zero_line: bool,
}

pub const YIELD_SPREAD_LEGS: (&str, &str) = ("US_10Y_Yield", "US_3M_Yield");
pub const FLOW_SERIES: [&str; 2] = ["KOSPI_Foreign_Net", "KOSDAQ_Foreign_Net"];

const PANELS: &[PanelSpec] = &[
    PanelSpec {
        id: "yields",
        section: Section::UsRates,
        title: "Policy rate and treasury yields",
        unit: "%",
        entries: &[line("Fed_Funds"), line("US_10Y_Yield"), line("US_3M_Yield")],
        zero_line: false,
    },
    PanelSpec {
        id: "yield_spread",
        section: Section::UsRates,
        title: "Yield spread (10Y - 3M)",
        unit: "%p",
        entries: &[entry(SeriesRef::Spread, Mark::Area, Axis::Primary, true)],
        zero_line: true,
    },
    PanelSpec {
        id: "credit",
        section: Section::CreditInflation,
        title: "Credit bonds",
        unit: "USD",
        entries: &[line_required("High_Yield_Bond"), line("Inv_Grade_Bond")],
        zero_line: false,
    },
    PanelSpec {
        id: "breakeven",
        section: Section::CreditInflation,
        title: "10Y breakeven inflation",
        unit: "%",
        entries: &[line_required("10Y_Breakeven")],
        zero_line: false,
    },
    PanelSpec {
        id: "oil",
        section: Section::Commodities,
        title: "WTI crude oil",
        unit: "USD",
        entries: &[line_required("Crude_Oil")],
        zero_line: false,
    },
    PanelSpec {
        id: "copper",
        section: Section::Commodities,
        title: "Copper",
        unit: "USD",
        entries: &[line_required("Copper")],
        zero_line: false,
    },
    PanelSpec {
        id: "gold",
        section: Section::Commodities,
        title: "Gold",
        unit: "USD",
        entries: &[line_required("Gold")],
        zero_line: false,
    },
    PanelSpec {
        id: "tips",
        section: Section::Commodities,
        title: "TIPS ETF",
        unit: "USD",
        entries: &[line_required("TIPS_ETF")],
        zero_line: false,
    },
    PanelSpec {
        id: "kospi",
        section: Section::KoreanEquities,
        title: "KOSPI index and volume",
        unit: "pt",
        entries: &[
            line_required("KOSPI"),
            entry(SeriesRef::Volume("KOSPI"), Mark::Bar, Axis::Secondary, false),
        ],
        zero_line: false,
    },
    PanelSpec {
        id: "kospi_flow",
        section: Section::KoreanEquities,
        title: "KOSPI foreign net buy",
        unit: "KRW bn",
        entries: &[
            entry(SeriesRef::FlowDaily("KOSPI_Foreign_Net"), Mark::Bar, Axis::Primary, true),
            entry(SeriesRef::FlowCumulative("KOSPI_Foreign_Net"), Mark::Line, Axis::Secondary, true),
        ],
        zero_line: true,
    },
    PanelSpec {
        id: "kosdaq",
        section: Section::KoreanEquities,
        title: "KOSDAQ index and volume",
        unit: "pt",
        entries: &[
            line_required("KOSDAQ"),
            entry(SeriesRef::Volume("KOSDAQ"), Mark::Bar, Axis::Secondary, false),
        ],
        zero_line: false,
    },
    PanelSpec {
        id: "kosdaq_flow",
        section: Section::KoreanEquities,
        title: "KOSDAQ foreign net buy",
        unit: "KRW bn",
        entries: &[
            entry(SeriesRef::FlowDaily("KOSDAQ_Foreign_Net"), Mark::Bar, Axis::Primary, true),
            entry(SeriesRef::FlowCumulative("KOSDAQ_Foreign_Net"), Mark::Line, Axis::Secondary, true),
        ],
        zero_line: true,
    },
    PanelSpec {
        id: "semis",
        section: Section::AiTech,
        title: "Semiconductor ETF",
        unit: "USD",
        entries: &[line_required("Semiconductor_ETF")],
        zero_line: false,
    },
    PanelSpec {
        id: "cloud",
        section: Section::AiTech,
        title: "Cloud ETF",
        unit: "USD",
        entries: &[line_required("Cloud_ETF")],
        zero_line: false,
    },
    PanelSpec {
        id: "zscore",
        section: Section::Comparison,
        title: "Z-score comparison",
        unit: "sigma",
        entries: &[entry(SeriesRef::ZScores, Mark::Line, Axis::Primary, true)],
        zero_line: true,
    },
];

/// The panels in display order.
pub fn layout() -> &'static [PanelSpec] {
    PANELS
}

/// Summary of one plotted series over the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    /// `last - first`.
    pub change: f64,
}

impl SeriesStats {
    pub fn from_points(points: &[(NaiveDate, f64)]) -> Option<Self> {
        let (_, first) = *points.first()?;
        let (_, last) = *points.last()?;
        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| {
                (lo.min(*v), hi.max(*v))
            });
        Some(Self {
            first,
            last,
            min,
            max,
            change: last - first,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSeries {
    pub name: String,
    pub mark: Mark,
    pub axis: Axis,
    pub points: Vec<(NaiveDate, f64)>,
    pub stats: Option<SeriesStats>,
}

impl PanelSeries {
    fn new(name: String, mark: Mark, axis: Axis, points: Vec<(NaiveDate, f64)>) -> Self {
        let stats = SeriesStats::from_points(&points);
        Self {
            name,
            mark,
            axis,
            points,
            stats,
        }
    }
}

/// A panel bound to data, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub id: String,
    pub section: Section,
    pub title: String,
    pub unit: String,
    pub zero_line: bool,
    pub series: Vec<PanelSeries>,
}

/// Everything the layout can draw from.
#[derive(Debug, Clone, Copy)]
pub struct PanelInputs<'a> {
    pub prices: &'a SeriesTable,
    pub volumes: &'a SeriesTable,
    pub spread: &'a DerivedSeries,
    pub flows: &'a [NetFlow],
    pub zscores: Option<&'a SeriesTable>,
}

impl PanelInputs<'_> {
    /// Series for one reference; empty when the data is absent.
    fn lookup(&self, source: SeriesRef) -> Vec<(String, Vec<(NaiveDate, f64)>)> {
        let flow = |name: &str| self.flows.iter().find(|f| f.daily.name == name);
        let one = |s: &DerivedSeries| {
            if s.is_empty() {
                Vec::new()
            } else {
                vec![(s.name.clone(), s.points.clone())]
            }
        };
        let from_table = |table: &SeriesTable, name: &str| {
            let points = table.non_null(name);
            if points.is_empty() {
                Vec::new()
            } else {
                vec![(name.to_string(), points)]
            }
        };

        match source {
            SeriesRef::Price(name) => from_table(self.prices, name),
            SeriesRef::Volume(name) => from_table(self.volumes, name)
                .into_iter()
                .map(|(n, p)| (format!("{n} volume"), p))
                .collect(),
            SeriesRef::Spread => one(self.spread),
            SeriesRef::FlowDaily(name) => flow(name).map(|f| one(&f.daily)).unwrap_or_default(),
            SeriesRef::FlowCumulative(name) => {
                flow(name).map(|f| one(&f.cumulative)).unwrap_or_default()
            }
            SeriesRef::ZScores => match self.zscores {
                Some(table) => table
                    .column_names()
                    .into_iter()
                    .flat_map(|name| from_table(table, name))
                    .collect(),
                None => Vec::new(),
            },
        }
    }
}

fn describe(source: SeriesRef) -> String {
    match source {
        SeriesRef::Price(n) | SeriesRef::Volume(n) => n.to_string(),
        SeriesRef::Spread => format!("{} - {}", YIELD_SPREAD_LEGS.0, YIELD_SPREAD_LEGS.1),
        SeriesRef::FlowDaily(n) | SeriesRef::FlowCumulative(n) => n.to_string(),
        SeriesRef::ZScores => "z-scores".to_string(),
    }
}

/// Bind every panel of the layout to the inputs.
///
/// A panel is skipped when a required series is missing or when it ends up
/// with no series at all; each skip is reported as an info diagnostic.
pub fn resolve_panels(inputs: &PanelInputs<'_>) -> (Vec<Panel>, Vec<Diagnostic>) {
    let mut panels = Vec::new();
    let mut notes = Vec::new();

    'panels: for spec in layout() {
        let mut series = Vec::new();
        for e in spec.entries {
            let found = inputs.lookup(e.source);
            if found.is_empty() && e.required {
                tracing::debug!(panel = spec.id, missing = %describe(e.source), "panel skipped");
                notes.push(Diagnostic::info(
                    SOURCE,
                    format!("'{}' skipped: no data for {}", spec.title, describe(e.source)),
                ));
                continue 'panels;
            }
            series.extend(
                found
                    .into_iter()
                    .map(|(name, points)| PanelSeries::new(name, e.mark, e.axis, points)),
            );
        }

        if series.is_empty() {
            notes.push(Diagnostic::info(
                SOURCE,
                format!("'{}' skipped: no series in the selected period", spec.title),
            ));
            continue;
        }

        panels.push(Panel {
            id: spec.id.to_string(),
            section: spec.section,
            title: spec.title.to_string(),
            unit: spec.unit.to_string(),
            zero_line: spec.zero_line,
            series,
        });
    }

    (panels, notes)
}
