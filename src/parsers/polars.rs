// Polar table ingestion: accepted input shapes, validation and pivoting.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{PlanningError, Result};

/// One long-form polar observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarSample {
    /// True wind angle (degrees)
    pub angle: f64,
    /// True wind speed (knots)
    pub wind_speed: f64,
    /// Boat speed (knots)
    pub boat_speed: f64,
}

/// The shapes the registry accepts for a boat's polar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolarInput {
    /// Pre-pivoted table, `speeds[angle_idx][wind_speed_idx]`
    Grid {
        angles: Vec<f64>,
        wind_speeds: Vec<f64>,
        speeds: Vec<Vec<f64>>,
    },
    /// Angle / wind speed / boat speed triples, pivoted on load
    LongForm(Vec<PolarSample>),
}

/// A validated, pivoted polar table. Missing cells are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolarTable {
    /// True Wind Angles (degrees), strictly ascending
    pub angles: Vec<f64>,
    /// True Wind Speeds (knots), strictly ascending
    pub wind_speeds: Vec<f64>,
    /// Boat speeds in knots: speeds[angle_idx][wind_speed_idx]
    pub speeds: Vec<Vec<f64>>,
}

impl PolarTable {
    pub fn from_input(input: PolarInput) -> Result<Self> {
        match input {
            PolarInput::Grid { angles, wind_speeds, speeds } => {
                Self::from_grid(angles, wind_speeds, speeds)
            }
            PolarInput::LongForm(samples) => Self::pivot(&samples),
        }
    }

    fn from_grid(angles: Vec<f64>, wind_speeds: Vec<f64>, speeds: Vec<Vec<f64>>) -> Result<Self> {
        check_axis("angle", &angles)?;
        check_axis("wind speed", &wind_speeds)?;
        if speeds.len() != angles.len() {
            return Err(PlanningError::DataFormat(format!(
                "expected {} angle rows, found {}",
                angles.len(),
                speeds.len()
            )));
        }
        if let Some((i, row)) = speeds.iter().enumerate().find(|(_, r)| r.len() != wind_speeds.len()) {
            return Err(PlanningError::DataFormat(format!(
                "row for angle {} has {} cells, expected {}",
                angles[i],
                row.len(),
                wind_speeds.len()
            )));
        }
        Ok(Self { angles, wind_speeds, speeds })
    }

    fn pivot(samples: &[PolarSample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(PlanningError::DataFormat("no polar samples".into()));
        }
        if samples.iter().any(|s| !s.angle.is_finite() || !s.wind_speed.is_finite()) {
            return Err(PlanningError::DataFormat("non-finite angle or wind speed".into()));
        }

        let mut angles: Vec<f64> = samples.iter().map(|s| s.angle).collect();
        let mut wind_speeds: Vec<f64> = samples.iter().map(|s| s.wind_speed).collect();
        angles.sort_by(f64::total_cmp);
        angles.dedup();
        wind_speeds.sort_by(f64::total_cmp);
        wind_speeds.dedup();

        // Keyed by (angle_idx, wind_speed_idx)
        let mut cells: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for s in samples {
            let a = axis_index(&angles, s.angle);
            let w = axis_index(&wind_speeds, s.wind_speed);
            if cells.insert((a, w), s.boat_speed).is_some() {
                return Err(PlanningError::DataFormat(format!(
                    "duplicate cell at angle {} / wind speed {}",
                    s.angle, s.wind_speed
                )));
            }
        }

        let speeds = (0..angles.len())
            .map(|a| {
                (0..wind_speeds.len())
                    .map(|w| cells.get(&(a, w)).copied().unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();

        Ok(Self { angles, wind_speeds, speeds })
    }
}

fn axis_index(axis: &[f64], value: f64) -> usize {
    axis.partition_point(|v| *v < value)
}

fn check_axis(name: &str, axis: &[f64]) -> Result<()> {
    if axis.is_empty() {
        return Err(PlanningError::DataFormat(format!("empty {} axis", name)));
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(PlanningError::DataFormat(format!("non-finite value on {} axis", name)));
    }
    if axis.windows(2).any(|w| w[1] <= w[0]) {
        return Err(PlanningError::DataFormat(format!("{} axis is not strictly ascending", name)));
    }
    Ok(())
}

impl PolarInput {
    /// Parses a polar CSV: header `twa/tws,6,8,...`, then one row per angle.
    /// Comma, semicolon and tab separators are accepted; empty cells become NaN.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| PlanningError::DataFormat("empty polar CSV".into()))?;
        let wind_speeds = split_row(header)
            .skip(1)
            .map(|v| parse_cell(v, "wind speed"))
            .collect::<Result<Vec<f64>>>()?;

        let mut angles = Vec::new();
        let mut speeds = Vec::new();
        for line in lines {
            let mut parts = split_row(line);
            let angle = parse_cell(parts.next().unwrap_or(""), "angle")?;
            let row = parts
                .map(|v| if v.is_empty() { Ok(f64::NAN) } else { parse_cell(v, "boat speed") })
                .collect::<Result<Vec<f64>>>()?;
            angles.push(angle);
            speeds.push(row);
        }

        Ok(PolarInput::Grid { angles, wind_speeds, speeds })
    }

    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Loading polar data from CSV: {:?}", path.as_ref());
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            PlanningError::DataFormat(format!("unable to read {:?}: {}", path.as_ref(), e))
        })?;
        Self::from_csv_str(&text)
    }
}

fn split_row(line: &str) -> impl Iterator<Item = &str> {
    line.split([',', ';', '\t']).map(str::trim)
}

fn parse_cell(value: &str, what: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| PlanningError::DataFormat(format!("invalid {} value {:?}", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_validation() {
        let ok = PolarTable::from_input(PolarInput::Grid {
            angles: vec![0.0, 90.0, 180.0],
            wind_speeds: vec![6.0, 12.0],
            speeds: vec![vec![0.0, 0.0], vec![5.0, 7.0], vec![0.0, 0.0]],
        });
        assert!(ok.is_ok());

        let ragged = PolarTable::from_input(PolarInput::Grid {
            angles: vec![0.0, 90.0],
            wind_speeds: vec![6.0, 12.0],
            speeds: vec![vec![0.0, 0.0], vec![5.0]],
        });
        assert!(matches!(ragged, Err(PlanningError::DataFormat(_))));

        let unsorted = PolarTable::from_input(PolarInput::Grid {
            angles: vec![90.0, 0.0],
            wind_speeds: vec![6.0],
            speeds: vec![vec![5.0], vec![0.0]],
        });
        assert!(matches!(unsorted, Err(PlanningError::DataFormat(_))));

        let empty = PolarTable::from_input(PolarInput::Grid {
            angles: vec![],
            wind_speeds: vec![6.0],
            speeds: vec![],
        });
        assert!(matches!(empty, Err(PlanningError::DataFormat(_))));
    }

    #[test]
    fn test_long_form_pivot() {
        let samples = vec![
            PolarSample { angle: 90.0, wind_speed: 12.0, boat_speed: 7.0 },
            PolarSample { angle: 0.0, wind_speed: 6.0, boat_speed: 0.0 },
            PolarSample { angle: 90.0, wind_speed: 6.0, boat_speed: 5.0 },
        ];
        let table = PolarTable::from_input(PolarInput::LongForm(samples)).unwrap();
        assert_eq!(table.angles, vec![0.0, 90.0]);
        assert_eq!(table.wind_speeds, vec![6.0, 12.0]);
        assert_eq!(table.speeds[1], vec![5.0, 7.0]);
        assert_eq!(table.speeds[0][0], 0.0);
        // (0, 12) was never supplied
        assert!(table.speeds[0][1].is_nan());
    }

    #[test]
    fn test_long_form_rejects_duplicates() {
        let samples = vec![
            PolarSample { angle: 90.0, wind_speed: 6.0, boat_speed: 5.0 },
            PolarSample { angle: 90.0, wind_speed: 6.0, boat_speed: 5.5 },
        ];
        assert!(matches!(
            PolarTable::from_input(PolarInput::LongForm(samples)),
            Err(PlanningError::DataFormat(_))
        ));
        assert!(PolarTable::from_input(PolarInput::LongForm(vec![])).is_err());
    }

    #[test]
    fn test_csv_parsing() {
        let csv = "twa/tws,6,12\n0,0,0\n45;4.5;6.1\n90,5.5,\n\n180\t0\t0\n";
        let input = PolarInput::from_csv_str(csv).unwrap();
        let table = PolarTable::from_input(input).unwrap();
        assert_eq!(table.angles, vec![0.0, 45.0, 90.0, 180.0]);
        assert_eq!(table.wind_speeds, vec![6.0, 12.0]);
        assert_eq!(table.speeds[1], vec![4.5, 6.1]);
        assert!(table.speeds[2][1].is_nan());

        assert!(PolarInput::from_csv_str("").is_err());
        assert!(PolarInput::from_csv_str("twa/tws,6\nabc,1").is_err());
    }
}
