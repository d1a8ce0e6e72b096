//! CSV export of hourly profiles and JSON export of full results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExportError;
use crate::pue::PueProfile;
use crate::resource::ResourceSeries;

/// Column header for the hourly PUE export.
const PUE_HEADER: &str = "timestamp,outdoor_temp_c,pue_factor,it_load_kw,total_facility_load_kw";

/// Column header for the hourly resource export.
const RESOURCE_HEADER: &str =
    "timestamp,irradiance_w_m2,wind_speed_m_s,hydro_availability,temperature_c";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";

fn create(path: &Path) -> io::Result<io::BufWriter<File>> {
    Ok(io::BufWriter::new(File::create(path)?))
}

/// Exports the hourly PUE forecast to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `ExportError` if file creation or writing fails.
pub fn export_pue_csv(profile: &PueProfile, path: &Path) -> Result<(), ExportError> {
    write_pue_csv(profile, create(path)?)
}

/// Writes the hourly PUE forecast as CSV to any writer.
///
/// One header row, then one row per hour. Output is deterministic for
/// identical inputs.
///
/// # Errors
///
/// Returns an `ExportError` if writing fails.
pub fn write_pue_csv(profile: &PueProfile, writer: impl Write) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(PUE_HEADER.split(','))?;
    for h in &profile.hourly {
        wtr.write_record(&[
            h.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.2}", h.outdoor_temp_c),
            format!("{:.4}", h.pue_factor),
            format!("{:.3}", h.it_load_kw),
            format!("{:.3}", h.total_facility_load_kw),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the hourly resource series to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `ExportError` if file creation or writing fails.
pub fn export_resource_csv(series: &ResourceSeries, path: &Path) -> Result<(), ExportError> {
    write_resource_csv(series, create(path)?)
}

/// Writes the hourly resource series as CSV to any writer.
///
/// # Errors
///
/// Returns an `ExportError` if writing fails.
pub fn write_resource_csv(series: &ResourceSeries, writer: impl Write) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(RESOURCE_HEADER.split(','))?;
    for r in &series.records {
        wtr.write_record(&[
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.2}", r.irradiance_w_m2),
            format!("{:.3}", r.wind_speed_m_s),
            format!("{:.4}", r.hydro_availability),
            format!("{:.2}", r.temperature_c),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `value` as pretty-printed JSON to a file.
///
/// # Errors
///
/// Returns an `ExportError` if the file cannot be written or serialization fails.
pub fn export_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ExportError> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, value)?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{CapacityPlan, PlanStatus};
    use crate::pue::PuePredictor;
    use crate::request::{Coordinates, DateRange, LoadProfile};
    use crate::resource::{ChannelProvenance, Provenance, synthetic};
    use chrono::NaiveDate;

    fn series(days: u32) -> ResourceSeries {
        let coordinates = Coordinates {
            latitude: 37.77,
            longitude: -122.42,
        };
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let range = DateRange {
            start_date: start,
            end_date: start + chrono::Days::new(u64::from(days) - 1),
        };
        ResourceSeries {
            coordinates,
            range,
            provenance: ChannelProvenance::all(Provenance::Synthetic),
            source: "synthetic".into(),
            records: synthetic::synthesize(&coordinates, &range),
        }
    }

    fn profile(s: &ResourceSeries) -> PueProfile {
        let load = LoadProfile {
            average_kw: 1000.0,
            peak_kw: 1200.0,
            current_pue: 1.5,
        };
        let plan = CapacityPlan {
            solar_kw: 0.0,
            wind_kw: 0.0,
            battery_kwh: 0.0,
            renewable_fraction: 0.0,
            total_cost_usd: 0.0,
            status: PlanStatus::ZeroBuild,
        };
        PuePredictor::default().predict(s, &load, &plan).unwrap()
    }

    #[test]
    fn pue_header_and_row_count() {
        let s = series(2);
        let mut buf = Vec::new();
        write_pue_csv(&profile(&s), &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], PUE_HEADER);
        // 1 header + 48 hourly rows
        assert_eq!(lines.len(), 49);
        assert!(lines[1].starts_with("2023-06-01T00:00,"));
    }

    #[test]
    fn resource_rows_parse_as_numbers() {
        let s = series(1);
        let mut buf = Vec::new();
        write_resource_csv(&s, &mut buf).unwrap();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        assert_eq!(rdr.headers().unwrap().len(), 5);
        let mut rows = 0;
        for record in rdr.records() {
            let rec = record.unwrap();
            for i in 1..5 {
                assert!(rec[i].parse::<f64>().is_ok(), "column {i} should parse as f64");
            }
            rows += 1;
        }
        assert_eq!(rows, 24);
    }

    #[test]
    fn deterministic_output() {
        let s = series(1);
        let (mut a, mut b) = (Vec::new(), Vec::new());
        write_resource_csv(&s, &mut a).unwrap();
        write_resource_csv(&s, &mut b).unwrap();
        assert_eq!(a, b);
    }
}
