//! CSV export of billed readings.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::reading::Reading;
use crate::tariff::Tariff;

/// Fixed leading columns; one `Rate`/`Cost` pair per tariff follows.
const HEADER: &str = "Account Number,Meter Number,Day,Hour of Day,Timestamp,\
                      Hourly Total,Daily Cumulative,Daily Total,Unit of Measurement";

/// Header row for the given tariffs, in tariff order.
pub fn header(tariffs: &[Tariff]) -> Vec<String> {
    HEADER
        .split(',')
        .map(|h| h.trim().to_string())
        .chain(
            tariffs
                .iter()
                .flat_map(|t| [format!("{} Rate", t.name()), format!("{} Cost", t.name())]),
        )
        .collect()
}

/// Exports billed readings to a CSV file at the given path.
///
/// # Arguments
///
/// * `readings` - Output of a billing run
/// * `tariffs` - The tariffs the run used, in column order
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(readings: &[Reading], tariffs: &[Tariff], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(readings, tariffs, buf)?;
    tracing::info!(rows = readings.len(), path = %path.display(), "billed readings written");
    Ok(())
}

/// Writes billed readings as CSV to any writer.
///
/// Day and hour are rendered in the reading's own zone in the layout the
/// utility uses; `Timestamp` is RFC 3339. A tariff with no matching tier
/// gets an empty `Rate` and a zero `Cost`.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(readings: &[Reading], tariffs: &[Tariff], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(header(tariffs))?;

    for r in readings {
        let mut row = vec![
            r.account.clone(),
            r.meter.clone(),
            r.timestamp.format("%m/%d/%Y").to_string(),
            r.timestamp.format("%-I:%M %p").to_string(),
            r.timestamp.to_rfc3339(),
            r.hourly_usage.to_string(),
            r.daily_cumulative.to_string(),
            r.daily_total.map(|d| d.to_string()).unwrap_or_default(),
            r.unit.clone(),
        ];
        for tariff in tariffs {
            let charge = r.charge_for(tariff.name());
            row.push(
                charge
                    .and_then(|c| c.tier.clone())
                    .unwrap_or_default(),
            );
            row.push(charge.map(|c| c.cost.to_string()).unwrap_or_else(|| "0".to_string()));
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
