use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use crate::signal::{Flag, Header, HemoData};

pub const PRIMARY_DATA: &str = "PRIMARY DATA";
pub const DIFFERENTIALS: &str = "DIFFERENTIALS";
pub const DERIVATIVES: &str = "DERIVATIVES";
pub const FLAGS: &str = "Flags";

fn format_value(v: f64) -> String {
    format!("{v:.5}")
}

/// Write `data` in the sectioned export layout.
///
/// `PRIMARY DATA` (domain then channels), `DIFFERENTIALS` and `DERIVATIVES` for whatever is
/// cached, then `Flags` with one row per flagged header.
pub fn write_csv<W: Write>(data: &HemoData, out: W) -> Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(out);
    let x_name = data.x_header().map(Header::name).unwrap_or("X");

    writer.write_record([PRIMARY_DATA])?;
    let headers: Vec<&Header> = data.headers().collect();
    let mut columns = Vec::with_capacity(headers.len());
    for h in &headers {
        columns.push(data.y(h.name())?);
    }
    write_section(&mut writer, x_name, data.x(), &headers, &columns)?;

    let diff_headers = data.differential_headers();
    if !diff_headers.is_empty() {
        writer.write_record([DIFFERENTIALS])?;
        let mut columns = Vec::with_capacity(diff_headers.len());
        for h in &diff_headers {
            columns.push(data.differential(h.name())?);
        }
        write_section(&mut writer, x_name, data.x(), &diff_headers, &columns)?;
    }

    let deriv_headers = data.derivative_headers();
    if !deriv_headers.is_empty() {
        writer.write_record([DERIVATIVES])?;
        let mut columns = Vec::with_capacity(deriv_headers.len());
        for h in &deriv_headers {
            columns.push(data.derivative(h.name())?);
        }
        write_section(&mut writer, x_name, data.x(), &deriv_headers, &columns)?;
    }

    writer.write_record([FLAGS])?;
    let flagged = data
        .x_header()
        .into_iter()
        .map(|h| (h, data.x_flags()))
        .chain(headers.iter().map(|h| (*h, data.flags(h.name()).ok())));
    for (header, flags) in flagged {
        let Some(flags) = flags.filter(|f| !f.is_empty()) else {
            continue;
        };
        let mut row = vec![header.name().to_string()];
        row.extend(flags.iter().map(Flag::to_string));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_section<W: Write>(
    writer: &mut csv::Writer<W>,
    x_name: &str,
    x: &[f64],
    headers: &[&Header],
    columns: &[&[f64]],
) -> Result<()> {
    let mut names = vec![x_name.to_string()];
    names.extend(headers.iter().map(|h| h.name().to_string()));
    writer.write_record(&names)?;
    let rows = columns.iter().map(|c| c.len()).chain([x.len()]).max().unwrap_or(0);
    for i in 0..rows {
        let mut row = Vec::with_capacity(columns.len() + 1);
        row.push(x.get(i).map(|v| format_value(*v)).unwrap_or_default());
        row.extend(
            columns
                .iter()
                .map(|c| c.get(i).map(|v| format_value(*v)).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }
    Ok(())
}

pub fn write_csv_file(data: &HemoData, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_csv(data, file).with_context(|| format!("writing {}", path.display()))
}

/// Dump `data` to stdout in the export layout.
pub fn print_to_console(data: &HemoData) -> Result<()> {
    let stdout = std::io::stdout();
    write_csv(data, stdout.lock())
}

/// Load a store from CSV.
///
/// Files in the export layout are read section by section and their flags restored; cached
/// sections are skipped, since they can be recomputed. Any other file is read as a plain
/// table with one header row. `x_column` names the domain column (default: the first).
pub fn read_csv_store(path: &Path, x_column: Option<&str>) -> Result<HemoData> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record.with_context(|| format!("reading {}", path.display()))?);
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());

    let is_export = records
        .first()
        .and_then(|r| r.get(0))
        .is_some_and(|f| f.trim() == PRIMARY_DATA);
    let (table, flag_rows) = if is_export {
        split_export(&records[1..])
    } else {
        (records.as_slice(), &[][..])
    };
    let (header_row, rows) = table
        .split_first()
        .ok_or_else(|| anyhow!("{} has no header row", path.display()))?;
    let names: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();
    let x_idx = match x_column {
        Some(col) => names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(col))
            .ok_or_else(|| anyhow!("missing domain column '{col}' in {}", path.display()))?,
        None => 0,
    };

    let mut columns = vec![Vec::with_capacity(rows.len()); names.len()];
    for (line, row) in rows.iter().enumerate() {
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        for (col, values) in columns.iter_mut().enumerate() {
            let raw = row.get(col).map(str::trim).unwrap_or_default();
            let value = raw.parse::<f64>().with_context(|| {
                format!(
                    "parsing '{raw}' in column '{}' on data row {}",
                    names[col],
                    line + 1
                )
            })?;
            values.push(value);
        }
    }

    let flags = parse_flag_rows(flag_rows);
    let flags_for = |header: &str| -> BTreeSet<Flag> {
        flags
            .iter()
            .find(|(h, _)| h.eq_ignore_ascii_case(header))
            .map(|(_, f)| f.clone())
            .unwrap_or_default()
    };

    let mut data = HemoData::new(name, Some(path));
    let x_values = std::mem::take(&mut columns[x_idx]);
    data.set_x(names[x_idx].as_str(), x_values, flags_for(&names[x_idx]))
        .with_context(|| format!("domain column of {}", path.display()))?;
    for (col, values) in columns.into_iter().enumerate() {
        if col == x_idx {
            continue;
        }
        data.add_y(names[col].as_str(), values, flags_for(&names[col]))
            .with_context(|| format!("column '{}' of {}", names[col], path.display()))?;
    }
    Ok(data)
}

/// Primary table and flag rows of an export, past the `PRIMARY DATA` marker.
fn split_export(records: &[StringRecord]) -> (&[StringRecord], &[StringRecord]) {
    let is_marker = |r: &StringRecord, name: &str| r.len() == 1 && r.get(0) == Some(name);
    let table_end = records
        .iter()
        .position(|r| is_marker(r, DIFFERENTIALS) || is_marker(r, DERIVATIVES) || is_marker(r, FLAGS))
        .unwrap_or(records.len());
    let flags = records
        .iter()
        .position(|r| is_marker(r, FLAGS))
        .map(|i| &records[i + 1..])
        .unwrap_or(&[]);
    (&records[..table_end], flags)
}

fn parse_flag_rows(rows: &[StringRecord]) -> Vec<(String, BTreeSet<Flag>)> {
    rows.iter()
        .filter_map(|row| {
            let mut fields = row.iter();
            let header = fields.next()?.trim().to_string();
            let flags = fields
                .filter(|f| !f.trim().is_empty())
                .filter_map(|f| f.parse::<Flag>().ok())
                .collect();
            Some((header, flags))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalKind, Unit};

    fn sample() -> HemoData {
        let mut data = HemoData::new("export", None);
        data.set_x("Time", vec![0.0, 0.5, 1.0], [Flag::Unit(Unit::Seconds)])
            .unwrap();
        data.add_y(
            "Pressure",
            vec![10.0, 12.5, 11.0],
            [Flag::Unit(Unit::MmHg), Flag::Kind(SignalKind::Pressure)],
        )
        .unwrap();
        data.add_y("Flow", vec![0.1, 0.2, 0.3], []).unwrap();
        data
    }

    #[test]
    fn export_layout() {
        let mut data = sample();
        data.calculate_derivative("pressure", None).unwrap();
        let mut buf = Vec::new();
        write_csv(&data, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "PRIMARY DATA");
        assert_eq!(lines[1], "Time,Pressure,Flow");
        assert_eq!(lines[2], "0.00000,10.00000,0.10000");
        assert_eq!(lines[5], "DERIVATIVES");
        assert_eq!(lines[6], "Time,Pressure");
        assert_eq!(lines[7], "0.00000,5.00000");
        assert!(!text.contains("DIFFERENTIALS"));
        assert_eq!(lines[10], "Flags");
        assert_eq!(lines[11], "Time,s");
        assert_eq!(lines[12], "Pressure,mmHg,PRESSURE");
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn export_reads_back_with_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.csv");
        let mut data = sample();
        data.calculate_differential("flow").unwrap();
        write_csv_file(&data, &path).unwrap();
        let loaded = read_csv_store(&path, None).unwrap();
        assert_eq!(loaded.name(), "beat");
        assert_eq!(loaded.file_name(), Some("beat.csv"));
        assert_eq!(loaded.y("pressure").unwrap(), &[10.0, 12.5, 11.0]);
        assert_eq!(loaded.x_unit(), Some(Unit::Seconds));
        assert_eq!(loaded.kind_of("pressure"), Some(SignalKind::Pressure));
        assert!(!loaded.has_differential("flow"));
    }

    #[test]
    fn custom_flags_survive_export_even_when_named_like_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.csv");
        let mut data = sample();
        let custom = [Flag::Custom("s".into()), Flag::Custom("ms".into()), Flag::Custom("Pa".into())];
        data.add_flags("flow", custom.clone()).unwrap();
        write_csv_file(&data, &path).unwrap();
        let loaded = read_csv_store(&path, None).unwrap();
        for flag in &custom {
            assert!(loaded.has_flag("flow", flag), "missing {flag}");
        }
        assert_eq!(loaded.unit_of("flow"), None);
        assert_eq!(loaded.flags("flow").unwrap().len(), 3);
    }

    #[test]
    fn plain_tables_pick_the_domain_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.csv");
        std::fs::write(&path, "ecg,t,p\n0.1,0.0,90\n0.2,0.01,91\n0.3,0.02,92\n").unwrap();
        let data = read_csv_store(&path, Some("T")).unwrap();
        assert_eq!(data.x(), &[0.0, 0.01, 0.02]);
        let names: Vec<&str> = data.headers().map(Header::name).collect();
        assert_eq!(names, vec!["ecg", "p"]);
        assert!(read_csv_store(&path, Some("time")).is_err());
    }

    #[test]
    fn malformed_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "t,p\n0.0,1\n0.1,oops\n").unwrap();
        let err = read_csv_store(&path, None).unwrap_err();
        assert!(format!("{err:#}").contains("oops"));
    }
}
