use crate::energy::DaySummary;
use crate::error::StoreError;
use crate::samples::{AggregateSample, StringSample};
use bigdecimal::BigDecimal;
use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use tempfile::Builder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    Written,
    /// The last row already belongs to this minute.
    DuplicateMinute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    Created,
    AlreadyExists,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn row_error(path: &Path, reason: impl ToString) -> StoreError {
    StoreError::Row {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(io_error(dir)),
        _ => Ok(()),
    }
}

/// Encodes every row up front so the file only ever sees whole records.
fn encode(path: &Path, rows: &[Vec<String>]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).map_err(csv_error(path))?;
    }
    writer
        .into_inner()
        .map_err(|e| io_error(path)(e.into_error()))
}

fn append_rows(path: &Path, rows: &[Vec<String>]) -> Result<(), StoreError> {
    let bytes = encode(path, rows)?;
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error(path))?;
    file.write_all(&bytes).map_err(io_error(path))
}

/// Writes `contents` beside `path` and renames it into place.
fn replace(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    publish(path, |tmp| fs::write(tmp, contents).map_err(io_error(tmp)))
}

fn temp_beside(path: &Path) -> Result<tempfile::NamedTempFile, StoreError> {
    ensure_parent(path)?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Builder::new()
        .prefix(".pvmon-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(io_error(dir))
}

/// Produces `path` through `write`, atomically replacing whatever was there.
///
/// `write` receives a temporary path with the same extension as `path`.
pub fn publish<E>(path: &Path, write: impl FnOnce(&Path) -> Result<(), E>) -> Result<(), E>
where
    E: From<StoreError>,
{
    let tmp = temp_beside(path)?;
    write(tmp.path())?;
    tmp.persist(path)
        .map_err(|e| io_error(path)(e.error))?;
    Ok(())
}

/// Like [`publish`], but never replaces an existing file.
pub fn publish_once<E>(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), E>,
) -> Result<Published, E>
where
    E: From<StoreError>,
{
    if path.exists() {
        return Ok(Published::AlreadyExists);
    }
    let tmp = temp_beside(path)?;
    write(tmp.path())?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(Published::Created),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Published::AlreadyExists),
        Err(e) => Err(io_error(path)(e.error).into()),
    }
}

/// Removes a published file; one that is already gone is fine.
pub fn withdraw(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path)(e)),
    }
}

/// Appends one aggregate row, unless the file's last row is already from the same minute.
pub fn append_sample(
    path: &Path,
    timestamp: &Zoned,
    watts: &BigDecimal,
) -> Result<Appended, StoreError> {
    let previous = read_samples(path, timestamp.time_zone())?;
    if previous.last().is_some_and(|last| same_minute(&last.timestamp, timestamp)) {
        return Ok(Appended::DuplicateMinute);
    }
    append_rows(path, &[vec![iso(timestamp), watts.to_string()]])?;
    Ok(Appended::Written)
}

fn same_minute(a: &Zoned, b: &Zoned) -> bool {
    a.date() == b.date() && a.hour() == b.hour() && a.minute() == b.minute()
}

/// Replaces the whole per-string file with `series`.
pub fn overwrite_string_series(path: &Path, series: &[StringSample]) -> Result<(), StoreError> {
    let rows: Vec<Vec<String>> = series
        .iter()
        .map(|s| {
            vec![
                iso(&s.timestamp),
                s.string1.to_string(),
                s.string2.to_string(),
            ]
        })
        .collect();
    let bytes = encode(path, &rows)?;
    replace(path, &bytes)
}

/// Appends the day's closing row: finalize time, kWh and peak watts.
pub fn append_summary(
    path: &Path,
    timestamp: &Zoned,
    summary: &DaySummary,
) -> Result<(), StoreError> {
    append_rows(
        path,
        &[vec![
            iso(timestamp),
            format!("{:.2}", summary.kwh),
            summary.peak_watts.to_string(),
        ]],
    )
}

/// Line the index document carries for one archived day.
pub fn index_entry(image_url: &str, day: &str) -> String {
    format!(r#"<p style="text-align:center;"><img src="{image_url}" alt="{day}"></p>"#)
}

/// Puts `entry` on the first line of the index document, keeping everything after it.
/// An entry that already heads the document is not added again.
pub fn update_index(path: &Path, entry: &str) -> Result<(), StoreError> {
    let previous = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_error(path)(e)),
    };
    if previous.lines().next() == Some(entry) {
        return Ok(());
    }
    let mut contents = String::with_capacity(entry.len() + 1 + previous.len());
    contents.push_str(entry);
    contents.push('\n');
    contents.push_str(&previous);
    replace(path, contents.as_bytes())
}

fn read_rows(path: &Path) -> Result<Vec<csv::StringRecord>, StoreError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(path)(e)),
    };
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(file)
        .into_records()
        .map(|r| r.map_err(csv_error(path)))
        .collect()
}

fn parse_timestamp(path: &Path, text: &str, tz: &TimeZone) -> Result<Zoned, StoreError> {
    Timestamp::from_str(text)
        .map(|ts| ts.to_zoned(tz.clone()))
        .map_err(|e| row_error(path, format!("timestamp {text:?}: {e}")))
}

fn field<'r>(path: &Path, record: &'r csv::StringRecord, i: usize) -> Result<&'r str, StoreError> {
    record
        .get(i)
        .ok_or_else(|| row_error(path, format!("expected {} fields, got {}", i + 1, record.len())))
}

/// Every aggregate sample recorded in `path`; a missing file is an empty day.
pub fn read_samples(path: &Path, tz: &TimeZone) -> Result<Vec<AggregateSample>, StoreError> {
    read_rows(path)?
        .iter()
        .map(|record| -> Result<AggregateSample, StoreError> {
            let timestamp = parse_timestamp(path, field(path, record, 0)?, tz)?;
            let raw = field(path, record, 1)?;
            let watts = BigDecimal::from_str(raw)
                .map_err(|e| row_error(path, format!("watts {raw:?}: {e}")))?;
            Ok(AggregateSample { timestamp, watts })
        })
        .collect()
}

pub fn read_string_series(path: &Path, tz: &TimeZone) -> Result<Vec<StringSample>, StoreError> {
    let int = |record: &csv::StringRecord, i: usize| -> Result<i64, StoreError> {
        let raw = field(path, record, i)?;
        raw.parse()
            .map_err(|e| row_error(path, format!("watts {raw:?}: {e}")))
    };
    read_rows(path)?
        .iter()
        .map(|record| -> Result<StringSample, StoreError> {
            Ok(StringSample {
                timestamp: parse_timestamp(path, field(path, record, 0)?, tz)?,
                string1: int(record, 1)?,
                string2: int(record, 2)?,
            })
        })
        .collect()
}

fn iso(z: &Zoned) -> String {
    crate::clock::iso(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::ToSpan;
    use jiff::civil::date;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn london() -> TimeZone {
        TimeZone::get("Europe/London").unwrap()
    }

    fn at(hour: i8, minute: i8, second: i8) -> Zoned {
        date(2021, 6, 21)
            .at(hour, minute, second, 0)
            .to_zoned(london())
            .unwrap()
    }

    #[test]
    fn append_sample_creates_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/2021-06-21.csv");

        assert_eq!(
            append_sample(&path, &at(10, 0, 0), &BigDecimal::from(2873)).unwrap(),
            Appended::Written
        );
        assert_eq!(
            append_sample(&path, &at(10, 1, 0), &BigDecimal::from_str("12.5").unwrap()).unwrap(),
            Appended::Written
        );

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "2021-06-21T10:00:00+01:00,2873\n2021-06-21T10:01:00+01:00,12.5\n"
        );
        let samples = read_samples(&path, &london()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, at(10, 1, 0));
    }

    #[test]
    fn same_minute_is_not_appended_twice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("day.csv");

        append_sample(&path, &at(10, 0, 5), &BigDecimal::from(100)).unwrap();
        assert_eq!(
            append_sample(&path, &at(10, 0, 48), &BigDecimal::from(200)).unwrap(),
            Appended::DuplicateMinute
        );
        assert_eq!(read_samples(&path, &london()).unwrap().len(), 1);
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempdir().unwrap();
        assert!(read_samples(&dir.path().join("nope.csv"), &london()).unwrap().is_empty());
        assert!(
            read_string_series(&dir.path().join("nope.csv"), &london())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn malformed_rows_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "yesterday,12\n").unwrap();
        assert!(matches!(
            read_samples(&path, &london()),
            Err(StoreError::Row { .. })
        ));
    }

    #[test]
    fn string_series_is_replaced_wholesale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("day-string.csv");
        let series = |n: i64| -> Vec<StringSample> {
            (0..n)
                .map(|i| StringSample {
                    timestamp: at(5, 0, 0).checked_add((i * 5).minutes()).unwrap(),
                    string1: 100 * i,
                    string2: 50 * i,
                })
                .collect()
        };

        overwrite_string_series(&path, &series(3)).unwrap();
        overwrite_string_series(&path, &series(5)).unwrap();

        let read = read_string_series(&path, &london()).unwrap();
        assert_eq!(read, series(5));
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn summary_row_has_two_decimal_kwh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dailytotals.csv");
        let summary = DaySummary {
            kwh: BigDecimal::from_str("12.5").unwrap(),
            peak_watts: BigDecimal::from(4120),
        };
        append_summary(&path, &at(21, 40, 0), &summary).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "2021-06-21T21:40:00+01:00,12.50,4120\n"
        );
    }

    #[test]
    fn index_keeps_newest_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.html");
        let days = ["2021-06-19", "2021-06-20", "2021-06-21"];
        for day in days {
            update_index(&path, &index_entry(&format!("/pvmon/data/{day}.png"), day)).unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"<p style="text-align:center;"><img src="/pvmon/data/2021-06-21.png" alt="2021-06-21"></p>"#,
                r#"<p style="text-align:center;"><img src="/pvmon/data/2021-06-20.png" alt="2021-06-20"></p>"#,
                r#"<p style="text-align:center;"><img src="/pvmon/data/2021-06-19.png" alt="2021-06-19"></p>"#,
            ]
        );
    }

    #[test]
    fn index_entry_is_added_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.html");
        let older = index_entry("/pvmon/data/2021-06-20.png", "2021-06-20");
        let entry = index_entry("/pvmon/data/2021-06-21.png", "2021-06-21");

        update_index(&path, &older).unwrap();
        update_index(&path, &entry).unwrap();
        update_index(&path, &entry).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![&entry[..], &older[..]]);
    }

    #[test]
    fn withdraw_tolerates_a_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2021-06-21.png");
        fs::write(&path, b"chart").unwrap();

        withdraw(&path).unwrap();
        assert!(!path.exists());
        withdraw(&path).unwrap();
    }

    #[test]
    fn publish_once_never_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2021-06-21.png");

        let first = publish_once(&path, |tmp| {
            assert_eq!(tmp.extension().unwrap(), "png");
            fs::write(tmp, b"first").map_err(io_error(tmp))
        })
        .unwrap();
        assert_eq!(first, Published::Created);

        let second = publish_once(&path, |tmp| fs::write(tmp, b"second").map_err(io_error(tmp)))
            .unwrap();
        assert_eq!(second, Published::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn publish_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("currentPwr.png");
        for body in [&b"one"[..], &b"two"[..]] {
            publish(&path, |tmp| fs::write(tmp, body).map_err(io_error(tmp))).unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn failed_write_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("currentPwr.png");
        fs::write(&path, b"old").unwrap();

        let result: Result<(), StoreError> =
            publish(&path, |tmp| Err(row_error(tmp, "render failed")));
        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
