use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result};

use crate::ranking::RankingRecord;

const HEADER: [&str; 7] = [
    "tower_id",
    "police",
    "fire_station",
    "hospital",
    "weighted_population",
    "unweighted_population",
    "score",
];

/// Write ranking records to a CSV file at `path`.
pub fn write_ranking(records: &[RankingRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create ranking output {}", path.display()))?;
    write_into(records, csv::Writer::from_writer(file))
}

/// Render ranking records as a CSV string.
pub fn ranking_to_string(records: &[RankingRecord]) -> Result<String> {
    let mut buf = Vec::new();
    write_into(records, csv::Writer::from_writer(&mut buf))?;
    String::from_utf8(buf).context("ranking CSV was not valid UTF-8")
}

fn write_into<W: Write>(records: &[RankingRecord], mut writer: csv::Writer<W>) -> Result<()> {
    writer.write_record(HEADER)?;
    for record in records {
        // Two-decimal output for the real-valued columns; full precision
        // stays inside the records themselves.
        writer.write_record([
            record.tower_id.as_str(),
            &record.police.to_string(),
            &record.fire_station.to_string(),
            &record.hospital.to_string(),
            &format!("{:.2}", record.weighted_population),
            &record.unweighted_population.to_string(),
            &format!("{:.2}", record.score),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TowerId;

    fn sample() -> Vec<RankingRecord> {
        vec![
            RankingRecord {
                tower_id: TowerId::new("001-AAAA"),
                police: 2,
                fire_station: 1,
                hospital: 0,
                weighted_population: 1000.0,
                unweighted_population: 1200,
                score: 20.5,
            },
            RankingRecord {
                tower_id: TowerId::new("002-BBBB"),
                police: 0,
                fire_station: 0,
                hospital: 0,
                weighted_population: 0.0,
                unweighted_population: 0,
                score: 0.0,
            },
        ]
    }

    #[test]
    fn renders_header_and_two_decimal_columns() {
        let csv = ranking_to_string(&sample()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("tower_id,police,fire_station,hospital,weighted_population,unweighted_population,score")
        );
        assert_eq!(lines.next(), Some("001-AAAA,2,1,0,1000.00,1200,20.50"));
        assert_eq!(lines.next(), Some("002-BBBB,0,0,0,0.00,0,0.00"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn writes_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.csv");
        write_ranking(&sample(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("tower_id,"));
        assert_eq!(text.lines().count(), 3);
    }
}
