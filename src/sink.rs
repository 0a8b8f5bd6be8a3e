use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::analysis::{PriceCurve, Summary};

pub const DISTRIBUTION_HEADER: [&str; 6] = ["premium_count", "p5", "p25", "p50", "p75", "p95"];
pub const PRICE_CURVE_HEADER: [&str; 3] = ["budget", "average_points", "samples"];

pub trait ResultSink {
    fn write_header(&mut self, header: &[&str]) -> io::Result<()>;
    fn write_row(&mut self, row: &[String]) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

/// Rows must match the header width.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> CsvSink<W> {
        CsvSink { writer: csv::Writer::from_writer(out) }
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

impl CsvSink<File> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<CsvSink<File>> {
        Ok(CsvSink::new(File::create(path)?))
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn write_header(&mut self, header: &[&str]) -> io::Result<()> {
        self.writer.write_record(header).map_err(io::Error::from)
    }

    fn write_row(&mut self, row: &[String]) -> io::Result<()> {
        self.writer.write_record(row).map_err(io::Error::from)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One row per premium-count bucket; sparse buckets get empty percentile fields.
pub fn write_distribution(sink: &mut dyn ResultSink, summary: &Summary) -> io::Result<()> {
    sink.write_header(&DISTRIBUTION_HEADER)?;
    for (premium_count, percentiles) in summary {
        let mut row = vec![premium_count.to_string()];
        match percentiles {
            Some(p) => row.extend(p.to_array().iter().map(ToString::to_string)),
            None => row.extend(std::iter::repeat(String::new()).take(5)),
        }
        sink.write_row(&row)?;
    }
    sink.finish()
}

pub fn write_price_curve(sink: &mut dyn ResultSink, curve: &PriceCurve) -> io::Result<()> {
    sink.write_header(&PRICE_CURVE_HEADER)?;
    for (price, average) in curve.averages() {
        let row = [
            price.to_string(),
            format!("{average:.2}"),
            curve.points_at(price).len().to_string(),
        ];
        sink.write_row(&row)?;
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Percentiles, TierCounts};
    use crate::model::sample::SimulationSample;

    #[test]
    fn distribution_rows() {
        let mut summary = Summary::new();
        summary.insert(0, None);
        summary.insert(1, Some(Percentiles { p5: 1, p25: 2, p50: 3, p75: 4, p95: 5 }));

        let mut sink = CsvSink::new(Vec::new());
        write_distribution(&mut sink, &summary).unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(text, "premium_count,p5,p25,p50,p75,p95\n0,,,,,\n1,1,2,3,4,5\n");
    }

    #[test]
    fn price_curve_rows() {
        let sample = |price, points| SimulationSample {
            total_price: price,
            total_points: points,
            tiers: TierCounts::default(),
        };
        let mut curve = PriceCurve::default();
        curve.merge(&[sample(950, 10), sample(950, 15), sample(800, 7)]);

        let mut sink = CsvSink::new(Vec::new());
        write_price_curve(&mut sink, &curve).unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(text, "budget,average_points,samples\n800,7.00,1\n950,12.50,2\n");
    }

    #[test]
    fn mismatched_row_is_rejected() {
        let mut sink = CsvSink::new(Vec::new());
        sink.write_header(&["a", "b"]).unwrap();
        assert!(sink.write_row(&["1".to_string()]).is_err());
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_header(&["x"]).unwrap();
        sink.write_row(&["1".to_string()]).unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x\n1\n");
    }
}
