//! Plain-text utilization report.
//!
//! Renders a published snapshot in the fixed format consumed by operators:
//!
//! ```text
//! Utilized[0-50]: 12 5630
//! ...
//! Utilized[460-512]: 803 1021
//! Last Scan Time: 1718035200.37s
//! Last Scan Duration: 41.02s
//! ```

use std::fmt::Write as FmtWrite;
use std::time::Duration;

use crate::scan::{bucket_range, ScanGeometry};
use crate::snapshot::Snapshot;

/// Renders `snapshot` as the utilization report.
pub fn render_report(snapshot: &Snapshot, geometry: &ScanGeometry) -> String {
    let mut out = String::new();

    for (i, bucket) in snapshot.buckets.iter().enumerate() {
        let (start, end) = bucket_range(geometry, i);
        writeln!(
            out,
            "Utilized[{}-{}]: {} {}",
            start, end, bucket.blocks, bucket.zero_pages
        )
        .ok();
    }

    writeln!(
        out,
        "Last Scan Time: {}s",
        format_hundredths(snapshot.last_scan_time)
    )
    .ok();
    writeln!(
        out,
        "Last Scan Duration: {}s",
        format_hundredths(snapshot.last_scan_duration)
    )
    .ok();

    out
}

/// `<seconds>.<hundredths>`, truncated rather than rounded.
pub fn format_hundredths(d: Duration) -> String {
    format!("{}.{:02}", d.as_secs(), d.subsec_nanos() / 10_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Bucket;

    #[test]
    fn test_format_hundredths() {
        assert_eq!(format_hundredths(Duration::ZERO), "0.00");
        assert_eq!(format_hundredths(Duration::from_millis(1_050)), "1.05");
        assert_eq!(format_hundredths(Duration::from_millis(9_999)), "9.99");
        assert_eq!(format_hundredths(Duration::new(42, 7_000_000)), "42.00");
    }

    #[test]
    fn test_render_small_geometry() {
        let geometry = ScanGeometry::new(8, 4, 256);
        let snapshot = Snapshot {
            buckets: vec![
                Bucket::default(),
                Bucket { blocks: 1, zero_pages: 6 },
                Bucket::default(),
                Bucket { blocks: 2, zero_pages: 2 },
            ],
            last_scan_time: Duration::from_millis(1_500_250),
            last_scan_duration: Duration::from_millis(3_070),
            sweeps: 4,
        };

        let expected = "\
Utilized[0-1]: 0 0
Utilized[2-3]: 1 6
Utilized[4-5]: 0 0
Utilized[6-8]: 2 2
Last Scan Time: 1500.25s
Last Scan Duration: 3.07s
";
        assert_eq!(render_report(&snapshot, &geometry), expected);
    }

    #[test]
    fn test_render_default_geometry_ranges() {
        let geometry = ScanGeometry::default();
        let report = render_report(&Snapshot::empty(10), &geometry);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "Utilized[0-50]: 0 0");
        assert_eq!(lines[1], "Utilized[51-101]: 0 0");
        assert_eq!(lines[9], "Utilized[460-512]: 0 0");
        assert_eq!(lines[10], "Last Scan Time: 0.00s");
        assert_eq!(lines[11], "Last Scan Duration: 0.00s");
    }
}
