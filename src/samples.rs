use crate::types::{magnitude, Sample};

pub const CSV_HEADER: &str = "Time (s),Acceleration x (m/s^2),Acceleration y (m/s^2),Acceleration z (m/s^2),Absolute acceleration (m/s^2)";

/// Parse an exported accelerometer recording into samples.
///
/// The first line is a header and is skipped. Rows are tab-separated when they
/// contain a tab, comma-separated otherwise, and may quote their fields.
/// Rows whose time or axis readings are not finite numbers are dropped.
pub fn parse_samples(raw: &str) -> Vec<Sample> {
    raw.split('\n')
        .skip(1)
        .filter_map(parse_row)
        .collect()
}

fn parse_row(row: &str) -> Option<Sample> {
    let row = row.trim_end_matches('\r');
    if row.trim().is_empty() {
        return None;
    }

    let delimiter = if row.contains('\t') { '\t' } else { ',' };
    let mut fields = row.split(delimiter).map(parse_field);

    let time = fields.next()??;
    let x = fields.next()??;
    let y = fields.next()??;
    let z = fields.next()??;

    // A zero or unreadable magnitude column is recomputed from the axes.
    let absolute = match fields.next().flatten() {
        Some(value) if value != 0.0 => value,
        _ => magnitude(x, y, z),
    };

    Some(Sample::with_absolute(time, x, y, z, absolute))
}

fn parse_field(field: &str) -> Option<f64> {
    let cleaned = field.replace('"', "");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Render samples in the canonical five-column export format.
pub fn samples_to_csv(samples: &[Sample]) -> String {
    let mut lines = Vec::with_capacity(samples.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for s in samples {
        lines.push(format!("{},{},{},{},{}", s.time, s.x, s.y, s.z, s.absolute));
    }
    lines.join("\n")
}
