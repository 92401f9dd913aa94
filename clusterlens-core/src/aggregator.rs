// File aggregation: fold every line of every file into one MetricsAggregate

use crate::input::read_log_file;
use crate::metrics::{MetricSelection, MetricsAggregate};
use crate::parser::classify_line;
use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};

/// Aggregate the full text of each file, in the order given.
///
/// All files share one aggregate: sums and slow queries are pooled globally,
/// so slow queries end up in file order, then line order. The per-file mean is
/// applied exactly once, after the last file.
pub fn aggregate_contents<I, S>(files: I) -> MetricsAggregate
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    aggregate_contents_with(files, &MetricSelection::all())
}

/// Same as [`aggregate_contents`], accumulating only the selected categories
pub fn aggregate_contents_with<I, S>(files: I, selection: &MetricSelection) -> MetricsAggregate
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut aggregate = MetricsAggregate::new();
    let mut file_count = 0;

    for content in files {
        file_count += 1;
        scan_content(&mut aggregate, content.as_ref(), selection);
    }

    info!(
        "Aggregated {} files: {} of {} lines decoded, {} slow queries",
        file_count, aggregate.records_decoded, aggregate.lines_scanned, aggregate.slow_query_count
    );

    aggregate.normalize(file_count)
}

fn scan_content(aggregate: &mut MetricsAggregate, content: &str, selection: &MetricSelection) {
    let before = aggregate.records_decoded;

    for line in content.lines() {
        aggregate.lines_scanned += 1;
        if let Some(record) = classify_line(line) {
            aggregate.records_decoded += 1;
            aggregate.record_with(&record, selection);
        }
    }

    debug!("File contributed {} structured records", aggregate.records_decoded - before);
}

/// Read the given files from disk and aggregate them.
///
/// Files are read one at a time in the order supplied. An unreadable file
/// fails the whole call; bad lines inside a readable file never do.
pub async fn aggregate_files<P: AsRef<Path>>(
    paths: &[P],
    selection: &MetricSelection,
) -> Result<MetricsAggregate> {
    info!("Starting metrics aggregation of {} files", paths.len());

    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        contents.push(read_log_file(path).await?);
    }

    Ok(aggregate_contents_with(&contents, selection))
}
