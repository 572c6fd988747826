//! JSON Lines export of the history.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::RehearseResult;

use super::postmortem::Postmortem;
use super::store::HistoryStore;

/// Writes one JSON object per line, digests included.
pub fn write_jsonl<W: Write>(records: &[Postmortem], writer: W) -> RehearseResult<usize> {
    let mut writer = BufWriter::new(writer);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}

impl HistoryStore {
    /// Exports the full history to a JSON Lines file.
    pub fn export_jsonl(&self, path: &Path) -> RehearseResult<usize> {
        let records = self.all()?;
        let file = std::fs::File::create(path)?;
        let count = write_jsonl(&records, file)?;

        tracing::info!(
            path = %path.display(),
            records = count,
            "History exported"
        );

        Ok(count)
    }
}
