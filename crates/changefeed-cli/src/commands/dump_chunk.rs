//! Dump-chunk command implementation.

use changefeed_format::{decode_chunk, FramedBlockDecoder};

use crate::location;
use crate::output;

pub fn run(file: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = location::validate_file(&file).map_err(|e| format!("Invalid chunk path: {}", e))?;
    let bytes = std::fs::read(&path)?;

    let (blocks, stopped_at) = decode_chunk(&FramedBlockDecoder, &bytes).map_err(|e| {
        let sanitized = location::sanitize_path_for_error(&path);
        format!("Failed to decode chunk: {}: {}", sanitized, e)
    })?;

    for block in &blocks {
        if json {
            for record in &block.records {
                println!("{}", serde_json::to_string(record)?);
            }
        } else {
            println!("block @{} ({} records)", block.offset, block.records.len());
            for record in &block.records {
                println!("{}", output::format_json(record));
            }
        }
    }

    if stopped_at < bytes.len() as u64 {
        eprintln!(
            "warning: {} trailing bytes after offset {} do not form a complete block",
            bytes.len() as u64 - stopped_at,
            stopped_at
        );
    }

    Ok(())
}
