//! Cursor command implementation.

use changefeed::ChangeFeedCursor;

pub fn run(token: String) -> Result<(), Box<dyn std::error::Error>> {
    let cursor = ChangeFeedCursor::deserialize(&token)?;
    println!("{}", serde_json::to_string_pretty(&cursor)?);
    Ok(())
}
