use std::fs::File;
use std::io::{BufWriter, Write};

use crate::domain::matching::MatchResult;
use crate::errors::EngineResult;
use crate::repository::{FileRepository, MatchOutput, MatchWriter};

fn write_json<W: Write>(mut writer: W, result: &MatchResult) -> EngineResult<()> {
    serde_json::to_writer(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl MatchWriter for FileRepository {
    fn write_matches(&self, result: &MatchResult) -> EngineResult<()> {
        match &self.output {
            MatchOutput::File(path) => {
                let file = File::create(path)?;
                write_json(BufWriter::new(file), result)
            }
            MatchOutput::Stdout => write_json(std::io::stdout().lock(), result),
        }
    }
}
