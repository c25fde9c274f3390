use crate::cluster::TopicPartition;
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const HIGH_WATERMARK_CHECKPOINT_FILE: &str = "replication-offset-checkpoint";

const CURRENT_VERSION: u32 = 0;

// File layout, one item per line:
//
// 0                              <- version
// 2                              <- number of entries
// orders 0 1200                  <- topic, partition, high watermark
// payments 3 88
//
// Topic names cannot contain whitespace, so a single space is an unambiguous separator.
pub struct HighWatermarkCheckpoint {
    path: PathBuf,
    // Serializes writers so two snapshots never race on the temp file.
    lock: Mutex<()>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint file IO failure: {0}")]
    Io(#[from] io::Error),
    #[error("Unrecognized checkpoint file version {0}")]
    UnsupportedVersion(u32),
    #[error("Malformed checkpoint file at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Topic name '{0}' can't be written to the checkpoint file")]
    InvalidTopic(String),
}

/// Topics are stored space separated, so a name must be non-empty and free of whitespace.
pub(crate) fn is_checkpointable_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.chars().any(char::is_whitespace)
}

impl HighWatermarkCheckpoint {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        HighWatermarkCheckpoint {
            path: directory.as_ref().join(HIGH_WATERMARK_CHECKPOINT_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the checkpoint file with `high_watermarks`. A crash at any point leaves either the
    /// previous file or the new one, never a mix.
    pub fn write(&self, high_watermarks: &HashMap<TopicPartition, u64>) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().expect("HighWatermarkCheckpoint.write() mutex guard poison");

        let mut entries: Vec<_> = high_watermarks.iter().collect();
        entries.sort();
        if let Some((topic_partition, _)) = entries
            .iter()
            .find(|(topic_partition, _)| !is_checkpointable_topic(topic_partition.topic()))
        {
            return Err(CheckpointError::InvalidTopic(topic_partition.topic().to_string()));
        }

        let mut contents = format!("{}\n{}\n", CURRENT_VERSION, entries.len());
        for (topic_partition, offset) in entries {
            contents.push_str(&format!(
                "{} {} {}\n",
                topic_partition.topic(),
                topic_partition.partition(),
                offset
            ));
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        // The rename itself is only durable once the directory entry is flushed.
        if let Some(parent) = self.path.parent() {
            fs::File::open(parent)?.sync_all()?;
        }

        Ok(())
    }

    /// Reads the last written snapshot. A missing file means nothing was ever checkpointed.
    pub fn read(&self) -> Result<HashMap<TopicPartition, u64>, CheckpointError> {
        let _guard = self.lock.lock().expect("HighWatermarkCheckpoint.read() mutex guard poison");

        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let version: u32 = parse_line(lines.next(), 1, "version")?;
        if version != CURRENT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(version));
        }
        let expected_entries: usize = parse_line(lines.next(), 2, "entry count")?;

        let mut high_watermarks = HashMap::with_capacity(expected_entries);
        let mut line_number = 2;
        for line in lines {
            line_number += 1;
            let line = line?;
            let (topic_partition, offset) = parse_entry(&line, line_number)?;
            high_watermarks.insert(topic_partition, offset);
        }

        if high_watermarks.len() != expected_entries {
            return Err(CheckpointError::Malformed {
                line: line_number,
                reason: format!(
                    "expected {} entries but found {}",
                    expected_entries,
                    high_watermarks.len()
                ),
            });
        }

        Ok(high_watermarks)
    }
}

fn parse_line<T: std::str::FromStr>(
    line: Option<io::Result<String>>,
    line_number: usize,
    what: &str,
) -> Result<T, CheckpointError> {
    let line = match line {
        Some(line) => line?,
        None => {
            return Err(CheckpointError::Malformed {
                line: line_number,
                reason: format!("missing {}", what),
            })
        }
    };

    line.trim().parse().map_err(|_| CheckpointError::Malformed {
        line: line_number,
        reason: format!("invalid {} '{}'", what, line),
    })
}

fn parse_entry(line: &str, line_number: usize) -> Result<(TopicPartition, u64), CheckpointError> {
    let malformed = || CheckpointError::Malformed {
        line: line_number,
        reason: format!("expected '<topic> <partition> <offset>', got '{}'", line),
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(malformed());
    }

    let partition: i32 = fields[1].parse().map_err(|_| malformed())?;
    let offset: u64 = fields[2].parse().map_err(|_| malformed())?;

    Ok((TopicPartition::new(fields[0], partition), offset))
}
