//! Raw packet dumps: a gzip stream of framed records, one file per
//! session. Writing happens on a blocking task fed through a channel
//! so the session loop never waits on disk.

use chrono::{SecondsFormat, Utc};
use flate2::{write::GzEncoder, Compression};
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::task;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Inbound = 0,
    Outbound = 1,
}

struct Record {
    direction: Direction,
    timestamp_millis: f64,
    data: Vec<u8>,
}

/// Handle used by a session to feed its dump file.
#[derive(Clone)]
pub struct PacketDumper {
    sender: flume::Sender<Record>,
}

impl PacketDumper {
    /// Opens `<dir>/<ISO-8601>.<profile-id>.dump.gz` and starts the
    /// writer task.
    pub fn open(dir: &Path, profile_id: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let path: PathBuf = dir.join(format!("{timestamp}.{profile_id}.dump.gz"));
        let file = std::fs::File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::new(4));

        let (sender, receiver) = flume::unbounded::<Record>();
        task::spawn_blocking(move || {
            while let Ok(record) = receiver.recv() {
                if write_record(&mut encoder, &record).is_err() {
                    break;
                }
            }
            if let Err(e) = encoder.finish() {
                tracing::warn!("failed to finish packet dump: {e}");
            }
        });

        tracing::info!("dumping packets to {}", path.display());
        Ok(Self { sender })
    }

    pub fn record(&self, direction: Direction, data: Vec<u8>) {
        let timestamp_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.sender
            .send(Record {
                direction,
                timestamp_millis,
                data,
            })
            .ok();
    }
}

fn write_record(writer: &mut impl Write, record: &Record) -> std::io::Result<()> {
    writer.write_all(&(record.data.len() as u32).to_be_bytes())?;
    writer.write_all(&[record.direction as u8])?;
    writer.write_all(&record.timestamp_millis.to_be_bytes())?;
    writer.write_all(&record.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn record_framing() {
        let mut buf = Vec::new();
        write_record(
            &mut buf,
            &Record {
                direction: Direction::Outbound,
                timestamp_millis: 1234.5,
                data: vec![0x2F, 0x01],
            },
        )
        .unwrap();
        assert_eq!(&buf[0..4], &2u32.to_be_bytes());
        assert_eq!(buf[4], 1);
        assert_eq!(&buf[5..13], &1234.5f64.to_be_bytes());
        assert_eq!(&buf[13..], &[0x2F, 0x01]);
    }

    #[tokio::test]
    async fn dump_file_is_gzip_of_records() {
        let dir = std::env::temp_dir().join(format!("dump-test-{}", std::process::id()));
        let dumper = PacketDumper::open(&dir, "abcd").unwrap();
        dumper.record(Direction::Inbound, vec![1, 2, 3]);
        drop(dumper);

        // wait for the writer task to flush
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let entry = std::fs::read_dir(&dir)
            .unwrap()
            .next()
            .expect("dump file created")
            .unwrap();
        assert!(entry.file_name().to_string_lossy().ends_with(".abcd.dump.gz"));

        let mut decoded = Vec::new();
        GzDecoder::new(std::fs::File::open(entry.path()).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(&decoded[0..4], &3u32.to_be_bytes());
        assert_eq!(decoded[4], 0);
        assert_eq!(&decoded[13..], &[1, 2, 3]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
