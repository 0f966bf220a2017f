use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Frames above this size are treated as a corrupt length prefix.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

fn encode_record<T: Serialize>(writer: &mut impl Write, record: &T) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Read exactly `buf.len()` bytes; `Ok(false)` on a clean or torn end of file.
fn read_frame_part(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only write-ahead log of one tenant.
///
/// Frame: `[u32 len][bincode record][u32 crc32]`, little endian. `len` counts
/// the payload only. A torn or corrupt tail left by a crash ends replay.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        self.append_buffered(record)?;
        self.flush_sync()
    }

    /// Buffer one record; durable only after `flush_sync`.
    pub fn append_buffered<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        encode_record(&mut self.writer, record)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write the compacted records to a temp file next to the log and fsync.
    pub fn write_compact_file<T: Serialize>(path: &Path, records: &[T]) -> io::Result<()> {
        let file = File::create(Self::tmp_path(path))?;
        let mut writer = BufWriter::new(file);
        for record in records {
            encode_record(&mut writer, record)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp file over the log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(Self::tmp_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact<T: Serialize>(&mut self, records: &[T]) -> io::Result<()> {
        Self::write_compact_file(&self.path, records)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Every intact record in the log, in append order. A missing file is an
    /// empty log.
    pub fn replay<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
        Ok(Self::replay_intact(path)?.0)
    }

    /// Replay the log, cut any torn or corrupt tail, and open it for appends.
    /// New frames must follow the last intact one or the next replay would
    /// stop in front of them.
    pub fn recover<T: DeserializeOwned>(path: &Path) -> io::Result<(Self, Vec<T>)> {
        let (records, intact_len) = Self::replay_intact(path)?;
        if let Ok(meta) = fs::metadata(path)
            && meta.len() > intact_len
        {
            warn!(
                path = %path.display(),
                dropped_bytes = meta.len() - intact_len,
                "truncating torn WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(intact_len)?;
            file.sync_all()?;
        }
        Ok((Self::open(path)?, records))
    }

    /// Intact records plus the byte length they occupy from the start of the file.
    fn replay_intact<T: DeserializeOwned>(path: &Path) -> io::Result<(Vec<T>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut intact_len = 0u64;

        loop {
            let mut len_buf = [0u8; 4];
            if !read_frame_part(&mut reader, &mut len_buf)? {
                break;
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                warn!(path = %path.display(), len, "implausible WAL frame length, stopping replay");
                break;
            }

            let mut payload = vec![0u8; len];
            if !read_frame_part(&mut reader, &mut payload)? {
                break;
            }
            let mut crc_buf = [0u8; 4];
            if !read_frame_part(&mut reader, &mut crc_buf)? {
                break;
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                warn!(
                    path = %path.display(),
                    replayed = records.len(),
                    "WAL checksum mismatch, stopping replay"
                );
                break;
            }

            match bincode::deserialize::<T>(&payload) {
                Ok(record) => records.push(record),
                Err(_) => break,
            }
            intact_len += 8 + len as u64;
        }

        Ok((records, intact_len))
    }
}
