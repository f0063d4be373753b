use crate::codec::{CalendarDate, DateCodec};
use crate::model::{NoteError, NoteFile};
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Owns the notes directory. The only component that writes note content.
#[derive(Debug, Clone)]
pub struct NoteStore {
    dir: PathBuf,
    codec: DateCodec,
}

impl NoteStore {
    pub fn new(dir: impl Into<PathBuf>, codec: DateCodec) -> Self {
        NoteStore {
            dir: dir.into(),
            codec,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn codec(&self) -> &DateCodec {
        &self.codec
    }

    pub fn path_for(&self, date: CalendarDate) -> PathBuf {
        self.dir.join(self.codec.encode(date))
    }

    pub fn exists(&self, date: CalendarDate) -> bool {
        self.path_for(date).is_file()
    }

    /// Returns the note text, or the synthesized default when the file does not
    /// exist yet. Nothing is written here.
    pub fn read(&self, date: CalendarDate) -> Result<String, NoteError> {
        Ok(self.load(date)?.content)
    }

    pub fn load(&self, date: CalendarDate) -> Result<NoteFile, NoteError> {
        let path = self.path_for(date);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(NoteFile {
                date,
                path,
                content,
                exists_on_disk: true,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(NoteFile {
                date,
                content: self.codec.default_content(date),
                path,
                exists_on_disk: false,
            }),
            Err(err) => Err(NoteError::io("reading", path, err)),
        }
    }

    /// Replaces the note for `date` with `content`.
    ///
    /// The text lands in a temporary file next to the target and is renamed over
    /// it, so a reader sees either the old or the new note, never a mix.
    pub fn write(&self, date: CalendarDate, content: &str) -> Result<(), NoteError> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| NoteError::io("creating", &self.dir, err))?;
        let path = self.path_for(date);
        let mut tmp = tempfile::Builder::new()
            .prefix(".daynote-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|err| NoteError::io("creating temp file in", &self.dir, err))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|err| NoteError::io("writing", tmp.path().to_path_buf(), err))?;
        tmp.persist(&path)
            .map_err(|err| NoteError::io("replacing", &path, err.error))?;
        info!(
            "event=note_write date={} bytes={}",
            date,
            content.len()
        );
        Ok(())
    }

    /// Every decodable note in the directory, in no particular order.
    ///
    /// Entries whose names do not decode are skipped with a warning. A missing
    /// notes directory is an empty collection.
    pub fn list_all(&self) -> Result<Vec<(CalendarDate, PathBuf)>, NoteError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(NoteError::io("listing", &self.dir, err)),
        };
        let mut notes = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("event=listing_skip dir={} reason={}", self.dir.display(), err);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!("event=listing_skip file={} reason=non-utf8 name", path.display());
                continue;
            };
            if name.starts_with(".daynote-") {
                debug!("event=listing_skip file={} reason=temp file", name);
                continue;
            }
            match self.codec.decode(name) {
                Ok(date) => notes.push((date, path)),
                Err(err) => warn!("event=listing_skip file={} reason={}", name, err),
            }
        }
        Ok(notes)
    }

    /// Reads every listed note. Unreadable files are logged and left out.
    pub fn load_corpus(&self) -> Result<Vec<NoteFile>, NoteError> {
        let listed = self.list_all()?;
        let mut notes = Vec::with_capacity(listed.len());
        for (date, path) in listed {
            match fs::read_to_string(&path) {
                Ok(content) => notes.push(NoteFile {
                    date,
                    path,
                    content,
                    exists_on_disk: true,
                }),
                Err(err) => warn!(
                    "event=corpus_skip file={} reason={}",
                    path.display(),
                    err
                ),
            }
        }
        Ok(notes)
    }
}
