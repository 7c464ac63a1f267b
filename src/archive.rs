//! Rewrites an exported image tarball to carry extra templates.
//!
//! The tarball is never unpacked onto disk: it holds root-owned device nodes
//! and the like, which an unprivileged user can't recreate. Instead it is
//! decompressed into a scratch file and streamed entry by entry into a new
//! compressed tarball, with `metadata.yaml` swapped for an updated copy and
//! the template bodies appended under `templates/`.

use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};
use log::debug;
use serde_yaml::{Mapping, Value};
use std::{
    fs::{self, File},
    io::{self, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use tar::{Archive, Builder as TarBuilder, EntryType, Header};

use crate::{
    error::{Error, Result},
    models::{Fingerprint, Template},
};

pub const METADATA_ENTRY: &str = "metadata.yaml";
pub const TEMPLATES_DIR: &str = "templates";

const TEMPLATE_MODE: u32 = 0o644;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedImage {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
}

/// Finds the tarball `lxc image export` left in `directory`.
///
/// Split images (separate metadata and rootfs tarballs) are not supported, so
/// the directory has to hold exactly one file.
pub fn locate_export(directory: &Path) -> Result<ExportedImage> {
    let mut names = fs::read_dir(directory)?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();

    if names.len() != 1 {
        return Err(Error::UnexpectedExport {
            found: names.len(),
            names,
        });
    }

    let name = names.remove(0);
    let fingerprint = Fingerprint::from_export_name(&name)?;

    Ok(ExportedImage {
        path: directory.join(name),
        fingerprint,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveCompression {
    Gzip,
}

impl ArchiveCompression {
    pub fn from_path(path: &Path) -> Result<ArchiveCompression> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Ok(ArchiveCompression::Gzip),
            _ => Err(Error::UnsupportedCompression(path.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteSummary {
    pub entries_copied: usize,
    pub templates_added: usize,
    pub compressed_size: u64,
}

/// Writes a copy of the image tarball at `source` to `output`, adding `templates`
/// to its metadata. `source` is left untouched.
pub fn rewrite(source: &Path, output: &Path, templates: &[Template]) -> Result<RewriteSummary> {
    let compression = ArchiveCompression::from_path(source)?;

    let scratch_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tarball = tempfile::tempfile_in(scratch_dir)?;
    decompress(compression, source, &mut tarball)?;
    tarball.seek(SeekFrom::Start(0))?;

    let encoder = GzEncoder::new(File::create(output)?, Compression::default());
    let mut builder = TarBuilder::new(encoder);

    let (metadata, entries_copied) = copy_entries(tarball, &mut builder)?;
    let metadata = metadata.ok_or_else(|| Error::MissingMetadata(source.to_owned()))?;

    let mut document: Value = serde_yaml::from_slice(&metadata)?;
    merge_templates(&mut document, templates)?;
    let metadata = serde_yaml::to_vec(&document)?;

    append_file(&mut builder, METADATA_ENTRY, &metadata)?;
    for template in templates {
        let name = format!("{}/{}", TEMPLATES_DIR, template.template);
        append_file(&mut builder, &name, template.content.as_bytes())?;
    }

    // Tar writer, then compressor, then file; each flushes into the next.
    let encoder = builder.into_inner()?;
    let mut file = encoder.finish()?;
    file.flush()?;
    file.sync_all()?;

    Ok(RewriteSummary {
        entries_copied,
        templates_added: templates.len(),
        compressed_size: file.metadata()?.len(),
    })
}

fn decompress(compression: ArchiveCompression, source: &Path, into: &mut File) -> Result<()> {
    let input = BufReader::new(File::open(source)?);
    let copied = match compression {
        ArchiveCompression::Gzip => io::copy(&mut MultiGzDecoder::new(input), into)?,
    };
    debug!("decompressed {} to {} bytes", source.display(), copied);
    Ok(())
}

/// Copies every entry except `metadata.yaml` into `builder`, returning the
/// metadata contents and the number of entries copied.
///
/// Entries are read raw so that long-name and pax records reach the output
/// exactly as they were. Such records are held back until the entry they
/// describe shows up, and dropped along with it if that entry is the metadata.
fn copy_entries<R: Read, W: Write>(
    tarball: R,
    builder: &mut TarBuilder<W>,
) -> Result<(Option<Vec<u8>>, usize)> {
    let mut archive = Archive::new(BufReader::new(tarball));
    let mut pending: Vec<(Header, Vec<u8>)> = Vec::new();
    let mut metadata = None;
    let mut copied = 0;

    for entry in archive.entries()?.raw(true) {
        let mut entry = entry?;
        let header = entry.header().clone();

        match header.entry_type() {
            EntryType::GNULongName | EntryType::GNULongLink | EntryType::XHeader => {
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                pending.push((header, data));
                continue;
            }
            _ => {}
        }

        if is_metadata(&header, &pending) {
            if metadata.is_some() {
                return Err(Error::InvalidMetadata(format!(
                    "image contains more than one {}",
                    METADATA_ENTRY
                )));
            }
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            metadata = Some(data);
            pending.clear();
            continue;
        }

        for (header, data) in pending.drain(..) {
            builder.append(&header, data.as_slice())?;
        }
        builder.append(&header, &mut entry)?;
        copied += 1;
    }

    if !pending.is_empty() {
        debug!("dropping {} trailing extension records", pending.len());
    }

    Ok((metadata, copied))
}

fn is_metadata(header: &Header, pending: &[(Header, Vec<u8>)]) -> bool {
    let pax_name = pending
        .iter()
        .rev()
        .filter(|(header, _)| header.entry_type() == EntryType::XHeader)
        .find_map(|(_, data)| pax_path(data));
    let long_name = pending
        .iter()
        .rev()
        .find(|(header, _)| header.entry_type() == EntryType::GNULongName);

    let name = match (pax_name, long_name) {
        (Some(path), _) => path.to_vec(),
        (None, Some((_, data))) => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            data[..end].to_vec()
        }
        (None, None) => header.path_bytes().into_owned(),
    };

    let name = name.strip_prefix(b"./").unwrap_or(name.as_slice());
    header.entry_type().is_file() && name == METADATA_ENTRY.as_bytes()
}

/// Finds the `path` record of a pax extended header. Each record reads
/// `<length> <key>=<value>\n`, the length counting the whole record.
fn pax_path(mut records: &[u8]) -> Option<&[u8]> {
    let mut path = None;
    while !records.is_empty() {
        let space = match records.iter().position(|&b| b == b' ') {
            Some(space) => space,
            None => break,
        };
        let len = match std::str::from_utf8(&records[..space])
            .ok()
            .and_then(|len| len.parse::<usize>().ok())
        {
            Some(len) if len > space + 1 && len <= records.len() => len,
            _ => break,
        };

        let record = &records[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(value);
        }
        records = &records[len..];
    }
    path
}

/// Adds each template to the `templates` mapping of an image's metadata,
/// keyed by the path it renders to. Templates already there are kept unless
/// one of `templates` targets the same path.
pub fn merge_templates(document: &mut Value, templates: &[Template]) -> Result<()> {
    let mapping = document
        .as_mapping_mut()
        .ok_or_else(|| Error::InvalidMetadata("document is not a mapping".into()))?;

    let key = Value::from("templates");
    if matches!(mapping.get(&key), None | Some(Value::Null)) {
        mapping.insert(key.clone(), Value::Mapping(Mapping::new()));
    }

    let existing = mapping
        .get_mut(&key)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| Error::InvalidMetadata("templates is not a mapping".into()))?;

    for template in templates {
        existing.insert(
            Value::from(template.path.clone()),
            serde_yaml::to_value(template)?,
        );
    }

    Ok(())
}

fn append_file<W: Write>(builder: &mut TarBuilder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(TEMPLATE_MODE);
    header.set_size(data.len() as u64);
    builder.append_data(&mut header, name, data)?;
    Ok(())
}
